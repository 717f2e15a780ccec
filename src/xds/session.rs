/*
 * Copyright 2023 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The per-stream discovery protocol state machine.

use std::collections::BTreeMap;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing_futures::Instrument;

use crate::{
    node::NodeIdentity,
    xds::{
        error::Peer, metrics, DiscoveryRequest, DiscoveryResponse, DiscoveryServer, Error,
        ResourceType,
    },
};

pub type ResponseSender = mpsc::Sender<Result<DiscoveryResponse, tonic::Status>>;

/// What was last sent for one resource type.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Tracked {
    nonce: String,
    version: String,
    /// Generation of the snapshot the last build used.
    generation: u64,
}

/// Protocol state of one discovery stream.
///
/// A session starts out awaiting its initial request, which carries the
/// node. Once the node is known the session is active, and every resource
/// type the client asked for is pushed again whenever the mesh changes.
pub struct Session {
    server: DiscoveryServer,
    /// Set for LDS, CDS, RDS and EDS streams. Aggregated streams serve any
    /// type.
    kind: Option<ResourceType>,
    peer: Peer,
    node: Option<NodeIdentity>,
    streams: BTreeMap<ResourceType, Tracked>,
}

impl Session {
    pub fn new(server: DiscoveryServer, kind: Option<ResourceType>, peer: impl Into<Peer>) -> Self {
        Self {
            server,
            kind,
            peer: peer.into(),
            node: None,
            streams: BTreeMap::new(),
        }
    }

    pub fn peer(&self) -> Peer {
        self.peer
    }

    /// The requesting node, once the initial request has been processed.
    pub fn node(&self) -> Option<&NodeIdentity> {
        self.node.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.node.is_some()
    }

    /// Serves the stream until the client goes away, the response channel is
    /// dropped, or the session fails.
    ///
    /// Requests are read on their own task and handed over one at a time, so
    /// that reading never waits on a build or a send.
    pub async fn run<S>(mut self, requests: S, responses: ResponseSender) -> Result<(), Error>
    where
        S: Stream<Item = Result<DiscoveryRequest, tonic::Status>> + Send + Unpin + 'static,
    {
        let (handoff_tx, mut handoff) = mpsc::channel(1);
        let mut receiver = tokio::spawn(receive(requests, handoff_tx, self.peer).in_current_span());
        let _abort = AbortOnDrop(receiver.abort_handle());

        let mut updates = self.server.store().subscribe();
        let mut watching = true;
        let mut ticker = tokio::time::interval(self.server.push_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                request = handoff.recv() => match request {
                    Some(request) => self.handle_request(request, &responses).await?,
                    None => {
                        return match (&mut receiver).await {
                            Ok(result) => result,
                            Err(error) => {
                                tracing::error!(%error, "receive task failed");
                                Ok(())
                            }
                        };
                    }
                },
                _ = ticker.tick() => self.refresh(&responses).await?,
                changed = updates.changed(), if watching => match changed {
                    Ok(()) => self.refresh(&responses).await?,
                    // The store is gone, only ticks remain.
                    Err(_) => watching = false,
                },
                _ = responses.closed() => {
                    tracing::debug!("response channel closed");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_request(
        &mut self,
        request: DiscoveryRequest,
        responses: &ResponseSender,
    ) -> Result<(), Error> {
        if self.node.is_none() {
            let node = NodeIdentity::from_node(request.node.as_ref().ok_or(Error::MissingNode)?)?;
            tracing::info!(node = %node.service_node(), "new discovery stream");
            self.node = Some(node);
        }

        let kind = self.resource_type(&request.type_url)?;
        let node = self.service_node();
        metrics::discovery_request(&node, kind.as_ref());

        let Some(tracked) = self.streams.get(&kind) else {
            tracing::debug!(%kind, "initial request");
            return self.push(kind, responses).await;
        };

        if request.response_nonce != tracked.nonce {
            tracing::trace!(
                %kind,
                nonce = %request.response_nonce,
                expected = %tracked.nonce,
                "ignoring stale request"
            );
            return Ok(());
        }

        match &request.error_detail {
            Some(error) => {
                metrics::nack(&node, kind);
                tracing::warn!(
                    %kind,
                    nonce = %request.response_nonce,
                    version = %request.version_info,
                    error = %error.message,
                    "NACK"
                );
            }
            None => {
                metrics::ack(&node, kind);
                tracing::debug!(
                    %kind,
                    nonce = %request.response_nonce,
                    version = %request.version_info,
                    "ACK"
                );
            }
        }

        Ok(())
    }

    fn resource_type(&self, type_url: &str) -> Result<ResourceType, Error> {
        match self.kind {
            Some(expected) if type_url.is_empty() || type_url == expected.type_url() => {
                Ok(expected)
            }
            Some(expected) => Err(Error::UnexpectedResourceType {
                expected,
                found: type_url.into(),
            }),
            None => Ok(ResourceType::try_from(type_url)?),
        }
    }

    /// Pushes every requested type whose last build predates the current
    /// snapshot.
    async fn refresh(&mut self, responses: &ResponseSender) -> Result<(), Error> {
        if self.node.is_none() {
            return Ok(());
        }

        let generation = self.server.store().load().generation;
        let outdated: Vec<_> = self
            .streams
            .iter()
            .filter(|(_, tracked)| tracked.generation != generation)
            .map(|(kind, _)| *kind)
            .collect();

        for kind in outdated {
            self.push(kind, responses).await?;
        }

        Ok(())
    }

    /// Builds `kind` from the current snapshot and sends it, unless the
    /// client already has that version.
    async fn push(&mut self, kind: ResourceType, responses: &ResponseSender) -> Result<(), Error> {
        let Some(node) = &self.node else {
            return Ok(());
        };

        let snapshot = self.server.store().load();
        let set = self.server.build(node, kind, &snapshot).map_err(|source| {
            metrics::build_error(kind);
            Error::Build { kind, source }
        })?;

        if let Some(tracked) = self.streams.get_mut(&kind) {
            tracked.generation = snapshot.generation;
            if tracked.version == set.version() {
                tracing::trace!(%kind, version = %tracked.version, "resources unchanged");
                return Ok(());
            }
        }

        let nonce = uuid::Uuid::new_v4().to_string();
        let version = set.version().to_owned();
        let resources = set.len();
        let response = set.into_response(nonce.clone(), self.server.control_plane());

        if responses.send(Ok(response)).await.is_err() {
            return Err(Error::SendFailed { peer: self.peer });
        }

        metrics::discovery_response(kind);
        tracing::debug!(%kind, %nonce, %version, resources, "sent discovery response");
        self.streams.insert(
            kind,
            Tracked {
                nonce,
                version,
                generation: snapshot.generation,
            },
        );

        Ok(())
    }

    fn service_node(&self) -> String {
        self.node
            .as_ref()
            .map(NodeIdentity::service_node)
            .unwrap_or_default()
    }
}

/// Forwards requests to the session until the stream ends.
async fn receive<S>(
    mut requests: S,
    handoff: mpsc::Sender<DiscoveryRequest>,
    peer: Peer,
) -> Result<(), Error>
where
    S: Stream<Item = Result<DiscoveryRequest, tonic::Status>> + Unpin,
{
    while let Some(request) = requests.next().await {
        match request {
            Ok(request) => {
                if handoff.send(request).await.is_err() {
                    return Ok(());
                }
            }
            Err(status) if status.code() == tonic::Code::Cancelled => {
                tracing::debug!(%peer, "stream cancelled by client");
                return Ok(());
            }
            Err(status) => return Err(Error::Receive { peer, status }),
        }
    }

    Ok(())
}

struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        mesh::{
            MeshModel, MeshSettings, MeshStore, Protocol, Service, ServiceInstance, ServicePort,
        },
        test::request,
    };
    use pretty_assertions::assert_eq;
    use std::{sync::Arc, time::Duration};
    use tokio::time::timeout;
    use tokio_stream::wrappers::ReceiverStream;

    const TIMEOUT: Duration = Duration::from_secs(10);
    const ROUTER: &str = "router~~edge~default.svc.cluster.local";

    fn model(gateway_ports: Vec<u32>) -> MeshModel {
        MeshModel {
            settings: MeshSettings {
                gateway_ports,
                ..<_>::default()
            },
            ..<_>::default()
        }
    }

    fn server(model: MeshModel) -> DiscoveryServer {
        DiscoveryServer::new(Arc::new(MeshStore::with_model(model)), &Config::default())
    }

    fn ack(response: &DiscoveryResponse) -> DiscoveryRequest {
        DiscoveryRequest {
            version_info: response.version_info.clone(),
            response_nonce: response.nonce.clone(),
            type_url: response.type_url.clone(),
            ..<_>::default()
        }
    }

    struct Harness {
        requests: mpsc::Sender<Result<DiscoveryRequest, tonic::Status>>,
        responses: mpsc::Receiver<Result<DiscoveryResponse, tonic::Status>>,
        session: tokio::task::JoinHandle<Result<(), Error>>,
    }

    impl Harness {
        fn start(server: DiscoveryServer, kind: Option<ResourceType>) -> Self {
            let (requests, rx) = mpsc::channel(8);
            let (tx, responses) = mpsc::channel(8);
            let session = tokio::spawn(Session::new(server, kind, Peer(None)).run(ReceiverStream::new(rx), tx));

            Self {
                requests,
                responses,
                session,
            }
        }

        async fn send(&self, request: DiscoveryRequest) {
            timeout(TIMEOUT, self.requests.send(Ok(request)))
                .await
                .unwrap()
                .unwrap();
        }

        async fn recv(&mut self) -> DiscoveryResponse {
            timeout(TIMEOUT, self.responses.recv())
                .await
                .unwrap()
                .unwrap()
                .unwrap()
        }

        /// Asserts that nothing is sent for a while.
        async fn quiet(&mut self) {
            assert!(timeout(Duration::from_millis(200), self.responses.recv())
                .await
                .is_err());
        }

        async fn finish(self) -> Result<(), Error> {
            drop(self.requests);
            timeout(TIMEOUT, self.session).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn initial_request_then_ack() {
        crate::test::enable_log("meshpilot=debug");
        let mut harness = Harness::start(server(model(vec![80])), None);

        harness.send(request(ROUTER, ResourceType::Listener)).await;
        let response = harness.recv().await;
        assert_eq!(response.type_url, ResourceType::Listener.type_url());
        assert_eq!(response.resources.len(), 1);
        assert!(!response.version_info.is_empty());
        uuid::Uuid::parse_str(&response.nonce).unwrap();

        harness.send(ack(&response)).await;
        harness.quiet().await;

        harness.finish().await.unwrap();
    }

    #[tokio::test]
    async fn stale_and_nack_requests_change_nothing() {
        let server = server(model(vec![80]));
        let (tx, mut rx) = mpsc::channel(8);
        let mut session = Session::new(server, None, Peer(None));

        session
            .handle_request(request(ROUTER, ResourceType::Listener), &tx)
            .await
            .unwrap();
        let response = rx.recv().await.unwrap().unwrap();
        let before = session.streams.clone();

        let mut stale = ack(&response);
        stale.response_nonce = uuid::Uuid::new_v4().to_string();
        session.handle_request(stale, &tx).await.unwrap();

        let mut nack = ack(&response);
        nack.error_detail = Some(crate::generated::google::rpc::Status {
            code: 3,
            message: "rejected".into(),
            details: Vec::new(),
        });
        session.handle_request(nack, &tx).await.unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(session.streams, before);
        assert_eq!(session.streams[&ResourceType::Listener].nonce, response.nonce);
    }

    #[tokio::test]
    async fn model_changes_are_pushed() {
        let server = server(model(vec![80]));
        let store = server.store().clone();
        let mut harness = Harness::start(server, None);

        harness.send(request(ROUTER, ResourceType::Listener)).await;
        let first = harness.recv().await;
        harness.send(ack(&first)).await;

        store.publish(model(vec![443, 80]));
        let second = harness.recv().await;
        assert_eq!(second.resources.len(), 2);
        assert_ne!(second.version_info, first.version_info);
        assert_ne!(second.nonce, first.nonce);

        // A different model producing the same listeners pushes nothing.
        let mut same_listeners = model(vec![443, 80]);
        same_listeners.settings.proxy_listen_port = 15001;
        store.publish(same_listeners);
        harness.quiet().await;

        harness.finish().await.unwrap();
    }

    fn sidecar_model(instances: &[(&str, u32, &str, Option<&str>)]) -> MeshModel {
        let http = |name: &str, port| ServicePort {
            name: name.into(),
            port,
            protocol: Protocol::Http,
        };

        MeshModel {
            services: vec![Service {
                hostname: "svc.ns.svc.cluster.local".into(),
                ports: vec![http("http", 80), http("http-alt", 8080)],
            }],
            instances: instances
                .iter()
                .map(|&(address, port, port_name, node)| ServiceInstance {
                    service: "svc.ns.svc.cluster.local".into(),
                    address: address.into(),
                    port,
                    port_name: port_name.into(),
                    node: node.map(String::from),
                    labels: <_>::default(),
                })
                .collect(),
            ..<_>::default()
        }
    }

    fn listener_keys(response: &DiscoveryResponse) -> Vec<String> {
        use prost::Message;

        response
            .resources
            .iter()
            .map(|any| {
                let listener = crate::xds::listener::Listener::decode(&*any.value).unwrap();
                crate::xds::convert::address_key(listener.address.as_ref().unwrap()).unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn sidecar_listeners_follow_the_model() {
        const SIDECAR: &str = "sidecar~10.0.0.5~svc.ns~ns.svc.cluster.local";

        let server = server(sidecar_model(&[("10.0.0.5", 80, "http", None)]));
        let store = server.store().clone();
        let mut harness = Harness::start(server, Some(ResourceType::Listener));

        harness.send(request(SIDECAR, ResourceType::Listener)).await;
        let initial = harness.recv().await;
        assert_eq!(listener_keys(&initial), ["10.0.0.5:80"]);

        harness.send(ack(&initial)).await;
        harness.quiet().await;

        store.publish(sidecar_model(&[
            ("10.0.0.6", 8080, "http-alt", Some("svc.ns")),
            ("10.0.0.5", 80, "http", None),
        ]));
        let update = harness.recv().await;
        assert_eq!(listener_keys(&update), ["10.0.0.5:80", "10.0.0.6:8080"]);
        assert_ne!(update.version_info, initial.version_info);

        harness.finish().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_only_push_new_generations() {
        let mut harness = Harness::start(server(model(vec![80])), None);

        // Ticks before the initial request do nothing.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(harness.responses.try_recv().is_err());

        harness.send(request(ROUTER, ResourceType::Listener)).await;
        harness.recv().await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(harness.responses.try_recv().is_err());

        harness.finish().await.unwrap();
    }

    #[tokio::test]
    async fn aggregated_streams_multiplex_types() {
        let mut harness = Harness::start(server(model(vec![80])), None);

        harness.send(request(ROUTER, ResourceType::Listener)).await;
        let listeners = harness.recv().await;
        harness.send(request(ROUTER, ResourceType::Cluster)).await;
        let clusters = harness.recv().await;

        assert_eq!(listeners.type_url, ResourceType::Listener.type_url());
        assert_eq!(clusters.type_url, ResourceType::Cluster.type_url());
        assert!(clusters.resources.is_empty());

        harness.finish().await.unwrap();
    }

    #[tokio::test]
    async fn typed_streams_reject_other_types() {
        let mut harness = Harness::start(server(model(vec![80])), Some(ResourceType::Listener));

        let mut initial = request(ROUTER, ResourceType::Listener);
        initial.type_url.clear();
        harness.send(initial).await;
        assert_eq!(
            harness.recv().await.type_url,
            ResourceType::Listener.type_url()
        );

        harness.send(request(ROUTER, ResourceType::Cluster)).await;
        assert!(matches!(
            timeout(TIMEOUT, harness.session).await.unwrap().unwrap(),
            Err(Error::UnexpectedResourceType {
                expected: ResourceType::Listener,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn invalid_identity_ends_the_session() {
        let harness = Harness::start(server(model(vec![80])), None);

        harness.send(request("garbage", ResourceType::Listener)).await;
        assert!(matches!(
            harness.finish().await,
            Err(Error::Identity(crate::node::ParseError::MissingParts { .. }))
        ));

        let harness = Harness::start(server(model(vec![80])), None);
        harness
            .send(DiscoveryRequest {
                type_url: ResourceType::Listener.type_url().into(),
                ..<_>::default()
            })
            .await;
        assert!(matches!(harness.finish().await, Err(Error::MissingNode)));
    }

    #[tokio::test]
    async fn transport_errors() {
        let harness = Harness::start(server(model(vec![80])), None);
        harness
            .requests
            .send(Err(tonic::Status::cancelled("client went away")))
            .await
            .unwrap();
        harness.finish().await.unwrap();

        let harness = Harness::start(server(model(vec![80])), None);
        harness
            .requests
            .send(Err(tonic::Status::data_loss("connection reset")))
            .await
            .unwrap();
        let Err(Error::Receive { peer, status }) = harness.finish().await else {
            panic!("expected a receive error");
        };
        assert_eq!(peer, Peer(None));
        assert_eq!(status.code(), tonic::Code::DataLoss);
    }

    #[tokio::test]
    async fn dropped_response_channel_is_a_clean_close() {
        let harness = Harness::start(server(model(vec![80])), None);
        drop(harness.responses);

        timeout(TIMEOUT, harness.session)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
