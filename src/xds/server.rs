/*
 * Copyright 2022 Google LLC
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

use std::{sync::Arc, time::Duration};

use futures::Stream;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tracing_futures::Instrument;

use crate::{
    config::Config,
    generated::envoy::service::{
        cluster::v3::cluster_discovery_service_server::{
            ClusterDiscoveryService, ClusterDiscoveryServiceServer,
        },
        discovery::v3::aggregated_discovery_service_server::{
            AggregatedDiscoveryService, AggregatedDiscoveryServiceServer,
        },
        endpoint::v3::endpoint_discovery_service_server::{
            EndpointDiscoveryService, EndpointDiscoveryServiceServer,
        },
        listener::v3::listener_discovery_service_server::{
            ListenerDiscoveryService, ListenerDiscoveryServiceServer,
        },
        route::v3::route_discovery_service_server::{
            RouteDiscoveryService, RouteDiscoveryServiceServer,
        },
    },
    mesh::{MeshStore, Snapshot},
    node::NodeIdentity,
    signal::ShutdownRx,
    xds::{
        cache::ResponseCache,
        error::Peer,
        metrics::{self, StreamConnectionMetrics},
        BuildError, DiscoveryRequest, DiscoveryResponse, Error, ResourceSet, ResourceType,
        Session,
    },
};

/// Responses buffered per stream before a session waits on the client.
const RESPONSE_BUFFER: usize = 4;

pub type ResponseStream = ReceiverStream<Result<DiscoveryResponse, tonic::Status>>;

/// Serves discovery requests from the snapshots of a [`MeshStore`].
///
/// Cloning is cheap, every clone serves from the same store and cache.
#[derive(Clone)]
pub struct DiscoveryServer {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<MeshStore>,
    cache: Option<ResponseCache>,
    control_plane: String,
    push_interval: Duration,
    max_message_size: usize,
}

impl DiscoveryServer {
    pub fn new(store: Arc<MeshStore>, config: &Config) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::new(config.cache.lifespan(), config.cache.size));

        Self {
            inner: Arc::new(Inner {
                store,
                cache,
                control_plane: config.id.clone(),
                push_interval: config.push_interval(),
                max_message_size: config.max_message_size,
            }),
        }
    }

    pub fn store(&self) -> &Arc<MeshStore> {
        &self.inner.store
    }

    /// The identifier sent in every response.
    pub fn control_plane(&self) -> &str {
        &self.inner.control_plane
    }

    pub fn push_interval(&self) -> Duration {
        self.inner.push_interval
    }

    pub(crate) fn build(
        &self,
        node: &NodeIdentity,
        kind: ResourceType,
        snapshot: &Snapshot,
    ) -> Result<ResourceSet, BuildError> {
        match &self.inner.cache {
            Some(cache) => cache.get_or_build(node, kind, snapshot),
            None => kind.build(node, snapshot),
        }
    }

    /// Builds `kind` for `node` from the current snapshot.
    pub fn build_once(
        &self,
        node: &NodeIdentity,
        kind: ResourceType,
    ) -> Result<ResourceSet, BuildError> {
        self.build(node, kind, &self.inner.store.load())
    }

    /// Answers a single request, outside of any stream.
    pub fn fetch(
        &self,
        request: DiscoveryRequest,
        kind: ResourceType,
    ) -> Result<DiscoveryResponse, Error> {
        let node = NodeIdentity::from_node(request.node.as_ref().ok_or(Error::MissingNode)?)?;
        if !request.type_url.is_empty() && request.type_url != kind.type_url() {
            return Err(Error::UnexpectedResourceType {
                expected: kind,
                found: request.type_url,
            });
        }

        metrics::discovery_request(&node.service_node(), kind.as_ref());
        let set = self.build_once(&node, kind).map_err(|source| {
            metrics::build_error(kind);
            Error::Build { kind, source }
        })?;

        metrics::discovery_response(kind);
        tracing::debug!(node = %node.service_node(), %kind, version = set.version(), "fetched resources");
        Ok(set.into_response(
            uuid::Uuid::new_v4().to_string(),
            self.control_plane(),
        ))
    }

    /// Starts a [`Session`] for `requests` on its own task, returning the
    /// stream of its responses. A failed session ends the stream with its
    /// error status.
    pub fn open_session<S>(
        &self,
        requests: S,
        kind: Option<ResourceType>,
        peer: impl Into<Peer>,
    ) -> ResponseStream
    where
        S: Stream<Item = Result<DiscoveryRequest, tonic::Status>> + Send + 'static,
    {
        let peer = peer.into();
        let (tx, rx) = tokio::sync::mpsc::channel(RESPONSE_BUFFER);
        let session = Session::new(self.clone(), kind, peer);
        let span = tracing::info_span!(
            "xds_session",
            %peer,
            kind = %kind.map_or_else(|| "aggregated".to_owned(), |kind| kind.to_string()),
        );

        tokio::spawn(
            async move {
                let _metrics = StreamConnectionMetrics::new();
                match session.run(Box::pin(requests), tx.clone()).await {
                    Ok(()) => tracing::debug!("discovery stream closed"),
                    Err(error) => {
                        tracing::warn!(%error, "request loop terminated with errors");
                        // Fails only if the client is already gone.
                        let _ = tx.send(Err(error.into())).await;
                    }
                }
            }
            .instrument(span),
        );

        ReceiverStream::new(rx)
    }

    /// Serves the aggregated and the typed discovery services on `listener`
    /// until `shutdown` changes.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: ShutdownRx,
    ) -> crate::Result<()> {
        let max = self.inner.max_message_size;
        tracing::info!(address = %listener.local_addr()?, "serving discovery services");

        tonic::transport::Server::builder()
            .add_service(
                AggregatedDiscoveryServiceServer::new(self.clone())
                    .max_decoding_message_size(max)
                    .max_encoding_message_size(max),
            )
            .add_service(
                ListenerDiscoveryServiceServer::new(self.clone())
                    .max_decoding_message_size(max)
                    .max_encoding_message_size(max),
            )
            .add_service(
                ClusterDiscoveryServiceServer::new(self.clone())
                    .max_decoding_message_size(max)
                    .max_encoding_message_size(max),
            )
            .add_service(
                RouteDiscoveryServiceServer::new(self.clone())
                    .max_decoding_message_size(max)
                    .max_encoding_message_size(max),
            )
            .add_service(
                EndpointDiscoveryServiceServer::new(self)
                    .max_decoding_message_size(max)
                    .max_encoding_message_size(max),
            )
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                let _ = shutdown.changed().await;
            })
            .await?;

        tracing::info!("discovery services stopped");
        Ok(())
    }
}

impl std::fmt::Debug for DiscoveryServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryServer")
            .field("control_plane", &self.inner.control_plane)
            .field("push_interval", &self.inner.push_interval)
            .field("cache", &self.inner.cache)
            .finish()
    }
}

#[tonic::async_trait]
impl AggregatedDiscoveryService for DiscoveryServer {
    type StreamAggregatedResourcesStream = ResponseStream;

    async fn stream_aggregated_resources(
        &self,
        request: tonic::Request<tonic::Streaming<DiscoveryRequest>>,
    ) -> Result<tonic::Response<Self::StreamAggregatedResourcesStream>, tonic::Status> {
        let peer = request.remote_addr();
        Ok(tonic::Response::new(self.open_session(
            request.into_inner(),
            None,
            peer,
        )))
    }
}

macro_rules! typed_discovery_service {
    ($service:ident, $stream:ident, $stream_fn:ident, $fetch_fn:ident, $kind:expr) => {
        #[tonic::async_trait]
        impl $service for DiscoveryServer {
            type $stream = ResponseStream;

            async fn $stream_fn(
                &self,
                request: tonic::Request<tonic::Streaming<DiscoveryRequest>>,
            ) -> Result<tonic::Response<Self::$stream>, tonic::Status> {
                let peer = request.remote_addr();
                Ok(tonic::Response::new(self.open_session(
                    request.into_inner(),
                    Some($kind),
                    peer,
                )))
            }

            async fn $fetch_fn(
                &self,
                request: tonic::Request<DiscoveryRequest>,
            ) -> Result<tonic::Response<DiscoveryResponse>, tonic::Status> {
                match self.fetch(request.into_inner(), $kind) {
                    Ok(response) => Ok(tonic::Response::new(response)),
                    Err(error) => {
                        tracing::warn!(%error, kind = %$kind, "fetch failed");
                        Err(error.into())
                    }
                }
            }
        }
    };
}

typed_discovery_service!(
    ListenerDiscoveryService,
    StreamListenersStream,
    stream_listeners,
    fetch_listeners,
    ResourceType::Listener
);
typed_discovery_service!(
    ClusterDiscoveryService,
    StreamClustersStream,
    stream_clusters,
    fetch_clusters,
    ResourceType::Cluster
);
typed_discovery_service!(
    RouteDiscoveryService,
    StreamRoutesStream,
    stream_routes,
    fetch_routes,
    ResourceType::Route
);
typed_discovery_service!(
    EndpointDiscoveryService,
    StreamEndpointsStream,
    stream_endpoints,
    fetch_endpoints,
    ResourceType::Endpoint
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CacheConfig,
        mesh::{MeshModel, MeshSettings},
        test::request,
    };
    use pretty_assertions::assert_eq;
    use tokio_stream::StreamExt;

    fn server(config: &Config) -> DiscoveryServer {
        let model = MeshModel {
            settings: MeshSettings {
                gateway_ports: vec![80, 443],
                ..<_>::default()
            },
            ..<_>::default()
        };

        DiscoveryServer::new(Arc::new(MeshStore::with_model(model)), config)
    }

    #[tokio::test]
    async fn fetch() {
        let config = Config {
            id: "meshpilot-test".into(),
            ..<_>::default()
        };
        let server = server(&config);

        let response = server
            .fetch(request("router~~edge~default", ResourceType::Listener), ResourceType::Listener)
            .unwrap();
        assert_eq!(response.resources.len(), 2);
        assert_eq!(response.control_plane.unwrap().identifier, "meshpilot-test");

        let node = NodeIdentity::parse("router~~edge~default").unwrap();
        let set = server.build_once(&node, ResourceType::Listener).unwrap();
        assert_eq!(response.version_info, set.version());
    }

    #[tokio::test]
    async fn fetch_for_unknown_node_is_empty() {
        let server = server(&<_>::default());
        let response = server
            .fetch(
                request("sidecar~10.1.2.3~nobody~default", ResourceType::Endpoint),
                ResourceType::Endpoint,
            )
            .unwrap();

        assert!(response.resources.is_empty());
        assert_eq!(response.type_url, ResourceType::Endpoint.type_url());
    }

    #[tokio::test]
    async fn fetch_errors() {
        let server = server(&<_>::default());

        assert!(matches!(
            server.fetch(request("garbage", ResourceType::Listener), ResourceType::Listener),
            Err(Error::Identity(_))
        ));
        assert!(matches!(
            server.fetch(
                request("router~~edge~default", ResourceType::Cluster),
                ResourceType::Listener
            ),
            Err(Error::UnexpectedResourceType { .. })
        ));
        assert!(matches!(
            server.fetch(DiscoveryRequest::default(), ResourceType::Listener),
            Err(Error::MissingNode)
        ));
    }

    #[tokio::test]
    async fn cached_builds_match() {
        let cached = server(&Config {
            cache: CacheConfig {
                enabled: true,
                ..<_>::default()
            },
            ..<_>::default()
        });
        let uncached = server(&<_>::default());
        let node = NodeIdentity::parse("router~~edge~default").unwrap();

        for kind in ResourceType::all() {
            assert_eq!(
                cached.build_once(&node, kind).unwrap(),
                uncached.build_once(&node, kind).unwrap()
            );
        }
        assert!(cached.build_once(&node, ResourceType::Route).is_ok());
    }

    #[tokio::test]
    async fn failed_sessions_end_with_status() {
        let server = server(&<_>::default());
        let requests = tokio_stream::iter(vec![Ok(request("garbage", ResourceType::Listener))])
            .chain(tokio_stream::pending());

        let mut responses = server.open_session(requests, None, Peer(None));
        let status = tokio::time::timeout(Duration::from_secs(10), responses.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert!(status.message().contains("garbage"));
        assert!(tokio::time::timeout(Duration::from_secs(10), responses.next())
            .await
            .unwrap()
            .is_none());
    }
}
