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

use std::{net::SocketAddr, sync::Arc, time::Duration};

use meshpilot::{
    config::Config,
    generated::envoy::service::listener::v3::listener_discovery_service_client::ListenerDiscoveryServiceClient,
    mesh::{MeshModel, MeshSettings, MeshStore},
    signal::{self, ShutdownTx},
    test::request,
    xds::{listener::Listener, DiscoveryRequest, DiscoveryServer, ResourceType},
};
use pretty_assertions::assert_eq;
use prost::Message;
use tokio::{sync::mpsc, time::timeout};
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;

const ROUTER: &str = "router~~edge~default.svc.cluster.local";
const TIMEOUT: Duration = Duration::from_secs(10);

fn model(gateway_ports: Vec<u32>) -> MeshModel {
    MeshModel {
        settings: MeshSettings {
            gateway_ports,
            ..<_>::default()
        },
        ..<_>::default()
    }
}

struct ControlPlane {
    address: SocketAddr,
    store: Arc<MeshStore>,
    _shutdown_tx: ShutdownTx,
}

impl ControlPlane {
    async fn start(model: MeshModel) -> Self {
        let store = meshpilot::test::store(model);
        let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let address = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = signal::channel();

        let server = DiscoveryServer::new(store.clone(), &Config::default());
        tokio::spawn(server.serve(listener, shutdown_rx));

        Self {
            address,
            store,
            _shutdown_tx: shutdown_tx,
        }
    }

    async fn client(&self) -> ListenerDiscoveryServiceClient<Channel> {
        ListenerDiscoveryServiceClient::connect(format!("http://{}", self.address))
            .await
            .unwrap()
    }
}

fn listener_names(response: &meshpilot::xds::DiscoveryResponse) -> Vec<String> {
    response
        .resources
        .iter()
        .map(|any| Listener::decode(&*any.value).unwrap().name)
        .collect()
}

#[tokio::test]
async fn listeners_are_streamed_and_updated() {
    let control_plane = ControlPlane::start(model(vec![80])).await;
    let mut client = control_plane.client().await;

    let (requests, rx) = mpsc::channel(4);
    requests
        .send(request(ROUTER, ResourceType::Listener))
        .await
        .unwrap();
    let mut responses = client
        .stream_listeners(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();

    let initial = timeout(TIMEOUT, responses.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(initial.type_url, ResourceType::Listener.type_url());
    assert_eq!(listener_names(&initial), ["0.0.0.0_80"]);
    assert!(!initial.nonce.is_empty());

    requests
        .send(DiscoveryRequest {
            version_info: initial.version_info.clone(),
            response_nonce: initial.nonce.clone(),
            type_url: initial.type_url.clone(),
            ..<_>::default()
        })
        .await
        .unwrap();

    control_plane.store.publish(model(vec![8080, 80]));

    let update = timeout(TIMEOUT, responses.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(listener_names(&update), ["0.0.0.0_80", "0.0.0.0_8080"]);
    assert_ne!(update.version_info, initial.version_info);
    assert_ne!(update.nonce, initial.nonce);
}

#[tokio::test]
async fn fetch_without_resources() {
    let control_plane = ControlPlane::start(MeshModel::default()).await;
    let mut client = control_plane.client().await;

    let response = client
        .fetch_listeners(request(ROUTER, ResourceType::Listener))
        .await
        .unwrap()
        .into_inner();

    assert!(response.resources.is_empty());
    assert_eq!(response.type_url, ResourceType::Listener.type_url());
    assert!(!response.version_info.is_empty());
}

#[tokio::test]
async fn invalid_node_ids_are_rejected() {
    let control_plane = ControlPlane::start(MeshModel::default()).await;
    let mut client = control_plane.client().await;

    let status = client
        .fetch_listeners(request("garbage", ResourceType::Listener))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);

    let (requests, rx) = mpsc::channel(4);
    requests
        .send(request("garbage", ResourceType::Listener))
        .await
        .unwrap();
    let mut responses = client
        .stream_listeners(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();

    let status = timeout(TIMEOUT, responses.message())
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
}
