/*
 * Copyright 2021 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *       http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

use std::convert::Infallible;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server as HyperServer, StatusCode};

use crate::{
    mesh::MeshStore,
    signal::{ShutdownRx, ShutdownTx},
};

/// Whether the control plane is still live. Once any thread panics it stays
/// not live, and a shutdown is started.
#[derive(Clone, Debug)]
pub struct Liveness {
    panicked: Arc<AtomicBool>,
}

impl Liveness {
    /// Chains a panic hook in front of the current one.
    pub fn new(shutdown_tx: ShutdownTx) -> Self {
        let panicked = Arc::new(AtomicBool::new(false));
        let previous = std::panic::take_hook();

        std::panic::set_hook(Box::new({
            let panicked = panicked.clone();
            move |info| {
                tracing::error!(%info, "control plane panicked, shutting down");
                panicked.store(true, Ordering::SeqCst);
                let _ = shutdown_tx.send(());
                previous(info);
            }
        }));

        Self { panicked }
    }

    pub fn is_live(&self) -> bool {
        !self.panicked.load(Ordering::SeqCst)
    }
}

/// Serves metrics, liveness, readiness and the current mesh snapshot on
/// `address` until `shutdown` changes.
pub fn server(
    address: std::net::SocketAddr,
    store: Arc<MeshStore>,
    liveness: Liveness,
    mut shutdown: ShutdownRx,
) -> tokio::task::JoinHandle<Result<(), hyper::Error>> {
    tracing::info!(address = %address, "Starting admin endpoint");

    let make_svc = make_service_fn(move |_conn| {
        let store = store.clone();
        let liveness = liveness.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let store = store.clone();
                let liveness = liveness.clone();
                async move {
                    let result = handle_request(req, &store, &liveness).await;
                    Ok::<_, Infallible>(map_result_into_response(result))
                }
            }))
        }
    });

    tokio::spawn(async move {
        HyperServer::try_bind(&address)?
            .serve(make_svc)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
    })
}

/// Provides a generic way to map results into HTTP responses, providing it's
/// own 500 Response when it's `Err`, and passes the inner value if `Ok`.
fn map_result_into_response(request: Result<Response<Body>, eyre::Error>) -> Response<Body> {
    match request {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(%error, "admin http server error");
            let mut response = Response::new(Body::from("internal error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

#[tracing::instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
async fn handle_request(
    request: Request<Body>,
    store: &MeshStore,
    liveness: &Liveness,
) -> Result<Response<Body>, eyre::Error> {
    tracing::trace!("handling request");

    match (request.method(), request.uri().path()) {
        (&Method::GET, "/metrics") => Ok(collect_metrics()),
        (&Method::GET, "/live" | "/livez") => check_liveness(liveness, store),
        (&Method::GET, "/ready" | "/readyz") => Ok(check_readiness(store)),
        (&Method::GET, "/snapshot") => json(StatusCode::OK, &*store.load()),
        (_, path) => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from(format!("{path} not found")))
            .map_err(From::from),
    }
}

fn json<T: serde::Serialize + ?Sized>(
    status: StatusCode,
    value: &T,
) -> Result<Response<Body>, eyre::Error> {
    Response::builder()
        .status(status)
        .header(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("application/json"),
        )
        .body(Body::from(serde_json::to_string(value)?))
        .map_err(From::from)
}

/// Live until a panic. The body reports the generation being served and
/// the number of open discovery streams.
fn check_liveness(liveness: &Liveness, store: &MeshStore) -> Result<Response<Body>, eyre::Error> {
    let live = liveness.is_live();
    let status = if live {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    json(
        status,
        &serde_json::json!({
            "live": live,
            "generation": store.load().generation,
            "sessions": crate::xds::metrics::active_sessions(),
        }),
    )
}

/// Ready once a mesh model has been published.
fn check_readiness(store: &MeshStore) -> Response<Body> {
    if store.is_ready() {
        return Response::new("ok".into());
    }

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    response
}

fn collect_metrics() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    let mut buffer = vec![];
    let encoder = prometheus::TextEncoder::new();
    let body =
        prometheus::Encoder::encode(&encoder, &crate::metrics::registry().gather(), &mut buffer)
            .map_err(|error| tracing::warn!(%error, "Failed to encode metrics"))
            .and_then(|_| {
                String::from_utf8(buffer)
                    .map(Body::from)
                    .map_err(|error| tracing::warn!(%error, "Failed to convert metrics to utf8"))
            });

    match body {
        Ok(body) => {
            *response.body_mut() = body;
        }
        Err(_) => {
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshModel, Service};
    use pretty_assertions::assert_eq;

    fn get(path: &str) -> Request<Body> {
        Request::get(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn collect_metrics() {
        let response = super::collect_metrics();
        assert_eq!(response.status(), hyper::StatusCode::OK);
    }

    #[test]
    fn readiness_follows_the_store() {
        let store = MeshStore::new();
        assert_eq!(
            check_readiness(&store).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        store.publish(MeshModel::default());
        assert_eq!(check_readiness(&store).status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn snapshot() {
        let store = MeshStore::with_model(MeshModel {
            services: vec![Service {
                hostname: "reviews.default.svc.cluster.local".into(),
                ports: Vec::new(),
            }],
            ..<_>::default()
        });
        let (shutdown_tx, _) = crate::signal::channel();
        let liveness = Liveness::new(shutdown_tx);

        let response = handle_request(get("/snapshot"), &store, &liveness)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(snapshot["generation"], 1);
        assert_eq!(
            snapshot["model"]["services"][0]["hostname"],
            "reviews.default.svc.cluster.local"
        );

        let response = handle_request(get("/nope"), &store, &liveness)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn liveness_reports_panics() {
        let store = MeshStore::with_model(MeshModel {
            services: vec![Service {
                hostname: "reviews.default.svc.cluster.local".into(),
                ports: Vec::new(),
            }],
            ..<_>::default()
        });
        let (shutdown_tx, shutdown_rx) = crate::signal::channel();
        let liveness = Liveness::new(shutdown_tx);

        let response = handle_request(get("/live"), &store, &liveness)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["live"], true);
        assert_eq!(body["generation"], 1);
        assert!(body["sessions"].is_i64());

        let _ = std::panic::catch_unwind(|| panic!("session task failed"));

        let response = check_liveness(&liveness, &store).unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["live"], false);
        assert!(shutdown_rx.has_changed().unwrap());
    }
}
