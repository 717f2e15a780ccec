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

//! The mesh model and the store discovery sessions read snapshots of it
//! from.

mod model;
mod resolve;
pub mod watch;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;

pub use self::{
    model::{MeshModel, MeshSettings, Protocol, Service, ServiceInstance, ServicePort, WireDuration},
    resolve::{
        inbound_cluster_name, outbound_cluster_name, ClusterObject, EndpointObject,
        ListenerObject, ResolveError, RouteObject, VirtualHostObject,
    },
};

/// An immutable, point-in-time view of the mesh model.
#[derive(Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Snapshot {
    /// Increases by one every time a different model is published.
    pub generation: u64,
    pub model: MeshModel,
}

/// Holds the current [`Snapshot`] and notifies subscribers when a new one is
/// published.
///
/// Readers never observe a partially updated model, publishing swaps in a
/// whole new snapshot.
pub struct MeshStore {
    current: ArcSwap<Snapshot>,
    notifier: tokio::sync::watch::Sender<u64>,
    publish: parking_lot::Mutex<()>,
    ready: AtomicBool,
}

impl MeshStore {
    /// An empty store, not ready until the first model is published.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
            notifier: tokio::sync::watch::channel(0).0,
            publish: <_>::default(),
            ready: AtomicBool::new(false),
        }
    }

    /// A store that is ready from the start. A non-empty `model` is served as
    /// generation 1.
    pub fn with_model(model: MeshModel) -> Self {
        let store = Self::new();
        store.publish(model);
        store
    }

    /// Returns the current snapshot. Callers keep using the returned snapshot
    /// for the whole of a build even if a newer one is published meanwhile.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replaces the model, returning the generation now being served.
    /// Publishing a model equal to the current one changes nothing and
    /// notifies no one.
    pub fn publish(&self, model: MeshModel) -> u64 {
        let _guard = self.publish.lock();
        self.ready.store(true, Ordering::SeqCst);

        let current = self.current.load();
        if current.model == model {
            return current.generation;
        }

        let generation = current.generation + 1;
        self.current.store(Arc::new(Snapshot { generation, model }));
        snapshot_generation().set(generation as i64);
        self.notifier.send_replace(generation);
        tracing::debug!(generation, "published mesh snapshot");

        generation
    }

    /// A receiver that is marked changed whenever a new snapshot is
    /// published. The value is the newest generation.
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<u64> {
        self.notifier.subscribe()
    }

    /// Whether a model has been published yet.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl Default for MeshStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MeshStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshStore")
            .field("generation", &self.current.load().generation)
            .field("ready", &self.is_ready())
            .finish()
    }
}

fn snapshot_generation() -> &'static prometheus::IntGauge {
    static SNAPSHOT_GENERATION: Lazy<prometheus::IntGauge> = Lazy::new(|| {
        prometheus::register_int_gauge_with_registry! {
            crate::metrics::opts(
                "snapshot_generation",
                "mesh",
                "Generation of the mesh snapshot currently being served",
            ),
            crate::metrics::registry(),
        }
        .unwrap()
    });

    &SNAPSHOT_GENERATION
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service(hostname: &str) -> Service {
        Service {
            hostname: hostname.into(),
            ports: Vec::new(),
        }
    }

    #[tokio::test]
    async fn publish_notifies_subscribers() {
        let store = MeshStore::new();
        assert!(!store.is_ready());
        let mut updates = store.subscribe();
        let before = store.load();

        let model = MeshModel {
            services: vec![service("a.default.svc.cluster.local")],
            ..<_>::default()
        };
        assert_eq!(store.publish(model.clone()), 1);

        updates.changed().await.unwrap();
        assert_eq!(*updates.borrow(), 1);
        assert!(store.is_ready());
        assert_eq!(store.load().model, model);
        // Snapshots already handed out are untouched.
        assert_eq!(before.generation, 0);
        assert_eq!(before.model, MeshModel::default());
    }

    #[tokio::test]
    async fn identical_models_are_not_republished() {
        let model = MeshModel {
            services: vec![service("a.default.svc.cluster.local")],
            ..<_>::default()
        };
        let store = MeshStore::with_model(model.clone());
        let updates = store.subscribe();

        assert_eq!(store.publish(model), 1);
        assert!(!updates.has_changed().unwrap());
    }
}
