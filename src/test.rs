/*
 * Copyright 2020 Google LLC
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

//! Common utilities for testing

use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::{
    mesh::{MeshModel, MeshStore},
    xds::{DiscoveryRequest, ResourceType},
};

static LOG_ONCE: Once = Once::new();

/// Call to safely enable logging calls with a given tracing env filter, e.g. "meshpilot=debug"
/// This can be very useful when attempting to debug unit and integration tests.
pub fn enable_log(filter: impl Into<EnvFilter>) {
    LOG_ONCE.call_once(|| {
        // A global subscriber may already be installed (e.g. by `traced_test`).
        let _ = tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .try_init();
    });
}

/// A store that is ready with `model` published as generation 1.
pub fn store(model: MeshModel) -> std::sync::Arc<MeshStore> {
    std::sync::Arc::new(MeshStore::with_model(model))
}

/// An initial request for `kind` from the node with `id`.
pub fn request(id: &str, kind: ResourceType) -> DiscoveryRequest {
    DiscoveryRequest {
        node: Some(crate::xds::core::Node {
            id: id.into(),
            ..<_>::default()
        }),
        type_url: kind.type_url().into(),
        ..<_>::default()
    }
}
