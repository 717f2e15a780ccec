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

//! The xDS discovery engine: per-stream sessions, the response builder and
//! the gRPC services that expose them.

pub mod builder;
pub mod cache;
pub mod convert;
mod error;
pub(crate) mod metrics;
pub mod normalize;
mod resource;
pub mod resources;
pub mod server;
pub mod session;

pub use crate::generated::envoy::{
    config::{
        cluster::v3 as cluster, core::v3 as core, endpoint::v3 as endpoint,
        listener::v3 as listener, route::v3 as route,
    },
    service::discovery::v3::{DiscoveryRequest, DiscoveryResponse},
};

pub use self::{
    builder::{BuildError, Kind, ResourceSet},
    error::{Error, Peer},
    resource::{ResourceType, UnknownResourceType},
    server::DiscoveryServer,
    session::Session,
};
