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

use std::net::Ipv4Addr;

use crate::{
    mesh::{ListenerObject, MeshSettings, ResolveError, Snapshot},
    node::NodeIdentity,
    xds::{core::TrafficDirection, listener::Listener, BuildError, Kind, ResourceType},
};

pub struct Listeners;

impl Kind for Listeners {
    const RESOURCE_TYPE: ResourceType = ResourceType::Listener;
    type Object = ListenerObject;
    type Resource = Listener;

    fn resolve(snapshot: &Snapshot, node: &NodeIdentity) -> Result<Vec<Self::Object>, ResolveError> {
        snapshot.model.listeners(node)
    }

    fn materialize(settings: &MeshSettings, object: Self::Object) -> Result<Listener, BuildError> {
        let (ip, port, direction, stat_prefix, use_original_dst) = match object {
            ListenerObject::Inbound {
                address,
                port,
                cluster,
            } => (
                super::ip(&address)?,
                port,
                TrafficDirection::Inbound,
                cluster,
                None,
            ),
            ListenerObject::Virtual { port } => (
                Ipv4Addr::UNSPECIFIED.into(),
                port,
                TrafficDirection::Outbound,
                "virtual".to_owned(),
                Some(true),
            ),
            ListenerObject::HttpProxy { port } => (
                Ipv4Addr::LOCALHOST.into(),
                port,
                TrafficDirection::Outbound,
                "http_proxy".to_owned(),
                None,
            ),
            ListenerObject::Gateway { port } => (
                Ipv4Addr::UNSPECIFIED.into(),
                port,
                TrafficDirection::Inbound,
                format!("gateway_{port}"),
                None,
            ),
        };

        Ok(Listener {
            name: format!("{ip}_{port}"),
            address: Some(super::socket_address(ip, port)?),
            use_original_dst,
            listener_filters_timeout: super::optional_timeout(settings.listener_filters_timeout)?,
            traffic_direction: direction as i32,
            stat_prefix,
        })
    }

    fn key(listener: &Listener) -> Result<String, BuildError> {
        super::address_key(listener.address.as_ref())
    }
}
