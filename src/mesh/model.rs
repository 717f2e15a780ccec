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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The mesh as the control plane sees it: services, the workloads backing
/// them, and mesh wide proxy settings.
///
/// Values are taken as written. Addresses and ports are only checked when a
/// resource is built from them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshModel {
    pub settings: MeshSettings,
    pub services: Vec<Service>,
    pub instances: Vec<ServiceInstance>,
}

impl MeshModel {
    pub fn from_reader<R: std::io::Read>(input: R) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_reader(input)
    }

    pub fn service(&self, hostname: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|service| service.hostname == hostname)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshSettings {
    /// Timeout for new upstream connections.
    pub connect_timeout: WireDuration,
    pub listener_filters_timeout: Option<WireDuration>,
    /// Upstream timeout for HTTP routes, unset leaves the proxy default.
    pub route_timeout: Option<WireDuration>,
    /// Port of the catch-all sidecar listener that hands redirected
    /// connections to the listener for their original destination. `0`
    /// disables it.
    pub proxy_listen_port: u32,
    /// Port of the sidecar's outbound HTTP proxy listener. `0` disables it.
    pub proxy_http_port: u32,
    /// Ports ingresses and routers listen on.
    pub gateway_ports: Vec<u32>,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            connect_timeout: WireDuration {
                seconds: 1,
                nanos: 0,
            },
            listener_filters_timeout: None,
            route_timeout: None,
            proxy_listen_port: 0,
            proxy_http_port: 0,
            gateway_ports: Vec::new(),
        }
    }
}

/// A `google.protobuf.Duration` as written in the mesh file. Nanos may
/// exceed a second or carry the opposite sign to the seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WireDuration {
    pub seconds: i64,
    pub nanos: i32,
}

impl From<WireDuration> for prost_types::Duration {
    fn from(value: WireDuration) -> Self {
        Self {
            seconds: value.seconds,
            nanos: value.nanos,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Service {
    /// Fully qualified name, e.g. `reviews.default.svc.cluster.local`.
    pub hostname: String,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

impl Service {
    pub fn port(&self, name: &str) -> Option<&ServicePort> {
        self.ports.iter().find(|port| port.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicePort {
    pub name: String,
    pub port: u32,
    #[serde(default)]
    pub protocol: Protocol,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Http,
    Http2,
    Grpc,
}

impl Protocol {
    pub fn is_http(self) -> bool {
        matches!(self, Self::Http | Self::Http2 | Self::Grpc)
    }
}

/// A workload endpoint backing one port of a service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceInstance {
    /// Hostname of the service this instance belongs to.
    pub service: String,
    pub address: String,
    pub port: u32,
    /// Name of the service port this instance serves.
    pub port_name: String,
    /// Id of the sidecar fronting this instance. When unset the sidecar is
    /// matched by address instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}
