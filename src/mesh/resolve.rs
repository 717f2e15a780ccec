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

//! Selection of the logical objects a node should be configured with.

use std::{collections::BTreeMap, net::IpAddr};

use super::{MeshModel, Service, ServiceInstance, ServicePort};
use crate::node::{NodeIdentity, NodeType};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("sidecar {node:?} has no IP address to match workloads against")]
    MissingNodeAddress { node: String },
    #[error("instance {address}:{port} references unknown service {service:?}")]
    UnknownService {
        service: String,
        address: String,
        port: u32,
    },
    #[error("instance {address}:{port} references unknown port {port_name:?} of {service:?}")]
    UnknownPort {
        service: String,
        port_name: String,
        address: String,
        port: u32,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenerObject {
    /// Accepts traffic for a workload fronted by the sidecar.
    Inbound {
        address: String,
        port: u32,
        cluster: String,
    },
    /// Catch-all listener redirected connections land on.
    Virtual { port: u32 },
    /// The sidecar's outbound HTTP proxy.
    HttpProxy { port: u32 },
    /// A port an ingress or router accepts traffic on.
    Gateway { port: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClusterObject {
    /// All instances of a service port, discovered through EDS.
    Outbound { name: String },
    /// The local workload behind an inbound listener.
    Inbound { name: String, port: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteObject {
    pub name: String,
    pub virtual_hosts: Vec<VirtualHostObject>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualHostObject {
    pub name: String,
    pub domains: Vec<String>,
    pub cluster: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointObject {
    pub cluster: String,
    /// `(address, port)` of every instance backing the cluster.
    pub endpoints: Vec<(String, u32)>,
}

pub fn outbound_cluster_name(service: &Service, port: &ServicePort) -> String {
    format!("outbound|{}|{}|{}", port.port, port.name, service.hostname)
}

pub fn inbound_cluster_name(service: &Service, instance: &ServiceInstance) -> String {
    format!(
        "inbound|{}|{}|{}",
        instance.port, instance.port_name, service.hostname
    )
}

impl MeshModel {
    pub fn listeners(&self, node: &NodeIdentity) -> Result<Vec<ListenerObject>, ResolveError> {
        let settings = &self.settings;

        match node.kind {
            NodeType::Sidecar => {
                let mut listeners = Vec::new();
                for instance in self.fronted_by(node)? {
                    let (service, _) = self.backing(instance)?;
                    listeners.push(ListenerObject::Inbound {
                        address: instance.address.clone(),
                        port: instance.port,
                        cluster: inbound_cluster_name(service, instance),
                    });
                }

                if settings.proxy_listen_port != 0 {
                    listeners.push(ListenerObject::Virtual {
                        port: settings.proxy_listen_port,
                    });
                }

                if settings.proxy_http_port != 0 {
                    listeners.push(ListenerObject::HttpProxy {
                        port: settings.proxy_http_port,
                    });
                }

                Ok(listeners)
            }
            NodeType::Ingress | NodeType::Router => Ok(settings
                .gateway_ports
                .iter()
                .map(|&port| ListenerObject::Gateway { port })
                .collect()),
        }
    }

    pub fn clusters(&self, node: &NodeIdentity) -> Result<Vec<ClusterObject>, ResolveError> {
        let mut clusters: Vec<_> = self
            .service_ports()
            .map(|(service, port)| ClusterObject::Outbound {
                name: outbound_cluster_name(service, port),
            })
            .collect();

        if node.kind == NodeType::Sidecar {
            for instance in self.fronted_by(node)? {
                let (service, _) = self.backing(instance)?;
                clusters.push(ClusterObject::Inbound {
                    name: inbound_cluster_name(service, instance),
                    port: instance.port,
                });
            }
        }

        Ok(clusters)
    }

    /// One route configuration per HTTP port number, named after the port.
    pub fn routes(&self, _node: &NodeIdentity) -> Result<Vec<RouteObject>, ResolveError> {
        let mut by_port = BTreeMap::<u32, Vec<VirtualHostObject>>::new();

        for (service, port) in self.service_ports().filter(|(_, port)| port.protocol.is_http()) {
            by_port
                .entry(port.port)
                .or_default()
                .push(VirtualHostObject {
                    name: format!("{}:{}", service.hostname, port.port),
                    domains: vec![
                        service.hostname.clone(),
                        format!("{}:{}", service.hostname, port.port),
                    ],
                    cluster: outbound_cluster_name(service, port),
                });
        }

        Ok(by_port
            .into_iter()
            .map(|(port, virtual_hosts)| RouteObject {
                name: port.to_string(),
                virtual_hosts,
            })
            .collect())
    }

    pub fn endpoints(&self, _node: &NodeIdentity) -> Result<Vec<EndpointObject>, ResolveError> {
        let mut assignments = BTreeMap::<String, Vec<(String, u32)>>::new();
        for (service, port) in self.service_ports() {
            assignments.insert(outbound_cluster_name(service, port), Vec::new());
        }

        for instance in &self.instances {
            let (service, port) = self.backing(instance)?;
            if let Some(endpoints) = assignments.get_mut(&outbound_cluster_name(service, port)) {
                endpoints.push((instance.address.clone(), instance.port));
            }
        }

        Ok(assignments
            .into_iter()
            .map(|(cluster, endpoints)| EndpointObject { cluster, endpoints })
            .collect())
    }

    fn service_ports(&self) -> impl Iterator<Item = (&Service, &ServicePort)> {
        self.services
            .iter()
            .flat_map(|service| service.ports.iter().map(move |port| (service, port)))
    }

    /// Instances fronted by a sidecar: those naming it, then those without a
    /// node whose address is the sidecar's.
    fn fronted_by<'a>(
        &'a self,
        node: &'a NodeIdentity,
    ) -> Result<impl Iterator<Item = &'a ServiceInstance>, ResolveError> {
        let ip = node.ip.ok_or_else(|| ResolveError::MissingNodeAddress {
            node: node.service_node(),
        })?;

        Ok(self
            .instances
            .iter()
            .filter(move |instance| match &instance.node {
                Some(id) => *id == node.id,
                None => instance.address.parse::<IpAddr>().ok() == Some(ip),
            }))
    }

    fn backing(
        &self,
        instance: &ServiceInstance,
    ) -> Result<(&Service, &ServicePort), ResolveError> {
        let service =
            self.service(&instance.service)
                .ok_or_else(|| ResolveError::UnknownService {
                    service: instance.service.clone(),
                    address: instance.address.clone(),
                    port: instance.port,
                })?;

        let port = service
            .port(&instance.port_name)
            .ok_or_else(|| ResolveError::UnknownPort {
                service: instance.service.clone(),
                port_name: instance.port_name.clone(),
                address: instance.address.clone(),
                port: instance.port,
            })?;

        Ok((service, port))
    }
}
