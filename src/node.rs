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

//! Resolution of the opaque node identifier proxies present on their first
//! discovery request.
//!
//! Identifiers follow the `<type>~<ip>~<id>~<domain>` grammar, for example
//! `sidecar~10.0.0.5~reviews-v1.default~default.svc.cluster.local`.

use std::net::IpAddr;

use crate::generated::envoy::config::core::v3::Node;

const SEPARATOR: char = '~';

/// The role a proxy plays in the mesh.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    serde::Serialize,
    serde::Deserialize,
    strum_macros::AsRefStr,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeType {
    /// Runs next to a workload and fronts its inbound and outbound traffic.
    Sidecar,
    /// Terminates traffic entering the mesh.
    Ingress,
    /// A standalone router with no workload of its own.
    Router,
}

/// The structured identity of a connected proxy, immutable for the lifetime
/// of its stream.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct NodeIdentity {
    pub kind: NodeType,
    /// Always present for sidecars; routers and ingresses may report an
    /// address that does not parse, in which case it is absent.
    pub ip: Option<IpAddr>,
    pub id: String,
    pub domain: String,
    pub cluster: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NodeIdentity {
    /// Parses a bare node identifier. The cluster and metadata are left empty.
    pub fn parse(service_node: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = service_node.split(SEPARATOR).collect();
        let &[kind, ip, id, domain] = parts.as_slice() else {
            return Err(ParseError::MissingParts {
                node: service_node.into(),
                found: parts.len(),
            });
        };

        let kind = kind
            .parse::<NodeType>()
            .map_err(|_| ParseError::InvalidType {
                node: service_node.into(),
                kind: kind.into(),
            })?;

        let ip = match (kind, ip.parse::<IpAddr>()) {
            (_, Ok(ip)) => Some(ip),
            (NodeType::Sidecar, Err(_)) => {
                return Err(ParseError::InvalidIp {
                    node: service_node.into(),
                    ip: ip.into(),
                })
            }
            (_, Err(_)) => None,
        };

        Ok(Self {
            kind,
            ip,
            id: id.into(),
            domain: domain.into(),
            cluster: String::new(),
            metadata: <_>::default(),
        })
    }

    /// Resolves the identity of the node attached to a discovery request.
    pub fn from_node(node: &Node) -> Result<Self, ParseError> {
        let mut identity = Self::parse(&node.id)?;
        identity.cluster = node.cluster.clone();
        identity.metadata = node
            .metadata
            .clone()
            .map(crate::codec::prost::mapping_from_struct)
            .unwrap_or_default();
        Ok(identity)
    }

    /// The identity in `<type>~<ip>~<id>~<domain>` form. Equal to the parsed
    /// identifier unless an unparsable ingress or router IP was dropped, in
    /// which case the IP part is empty.
    pub fn service_node(&self) -> String {
        let ip = self.ip.map(|ip| ip.to_string()).unwrap_or_default();
        [self.kind.as_ref(), &ip, &self.id, &self.domain].join("~")
    }
}

/// A malformed node identifier. Every variant keeps the identifier as the
/// proxy sent it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("missing parts in the service node {node:?}: expected 4, found {found}")]
    MissingParts { node: String, found: usize },
    #[error("invalid node type {kind:?} (valid types: sidecar, ingress, router) in the service node {node:?}")]
    InvalidType { node: String, kind: String },
    #[error("invalid IP address {ip:?} in the service node {node:?}")]
    InvalidIp { node: String, ip: String },
}

impl ParseError {
    /// The identifier that failed to parse.
    pub fn node(&self) -> &str {
        match self {
            Self::MissingParts { node, .. }
            | Self::InvalidType { node, .. }
            | Self::InvalidIp { node, .. } => node,
        }
    }
}

impl From<ParseError> for tonic::Status {
    fn from(error: ParseError) -> Self {
        tonic::Status::invalid_argument(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_sidecar() {
        let identity = NodeIdentity::parse("sidecar~10.0.0.5~svc.ns~ns.svc.cluster.local").unwrap();

        assert_eq!(identity.kind, NodeType::Sidecar);
        assert_eq!(identity.ip, Some("10.0.0.5".parse().unwrap()));
        assert_eq!(identity.id, "svc.ns");
        assert_eq!(identity.domain, "ns.svc.cluster.local");
        assert!(identity.cluster.is_empty());
        assert_eq!(
            identity.service_node(),
            "sidecar~10.0.0.5~svc.ns~ns.svc.cluster.local"
        );
    }

    #[test]
    fn parse_ipv6_sidecar() {
        let identity = NodeIdentity::parse("sidecar~fd00::5~svc.ns~ns.svc.cluster.local").unwrap();
        assert_eq!(identity.ip, Some("fd00::5".parse().unwrap()));
    }

    #[test]
    fn router_without_ip() {
        let identity = NodeIdentity::parse("router~~edge~ns.svc.cluster.local").unwrap();
        assert_eq!(identity.kind, NodeType::Router);
        assert_eq!(identity.ip, None);

        let identity = NodeIdentity::parse("ingress~not-an-ip~gw~ns").unwrap();
        assert_eq!(identity.kind, NodeType::Ingress);
        assert_eq!(identity.ip, None);
        assert_eq!(identity.service_node(), "ingress~~gw~ns");
        assert_eq!(
            NodeIdentity::parse(&identity.service_node()).unwrap(),
            identity
        );
    }

    #[test]
    fn garbage() {
        let error = NodeIdentity::parse("garbage").unwrap_err();
        assert_eq!(
            error,
            ParseError::MissingParts {
                node: "garbage".into(),
                found: 1
            }
        );
        assert_eq!(error.node(), "garbage");
        assert!(error.to_string().contains("\"garbage\""));
    }

    #[test]
    fn too_many_parts() {
        let error = NodeIdentity::parse("sidecar~10.0.0.5~a~b~c").unwrap_err();
        assert!(matches!(error, ParseError::MissingParts { found: 5, .. }));
    }

    #[test]
    fn invalid_type() {
        let error = NodeIdentity::parse("gateway~10.0.0.5~svc.ns~ns").unwrap_err();
        assert_eq!(
            error,
            ParseError::InvalidType {
                node: "gateway~10.0.0.5~svc.ns~ns".into(),
                kind: "gateway".into(),
            }
        );
    }

    #[test]
    fn sidecar_requires_ip() {
        let error = NodeIdentity::parse("sidecar~10.0.0~svc.ns~ns").unwrap_err();
        assert_eq!(
            error,
            ParseError::InvalidIp {
                node: "sidecar~10.0.0~svc.ns~ns".into(),
                ip: "10.0.0".into(),
            }
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        for id in ["garbage", "sidecar~x~y~z", "sidecar~10.0.0.1~a~b"] {
            assert_eq!(NodeIdentity::parse(id), NodeIdentity::parse(id));
        }
    }

    #[test]
    fn from_node_carries_cluster_and_metadata() {
        let serde_json::Value::Object(metadata) = serde_json::json!({ "ISTIO_VERSION": "1.0" })
        else {
            unreachable!()
        };

        let node = Node {
            id: "sidecar~10.0.0.5~svc.ns~ns.svc.cluster.local".into(),
            cluster: "reviews".into(),
            metadata: Some(crate::codec::prost::struct_from_json(metadata.clone())),
            ..<_>::default()
        };

        let identity = NodeIdentity::from_node(&node).unwrap();
        assert_eq!(identity.cluster, "reviews");
        assert_eq!(identity.metadata, metadata);
    }
}
