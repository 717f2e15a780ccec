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

//! Turns a node identity and a mesh snapshot into the complete, ordered set
//! of resources of one kind.

use std::hash::Hasher;

use crate::{
    mesh::{MeshSettings, ResolveError, Snapshot},
    node::NodeIdentity,
    xds::{
        convert::ConversionError, core::ControlPlane, normalize::normalize,
        resources::{Clusters, Endpoints, Listeners, Routes},
        DiscoveryResponse, ResourceType,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to resolve mesh objects: {0}")]
    Resolve(#[from] ResolveError),
    #[error("{address:?} is not an IP address")]
    InvalidAddress { address: String },
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("failed to encode {kind} resource: {source}")]
    Encode {
        kind: ResourceType,
        source: prost::EncodeError,
    },
}

/// What it takes to build one kind of resource.
pub trait Kind {
    const RESOURCE_TYPE: ResourceType;

    /// The logical mesh object a resource is materialized from.
    type Object;
    type Resource: prost::Message;

    /// Selects the objects relevant to `node`.
    fn resolve(snapshot: &Snapshot, node: &NodeIdentity) -> Result<Vec<Self::Object>, ResolveError>;

    fn materialize(
        settings: &MeshSettings,
        object: Self::Object,
    ) -> Result<Self::Resource, BuildError>;

    /// The attribute identifying a resource within its set, e.g. a
    /// listener's bind address.
    fn key(resource: &Self::Resource) -> Result<String, BuildError>;
}

/// Builds every resource of kind `K` for `node`. Any failure fails the whole
/// build, a partial set is never returned.
pub fn build<K: Kind>(node: &NodeIdentity, snapshot: &Snapshot) -> Result<ResourceSet, BuildError> {
    let resources = K::resolve(snapshot, node)?
        .into_iter()
        .map(|object| {
            let resource = K::materialize(&snapshot.model.settings, object)?;
            Ok((K::key(&resource)?, resource))
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    let mut keys = Vec::with_capacity(resources.len());
    let mut encoded = Vec::with_capacity(resources.len());
    for (key, resource) in normalize(resources) {
        let any = crate::codec::prost::encode_any(K::RESOURCE_TYPE.type_url(), &resource)
            .map_err(|source| BuildError::Encode {
                kind: K::RESOURCE_TYPE,
                source,
            })?;
        keys.push(key);
        encoded.push(any);
    }

    Ok(ResourceSet::new(K::RESOURCE_TYPE, keys, encoded))
}

impl ResourceType {
    /// Builds the resources of this type for `node`.
    pub fn build(self, node: &NodeIdentity, snapshot: &Snapshot) -> Result<ResourceSet, BuildError> {
        match self {
            Self::Cluster => build::<Clusters>(node, snapshot),
            Self::Endpoint => build::<Endpoints>(node, snapshot),
            Self::Listener => build::<Listeners>(node, snapshot),
            Self::Route => build::<Routes>(node, snapshot),
        }
    }
}

/// The deduplicated resources of one kind, ordered by key.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceSet {
    kind: ResourceType,
    keys: Vec<String>,
    resources: Vec<prost_types::Any>,
    version: String,
}

impl ResourceSet {
    fn new(kind: ResourceType, keys: Vec<String>, resources: Vec<prost_types::Any>) -> Self {
        let mut hasher = seahash::SeaHasher::new();
        hasher.write(kind.type_url().as_bytes());
        for (key, resource) in keys.iter().zip(&resources) {
            hasher.write_usize(key.len());
            hasher.write(key.as_bytes());
            hasher.write_usize(resource.value.len());
            hasher.write(&resource.value);
        }

        Self {
            kind,
            keys,
            resources,
            version: format!("{:016x}", hasher.finish()),
        }
    }

    pub fn kind(&self) -> ResourceType {
        self.kind
    }

    /// The key of each resource, in order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn resources(&self) -> &[prost_types::Any] {
        &self.resources
    }

    /// A digest of the set's contents. Identical sets always share a version.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn into_response(self, nonce: String, control_plane: &str) -> DiscoveryResponse {
        DiscoveryResponse {
            version_info: self.version,
            resources: self.resources,
            type_url: self.kind.type_url().into(),
            nonce,
            control_plane: Some(ControlPlane {
                identifier: control_plane.into(),
            }),
            ..<_>::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mesh::{MeshModel, Protocol, Service, ServiceInstance, ServicePort},
        xds::listener::Listener,
    };
    use pretty_assertions::assert_eq;
    use prost::Message;

    fn instance(address: &str, port: u32, node: Option<&str>) -> ServiceInstance {
        ServiceInstance {
            service: "svc.ns.svc.cluster.local".into(),
            address: address.into(),
            port,
            port_name: "http".into(),
            node: node.map(From::from),
            labels: <_>::default(),
        }
    }

    fn snapshot(instances: Vec<ServiceInstance>) -> Snapshot {
        Snapshot {
            generation: 1,
            model: MeshModel {
                services: vec![Service {
                    hostname: "svc.ns.svc.cluster.local".into(),
                    ports: vec![ServicePort {
                        name: "http".into(),
                        port: 80,
                        protocol: Protocol::Http,
                    }],
                }],
                instances,
                ..<_>::default()
            },
        }
    }

    fn node() -> NodeIdentity {
        NodeIdentity::parse("sidecar~10.0.0.5~svc.ns~ns.svc.cluster.local").unwrap()
    }

    #[test]
    fn listeners_are_deduplicated_and_sorted() {
        let snapshot = snapshot(vec![
            instance("10.0.0.5", 80, None),
            instance("10.0.0.2", 443, Some("svc.ns")),
            instance("10.0.0.2", 443, Some("svc.ns")),
        ]);

        let set = build::<Listeners>(&node(), &snapshot).unwrap();
        assert_eq!(set.keys(), ["10.0.0.2:443", "10.0.0.5:80"]);
        assert_eq!(set.len(), 2);

        let names: Vec<_> = set
            .resources()
            .iter()
            .map(|any| {
                assert_eq!(any.type_url, ResourceType::Listener.type_url());
                Listener::decode(&*any.value).unwrap().name
            })
            .collect();
        assert_eq!(names, ["10.0.0.2_443", "10.0.0.5_80"]);
    }

    #[test]
    fn builds_are_deterministic() {
        let forwards = snapshot(vec![
            instance("10.0.0.5", 80, None),
            instance("10.0.0.6", 8080, Some("svc.ns")),
        ]);
        let backwards = snapshot(vec![
            instance("10.0.0.6", 8080, Some("svc.ns")),
            instance("10.0.0.5", 80, None),
        ]);

        for kind in ResourceType::all() {
            let first = kind.build(&node(), &forwards).unwrap();
            assert_eq!(first, kind.build(&node(), &forwards).unwrap());
            assert_eq!(first.version(), kind.build(&node(), &forwards).unwrap().version());
            if kind == ResourceType::Listener {
                assert_eq!(first, kind.build(&node(), &backwards).unwrap());
            }
        }
    }

    #[test]
    fn versions_track_contents() {
        let one = build::<Listeners>(&node(), &snapshot(vec![instance("10.0.0.5", 80, None)])).unwrap();
        let two = build::<Listeners>(
            &node(),
            &snapshot(vec![
                instance("10.0.0.5", 80, None),
                instance("10.0.0.6", 8080, Some("svc.ns")),
            ]),
        )
        .unwrap();

        assert_ne!(one.version(), two.version());
    }

    #[test]
    fn no_matching_objects_is_an_empty_set() {
        let node = NodeIdentity::parse("sidecar~10.9.9.9~nobody~ns.svc.cluster.local").unwrap();
        let set = build::<Listeners>(&node, &snapshot(vec![instance("10.0.0.5", 80, None)])).unwrap();

        assert!(set.is_empty());
        assert!(!set.version().is_empty());
    }

    #[test]
    fn malformed_objects_fail_the_whole_build() {
        let snapshot = snapshot(vec![
            instance("10.0.0.5", 80, None),
            instance("not-an-ip", 81, Some("svc.ns")),
        ]);

        assert!(matches!(
            build::<Listeners>(&node(), &snapshot),
            Err(BuildError::InvalidAddress { .. })
        ));

        let snapshot = self::snapshot(vec![instance("10.0.0.5", 80_000, None)]);
        assert!(matches!(
            build::<Listeners>(&node(), &snapshot),
            Err(BuildError::Conversion(ConversionError::PortOutOfRange(80_000)))
        ));
    }

    #[test]
    fn response_carries_set() {
        let set = build::<Listeners>(&node(), &snapshot(vec![instance("10.0.0.5", 80, None)])).unwrap();
        let version = set.version().to_owned();
        let response = set.clone().into_response("nonce".into(), "meshpilot-0");

        assert_eq!(response.version_info, version);
        assert_eq!(response.nonce, "nonce");
        assert_eq!(response.type_url, ResourceType::Listener.type_url());
        assert_eq!(response.resources, set.resources());
        assert_eq!(response.control_plane.unwrap().identifier, "meshpilot-0");
    }
}
