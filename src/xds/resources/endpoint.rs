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

use crate::{
    mesh::{EndpointObject, MeshSettings, ResolveError, Snapshot},
    node::NodeIdentity,
    xds::{
        endpoint::{
            lb_endpoint::HostIdentifier, ClusterLoadAssignment, Endpoint, LbEndpoint,
            LocalityLbEndpoints,
        },
        normalize::normalize,
        BuildError, Kind, ResourceType,
    },
};

pub struct Endpoints;

impl Kind for Endpoints {
    const RESOURCE_TYPE: ResourceType = ResourceType::Endpoint;
    type Object = EndpointObject;
    type Resource = ClusterLoadAssignment;

    fn resolve(snapshot: &Snapshot, node: &NodeIdentity) -> Result<Vec<Self::Object>, ResolveError> {
        snapshot.model.endpoints(node)
    }

    fn materialize(
        _: &MeshSettings,
        object: Self::Object,
    ) -> Result<ClusterLoadAssignment, BuildError> {
        let lb_endpoints = object
            .endpoints
            .into_iter()
            .map(|(address, port)| {
                let address = super::socket_address(super::ip(&address)?, port)?;
                let key = super::address_key(Some(&address))?;
                let endpoint = LbEndpoint {
                    host_identifier: Some(HostIdentifier::Endpoint(Endpoint {
                        address: Some(address),
                        ..<_>::default()
                    })),
                    ..<_>::default()
                };

                Ok((key, endpoint))
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        Ok(ClusterLoadAssignment {
            cluster_name: object.cluster,
            endpoints: vec![LocalityLbEndpoints {
                lb_endpoints: normalize(lb_endpoints)
                    .into_iter()
                    .map(|(_, endpoint)| endpoint)
                    .collect(),
                ..<_>::default()
            }],
        })
    }

    fn key(assignment: &ClusterLoadAssignment) -> Result<String, BuildError> {
        Ok(assignment.cluster_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xds::convert;
    use pretty_assertions::assert_eq;

    fn keys(assignment: &ClusterLoadAssignment) -> Vec<String> {
        assignment.endpoints[0]
            .lb_endpoints
            .iter()
            .map(|endpoint| {
                let Some(HostIdentifier::Endpoint(endpoint)) = &endpoint.host_identifier else {
                    panic!("missing endpoint");
                };
                convert::address_key(endpoint.address.as_ref().unwrap()).unwrap()
            })
            .collect()
    }

    #[test]
    fn endpoints_are_normalized() {
        let assignment = Endpoints::materialize(
            &<_>::default(),
            EndpointObject {
                cluster: "outbound|80|http|a".into(),
                endpoints: vec![
                    ("10.0.0.9".into(), 80),
                    ("10.0.0.10".into(), 80),
                    ("10.0.0.9".into(), 80),
                ],
            },
        )
        .unwrap();

        assert_eq!(Endpoints::key(&assignment).unwrap(), "outbound|80|http|a");
        assert_eq!(keys(&assignment), ["10.0.0.10:80", "10.0.0.9:80"]);
    }

    #[test]
    fn empty_assignment() {
        let assignment = Endpoints::materialize(
            &<_>::default(),
            EndpointObject {
                cluster: "outbound|80|http|a".into(),
                endpoints: Vec::new(),
            },
        )
        .unwrap();

        assert_eq!(assignment.endpoints.len(), 1);
        assert!(assignment.endpoints[0].lb_endpoints.is_empty());
    }

    #[test]
    fn hostnames_are_rejected() {
        assert!(matches!(
            Endpoints::materialize(
                &<_>::default(),
                EndpointObject {
                    cluster: "outbound|80|http|a".into(),
                    endpoints: vec![("reviews".into(), 80)],
                },
            ),
            Err(BuildError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn keys_follow_wire_addresses() {
        let assignment = Endpoints::materialize(
            &<_>::default(),
            EndpointObject {
                cluster: "outbound|80|http|a".into(),
                endpoints: vec![("::1".into(), 80), ("10.0.0.1".into(), 80), ("::1".into(), 80)],
            },
        )
        .unwrap();
        assert_eq!(keys(&assignment), ["10.0.0.1:80", "[::1]:80"]);

        assert!(matches!(
            Endpoints::materialize(
                &<_>::default(),
                EndpointObject {
                    cluster: "outbound|80|http|a".into(),
                    endpoints: vec![("10.0.0.1".into(), 70_000)],
                },
            ),
            Err(BuildError::Conversion(convert::ConversionError::PortOutOfRange(70_000)))
        ));
    }
}
