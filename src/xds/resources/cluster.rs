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
    mesh::{ClusterObject, MeshSettings, ResolveError, Snapshot},
    node::NodeIdentity,
    xds::{
        cluster::{
            cluster::{ClusterDiscoveryType, DiscoveryType, EdsClusterConfig},
            Cluster,
        },
        convert,
        core::{config_source::ConfigSourceSpecifier, AggregatedConfigSource, ApiVersion, ConfigSource},
        endpoint::{lb_endpoint::HostIdentifier, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints},
        BuildError, Kind, ResourceType,
    },
};

pub struct Clusters;

impl Kind for Clusters {
    const RESOURCE_TYPE: ResourceType = ResourceType::Cluster;
    type Object = ClusterObject;
    type Resource = Cluster;

    fn resolve(snapshot: &Snapshot, node: &NodeIdentity) -> Result<Vec<Self::Object>, ResolveError> {
        snapshot.model.clusters(node)
    }

    fn materialize(settings: &MeshSettings, object: Self::Object) -> Result<Cluster, BuildError> {
        let connect_timeout = Some(convert::timeout(&settings.connect_timeout.into())?);

        Ok(match object {
            ClusterObject::Outbound { name } => Cluster {
                eds_cluster_config: Some(EdsClusterConfig {
                    eds_config: Some(ConfigSource {
                        resource_api_version: ApiVersion::V3 as i32,
                        config_source_specifier: Some(ConfigSourceSpecifier::Ads(
                            AggregatedConfigSource {},
                        )),
                        ..<_>::default()
                    }),
                    service_name: name.clone(),
                }),
                name,
                connect_timeout,
                cluster_discovery_type: Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32)),
                ..<_>::default()
            },
            ClusterObject::Inbound { name, port } => Cluster {
                load_assignment: Some(ClusterLoadAssignment {
                    cluster_name: name.clone(),
                    endpoints: vec![LocalityLbEndpoints {
                        lb_endpoints: vec![LbEndpoint {
                            host_identifier: Some(HostIdentifier::Endpoint(Endpoint {
                                address: Some(super::socket_address(
                                    Ipv4Addr::LOCALHOST.into(),
                                    port,
                                )?),
                                ..<_>::default()
                            })),
                            ..<_>::default()
                        }],
                        ..<_>::default()
                    }],
                }),
                name,
                connect_timeout,
                cluster_discovery_type: Some(ClusterDiscoveryType::Type(
                    DiscoveryType::Static as i32,
                )),
                ..<_>::default()
            },
        })
    }

    fn key(cluster: &Cluster) -> Result<String, BuildError> {
        Ok(cluster.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::WireDuration;
    use pretty_assertions::assert_eq;

    const NAME: &str = "outbound|9080|http|reviews.default.svc.cluster.local";

    #[test]
    fn outbound_clusters_use_ads() {
        let cluster =
            Clusters::materialize(&<_>::default(), ClusterObject::Outbound { name: NAME.into() })
                .unwrap();

        assert_eq!(Clusters::key(&cluster).unwrap(), NAME);
        assert_eq!(
            cluster.cluster_discovery_type,
            Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32))
        );
        let eds = cluster.eds_cluster_config.unwrap();
        assert_eq!(eds.service_name, NAME);
        let source = eds.eds_config.unwrap();
        assert_eq!(source.resource_api_version, ApiVersion::V3 as i32);
        assert!(matches!(
            source.config_source_specifier,
            Some(ConfigSourceSpecifier::Ads(_))
        ));
        assert_eq!(
            cluster.connect_timeout,
            Some(prost_types::Duration {
                seconds: 1,
                nanos: 0
            })
        );
    }

    #[test]
    fn inbound_clusters_point_at_localhost() {
        let cluster = Clusters::materialize(
            &<_>::default(),
            ClusterObject::Inbound {
                name: "inbound|9080|http|reviews.default.svc.cluster.local".into(),
                port: 9080,
            },
        )
        .unwrap();

        let assignment = cluster.load_assignment.unwrap();
        let Some(HostIdentifier::Endpoint(endpoint)) =
            &assignment.endpoints[0].lb_endpoints[0].host_identifier
        else {
            panic!("inbound cluster has no endpoint");
        };
        assert_eq!(
            convert::address_key(endpoint.address.as_ref().unwrap()).unwrap(),
            "127.0.0.1:9080"
        );
    }

    #[test]
    fn connect_timeout_is_normalized() {
        let settings = MeshSettings {
            connect_timeout: WireDuration {
                seconds: 2,
                nanos: -250_000_000,
            },
            ..<_>::default()
        };
        let cluster =
            Clusters::materialize(&settings, ClusterObject::Outbound { name: NAME.into() }).unwrap();

        assert_eq!(
            cluster.connect_timeout,
            Some(prost_types::Duration {
                seconds: 1,
                nanos: 750_000_000
            })
        );
    }
}
