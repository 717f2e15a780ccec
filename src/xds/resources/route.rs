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
    mesh::{MeshSettings, ResolveError, RouteObject, Snapshot},
    node::NodeIdentity,
    xds::{
        normalize::normalize_by,
        route::{
            route, route_action::ClusterSpecifier, route_match::PathSpecifier, Route,
            RouteAction, RouteConfiguration, RouteMatch, VirtualHost,
        },
        BuildError, Kind, ResourceType,
    },
};

pub struct Routes;

impl Kind for Routes {
    const RESOURCE_TYPE: ResourceType = ResourceType::Route;
    type Object = RouteObject;
    type Resource = RouteConfiguration;

    fn resolve(snapshot: &Snapshot, node: &NodeIdentity) -> Result<Vec<Self::Object>, ResolveError> {
        snapshot.model.routes(node)
    }

    fn materialize(
        settings: &MeshSettings,
        object: Self::Object,
    ) -> Result<RouteConfiguration, BuildError> {
        let timeout = super::optional_timeout(settings.route_timeout)?;

        let virtual_hosts = object
            .virtual_hosts
            .into_iter()
            .map(|host| VirtualHost {
                name: host.name,
                domains: host.domains,
                routes: vec![Route {
                    name: "default".into(),
                    r#match: Some(RouteMatch {
                        path_specifier: Some(PathSpecifier::Prefix("/".into())),
                    }),
                    action: Some(route::Action::Route(RouteAction {
                        timeout: timeout.clone(),
                        cluster_specifier: Some(ClusterSpecifier::Cluster(host.cluster)),
                    })),
                }],
            })
            .collect();

        Ok(RouteConfiguration {
            name: object.name,
            virtual_hosts: normalize_by(virtual_hosts, |host| host.name.clone()),
        })
    }

    fn key(routes: &RouteConfiguration) -> Result<String, BuildError> {
        Ok(routes.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{VirtualHostObject, WireDuration};
    use pretty_assertions::assert_eq;

    fn host(name: &str) -> VirtualHostObject {
        VirtualHostObject {
            name: name.into(),
            domains: vec![name.into()],
            cluster: format!("outbound|80|http|{name}"),
        }
    }

    #[test]
    fn virtual_hosts_are_normalized() {
        let routes = Routes::materialize(
            &<_>::default(),
            RouteObject {
                name: "80".into(),
                virtual_hosts: vec![host("b:80"), host("a:80"), host("b:80")],
            },
        )
        .unwrap();

        assert_eq!(Routes::key(&routes).unwrap(), "80");
        let names: Vec<_> = routes.virtual_hosts.iter().map(|host| &*host.name).collect();
        assert_eq!(names, ["a:80", "b:80"]);

        let Some(route::Action::Route(action)) = &routes.virtual_hosts[0].routes[0].action else {
            panic!("route has no action");
        };
        assert_eq!(
            action.cluster_specifier,
            Some(ClusterSpecifier::Cluster("outbound|80|http|a:80".into()))
        );
        assert_eq!(action.timeout, None);
    }

    #[test]
    fn route_timeout() {
        let settings = MeshSettings {
            route_timeout: Some(WireDuration {
                seconds: 3,
                nanos: 0,
            }),
            ..<_>::default()
        };
        let routes = Routes::materialize(
            &settings,
            RouteObject {
                name: "80".into(),
                virtual_hosts: vec![host("a:80")],
            },
        )
        .unwrap();

        let Some(route::Action::Route(action)) = &routes.virtual_hosts[0].routes[0].action else {
            panic!("route has no action");
        };
        assert_eq!(
            action.timeout,
            Some(prost_types::Duration {
                seconds: 3,
                nanos: 0
            })
        );
    }
}
