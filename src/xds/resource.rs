/*
 * Copyright 2021 Google LLC
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

macro_rules! type_urls {
     ($($base_url:literal : {$($const_name:ident = $type_url:literal),+ $(,)?})+) => {
         $(
             $(
                 pub(crate) const $const_name : &str = concat!($base_url, "/", $type_url);
             )+
         )+
     }
 }

type_urls! {
    "type.googleapis.com": {
        CLUSTER_TYPE = "envoy.config.cluster.v3.Cluster",
        ENDPOINT_TYPE = "envoy.config.endpoint.v3.ClusterLoadAssignment",
        LISTENER_TYPE = "envoy.config.listener.v3.Listener",
        ROUTE_TYPE = "envoy.config.route.v3.RouteConfiguration",
    }
}

/// The kinds of resource served over discovery streams.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    serde::Serialize,
    strum_macros::AsRefStr,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceType {
    Cluster,
    Endpoint,
    Listener,
    Route,
}

impl ResourceType {
    /// Returns the corresponding type URL for the response type.
    pub const fn type_url(&self) -> &'static str {
        match self {
            Self::Cluster => CLUSTER_TYPE,
            Self::Endpoint => ENDPOINT_TYPE,
            Self::Listener => LISTENER_TYPE,
            Self::Route => ROUTE_TYPE,
        }
    }

    /// Returns every served resource type.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl TryFrom<&'_ str> for ResourceType {
    type Error = UnknownResourceType;

    fn try_from(url: &str) -> Result<Self, UnknownResourceType> {
        Ok(match url {
            CLUSTER_TYPE => Self::Cluster,
            ENDPOINT_TYPE => Self::Endpoint,
            LISTENER_TYPE => Self::Listener,
            ROUTE_TYPE => Self::Route,
            unknown => return Err(UnknownResourceType(unknown.to_owned())),
        })
    }
}

/// Accepts either a full type URL or the short name (`listener`, `cluster`,
/// `route`, `endpoint`), so the same parser serves the wire and the CLI.
impl std::str::FromStr for ResourceType {
    type Err = UnknownResourceType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .find(|kind| kind.as_ref() == value)
            .map(Ok)
            .unwrap_or_else(|| Self::try_from(value))
    }
}

/// Error indicating an unknown resource type was found.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Unknown resource type: {0}")]
pub struct UnknownResourceType(pub String);

impl From<UnknownResourceType> for tonic::Status {
    fn from(error: UnknownResourceType) -> Self {
        tonic::Status::invalid_argument(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_short_names_and_urls() {
        for kind in ResourceType::all() {
            assert_eq!(kind.as_ref().parse::<ResourceType>(), Ok(kind));
            assert_eq!(kind.type_url().parse::<ResourceType>(), Ok(kind));
        }

        assert_eq!(
            "listener".parse::<ResourceType>(),
            Ok(ResourceType::Listener)
        );
        assert_eq!(
            "type.googleapis.com/envoy.config.listener.v3.Listener".parse::<ResourceType>(),
            Ok(ResourceType::Listener)
        );
    }

    #[test]
    fn unknown_type() {
        let error = "type.googleapis.com/envoy.config.core.v3.TypedExtensionConfig"
            .parse::<ResourceType>()
            .unwrap_err();
        assert_eq!(
            tonic::Status::from(error).code(),
            tonic::Code::InvalidArgument
        );
    }
}
