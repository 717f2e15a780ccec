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

//! Server configuration.

use std::{net::SocketAddr, time::Duration};

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18000;
pub const DEFAULT_ADMIN_PORT: u16 = 8000;
const DEFAULT_PUSH_INTERVAL_SECS: u64 = 5;
const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Configuration of a discovery server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Identifies this control plane instance in every response.
    pub id: String,
    /// Port the discovery services listen on.
    pub port: u16,
    /// How often sessions check for snapshots they missed.
    pub push_interval_secs: u64,
    /// Largest message accepted or sent over gRPC, in bytes.
    pub max_message_size: usize,
    pub cache: CacheConfig,
    pub admin: AdminConfig,
}

impl Config {
    /// Attempts to deserialize `input` as a YAML object representing `Self`.
    pub fn from_reader<R: std::io::Read>(input: R) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_reader(input)
    }

    /// The push interval, never shorter than one second.
    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: default_id(),
            port: DEFAULT_PORT,
            push_interval_secs: DEFAULT_PUSH_INTERVAL_SECS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            cache: <_>::default(),
            admin: <_>::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    pub lifespan_secs: u64,
    /// Most resource sets kept at once.
    pub size: usize,
}

impl CacheConfig {
    pub fn lifespan(&self) -> Duration {
        Duration::from_secs(self.lifespan_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lifespan_secs: 5,
            size: 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    pub address: SocketAddr,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            address: (std::net::Ipv6Addr::UNSPECIFIED, DEFAULT_ADMIN_PORT).into(),
        }
    }
}

fn default_id() -> String {
    uuid::Uuid::new_v4().as_hyphenated().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = Config::from_reader("id: meshpilot-0".as_bytes()).unwrap();

        assert_eq!(config.id, "meshpilot-0");
        assert_eq!(config.port, 18000);
        assert_eq!(config.push_interval(), Duration::from_secs(5));
        assert_eq!(config.max_message_size, 4 * 1024 * 1024);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.size, 1024);
        assert_eq!(config.admin.address, "[::]:8000".parse().unwrap());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(Config::default().id, Config::default().id);
    }

    #[test]
    fn parse_yaml() {
        let yaml = "
id: cp-1
port: 15010
push_interval_secs: 0
cache:
  enabled: true
  lifespan_secs: 30
admin:
  address: 127.0.0.1:9901
";
        let config = Config::from_reader(yaml.as_bytes()).unwrap();

        assert_eq!(config.port, 15010);
        assert_eq!(config.push_interval(), Duration::from_secs(1));
        assert!(config.cache.enabled);
        assert_eq!(config.cache.lifespan(), Duration::from_secs(30));
        assert_eq!(config.cache.size, 1024);
        assert_eq!(config.admin.address, "127.0.0.1:9901".parse().unwrap());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::from_reader("prot: 1".as_bytes()).is_err());
    }
}
