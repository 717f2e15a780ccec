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

use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::{
    config::Config,
    mesh::{self, MeshStore},
    signal::ShutdownRx,
    xds::DiscoveryServer,
};

/// Runs the discovery server for the mesh described in a file.
#[derive(clap::Args, Clone, Debug)]
pub struct Serve {
    /// The mesh file to serve, watched for changes.
    #[clap(long, env = "MESHPILOT_MESH")]
    pub mesh: PathBuf,
    /// The port the discovery services listen on.
    #[clap(short, long, env = "MESHPILOT_PORT")]
    pub port: Option<u16>,
    /// How often sessions check for missed mesh updates.
    #[clap(long, env = "MESHPILOT_PUSH_INTERVAL_SECS")]
    pub push_interval_secs: Option<u64>,
    /// Cache built resources between sessions.
    #[clap(long, env = "MESHPILOT_CACHE")]
    pub cache: bool,
}

impl Serve {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }

        if let Some(interval) = self.push_interval_secs {
            config.push_interval_secs = interval;
        }

        if self.cache {
            config.cache.enabled = true;
        }
    }

    pub async fn run(
        &self,
        mut config: Config,
        store: Arc<MeshStore>,
        shutdown_rx: ShutdownRx,
    ) -> crate::Result<()> {
        self.apply(&mut config);
        tracing::info!(id = %config.id, port = config.port, mesh = %self.mesh.display(), "starting discovery server");

        let provider = tryhard::retry_fn({
            let store = store.clone();
            let path = self.mesh.clone();
            move || mesh::watch::watch(store.clone(), path.clone())
        })
        .retries(10)
        .exponential_backoff(Duration::from_millis(500))
        .max_delay(Duration::from_secs(30))
        .on_retry(|attempt, _, error: &eyre::Error| {
            let error = error.to_string();
            async move {
                tracing::warn!(attempt, %error, "mesh provider failed, retrying");
            }
        });

        let listener =
            tokio::net::TcpListener::bind((std::net::Ipv6Addr::UNSPECIFIED, config.port)).await?;
        let server = DiscoveryServer::new(store, &config);

        tokio::select! {
            result = server.serve(listener, shutdown_rx) => result,
            result = provider => match result {
                Ok(()) => Err(eyre::eyre!("mesh provider stopped")),
                Err(error) => Err(error.wrap_err("mesh provider failed")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_override_config() {
        let serve = Serve {
            mesh: "mesh.yaml".into(),
            port: Some(15010),
            push_interval_secs: None,
            cache: true,
        };
        let mut config = Config::default();
        serve.apply(&mut config);

        assert_eq!(config.port, 15010);
        assert_eq!(config.push_interval_secs, 5);
        assert!(config.cache.enabled);
    }
}
