/*
 * Copyright 2022 Google LLC
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

mod fetch;
mod serve;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{admin::Liveness, mesh::MeshStore, Config};

pub use self::{fetch::Fetch, serve::Serve};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const ETC_CONFIG_PATH: &str = "/etc/meshpilot/meshpilot.yaml";

/// The Command-Line Interface for meshpilot.
#[derive(clap::Parser)]
#[command(version)]
#[non_exhaustive]
pub struct Cli {
    /// Whether to spawn the admin server or not.
    #[clap(env = "MESHPILOT_NO_ADMIN", long)]
    pub no_admin: bool,
    /// The path to the configuration file for the control plane.
    #[clap(short, long, env = "MESHPILOT_CONFIG", default_value = "meshpilot.yaml")]
    pub config: PathBuf,
    /// The address to bind for the admin server.
    #[clap(long, env = "MESHPILOT_ADMIN_ADDRESS")]
    pub admin_address: Option<std::net::SocketAddr>,
    /// Whether meshpilot will report any results to stdout/stderr.
    #[clap(short, long, env = "MESHPILOT_QUIET")]
    pub quiet: bool,
    #[clap(subcommand)]
    pub command: Commands,
}

/// The various meshpilot commands.
#[derive(Clone, clap::Subcommand)]
pub enum Commands {
    Serve(Serve),
    Fetch(Fetch),
}

impl Cli {
    /// Drives the main meshpilot application lifecycle using the command line
    /// arguments.
    #[tracing::instrument(skip_all)]
    pub async fn drive(self) -> crate::Result<()> {
        let version: std::borrow::Cow<'static, str> = if cfg!(debug_assertions) {
            format!("{VERSION}+debug").into()
        } else {
            VERSION.into()
        };

        if !self.quiet {
            let env_filter = tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy();
            tracing_subscriber::fmt()
                .json()
                .with_file(true)
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter)
                .init();
        }

        tracing::info!(
            version = &*version,
            commit = option_env!("GIT_COMMIT_HASH").unwrap_or("unknown"),
            "Starting meshpilot"
        );

        let mut config = Self::read_config(&self.config)?;
        if let Some(address) = self.admin_address {
            config.admin.address = address;
        }

        match self.command {
            Commands::Fetch(fetch) => fetch.run(&config).await,
            Commands::Serve(serve) => {
                let (shutdown_tx, shutdown_rx) = crate::signal::spawn_handler()?;
                let store = Arc::new(MeshStore::new());

                let _admin_task = (!self.no_admin).then(|| {
                    crate::admin::server(
                        config.admin.address,
                        store.clone(),
                        Liveness::new(shutdown_tx.clone()),
                        shutdown_rx.clone(),
                    )
                });

                serve.run(config, store, shutdown_rx).await
            }
        }
    }

    /// Searches for the configuration file, falling back to the defaults when
    /// none is found.
    fn read_config<A: AsRef<Path>>(path: A) -> Result<Config, eyre::Error> {
        let path = path.as_ref();
        let from_reader = |file| Config::from_reader(file).map_err(From::from);

        match std::fs::File::open(path) {
            Ok(file) => (from_reader)(file),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path=%path.display(), "provided path not found");
                match cfg!(unix).then(|| std::fs::File::open(ETC_CONFIG_PATH)) {
                    Some(Ok(file)) => (from_reader)(file),
                    Some(Err(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                        tracing::debug!(path = ETC_CONFIG_PATH, "/etc path not found");
                        Ok(Config::default())
                    }
                    Some(Err(error)) => Err(error.into()),
                    None => Ok(Config::default()),
                }
            }
            Err(error) => Err(error.into()),
        }
    }
}
