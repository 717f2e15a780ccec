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

use std::{path::PathBuf, sync::Arc};

use crate::{
    config::Config,
    mesh::{self, MeshStore},
    node::NodeIdentity,
    xds::{DiscoveryServer, ResourceType},
};

/// Builds the resources a node would receive once, and prints their versions
/// and keys.
#[derive(clap::Args, Clone, Debug)]
pub struct Fetch {
    /// The mesh file to build from.
    #[clap(long, env = "MESHPILOT_MESH")]
    pub mesh: PathBuf,
    /// The node id, e.g. `sidecar~10.0.0.5~reviews.default~default.svc.cluster.local`.
    #[clap(long)]
    pub node: String,
    /// Only build this resource type.
    #[clap(long)]
    pub kind: Option<ResourceType>,
}

impl Fetch {
    pub async fn run(&self, config: &Config) -> crate::Result<()> {
        let model = mesh::watch::read(&self.mesh).await?;
        let server = DiscoveryServer::new(Arc::new(MeshStore::with_model(model)), config);
        let output = self.fetch(&server)?;

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn fetch(&self, server: &DiscoveryServer) -> crate::Result<serde_json::Value> {
        let node = NodeIdentity::parse(&self.node)?;
        let kinds: Vec<_> = match self.kind {
            Some(kind) => vec![kind],
            None => ResourceType::all().collect(),
        };

        let mut output = serde_json::Map::new();
        for kind in kinds {
            let set = server.build_once(&node, kind)?;
            output.insert(
                kind.to_string(),
                serde_json::json!({
                    "version": set.version(),
                    "resources": set.keys(),
                }),
            );
        }

        Ok(output.into())
    }
}
