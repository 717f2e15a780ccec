/*
 * Copyright 2022 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *       http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Feeds a [`MeshStore`] from a YAML file, republishing whenever the file's
//! contents change.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use notify::Watcher;
use tracing::Instrument;

use super::{MeshModel, MeshStore};

/// Reads the mesh model at `path` once, without watching it.
pub async fn read(path: &Path) -> crate::Result<MeshModel> {
    let buf = tokio::fs::read(path).await?;
    Ok(serde_yaml::from_slice(&buf)?)
}

pub async fn watch(store: Arc<MeshStore>, path: impl Into<PathBuf>) -> crate::Result<()> {
    let path = path.into();
    let span = tracing::info_span!("mesh_provider", path = %path.display());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    async fn watch_inner(
        store: &MeshStore,
        path: &Path,
        tx: tokio::sync::mpsc::UnboundedSender<Result<notify::Event, notify::Error>>,
    ) -> crate::Result<notify::RecommendedWatcher> {
        tracing::info!("discovering mesh through filesystem");
        let mut watcher = notify::RecommendedWatcher::new(
            move |res| {
                // The receiver only goes away once the provider has stopped.
                let _ = tx.send(res);
            },
            Default::default(),
        )?;

        tracing::trace!("reading file");
        let model = read(path).await?;
        let generation = store.publish(model);
        tracing::info!(generation, "applied initial mesh");
        watcher.watch(path, notify::RecursiveMode::NonRecursive)?;
        tracing::info!("watching file");
        Ok(watcher)
    }

    let _watcher = watch_inner(&store, &path, tx)
        .instrument(span.clone())
        .await?;

    while let Some(event) = rx.recv().instrument(span.clone()).await.transpose()? {
        tracing::trace!(event = ?event.kind, "new file event");

        if !matches!(
            event.kind,
            notify::EventKind::Modify(notify::event::ModifyKind::Data(_))
        ) {
            continue;
        }

        for path in event.paths {
            // At least on macOS it's not always safe to
            // immediately read file after the change, a small
            // delay fixes that.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            match read(&path).await {
                Ok(model) => {
                    let generation = store.publish(model);
                    tracing::info!(path = %path.display(), generation, "file changed, updated mesh");
                }
                // A half written or invalid file keeps the last good
                // snapshot in place until the next write.
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "failed to read mesh file")
                }
            }
        }
    }

    Err(eyre::eyre!("filesystem watch unexpectedly stopped"))
}
