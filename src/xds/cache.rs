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

use cached::Cached;
use parking_lot::Mutex;

use crate::{
    mesh::Snapshot,
    node::NodeIdentity,
    xds::{BuildError, ResourceSet, ResourceType},
};

type Key = (String, ResourceType, u64);

/// Caches built resource sets for a limited duration, keyed by the node's
/// service node string, the resource type and the snapshot generation.
///
/// Builds only depend on those three, so a cached set is always the set a
/// fresh build would produce.
pub struct ResponseCache {
    cache: Mutex<cached::TimedSizedCache<Key, ResourceSet>>,
}

impl ResponseCache {
    pub fn new(lifespan: std::time::Duration, size: usize) -> Self {
        Self {
            cache: Mutex::new(cached::TimedSizedCache::with_size_and_lifespan(
                size.max(1),
                lifespan.as_secs(),
            )),
        }
    }

    pub fn get_or_build(
        &self,
        node: &NodeIdentity,
        kind: ResourceType,
        snapshot: &Snapshot,
    ) -> Result<ResourceSet, BuildError> {
        let key = (node.service_node(), kind, snapshot.generation);
        if let Some(set) = self.cache.lock().cache_get(&key) {
            return Ok(set.clone());
        }

        // Built without the lock held. Concurrent misses for the same key
        // build the same set, the last insert wins.
        let set = kind.build(node, snapshot)?;
        self.cache.lock().cache_set(key, set.clone());
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().cache_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("len", &self.len())
            .finish()
    }
}
