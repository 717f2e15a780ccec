/*
 * Copyright 2020 Google LLC All Rights Reserved.
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

use once_cell::sync::Lazy;
use prometheus::{IntGauge, Opts, Registry};

pub const NAMESPACE: &str = "meshpilot";

/// Returns the [`Registry`] containing every metric exported on `/metrics`.
pub fn registry() -> &'static Registry {
    static REGISTRY: Lazy<Registry> = Lazy::new(Registry::default);
    &REGISTRY
}

pub fn opts(name: &str, subsystem: &str, description: &str) -> Opts {
    Opts::new(name, description)
        .namespace(NAMESPACE)
        .subsystem(subsystem)
}

pub(crate) fn shutdown_initiated() -> &'static IntGauge {
    static SHUTDOWN_INITIATED: Lazy<IntGauge> = Lazy::new(|| {
        prometheus::register_int_gauge_with_registry! {
            Opts::new(
                "shutdown_initiated",
                "Shutdown process has been started",
            )
            .namespace(NAMESPACE),
            registry(),
        }
        .unwrap()
    });

    &SHUTDOWN_INITIATED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_are_namespaced() {
        shutdown_initiated().set(0);

        let families = registry().gather();
        assert!(families
            .iter()
            .any(|family| family.get_name() == "meshpilot_shutdown_initiated"));
        assert_eq!(opts("acks", "xds", "").fq_name(), "meshpilot_xds_acks");
    }
}
