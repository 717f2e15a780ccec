/*
 * Copyright 2021 Google LLC
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

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, IntGauge};

use crate::xds::ResourceType;

const SUBSYSTEM: &str = "xds";
pub(crate) const NODE_LABEL: &str = "node";
pub(crate) const TYPE_LABEL: &str = "type";

static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    prometheus::register_int_gauge_with_registry! {
        crate::metrics::opts(
            "active_sessions",
            SUBSYSTEM,
            "Number of open discovery streams",
        ),
        crate::metrics::registry(),
    }
    .unwrap()
});

static DISCOVERY_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec_with_registry! {
        crate::metrics::opts(
            "discovery_requests",
            SUBSYSTEM,
            "Total number of discovery requests received",
        ),
        &[NODE_LABEL, TYPE_LABEL],
        crate::metrics::registry(),
    }
    .unwrap()
});

static DISCOVERY_RESPONSES: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec_with_registry! {
        crate::metrics::opts(
            "discovery_responses",
            SUBSYSTEM,
            "Total number of discovery responses sent",
        ),
        &[TYPE_LABEL],
        crate::metrics::registry(),
    }
    .unwrap()
});

static ACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec_with_registry! {
        crate::metrics::opts("acks", SUBSYSTEM, "Total number of discovery ACKs"),
        &[NODE_LABEL, TYPE_LABEL],
        crate::metrics::registry(),
    }
    .unwrap()
});

static NACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec_with_registry! {
        crate::metrics::opts("nacks", SUBSYSTEM, "Total number of discovery NACKs"),
        &[NODE_LABEL, TYPE_LABEL],
        crate::metrics::registry(),
    }
    .unwrap()
});

static BUILD_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec_with_registry! {
        crate::metrics::opts(
            "build_errors",
            SUBSYSTEM,
            "Total number of failed resource builds",
        ),
        &[TYPE_LABEL],
        crate::metrics::registry(),
    }
    .unwrap()
});

/// Number of discovery streams currently open.
pub(crate) fn active_sessions() -> i64 {
    ACTIVE_SESSIONS.get()
}

pub(crate) fn discovery_request(node: &str, kind: &str) {
    DISCOVERY_REQUESTS.with_label_values(&[node, kind]).inc();
}

pub(crate) fn discovery_response(kind: ResourceType) {
    DISCOVERY_RESPONSES.with_label_values(&[kind.as_ref()]).inc();
}

pub(crate) fn ack(node: &str, kind: ResourceType) {
    ACKS.with_label_values(&[node, kind.as_ref()]).inc();
}

pub(crate) fn nack(node: &str, kind: ResourceType) {
    NACKS.with_label_values(&[node, kind.as_ref()]).inc();
}

pub(crate) fn build_error(kind: ResourceType) {
    BUILD_ERRORS.with_label_values(&[kind.as_ref()]).inc();
}

/// Counts an open stream for as long as it is alive.
pub struct StreamConnectionMetrics(());

impl StreamConnectionMetrics {
    pub fn new() -> Self {
        ACTIVE_SESSIONS.inc();
        Self(())
    }
}

impl Drop for StreamConnectionMetrics {
    fn drop(&mut self) {
        ACTIVE_SESSIONS.dec();
    }
}
