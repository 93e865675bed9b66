// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Process-wide Prometheus registry (ambient observability, matching the
//! teacher's `libra-metrics` crate: a `lazy_static` registry of counters
//! and gauges, rendered through the text encoder). Thread-pool sizing
//! and bind addresses are configuration (§1 non-goals); this module only
//! ever reports counts the executor and dispatcher already compute.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
    pub static ref HTTP_REQUESTS_TOTAL: IntCounter =
        IntCounter::new("bs_node_http_requests_total", "HTTP requests serviced by the query dispatcher")
            .expect("metric registration is infallible for a well-formed name");
    pub static ref BLOCKS_CONNECTED_TOTAL: IntCounter =
        IntCounter::new("bs_node_blocks_connected_total", "Blocks applied to the fee estimator and content store")
            .expect("metric registration is infallible for a well-formed name");
    pub static ref STORE_RUNNING: IntGauge =
        IntGauge::new("bs_node_store_running", "1 while the store facade is in the running lifecycle state")
            .expect("metric registration is infallible for a well-formed name");
}

/// Registers every metric once. Idempotent: a second call is a no-op
/// (duplicate registration is swallowed, matching `libra-metrics`'
/// tolerance for re-registration under test).
pub fn register() {
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BLOCKS_CONNECTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STORE_RUNNING.clone()));
}

/// Render the registry in Prometheus text exposition format for the
/// `/metrics` route.
pub fn render() -> String {
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_metric_names() {
        register();
        HTTP_REQUESTS_TOTAL.inc();
        let text = render();
        assert!(text.contains("bs_node_http_requests_total"));
    }
}
