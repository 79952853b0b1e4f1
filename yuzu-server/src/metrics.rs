//! Server metrics definitions
//!
//! OpenTelemetry metrics for monitoring server health and patch activity.
//! All instruments are prefixed `yuzu.server.*` for easy filtering.
//!
//! Metrics are recorded automatically when observability is enabled via
//! `ServerBuilder::with_observability()` and exported periodically to the
//! configured OTLP endpoint.
//!
//! # Examples
//!
//! ```rust,no_run
//! use yuzu_server::ServerMetrics;
//!
//! let metrics = ServerMetrics::new("my-service");
//! metrics.record_connection(5);
//! metrics.record_complete_request();
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Server metrics for monitoring.
pub struct ServerMetrics {
    /// Number of active connections
    pub connections_active: Gauge<i64>,
    /// Total number of connections (cumulative)
    pub connections_total: Counter<u64>,
    /// Total number of `complete` requests served
    pub complete_requests_total: Counter<u64>,
    /// Total number of patches emitted by the tracker
    pub patches_total: Counter<u64>,
    /// Distribution of patch-batch sizes
    pub batch_size: Histogram<u64>,
    /// Total number of errors
    pub errors_total: Counter<u64>,
}

impl ServerMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connections_active: meter
                .i64_gauge("yuzu.server.connections.active")
                .with_description("Number of active WebSocket connections")
                .build(),
            connections_total: meter
                .u64_counter("yuzu.server.connections.total")
                .with_description("Total number of connections established")
                .build(),
            complete_requests_total: meter
                .u64_counter("yuzu.server.complete_requests.total")
                .with_description("Total number of complete requests served")
                .build(),
            patches_total: meter
                .u64_counter("yuzu.server.patches.total")
                .with_description("Total number of patches emitted by the tracker")
                .build(),
            batch_size: meter
                .u64_histogram("yuzu.server.batch.size")
                .with_description("Number of patches per patch-batch message")
                .build(),
            errors_total: meter
                .u64_counter("yuzu.server.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
        }
    }

    pub fn record_connection(&self, active: i64) {
        self.connections_active.record(active, &[]);
        self.connections_total.add(1, &[]);
    }

    pub fn record_disconnection(&self, active: i64) {
        self.connections_active.record(active, &[]);
    }

    pub fn record_complete_request(&self) {
        self.complete_requests_total.add(1, &[]);
    }

    pub fn record_patch(&self) {
        self.patches_total.add(1, &[]);
    }

    pub fn record_batch(&self, size: u64) {
        self.batch_size.record(size, &[]);
    }

    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_can_be_created_and_recorded_without_panicking() {
        let metrics = ServerMetrics::new("test-server");
        metrics.record_connection(1);
        metrics.record_complete_request();
        metrics.record_patch();
        metrics.record_batch(10);
        metrics.record_error("test_error");
        metrics.record_disconnection(0);
    }

    #[test]
    fn connection_counts_move_independently_of_cumulative_total() {
        let metrics = ServerMetrics::new("test-server-conn");
        metrics.record_connection(1);
        metrics.record_connection(2);
        metrics.record_connection(3);
        metrics.record_disconnection(2);
        metrics.record_disconnection(1);
        metrics.record_disconnection(0);
    }

    #[test]
    fn batch_sizes_recorded_across_a_range() {
        let metrics = ServerMetrics::new("test-server-batch");
        metrics.record_batch(1);
        metrics.record_batch(5);
        metrics.record_batch(100);
    }
}
