//! Client metrics definitions.
//!
//! OpenTelemetry metrics for monitoring client health and patch activity.
//! All instruments are prefixed `yuzu.client.*`. Metrics are recorded
//! automatically when observability is enabled via
//! `ClientBuilder::with_observability`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use yuzu_client::ClientMetrics;
//!
//! let metrics = ClientMetrics::new("my-client");
//! metrics.update_connection_state(2);
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring.
pub struct ClientMetrics {
    /// Connection state (0=disconnected, 1=connecting, 2=connected).
    pub connection_state: Gauge<i64>,
    /// Total number of reconnection attempts.
    pub reconnection_attempts: Counter<u64>,
    /// Total number of successful reconnections.
    pub reconnection_success: Counter<u64>,
    /// Total number of patches applied to the local mirror.
    pub patches_applied: Counter<u64>,
    /// Distribution of patch-batch sizes received.
    pub batch_size: Histogram<u64>,
    /// Total number of listener notifications delivered.
    pub notifications_delivered: Counter<u64>,
    /// Total number of errors.
    pub errors_total: Counter<u64>,
}

impl ClientMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("yuzu.client.connection.state")
                .with_description("Connection state (0=disconnected, 1=connecting, 2=connected)")
                .build(),
            reconnection_attempts: meter
                .u64_counter("yuzu.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("yuzu.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            patches_applied: meter
                .u64_counter("yuzu.client.patches.applied")
                .with_description("Total number of patches applied to the local mirror")
                .build(),
            batch_size: meter
                .u64_histogram("yuzu.client.batch.size")
                .with_description("Number of patches per received patch-batch message")
                .build(),
            notifications_delivered: meter
                .u64_counter("yuzu.client.notifications.delivered")
                .with_description("Total number of listener notifications delivered")
                .build(),
            errors_total: meter
                .u64_counter("yuzu.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: i64) {
        self.connection_state.record(state, &[]);
    }

    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    pub fn record_patch(&self) {
        self.patches_applied.add(1, &[]);
    }

    pub fn record_batch(&self, size: u64) {
        self.batch_size.record(size, &[]);
    }

    pub fn record_notification(&self) {
        self.notifications_delivered.add(1, &[]);
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
        let metrics = ClientMetrics::new("test-client");
        metrics.update_connection_state(2);
        metrics.record_reconnection_attempt();
        metrics.record_reconnection_success();
        metrics.record_patch();
        metrics.record_batch(3);
        metrics.record_notification();
        metrics.record_error("decode");
    }

    #[test]
    fn connection_states_cover_the_documented_range() {
        let metrics = ClientMetrics::new("test-client-state");
        for state in 0..=2 {
            metrics.update_connection_state(state);
        }
    }
}
