//! Observability infrastructure for the deployment engine
//!
//! Provides:
//! - Prometheus metrics (deploy counters, validation violations,
//!   compose/write latency, detected hardware info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_gauge, GaugeVec, Histogram, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    compose_latency_seconds: Histogram,
    write_latency_seconds: Histogram,
    deploys_written: IntGauge,
    deploys_rejected: IntGauge,
    deploys_not_found: IntGauge,
    write_errors: IntGauge,
    validation_violations: IntGauge,
    templates_loaded: IntGauge,
    gpu_info: GaugeVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            compose_latency_seconds: register_histogram!(
                "homestack_compose_latency_seconds",
                "Time spent composing a deployment descriptor",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register compose_latency_seconds"),

            write_latency_seconds: register_histogram!(
                "homestack_write_latency_seconds",
                "Time spent persisting a compose artifact",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register write_latency_seconds"),

            deploys_written: register_int_gauge!(
                "homestack_deploys_written_total",
                "Total number of compose artifacts written"
            )
            .expect("Failed to register deploys_written"),

            deploys_rejected: register_int_gauge!(
                "homestack_deploys_rejected_total",
                "Total number of descriptors rejected by the security validator"
            )
            .expect("Failed to register deploys_rejected"),

            deploys_not_found: register_int_gauge!(
                "homestack_deploys_not_found_total",
                "Total number of requests for unknown service ids"
            )
            .expect("Failed to register deploys_not_found"),

            write_errors: register_int_gauge!(
                "homestack_write_errors_total",
                "Total number of persistence failures"
            )
            .expect("Failed to register write_errors"),

            validation_violations: register_int_gauge!(
                "homestack_validation_violations_total",
                "Total number of individual rule violations found"
            )
            .expect("Failed to register validation_violations"),

            templates_loaded: register_int_gauge!(
                "homestack_templates_loaded",
                "Number of service templates in the catalog"
            )
            .expect("Failed to register templates_loaded"),

            gpu_info: register_gauge_vec!(
                "homestack_gpu_info",
                "Detected GPU hardware on this host",
                &["vendor", "device_class"]
            )
            .expect("Failed to register gpu_info"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share
/// the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_compose_latency(&self, duration_secs: f64) {
        self.inner().compose_latency_seconds.observe(duration_secs);
    }

    pub fn observe_write_latency(&self, duration_secs: f64) {
        self.inner().write_latency_seconds.observe(duration_secs);
    }

    pub fn inc_deploys_written(&self) {
        self.inner().deploys_written.inc();
    }

    pub fn inc_deploys_rejected(&self) {
        self.inner().deploys_rejected.inc();
    }

    pub fn inc_deploys_not_found(&self) {
        self.inner().deploys_not_found.inc();
    }

    pub fn inc_write_errors(&self) {
        self.inner().write_errors.inc();
    }

    pub fn add_validation_violations(&self, count: i64) {
        self.inner().validation_violations.add(count);
    }

    pub fn set_templates_loaded(&self, count: i64) {
        self.inner().templates_loaded.set(count);
    }

    /// Record a detected GPU
    pub fn set_gpu_info(&self, vendor: &str, device_class: &str) {
        self.inner()
            .gpu_info
            .with_label_values(&[vendor, device_class])
            .set(1.0);
    }

    /// Clear detected hardware before a fresh scan
    pub fn reset_gpu_info(&self) {
        self.inner().gpu_info.reset();
    }
}

/// Structured logger for engine events
#[derive(Clone)]
pub struct StructuredLogger {
    host_name: String,
}

impl StructuredLogger {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, catalog_version: &str, templates: usize) {
        info!(
            event = "engine_started",
            host = %self.host_name,
            engine_version = %version,
            catalog_version = %catalog_version,
            templates = templates,
            "Deployment engine started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            host = %self.host_name,
            reason = %reason,
            "Deployment engine shutting down"
        );
    }

    pub fn log_hardware_detected(&self, vendor: &str, device_class: &str, bus_address: &str) {
        info!(
            event = "hardware_detected",
            host = %self.host_name,
            vendor = %vendor,
            device_class = %device_class,
            bus_address = %bus_address,
            "GPU detected"
        );
    }

    pub fn log_deploy_written(&self, service_id: &str, path: &str, checksum: &str) {
        info!(
            event = "deploy_written",
            host = %self.host_name,
            service_id = %service_id,
            path = %path,
            checksum = %checksum,
            "Compose artifact written"
        );
    }

    /// Every rejection is surfaced with its full rule list; rejections
    /// are never retried or downgraded automatically
    pub fn log_deploy_rejected(&self, service_id: &str, rules: &[&str]) {
        warn!(
            event = "deploy_rejected",
            host = %self.host_name,
            service_id = %service_id,
            violation_count = rules.len(),
            rules = ?rules,
            "Descriptor rejected by security validator"
        );
    }

    pub fn log_service_not_found(&self, service_id: &str) {
        info!(
            event = "service_not_found",
            host = %self.host_name,
            service_id = %service_id,
            "Requested service is not in the catalog"
        );
    }

    pub fn log_write_failure(&self, service_id: &str, error: &str) {
        warn!(
            event = "write_failed",
            host = %self.host_name,
            service_id = %service_id,
            error = %error,
            "Failed to persist compose artifact"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_metrics_creation() {
        // Metrics register against the global Prometheus registry, so
        // exercise the full handle surface once.
        let metrics = EngineMetrics::new();

        metrics.observe_compose_latency(0.001);
        metrics.observe_write_latency(0.002);
        metrics.inc_deploys_written();
        metrics.inc_deploys_rejected();
        metrics.inc_deploys_not_found();
        metrics.inc_write_errors();
        metrics.add_validation_violations(3);
        metrics.set_templates_loaded(7);
        metrics.set_gpu_info("nvidia", "Ada");
        metrics.reset_gpu_info();
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-host");
        assert_eq!(logger.host_name, "test-host");
    }
}
