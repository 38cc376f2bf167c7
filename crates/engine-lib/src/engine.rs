//! The deploy pipeline: classify, look up, compose, validate, write
//!
//! One request owns its descriptor for the whole pipeline; catalog
//! and policy are read-only once published, so concurrent requests
//! for different services proceed fully in parallel. The writer is
//! the only serialization point, and only per service id.

use crate::catalog::{Catalog, CATALOG_VERSION};
use crate::compose::{compose, UserParameters};
use crate::hardware::{self, BusEnumerator};
use crate::models::{DeployOutcome, HardwareProfile, RawBusRecord};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::policy::SecurityPolicy;
use crate::validator::validate;
use crate::writer::ComposeWriter;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// One deploy request from the front end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub service_id: String,
    #[serde(default)]
    pub parameters: UserParameters,
    /// Pre-enumerated bus records; when absent the engine runs its
    /// own enumeration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_records: Option<Vec<RawBusRecord>>,
}

/// The hardware-aware template engine
pub struct ComposeEngine {
    catalog: Arc<Catalog>,
    policy: Arc<SecurityPolicy>,
    writer: ComposeWriter,
    enumerator: Arc<dyn BusEnumerator>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl ComposeEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        policy: Arc<SecurityPolicy>,
        enumerator: Arc<dyn BusEnumerator>,
        host_name: impl Into<String>,
    ) -> Self {
        let metrics = EngineMetrics::new();
        metrics.set_templates_loaded(catalog.len() as i64);

        Self {
            writer: ComposeWriter::new(&policy.confinement_root),
            catalog,
            policy,
            enumerator,
            metrics,
            logger: StructuredLogger::new(host_name),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    pub fn catalog_version(&self) -> &'static str {
        CATALOG_VERSION
    }

    /// Enumerate the bus and classify whatever is attached
    ///
    /// Enumeration failure degrades to an empty profile list; "no
    /// GPU" is an expected outcome, never a request failure.
    pub async fn detect_hardware(&self) -> Vec<HardwareProfile> {
        let records = self.enumerator.enumerate().await.unwrap_or_default();
        let profiles = hardware::classify(&records);

        self.metrics.reset_gpu_info();
        for profile in &profiles {
            self.metrics
                .set_gpu_info(profile.vendor.as_str(), &profile.device_class);
            self.logger.log_hardware_detected(
                profile.vendor.as_str(),
                &profile.device_class,
                &profile.bus_address,
            );
        }

        profiles
    }

    /// Run one request through the full pipeline
    ///
    /// Rejections and unknown services are outcomes, not errors; only
    /// persistence failures surface as `Err`, and those leave no
    /// partially-written artifact behind.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<DeployOutcome> {
        let profiles = match &request.bus_records {
            Some(records) => hardware::classify(records),
            None => self.detect_hardware().await,
        };
        let profile = hardware::select_primary(&profiles)
            .cloned()
            .unwrap_or_else(hardware::software_profile);

        let Some(template) = self.catalog.lookup(&request.service_id) else {
            self.metrics.inc_deploys_not_found();
            self.logger.log_service_not_found(&request.service_id);
            return Ok(DeployOutcome::NotFound {
                service_id: request.service_id.clone(),
            });
        };

        let compose_start = Instant::now();
        let descriptor = compose(template, &profile, &request.parameters, &self.policy);
        self.metrics
            .observe_compose_latency(compose_start.elapsed().as_secs_f64());
        debug!(
            service = %descriptor.service_id,
            vendor = %profile.vendor.as_str(),
            device_class = %profile.device_class,
            "Descriptor composed"
        );

        let verdict = validate(&descriptor, &self.policy);
        if !verdict.accepted {
            let rules: Vec<&str> = verdict.violations.iter().map(|v| v.rule.as_str()).collect();
            self.metrics.inc_deploys_rejected();
            self.metrics
                .add_validation_violations(verdict.violations.len() as i64);
            self.logger.log_deploy_rejected(&request.service_id, &rules);
            return Ok(DeployOutcome::Rejected(verdict));
        }

        let write_start = Instant::now();
        let artifact = match self.writer.write(&descriptor).await {
            Ok(artifact) => artifact,
            Err(e) => {
                self.metrics.inc_write_errors();
                self.logger
                    .log_write_failure(&request.service_id, &e.to_string());
                return Err(e).with_context(|| {
                    format!("failed to persist artifact for '{}'", request.service_id)
                });
            }
        };
        self.metrics
            .observe_write_latency(write_start.elapsed().as_secs_f64());

        self.metrics.inc_deploys_written();
        self.logger.log_deploy_written(
            &artifact.service_id,
            &artifact.path.to_string_lossy(),
            &artifact.checksum,
        );

        Ok(DeployOutcome::Written(artifact))
    }
}
