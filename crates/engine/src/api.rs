//! HTTP API: deploy pipeline, catalog listing, hardware report,
//! health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use engine_lib::{
    catalog::ParamSlot,
    health::{ComponentStatus, HealthRegistry},
    ComposeEngine, DeployOutcome, DeployRequest, HardwareProfile,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ComposeEngine>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(engine: Arc<ComposeEngine>, health_registry: HealthRegistry) -> Self {
        Self {
            engine,
            health_registry,
        }
    }
}

/// One catalog entry as exposed over the API
#[derive(Debug, Serialize)]
struct TemplateSummary {
    id: String,
    image: String,
    gpu_aware: bool,
    parameters: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct TemplatesResponse {
    catalog_version: &'static str,
    templates: Vec<TemplateSummary>,
}

#[derive(Debug, Serialize)]
struct HardwareResponse {
    gpus: Vec<HardwareProfile>,
    primary: Option<HardwareProfile>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Deploy endpoint: composes, validates and persists one service
///
/// Outcomes map to status codes: written 200, rejected 422,
/// unknown service 404. Persistence failures are 500.
async fn deploy(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeployRequest>,
) -> impl IntoResponse {
    match state.engine.deploy(&request).await {
        Ok(outcome) => {
            let status_code = match &outcome {
                DeployOutcome::Written(_) => StatusCode::OK,
                DeployOutcome::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DeployOutcome::NotFound { .. } => StatusCode::NOT_FOUND,
            };
            (status_code, Json(outcome)).into_response()
        }
        Err(e) => {
            error!(service_id = %request.service_id, error = %e, "Deploy failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Catalog listing
async fn templates(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let templates = state
        .engine
        .catalog()
        .templates()
        .iter()
        .map(|t| TemplateSummary {
            id: t.id.clone(),
            image: t.image.clone(),
            gpu_aware: !t.hardware_bindings.is_empty(),
            parameters: t
                .param_slots
                .iter()
                .map(|slot| match slot {
                    ParamSlot::MediaPath => "media_path",
                    ParamSlot::Port => "port",
                })
                .collect(),
        })
        .collect();

    Json(TemplatesResponse {
        catalog_version: state.engine.catalog_version(),
        templates,
    })
}

/// Fresh enumeration and classification of attached GPUs
async fn hardware(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let gpus = state.engine.detect_hardware().await;
    let primary = engine_lib::hardware::select_primary(&gpus).cloned();

    Json(HardwareResponse { gpus, primary })
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/deploy", post(deploy))
        .route("/v1/templates", get(templates))
        .route("/v1/hardware", get(hardware))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
