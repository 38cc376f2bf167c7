//! Integration tests for the engine API endpoints

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use engine_lib::{
    catalog::Catalog,
    hardware::StaticEnumerator,
    health::{components, ComponentStatus, HealthRegistry},
    ComposeEngine, DeployOutcome, DeployRequest, EngineMetrics, RawBusRecord, SecurityPolicy,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ComposeEngine>,
    pub health_registry: HealthRegistry,
    pub metrics: EngineMetrics,
}

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
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/deploy", post(deploy))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

fn nvidia_records() -> Vec<RawBusRecord> {
    vec![RawBusRecord {
        vendor_id: "10de".to_string(),
        device_id: "2684".to_string(),
        bus_address: "0000:01:00.0".to_string(),
    }]
}

async fn setup_test_app(tmp: &TempDir) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::CATALOG).await;
    health_registry.register(components::WRITER).await;

    let engine = Arc::new(ComposeEngine::new(
        Arc::new(Catalog::builtin()),
        Arc::new(SecurityPolicy::with_base_root(tmp.path())),
        Arc::new(StaticEnumerator::new(nvidia_records())),
        "test-host",
    ));

    let state = Arc::new(AppState {
        engine,
        health_registry,
        metrics: EngineMetrics::new(),
    });
    let router = create_test_router(state.clone());

    (router, state)
}

fn deploy_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/deploy")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_deploy_returns_200_and_artifact_on_success() {
    let tmp = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&tmp).await;

    let response = app
        .oneshot(deploy_request(serde_json::json!({
            "service_id": "plex",
            "parameters": { "media_path": "/mnt/d/Media" }
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let outcome: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(outcome["status"], "written");
    assert!(outcome["checksum"].as_str().unwrap().len() == 64);
    assert!(tmp.path().join("services/plex.yml").exists());
}

#[tokio::test]
async fn test_deploy_returns_422_with_violations_on_rejection() {
    let tmp = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&tmp).await;

    let response = app
        .oneshot(deploy_request(serde_json::json!({
            "service_id": "plex",
            "parameters": { "media_path": "/" }
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let outcome: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(outcome["status"], "rejected");
    let violations = outcome["violations"].as_array().unwrap();
    assert!(violations
        .iter()
        .any(|v| v["rule"] == "forbidden_mount_target"));
    assert!(!tmp.path().join("services/plex.yml").exists());
}

#[tokio::test]
async fn test_deploy_returns_404_for_unknown_service() {
    let tmp = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&tmp).await;

    let response = app
        .oneshot(deploy_request(serde_json::json!({
            "service_id": "no-such-service"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let outcome: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(outcome["status"], "not_found");
    assert_eq!(outcome["service_id"], "no-such-service");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let tmp = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&tmp).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["catalog"].is_object());
    assert!(health["components"]["writer"].is_object());
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let tmp = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&tmp).await;

    // By default, the engine is not ready
    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let tmp = TempDir::new().unwrap();
    let (app, state) = setup_test_app(&tmp).await;

    state.health_registry.set_ready(true).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let tmp = TempDir::new().unwrap();
    let (app, state) = setup_test_app(&tmp).await;

    state.metrics.observe_compose_latency(0.001);
    state.metrics.observe_write_latency(0.002);
    state.metrics.set_templates_loaded(7);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("homestack_compose_latency_seconds"));
    assert!(metrics_text.contains("homestack_write_latency_seconds"));
    assert!(metrics_text.contains("homestack_templates_loaded"));
}
