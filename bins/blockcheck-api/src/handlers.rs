// HTTP route handlers for the Blockcheck API

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use blockcheck_engine::{extract_function_name, run_test_suite, SuiteInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::metrics;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNameRequest {
    pub source_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNameResponse {
    pub function_name: Option<String>,
}

/// POST /api/v1/verify - Verify a submission against its test cases
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SuiteInput>,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let test_cases = payload.test_cases.len();
    let start = Instant::now();

    let report = run_test_suite(payload, &state.config).await;

    let elapsed = start.elapsed();
    metrics::record_suite(report.passed, elapsed.as_secs_f64());
    info!(
        request_id = %request_id,
        function = %report.function_name,
        test_cases,
        passed = report.passed,
        elapsed_ms = elapsed.as_millis() as u64,
        "Submission verified"
    );

    (StatusCode::OK, Json(report))
}

/// POST /api/v1/function-name - First top-level function in generated code
pub async fn function_name(Json(payload): Json<FunctionNameRequest>) -> impl IntoResponse {
    let function_name = extract_function_name(&payload.source_text);
    (StatusCode::OK, Json(FunctionNameResponse { function_name }))
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// GET /metrics - Prometheus exposition
pub async fn export_metrics() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to encode metrics: {}", e)).into_response()
        }
    }
}
