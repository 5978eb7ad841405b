use crate::db::reports_to_csv;
use crate::models::{FailureKind, ParseResult, PipelineOutcome};
use crate::service::PipelineService;
use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body: AIH text already extracted from the source document
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

/// Error envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

/// Health check
pub async fn health_check() -> &'static str {
    "OK"
}

/// Split, extract and validate
pub async fn parse(
    State(service): State<Arc<PipelineService>>,
    Json(req): Json<TextRequest>,
) -> Response {
    let result: ParseResult = service.parse(&req.text);
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(result)).into_response()
}

/// Full pipeline: parse, match, report
pub async fn analyze(
    State(service): State<Arc<PipelineService>>,
    Json(req): Json<TextRequest>,
) -> Response {
    let outcome: PipelineOutcome = service.process_async(&req.text).await;
    let status = outcome_status(&outcome);
    (status, Json(outcome)).into_response()
}

/// Full pipeline, reports rendered as CSV
pub async fn analyze_csv(
    State(service): State<Arc<PipelineService>>,
    Json(req): Json<TextRequest>,
) -> Response {
    let outcome = service.process_async(&req.text).await;
    if !outcome.success {
        let response = ErrorResponse {
            success: false,
            message: outcome
                .analysis
                .message
                .clone()
                .unwrap_or_else(|| "processing failed".to_string()),
        };
        return (outcome_status(&outcome), Json(response)).into_response();
    }

    match reports_to_csv(&outcome.analysis.reports) {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response(),
        Err(e) => {
            tracing::error!("CSV export failed: {}", e);
            let response = ErrorResponse {
                success: false,
                message: format!("Error: {}", e),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

/// Empty input is the caller's fault; a missing catalog is ours.
fn outcome_status(outcome: &PipelineOutcome) -> StatusCode {
    match outcome.failure {
        None => StatusCode::OK,
        Some(FailureKind::EmptyInput) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(FailureKind::CatalogUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
        Some(FailureKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
