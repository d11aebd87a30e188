//! HTTP handlers for health, diagnostics and gated procedures.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::AppState;
use crate::ratelimit::{RateLimitResult, Tier};

/// Admission details echoed back by a gated procedure call.
#[derive(Debug, Serialize)]
pub struct ProcedureAdmission {
    pub procedure: String,
    pub tier: Tier,
    pub limit: u32,
    pub remaining: u32,
    pub reset: u64,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Rate limiter diagnostics. Hidden in production.
pub async fn rate_limit_stats(State(state): State<AppState>) -> Response {
    if state.environment.is_production() {
        debug!("Stats endpoint requested in production mode");
        return not_found().await.into_response();
    }
    Json(state.registry.stats()).into_response()
}

/// Terminal handler for `/trpc/{procedure}` once the gate has admitted the call.
pub async fn procedure_call(
    Path(procedure): Path<String>,
    Extension(admission): Extension<RateLimitResult>,
) -> Json<ProcedureAdmission> {
    Json(ProcedureAdmission {
        tier: Tier::for_procedure(&procedure),
        procedure,
        limit: admission.limit,
        remaining: admission.remaining,
        reset: admission.reset,
    })
}

pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
