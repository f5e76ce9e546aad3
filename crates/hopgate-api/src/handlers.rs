//! REST API handlers.
//!
//! Each handler reads or mutates the `RuleTable` and returns JSON.
//! Mutations answer `204 No Content`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{info, warn};

use crate::ApiState;

/// JSON envelope shared by every body the API returns:
/// `{"success": true, "data": ...}` or `{"success": false, "error": "..."}`.
#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data: Some(data),
        error: None,
    })
}

fn bad_request(reason: impl Into<String>) -> Response {
    let reason = reason.into();
    warn!(reason = %reason, "rejected rule request");
    let body = Envelope::<()> {
        success: false,
        data: None,
        error: Some(reason),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Create rule request body.
#[derive(Debug, serde::Deserialize)]
pub struct CreateRule {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub target: String,
}

/// GET /rules
pub async fn list_rules(State(state): State<ApiState>) -> impl IntoResponse {
    success(state.rules.snapshot())
}

/// POST /rules
pub async fn create_rule(
    State(state): State<ApiState>,
    payload: Result<Json<CreateRule>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let service = req.service.trim();
    let target = req.target.trim();
    if service.is_empty() || target.is_empty() {
        return bad_request("service and target are required");
    }

    state.rules.add(service, target);
    info!(service, target, "rule created via API");
    StatusCode::NO_CONTENT.into_response()
}

/// DELETE /rules/{service}
pub async fn delete_rule(
    State(state): State<ApiState>,
    Path(service): Path<String>,
) -> impl IntoResponse {
    state.rules.remove(&service);
    info!(service = %service, "rule deleted via API");
    StatusCode::NO_CONTENT
}

/// DELETE /rules
pub async fn clear_rules(State(state): State<ApiState>) -> impl IntoResponse {
    state.rules.clear();
    info!("all rules deleted via API");
    StatusCode::NO_CONTENT
}
