//! Liveness endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::{ApiContext, Envelope};
use crate::config::{APP_NAME, APP_VERSION};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime: f64,
}

/// `GET /api/health`: this service is up. Does not contact the
/// prediction service; see `/api/status/backend` for that.
pub async fn check(State(ctx): State<ApiContext>) -> Json<Envelope<HealthResponse>> {
    Json(Envelope::ok(HealthResponse {
        status: "ok",
        service: APP_NAME,
        version: APP_VERSION,
        uptime: ctx.core.started_at().elapsed().as_secs_f64(),
    }))
}
