//! Status endpoints: scan reconciliation, prediction service health,
//! system snapshot and service metrics.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Envelope};
use crate::health::{check_backend_health, BackendHealth};
use crate::metrics::{get_service_metrics, ServiceMetricsReport};
use crate::reconciler::{get_status, ScanKey, ScanStatusView};
use crate::snapshot::{get_system_snapshot, SystemSnapshot};

/// `GET /api/status/scan?sessionId=&patientId=`
pub async fn scan(
    State(ctx): State<ApiContext>,
    query: Result<Query<ScanKey>, QueryRejection>,
) -> Result<Json<Envelope<ScanStatusView>>, ApiError> {
    let Query(key) = query?;
    let view = get_status(&ctx.core.db, ctx.core.backend(), &key).await?;
    Ok(Json(Envelope::ok(view)))
}

/// `GET /api/status/backend`
pub async fn backend(State(ctx): State<ApiContext>) -> Json<Envelope<BackendHealth>> {
    Json(Envelope::ok(check_backend_health(ctx.core.backend()).await))
}

/// `GET /api/status/system`
pub async fn system(
    State(ctx): State<ApiContext>,
) -> Result<Json<Envelope<SystemSnapshot>>, ApiError> {
    let snapshot =
        get_system_snapshot(&ctx.core.db, ctx.core.backend(), ctx.core.started_at()).await?;
    Ok(Json(Envelope::ok(snapshot)))
}

/// `GET /api/status/metrics` carries its own `success` flag and a
/// zeroed fallback when the service cannot be reached.
pub async fn metrics(State(ctx): State<ApiContext>) -> Json<ServiceMetricsReport> {
    Json(get_service_metrics(ctx.core.backend()).await)
}
