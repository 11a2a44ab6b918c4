//! Prediction endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Envelope};
use crate::models::PageRequest;
use crate::reconciler::ScanStatusView;
use crate::submission::{create_prediction, list_predictions, NewPrediction, PredictionResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionsQuery {
    pub patient_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// `POST /api/predictions`
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<NewPrediction>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<PredictionResult>>), ApiError> {
    let Json(input) = payload?;
    let result = create_prediction(&ctx.core.db, ctx.core.backend(), input).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(result))))
}

/// `GET /api/predictions?patientId=&limit=&offset=`
pub async fn list(
    State(ctx): State<ApiContext>,
    query: Result<Query<PredictionsQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<ScanStatusView>>>, ApiError> {
    let Query(query) = query?;
    let page = PageRequest::resolve(query.limit, query.offset)?;
    let predictions = list_predictions(&ctx.core.db, query.patient_id.as_deref(), page)?;
    Ok(Json(Envelope::page(predictions)))
}
