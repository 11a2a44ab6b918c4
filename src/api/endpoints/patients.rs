//! Patient endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Envelope};
use crate::models::{PageRequest, Patient, PatientSummary};
use crate::patients::{list_patients, register_patient, NewPatient};

#[derive(Deserialize)]
pub struct PatientsQuery {
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// `POST /api/patients`
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<NewPatient>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Patient>>), ApiError> {
    let Json(input) = payload?;
    let patient = register_patient(&ctx.core.db, input)?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(patient))))
}

/// `GET /api/patients?search=&limit=&offset=`
pub async fn list(
    State(ctx): State<ApiContext>,
    query: Result<Query<PatientsQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<PatientSummary>>>, ApiError> {
    let Query(query) = query?;
    let page = PageRequest::resolve(query.limit, query.offset)?;
    let patients = list_patients(&ctx.core.db, query.search.as_deref(), page)?;
    Ok(Json(Envelope::page(patients)))
}
