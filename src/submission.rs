//! Prediction submission and listing.
//!
//! A submission creates a `processing` scan, posts the fingerprint to the
//! prediction service and records the answer through the same conditional
//! terminal write the reconciler uses.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, Database, DatabaseError};
use crate::error::ServiceError;
use crate::models::*;
use crate::prediction::{
    PatientMetadata, PredictionBackend, PredictionError, PredictionRequest, RemoteStatus,
};
use crate::reconciler::{record_terminal_outcome, ScanStatusView};

/// Upper bound on one submission round trip.
pub const SUBMISSION_TIMEOUT: Duration = Duration::from_secs(30);

const SESSION_ID_ATTEMPTS: usize = 5;
const DEFAULT_ALGORITHM_VERSION: &str = "1.0";
const DEFAULT_MODEL_ACCURACY: f64 = 98.5;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintData {
    /// Base64-encoded image.
    pub image_data: String,
    /// Capture quality, 0 to 100.
    pub quality: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrediction {
    pub patient_id: String,
    pub fingerprint_data: FingerprintData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMetadata {
    pub processing_time: Option<f64>,
    pub algorithm_version: String,
    pub quality_score: f64,
    pub model_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    #[serde(flatten)]
    pub scan: ScanStatusView,
    pub api_metadata: ApiMetadata,
}

impl NewPrediction {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.patient_id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("Patient ID is required".into()));
        }
        let fingerprint = &self.fingerprint_data;
        if fingerprint.image_data.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("Fingerprint image is required".into()));
        }
        if !fingerprint.quality.is_finite() || !(0.0..=100.0).contains(&fingerprint.quality) {
            return Err(ServiceError::InvalidRequest(
                "Quality must be between 0 and 100".into(),
            ));
        }
        if fingerprint.timestamp.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("Capture timestamp is required".into()));
        }
        Ok(())
    }
}

/// Submit a fingerprint for prediction.
///
/// Transport or HTTP failures mark the scan `failed` and surface as
/// `UpstreamUnavailable`. A `processing` answer leaves the scan open for
/// the reconciler and returns its progress.
pub async fn create_prediction(
    db: &Database,
    backend: &dyn PredictionBackend,
    input: NewPrediction,
) -> Result<PredictionResult, ServiceError> {
    create_prediction_with(db, backend, input, generate_session_id).await
}

async fn create_prediction_with(
    db: &Database,
    backend: &dyn PredictionBackend,
    input: NewPrediction,
    mut next_session_id: impl FnMut() -> String,
) -> Result<PredictionResult, ServiceError> {
    input.validate()?;
    let fingerprint = input.fingerprint_data;

    let (patient, record) = {
        let conn = db.connect()?;
        let patient = Uuid::parse_str(input.patient_id.trim())
            .ok()
            .map(|id| db::get_patient(&conn, &id))
            .transpose()?
            .flatten()
            .ok_or_else(|| ServiceError::NotFound("Patient not found".into()))?;

        let metadata = serde_json::json!({
            "quality": fingerprint.quality,
            "timestamp": fingerprint.timestamp,
            "imageLength": fingerprint.image_data.len(),
        })
        .to_string();
        let record = insert_with_fresh_session(&conn, patient.id, metadata, &mut next_session_id)?;
        (patient, record)
    };

    let identity = PatientIdentity {
        name: patient.display_name(),
        email: patient.email.clone(),
    };
    tracing::info!(
        session_id = %record.session_id,
        patient_id = %patient.id,
        "Submitting fingerprint for prediction"
    );

    let request = PredictionRequest {
        session_id: record.session_id.clone(),
        fingerprint_image: fingerprint.image_data,
        quality_score: fingerprint.quality,
        timestamp: fingerprint.timestamp,
        patient_metadata: PatientMetadata {
            id: patient.id.to_string(),
            name: identity.name.clone(),
            email: identity.email.clone(),
        },
    };

    let reply = match tokio::time::timeout(SUBMISSION_TIMEOUT, backend.submit(&request)).await {
        Ok(result) => result,
        Err(_) => Err(PredictionError::Timeout(SUBMISSION_TIMEOUT.as_secs())),
    };

    let reply = match reply {
        Ok(reply) => reply,
        Err(err) => {
            tracing::error!(
                session_id = %record.session_id,
                error = %err,
                "Prediction submission failed"
            );
            let outcome = ScanOutcome::Failed {
                error_message: err.to_string(),
            };
            record_terminal_outcome(db, &record, &identity, &outcome, None)?;
            return Err(ServiceError::UpstreamUnavailable(err.to_string()));
        }
    };

    let api_metadata = ApiMetadata {
        processing_time: match &reply.status {
            RemoteStatus::Completed(prediction) => Some(prediction.scan_duration),
            _ => None,
        },
        algorithm_version: reply
            .algorithm_version
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ALGORITHM_VERSION.to_string()),
        quality_score: reply.quality_assessment.unwrap_or(fingerprint.quality),
        model_accuracy: reply.model_accuracy.unwrap_or(DEFAULT_MODEL_ACCURACY),
    };

    let outcome = match reply.status {
        RemoteStatus::Pending(details) => {
            return Ok(PredictionResult {
                scan: ScanStatusView::new(&record, identity, Some(details)),
                api_metadata,
            });
        }
        RemoteStatus::Completed(prediction) => ScanOutcome::Completed(prediction),
        RemoteStatus::Failed(error_message) => ScanOutcome::Failed { error_message },
    };

    let stored = record_terminal_outcome(db, &record, &identity, &outcome, Some(&reply.raw))?;
    Ok(PredictionResult {
        scan: ScanStatusView::new(&stored, identity, None),
        api_metadata,
    })
}

fn insert_with_fresh_session(
    conn: &rusqlite::Connection,
    patient_id: Uuid,
    fingerprint_data: String,
    next_session_id: &mut impl FnMut() -> String,
) -> Result<ScanRecord, ServiceError> {
    for _ in 0..SESSION_ID_ATTEMPTS {
        let record = ScanRecord::new_processing(
            patient_id,
            next_session_id(),
            Some(fingerprint_data.clone()),
        );
        match db::insert_scan(conn, &record) {
            Ok(()) => return Ok(record),
            Err(DatabaseError::Duplicate { .. }) => {
                tracing::debug!(session_id = %record.session_id, "Session id collision, retrying");
            }
            Err(other) => return Err(other.into()),
        }
    }
    Err(ServiceError::Internal(format!(
        "no unused session id after {SESSION_ID_ATTEMPTS} attempts"
    )))
}

/// One page of scans, newest first, optionally for a single patient.
pub fn list_predictions(
    db: &Database,
    patient_id: Option<&str>,
    page: PageRequest,
) -> Result<Page<ScanStatusView>, ServiceError> {
    let patient_id = patient_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|raw| {
            Uuid::parse_str(raw)
                .map_err(|_| ServiceError::InvalidRequest("patientId must be a UUID".into()))
        })
        .transpose()?;

    let conn = db.connect()?;
    let (rows, total) = db::list_scans(&conn, patient_id.as_ref(), page.limit, page.offset)?;
    Ok(Page {
        items: rows
            .into_iter()
            .map(|row| ScanStatusView::new(&row.scan, row.patient, None))
            .collect(),
        pagination: Pagination::new(page, total),
    })
}
