//! Scan status reconciliation.
//!
//! A scan record lives in two places: the local database, which is the
//! source of truth once terminal, and the prediction service, which knows
//! about progress while the record is still `processing`. `get_status`
//! merges both and persists the first terminal outcome it observes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, Database};
use crate::error::ServiceError;
use crate::models::*;
use crate::prediction::{PredictionBackend, ProcessingDetails, RemoteReply, RemoteStatus};

/// Bound on a single status probe. A probe that exceeds it counts as failed.
pub const STATUS_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Patient-keyed lookups only consider scans this recent.
pub const RECENT_SCAN_WINDOW_HOURS: i64 = 24;

pub const ACTION_PREDICTION_COMPLETED: &str = "Blood group prediction completed";
pub const ACTION_PREDICTION_FAILED: &str = "Blood group prediction failed";

/// Lookup key for a scan. `session_id` wins when both are present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanKey {
    pub session_id: Option<String>,
    pub patient_id: Option<String>,
}

impl ScanKey {
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            patient_id: None,
        }
    }

    pub fn patient(patient_id: impl Into<String>) -> Self {
        Self {
            session_id: None,
            patient_id: Some(patient_id.into()),
        }
    }
}

/// Unified view of one scan, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatusView {
    pub id: Uuid,
    pub session_id: String,
    pub status: ScanStatus,
    pub blood_group: Option<BloodGroup>,
    pub confidence: Option<f64>,
    pub scan_duration: Option<f64>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub patient: PatientIdentity,
    /// Live progress; only present while the service is still working.
    pub processing_details: Option<ProcessingDetails>,
}

impl ScanStatusView {
    pub fn new(
        record: &ScanRecord,
        patient: PatientIdentity,
        processing_details: Option<ProcessingDetails>,
    ) -> Self {
        let prediction = record.outcome.prediction();
        Self {
            id: record.id,
            session_id: record.session_id.clone(),
            status: record.status(),
            blood_group: prediction.map(|p| p.blood_group),
            confidence: prediction.map(|p| p.confidence),
            scan_duration: prediction.map(|p| p.scan_duration),
            error_message: record.outcome.error_message().map(str::to_string),
            timestamp: record.created_at,
            patient,
            processing_details,
        }
    }
}

/// Resolve a scan and reconcile it with the prediction service.
///
/// Terminal records are returned without contacting the service. For a
/// `processing` record the service is probed once; probe failures are
/// absorbed and the local record is returned as is.
pub async fn get_status(
    db: &Database,
    backend: &dyn PredictionBackend,
    key: &ScanKey,
) -> Result<ScanStatusView, ServiceError> {
    let (record, patient) = {
        let conn = db.connect()?;
        let record = resolve_record(&conn, key, Utc::now())?;
        let patient = db::get_patient_identity(&conn, &record.patient_id)?;
        (record, patient)
    };

    if record.status().is_terminal() {
        return Ok(ScanStatusView::new(&record, patient, None));
    }

    let Some(reply) = probe(backend, &record.session_id).await else {
        return Ok(ScanStatusView::new(&record, patient, None));
    };

    let outcome = match reply.status {
        RemoteStatus::Pending(details) => {
            return Ok(ScanStatusView::new(&record, patient, Some(details)));
        }
        RemoteStatus::Completed(prediction) => ScanOutcome::Completed(prediction),
        RemoteStatus::Failed(error_message) => ScanOutcome::Failed { error_message },
    };

    let persisted = record_terminal_outcome(db, &record, &patient, &outcome, Some(&reply.raw))?;
    Ok(ScanStatusView::new(&persisted, patient, None))
}

fn resolve_record(
    conn: &rusqlite::Connection,
    key: &ScanKey,
    now: DateTime<Utc>,
) -> Result<ScanRecord, ServiceError> {
    let session_id = key.session_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let patient_id = key.patient_id.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let found = match (session_id, patient_id) {
        (Some(session_id), _) if is_valid_session_id(session_id) => {
            db::get_scan_by_session(conn, session_id)?
        }
        // Only generated ids are ever stored.
        (Some(_), _) => None,
        (None, Some(patient_id)) => match Uuid::parse_str(patient_id) {
            Ok(patient_id) => {
                let since = now - chrono::Duration::hours(RECENT_SCAN_WINDOW_HOURS);
                db::get_latest_scan_for_patient(conn, &patient_id, &since)?
            }
            // No record can carry a malformed id.
            Err(_) => None,
        },
        (None, None) => {
            return Err(ServiceError::InvalidRequest(
                "Either sessionId or patientId is required".into(),
            ))
        }
    };

    found.ok_or_else(|| ServiceError::NotFound("Scan result not found".into()))
}

async fn probe(backend: &dyn PredictionBackend, session_id: &str) -> Option<RemoteReply> {
    match tokio::time::timeout(STATUS_PROBE_TIMEOUT, backend.scan_status(session_id)).await {
        Ok(Ok(reply)) => Some(reply),
        Ok(Err(err)) => {
            tracing::warn!(session_id, error = %err, "Status probe failed, returning local state");
            None
        }
        Err(_) => {
            tracing::warn!(
                session_id,
                timeout_secs = STATUS_PROBE_TIMEOUT.as_secs(),
                "Status probe timed out, returning local state"
            );
            None
        }
    }
}

/// Persist a terminal outcome for a `processing` scan and return the
/// stored record.
///
/// The transition and its system-log entry commit together. When another
/// caller already moved the record out of `processing`, nothing is
/// written and the winner's stored values are returned.
pub(crate) fn record_terminal_outcome(
    db: &Database,
    record: &ScanRecord,
    patient: &PatientIdentity,
    outcome: &ScanOutcome,
    api_response: Option<&str>,
) -> Result<ScanRecord, ServiceError> {
    let mut conn = db.connect()?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(db::DatabaseError::from)?;

    let applied = db::apply_terminal_outcome(&tx, &record.id, outcome, api_response)?;
    if applied {
        let (action, details, level) = match outcome {
            ScanOutcome::Completed(prediction) => (
                ACTION_PREDICTION_COMPLETED,
                format!(
                    "Patient: {}, Result: {}, Confidence: {}%, Session: {}",
                    patient.name, prediction.blood_group, prediction.confidence, record.session_id
                ),
                LogLevel::Info,
            ),
            ScanOutcome::Failed { error_message } => (
                ACTION_PREDICTION_FAILED,
                format!("Session: {}, Error: {error_message}", record.session_id),
                LogLevel::Error,
            ),
            ScanOutcome::Processing => {
                return Err(ServiceError::Internal(
                    "processing is not a terminal outcome".into(),
                ))
            }
        };
        db::insert_system_log(&tx, action, &details, level)?;
    }

    let stored = db::get_scan(&tx, &record.id)?.ok_or_else(|| {
        ServiceError::Internal(format!("scan {} vanished during update", record.session_id))
    })?;
    tx.commit().map_err(db::DatabaseError::from)?;

    if applied {
        tracing::info!(
            session_id = %record.session_id,
            status = %stored.status(),
            "Scan reached terminal status"
        );
    } else {
        tracing::debug!(
            session_id = %record.session_id,
            "Terminal status already recorded by another caller"
        );
    }
    Ok(stored)
}
