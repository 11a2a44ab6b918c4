use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BloodGroup, ScanStatus};

const SESSION_PREFIX: &str = "BG";
const SESSION_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SESSION_SUFFIX_LEN: usize = 8;

/// Result fields written on a `completed` transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionOutcome {
    pub blood_group: BloodGroup,
    /// Percentage, as reported by the prediction service.
    pub confidence: f64,
    /// Seconds, as reported by the prediction service.
    pub scan_duration: f64,
}

/// Status of a scan together with the fields that status carries.
///
/// Result fields exist only on `Completed`, the error message only on
/// `Failed`, so a record can never hold both.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Processing,
    Completed(PredictionOutcome),
    Failed { error_message: String },
}

impl ScanOutcome {
    pub fn status(&self) -> ScanStatus {
        match self {
            Self::Processing => ScanStatus::Processing,
            Self::Completed(_) => ScanStatus::Completed,
            Self::Failed { .. } => ScanStatus::Failed,
        }
    }

    pub fn prediction(&self) -> Option<&PredictionOutcome> {
        match self {
            Self::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { error_message } => Some(error_message),
            _ => None,
        }
    }
}

/// One blood-group detection attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub session_id: String,
    pub outcome: ScanOutcome,
    /// Submitted payload metadata (JSON text).
    pub fingerprint_data: Option<String>,
    /// Raw terminal response from the prediction service (JSON text).
    pub api_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScanRecord {
    /// A fresh record in `processing` state.
    pub fn new_processing(
        patient_id: Uuid,
        session_id: String,
        fingerprint_data: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            session_id,
            outcome: ScanOutcome::Processing,
            fingerprint_data,
            api_response: None,
            created_at: Utc::now(),
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.outcome.status()
    }
}

/// Generate a session id: `BG` followed by 8 uppercase alphanumerics.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SESSION_SUFFIX_LEN)
        .map(|_| SESSION_CHARSET[rng.gen_range(0..SESSION_CHARSET.len())] as char)
        .collect();
    format!("{SESSION_PREFIX}{suffix}")
}

pub fn is_valid_session_id(candidate: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^BG[A-Z0-9]{8}$").expect("static session id pattern"))
        .is_match(candidate)
}
