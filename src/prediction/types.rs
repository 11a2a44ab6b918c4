//! Prediction service wire types.
//!
//! Every response field is optional on the wire. Payloads are converted
//! into domain types here, once, with defaults applied at this boundary.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use super::PredictionError;
use crate::models::{BloodGroup, PredictionOutcome};

pub const DEFAULT_SERVICE_VERSION: &str = "1.0.0";
pub const DEFAULT_PROCESSING_STEP: &str = "Processing";
pub const DEFAULT_FAILURE_MESSAGE: &str = "Processing failed";
pub const UNKNOWN_USAGE: &str = "Unknown";

// ═══════════════════════════════════════════════════════════
// Outbound
// ═══════════════════════════════════════════════════════════

/// Body of `POST /api/prediction`.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRequest {
    pub session_id: String,
    pub fingerprint_image: String,
    pub quality_score: f64,
    pub timestamp: String,
    pub patient_metadata: PatientMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientMetadata {
    pub id: String,
    pub name: String,
    pub email: String,
}

// ═══════════════════════════════════════════════════════════
// Inbound payloads
// ═══════════════════════════════════════════════════════════

/// Body of `GET /api/health`.
///
/// Fields are read one by one: a value of the wrong type is treated as
/// absent without discarding its neighbours.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub uptime: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub active_connections: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub queue_size: Option<u64>,
    /// Either a number or a preformatted string, depending on the service.
    pub memory_usage: Option<serde_json::Value>,
    pub cpu_usage: Option<serde_json::Value>,
}

/// Body of `GET /api/status/{session_id}` and of a prediction response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: Option<String>,
    pub blood_group: Option<String>,
    pub confidence: Option<f64>,
    pub processing_time: Option<f64>,
    pub error_message: Option<String>,
    pub current_step: Option<String>,
    pub estimated_time_remaining: Option<f64>,
    pub progress_percentage: Option<f64>,
    pub algorithm_version: Option<String>,
    pub quality_assessment: Option<f64>,
    pub model_accuracy: Option<f64>,
}

/// Body of `GET /api/metrics`. Read field by field, like [`HealthPayload`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_requests: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub average_response_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub success_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub active_connections: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub queue_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub supported_blood_groups: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub algorithm_accuracy: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub model_version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_updated: Option<String>,
}

/// Deserialize an optional field, mapping a mistyped value to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Error body some service failures carry.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    pub detail: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Domain views
// ═══════════════════════════════════════════════════════════

/// Progress of a scan the service is still working on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingDetails {
    pub current_step: String,
    /// Seconds.
    pub estimated_time_remaining: f64,
    /// Percentage.
    pub progress: f64,
}

/// What the service reports about one session.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteStatus {
    Pending(ProcessingDetails),
    Completed(PredictionOutcome),
    Failed(String),
}

/// A parsed status or prediction response, with its raw body kept for audit.
#[derive(Debug, Clone)]
pub struct RemoteReply {
    pub status: RemoteStatus,
    pub algorithm_version: Option<String>,
    pub quality_assessment: Option<f64>,
    pub model_accuracy: Option<f64>,
    pub raw: String,
}

impl RemoteReply {
    pub fn parse(raw: String) -> Result<Self, PredictionError> {
        let payload: StatusPayload = serde_json::from_str(&raw)
            .map_err(|e| PredictionError::MalformedResponse(e.to_string()))?;
        Self::from_payload(payload, raw)
    }

    pub fn from_payload(payload: StatusPayload, raw: String) -> Result<Self, PredictionError> {
        let status = match payload.status.as_deref() {
            Some("completed") => {
                let group = payload.blood_group.as_deref().ok_or_else(|| {
                    PredictionError::MalformedResponse("completed without blood_group".into())
                })?;
                let blood_group = BloodGroup::from_str(group).map_err(|_| {
                    PredictionError::MalformedResponse(format!("unknown blood group '{group}'"))
                })?;
                RemoteStatus::Completed(PredictionOutcome {
                    blood_group,
                    confidence: payload.confidence.unwrap_or(0.0),
                    scan_duration: payload.processing_time.unwrap_or(0.0),
                })
            }
            Some("failed") => RemoteStatus::Failed(
                payload
                    .error_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            ),
            Some("processing") => RemoteStatus::Pending(ProcessingDetails {
                current_step: payload
                    .current_step
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PROCESSING_STEP.to_string()),
                estimated_time_remaining: payload.estimated_time_remaining.unwrap_or(0.0),
                progress: payload.progress_percentage.unwrap_or(0.0),
            }),
            Some(other) => {
                return Err(PredictionError::MalformedResponse(format!(
                    "unknown status '{other}'"
                )))
            }
            None => return Err(PredictionError::MalformedResponse("missing status".into())),
        };

        Ok(Self {
            status,
            algorithm_version: payload.algorithm_version,
            quality_assessment: payload.quality_assessment,
            model_accuracy: payload.model_accuracy,
            raw,
        })
    }
}

/// Render a usage figure that may arrive as a number or a string.
pub fn usage_label(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => UNKNOWN_USAGE.to_string(),
    }
}
