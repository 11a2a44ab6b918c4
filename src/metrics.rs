//! Prediction service metrics report.

use chrono::Utc;
use serde::Serialize;

use crate::models::BloodGroup;
use crate::prediction::{MetricsPayload, PredictionBackend, DEFAULT_SERVICE_VERSION};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetrics {
    pub api_version: String,
    pub total_requests: u64,
    pub average_response_time: f64,
    pub success_rate: f64,
    pub active_connections: u64,
    pub queue_size: u64,
    pub supported_blood_groups: Vec<String>,
    pub algorithm_accuracy: f64,
    pub model_version: String,
    pub last_updated: String,
}

/// Metrics as reported to clients. On failure `success` is false, `error`
/// says why and `data` holds zeroed figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceMetricsReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data: ServiceMetrics,
}

fn all_blood_groups() -> Vec<String> {
    BloodGroup::ALL.iter().map(|g| g.as_str().to_string()).collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl From<MetricsPayload> for ServiceMetrics {
    fn from(payload: MetricsPayload) -> Self {
        Self {
            api_version: non_empty(payload.version)
                .unwrap_or_else(|| DEFAULT_SERVICE_VERSION.to_string()),
            total_requests: payload.total_requests.unwrap_or(0),
            average_response_time: payload.average_response_time.unwrap_or(0.0),
            success_rate: payload.success_rate.unwrap_or(100.0),
            active_connections: payload.active_connections.unwrap_or(0),
            queue_size: payload.queue_size.unwrap_or(0),
            supported_blood_groups: payload
                .supported_blood_groups
                .filter(|groups| !groups.is_empty())
                .unwrap_or_else(all_blood_groups),
            algorithm_accuracy: payload.algorithm_accuracy.unwrap_or(98.5),
            model_version: non_empty(payload.model_version).unwrap_or_else(|| "1.0".to_string()),
            last_updated: non_empty(payload.last_updated)
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
        }
    }
}

impl ServiceMetrics {
    fn unavailable() -> Self {
        Self {
            api_version: UNKNOWN.to_string(),
            total_requests: 0,
            average_response_time: 0.0,
            success_rate: 0.0,
            active_connections: 0,
            queue_size: 0,
            supported_blood_groups: all_blood_groups(),
            algorithm_accuracy: 0.0,
            model_version: UNKNOWN.to_string(),
            last_updated: Utc::now().to_rfc3339(),
        }
    }
}

pub async fn get_service_metrics(backend: &dyn PredictionBackend) -> ServiceMetricsReport {
    match backend.metrics().await {
        Ok(payload) => ServiceMetricsReport {
            success: true,
            error: None,
            data: payload.into(),
        },
        Err(err) => {
            tracing::warn!(error = %err, "Failed to fetch prediction service metrics");
            ServiceMetricsReport {
                success: false,
                error: Some(err.to_string()),
                data: ServiceMetrics::unavailable(),
            }
        }
    }
}
