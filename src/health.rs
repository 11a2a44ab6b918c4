//! Prediction service health probe.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::prediction::{
    usage_label, HealthPayload, PredictionBackend, PredictionError, DEFAULT_SERVICE_VERSION,
};

/// Upper bound on a health probe, including connection setup.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Service-reported figures, present only on a healthy probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDetails {
    pub version: String,
    pub uptime: f64,
    pub active_connections: u64,
    pub queue_size: u64,
    pub memory_usage: String,
    pub cpu_usage: String,
}

impl From<HealthPayload> for BackendDetails {
    fn from(payload: HealthPayload) -> Self {
        Self {
            memory_usage: usage_label(payload.memory_usage.as_ref()),
            cpu_usage: usage_label(payload.cpu_usage.as_ref()),
            version: payload
                .version
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_SERVICE_VERSION.to_string()),
            uptime: payload.uptime.unwrap_or(0.0),
            active_connections: payload.active_connections.unwrap_or(0),
            queue_size: payload.queue_size.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHealth {
    pub status: HealthStatus,
    /// Milliseconds from request start to outcome.
    pub response_time: u64,
    pub last_checked: DateTime<Utc>,
    #[serde(flatten)]
    pub details: Option<BackendDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackendHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Probe the prediction service. Never fails: every error becomes an
/// `unhealthy` report carrying the error description.
pub async fn check_backend_health(backend: &dyn PredictionBackend) -> BackendHealth {
    let started = Instant::now();
    let result = match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, backend.health()).await {
        Ok(result) => result,
        Err(_) => Err(PredictionError::Timeout(HEALTH_CHECK_TIMEOUT.as_secs())),
    };
    let response_time = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(payload) => BackendHealth {
            status: HealthStatus::Healthy,
            response_time,
            last_checked: Utc::now(),
            details: Some(payload.into()),
            error: None,
        },
        Err(err) => {
            tracing::warn!(error = %err, response_time, "Prediction service health check failed");
            BackendHealth {
                status: HealthStatus::Unhealthy,
                response_time,
                last_checked: Utc::now(),
                details: None,
                error: Some(err.to_string()),
            }
        }
    }
}
