//! Access to the external blood-group prediction service.
//!
//! The service is an opaque HTTP collaborator. `PredictionBackend` is the
//! seam the rest of the crate talks to; `PredictionClient` is the HTTP
//! implementation.

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use client::PredictionClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Prediction service is not reachable at {0}")]
    Connection(String),

    #[error("Prediction service request timed out after {0}s")]
    Timeout(u64),

    #[error("Prediction service error: {status} - {detail}")]
    Status { status: u16, detail: String },

    #[error("Malformed prediction service response: {0}")]
    MalformedResponse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Operations the prediction service exposes.
#[async_trait]
pub trait PredictionBackend: Send + Sync {
    /// `GET /api/health`
    async fn health(&self) -> Result<HealthPayload, PredictionError>;

    /// `GET /api/status/{session_id}`
    async fn scan_status(&self, session_id: &str) -> Result<RemoteReply, PredictionError>;

    /// `POST /api/prediction`
    async fn submit(&self, request: &PredictionRequest) -> Result<RemoteReply, PredictionError>;

    /// `GET /api/metrics`
    async fn metrics(&self) -> Result<MetricsPayload, PredictionError>;
}
