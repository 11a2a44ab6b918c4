use std::time::Duration;

use async_trait::async_trait;

use super::types::{
    ErrorPayload, HealthPayload, MetricsPayload, PredictionRequest, RemoteReply,
};
use super::{PredictionBackend, PredictionError};

/// Bound on `GET /api/health`.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on `GET /api/status/{session_id}`.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on `POST /api/prediction`; image payloads are large.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound on `GET /api/metrics`.
pub const METRICS_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP client for the prediction service.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    base_url: String,
    client: reqwest::Client,
}

impl PredictionClient {
    pub fn new(base_url: &str) -> Result<Self, PredictionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| PredictionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(&self, err: reqwest::Error, timeout: Duration) -> PredictionError {
        if err.is_timeout() {
            PredictionError::Timeout(timeout.as_secs())
        } else if err.is_connect() {
            PredictionError::Connection(self.base_url.clone())
        } else if err.is_decode() {
            PredictionError::MalformedResponse(err.to_string())
        } else {
            PredictionError::HttpClient(err.to_string())
        }
    }

    async fn get(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<reqwest::Response, PredictionError> {
        let response = self
            .client
            .get(self.url(path))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e, timeout))?;
        ensure_success(response).await
    }

    async fn read_text(
        &self,
        response: reqwest::Response,
        timeout: Duration,
    ) -> Result<String, PredictionError> {
        response
            .text()
            .await
            .map_err(|e| self.map_send_error(e, timeout))
    }
}

/// Turn a non-2xx response into `PredictionError::Status`, preferring the
/// service's own `detail` message over the reason phrase.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, PredictionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorPayload>(&body)
        .ok()
        .and_then(|p| p.detail)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
    Err(PredictionError::Status {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl PredictionBackend for PredictionClient {
    async fn health(&self) -> Result<HealthPayload, PredictionError> {
        let response = self.get("/api/health", HEALTH_TIMEOUT).await?;
        let body = self.read_text(response, HEALTH_TIMEOUT).await?;
        // A healthy service may answer with an empty or non-object body.
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    async fn scan_status(&self, session_id: &str) -> Result<RemoteReply, PredictionError> {
        let path = format!("/api/status/{session_id}");
        let response = self.get(&path, STATUS_TIMEOUT).await?;
        let body = self.read_text(response, STATUS_TIMEOUT).await?;
        RemoteReply::parse(body)
    }

    async fn submit(&self, request: &PredictionRequest) -> Result<RemoteReply, PredictionError> {
        let response = self
            .client
            .post(self.url("/api/prediction"))
            .timeout(SUBMIT_TIMEOUT)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e, SUBMIT_TIMEOUT))?;
        let response = ensure_success(response).await?;
        let body = self.read_text(response, SUBMIT_TIMEOUT).await?;
        RemoteReply::parse(body)
    }

    async fn metrics(&self) -> Result<MetricsPayload, PredictionError> {
        let response = self.get("/api/metrics", METRICS_TIMEOUT).await?;
        let body = self.read_text(response, METRICS_TIMEOUT).await?;
        serde_json::from_str(&body).map_err(|e| PredictionError::MalformedResponse(e.to_string()))
    }
}
