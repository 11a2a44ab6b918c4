//! Scriptable in-process backend for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Barrier;

use super::types::{
    HealthPayload, MetricsPayload, PredictionRequest, RemoteReply, StatusPayload,
};
use super::{PredictionBackend, PredictionError};

#[derive(Debug, Clone)]
enum Scripted<T> {
    Reply(T),
    Unreachable,
    Hang,
}

pub struct MockPredictionBackend {
    health: Scripted<HealthPayload>,
    status: Scripted<StatusPayload>,
    submit: Scripted<StatusPayload>,
    metrics: Scripted<MetricsPayload>,
    /// When set, every status probe waits here before answering.
    status_gate: Option<Arc<Barrier>>,
    status_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    last_submission: std::sync::Mutex<Option<PredictionRequest>>,
}

impl MockPredictionBackend {
    /// A backend whose every call fails with a connection error.
    pub fn unreachable() -> Self {
        Self {
            health: Scripted::Unreachable,
            status: Scripted::Unreachable,
            submit: Scripted::Unreachable,
            metrics: Scripted::Unreachable,
            status_gate: None,
            status_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            last_submission: std::sync::Mutex::new(None),
        }
    }

    pub fn with_health(mut self, payload: HealthPayload) -> Self {
        self.health = Scripted::Reply(payload);
        self
    }

    pub fn hanging_health(mut self) -> Self {
        self.health = Scripted::Hang;
        self
    }

    pub fn with_status(mut self, payload: serde_json::Value) -> Self {
        self.status = Scripted::Reply(serde_json::from_value(payload).unwrap());
        self
    }

    pub fn hanging_status(mut self) -> Self {
        self.status = Scripted::Hang;
        self
    }

    pub fn with_submit(mut self, payload: serde_json::Value) -> Self {
        self.submit = Scripted::Reply(serde_json::from_value(payload).unwrap());
        self
    }

    pub fn with_metrics(mut self, payload: serde_json::Value) -> Self {
        self.metrics = Scripted::Reply(serde_json::from_value(payload).unwrap());
        self
    }

    pub fn with_status_gate(mut self, gate: Arc<Barrier>) -> Self {
        self.status_gate = Some(gate);
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn last_submission(&self) -> Option<PredictionRequest> {
        self.last_submission.lock().unwrap().clone()
    }
}

async fn play<T: Clone>(script: &Scripted<T>) -> Result<T, PredictionError> {
    match script {
        Scripted::Reply(value) => Ok(value.clone()),
        Scripted::Unreachable => Err(PredictionError::Connection("mock://prediction".into())),
        Scripted::Hang => std::future::pending().await,
    }
}

fn to_reply(payload: StatusPayload) -> Result<RemoteReply, PredictionError> {
    let raw = serde_json::to_string(&payload).unwrap();
    RemoteReply::from_payload(payload, raw)
}

#[async_trait]
impl PredictionBackend for MockPredictionBackend {
    async fn health(&self) -> Result<HealthPayload, PredictionError> {
        play(&self.health).await
    }

    async fn scan_status(&self, _session_id: &str) -> Result<RemoteReply, PredictionError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.status_gate {
            gate.wait().await;
        }
        to_reply(play(&self.status).await?)
    }

    async fn submit(&self, request: &PredictionRequest) -> Result<RemoteReply, PredictionError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_submission.lock().unwrap() = Some(request.clone());
        to_reply(play(&self.submit).await?)
    }

    async fn metrics(&self) -> Result<MetricsPayload, PredictionError> {
        play(&self.metrics).await
    }
}
