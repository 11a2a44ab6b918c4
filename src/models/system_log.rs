use chrono::{DateTime, Utc};
use serde::Serialize;

use super::enums::LogLevel;

/// Persisted operational event, surfaced by the system snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemLog {
    pub id: i64,
    pub action: String,
    pub details: String,
    pub level: LogLevel,
    pub created_at: DateTime<Utc>,
}
