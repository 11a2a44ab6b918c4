//! Operational snapshot: scan counters, blood-group distribution, recent
//! errors and the prediction service health, in one read.

use std::time::Instant;

use chrono::{DateTime, Local, NaiveTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::APP_VERSION;
use crate::db::{self, Database};
use crate::error::ServiceError;
use crate::health::{check_backend_health, BackendHealth};
use crate::models::*;
use crate::prediction::PredictionBackend;

/// Error log entries older than this are not reported.
const RECENT_ERROR_WINDOW_HOURS: i64 = 24;
const RECENT_ERROR_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Operational,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub status: SystemStatus,
    /// Seconds since this process started.
    pub uptime: f64,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatistics {
    pub total_scans: i64,
    pub today_scans: i64,
    pub active_patients: i64,
    pub completed_scans: i64,
    pub error_count: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodGroupShare {
    pub blood_group: BloodGroup,
    pub count: i64,
    /// Share of all scans, not only completed ones.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentError {
    pub id: i64,
    pub action: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl From<SystemLog> for RecentError {
    fn from(log: SystemLog) -> Self {
        Self {
            id: log.id,
            action: log.action,
            details: log.details,
            timestamp: log.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub system: SystemInfo,
    pub statistics: ScanStatistics,
    pub prediction_backend: BackendHealth,
    pub blood_group_distribution: Vec<BloodGroupShare>,
    pub recent_errors: Vec<RecentError>,
}

/// Collect the snapshot. Storage failures surface as `Internal`; the
/// health probe never fails.
pub async fn get_system_snapshot(
    db: &Database,
    backend: &dyn PredictionBackend,
    started_at: Instant,
) -> Result<SystemSnapshot, ServiceError> {
    let now = Utc::now();
    let (statistics, distribution, recent_errors) = {
        let conn = db.connect()?;
        collect_statistics(&conn, now, local_midnight(Local::now()))?
    };

    let prediction_backend = check_backend_health(backend).await;
    let status = if prediction_backend.is_healthy() {
        SystemStatus::Operational
    } else {
        SystemStatus::Degraded
    };

    Ok(SystemSnapshot {
        system: SystemInfo {
            status,
            uptime: started_at.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
            version: APP_VERSION.to_string(),
        },
        statistics,
        prediction_backend,
        blood_group_distribution: distribution,
        recent_errors,
    })
}

fn collect_statistics(
    conn: &Connection,
    now: DateTime<Utc>,
    day_start: DateTime<Utc>,
) -> Result<(ScanStatistics, Vec<BloodGroupShare>, Vec<RecentError>), ServiceError> {
    let total_scans = db::count_scans(conn)?;
    let today_scans = db::count_scans_since(conn, &day_start)?;
    let active_patients = db::count_patients(conn)?;
    let completed_scans = db::count_scans_with_status(conn, ScanStatus::Completed)?;

    let error_since = now - chrono::Duration::hours(RECENT_ERROR_WINDOW_HOURS);
    let recent_errors: Vec<RecentError> = db::recent_errors(conn, &error_since, RECENT_ERROR_LIMIT)?
        .into_iter()
        .map(RecentError::from)
        .collect();

    let distribution = db::completed_blood_group_counts(conn)?
        .into_iter()
        .map(|(blood_group, count)| BloodGroupShare {
            blood_group,
            count,
            percentage: if total_scans > 0 {
                percentage(count, total_scans)
            } else {
                0.0
            },
        })
        .collect();

    let statistics = ScanStatistics {
        total_scans,
        today_scans,
        active_patients,
        completed_scans,
        error_count: recent_errors.len(),
        success_rate: if total_scans > 0 {
            percentage(completed_scans, total_scans)
        } else {
            100.0
        },
    };
    Ok((statistics, distribution, recent_errors))
}

/// `part / whole * 100`, rounded to one decimal.
fn percentage(part: i64, whole: i64) -> f64 {
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

/// Start of the current local day, in UTC.
fn local_midnight(now: DateTime<Local>) -> DateTime<Utc> {
    now.date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()
        .map(|midnight| midnight.with_timezone(&Utc))
        // No local midnight today (DST gap): fall back to a rolling day.
        .unwrap_or_else(|| (now - chrono::Duration::hours(24)).with_timezone(&Utc))
}
