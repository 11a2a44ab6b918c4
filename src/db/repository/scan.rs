use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{parse_db_timestamp, parse_db_uuid, to_db_timestamp, DatabaseError};
use crate::models::*;

const SCAN_COLUMNS: &str = "s.id, s.patient_id, s.session_id, s.status, s.blood_group,
    s.confidence, s.scan_duration, s.error_message, s.fingerprint_data, s.api_response,
    s.created_at";

/// Raw column values, decoded into a `ScanRecord` outside the row callback.
struct ScanRow {
    id: String,
    patient_id: String,
    session_id: String,
    status: String,
    blood_group: Option<String>,
    confidence: Option<f64>,
    scan_duration: Option<f64>,
    error_message: Option<String>,
    fingerprint_data: Option<String>,
    api_response: Option<String>,
    created_at: String,
}

fn read_scan_row(row: &Row<'_>) -> rusqlite::Result<ScanRow> {
    Ok(ScanRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        session_id: row.get(2)?,
        status: row.get(3)?,
        blood_group: row.get(4)?,
        confidence: row.get(5)?,
        scan_duration: row.get(6)?,
        error_message: row.get(7)?,
        fingerprint_data: row.get(8)?,
        api_response: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl ScanRow {
    fn into_record(self) -> Result<ScanRecord, DatabaseError> {
        let outcome = match ScanStatus::from_str(&self.status)? {
            ScanStatus::Processing => ScanOutcome::Processing,
            ScanStatus::Completed => {
                let (Some(group), Some(confidence), Some(scan_duration)) =
                    (self.blood_group, self.confidence, self.scan_duration)
                else {
                    return Err(DatabaseError::ConstraintViolation(format!(
                        "completed scan {} is missing result fields",
                        self.session_id
                    )));
                };
                ScanOutcome::Completed(PredictionOutcome {
                    blood_group: BloodGroup::from_str(&group)?,
                    confidence,
                    scan_duration,
                })
            }
            ScanStatus::Failed => ScanOutcome::Failed {
                error_message: self.error_message.unwrap_or_default(),
            },
        };

        Ok(ScanRecord {
            id: parse_db_uuid(&self.id)?,
            patient_id: parse_db_uuid(&self.patient_id)?,
            session_id: self.session_id,
            outcome,
            fingerprint_data: self.fingerprint_data,
            api_response: self.api_response,
            created_at: parse_db_timestamp(&self.created_at)?,
        })
    }
}

pub fn insert_scan(conn: &Connection, scan: &ScanRecord) -> Result<(), DatabaseError> {
    let prediction = scan.outcome.prediction();
    let created_at = to_db_timestamp(&scan.created_at);
    conn.execute(
        "INSERT INTO scan_results (id, patient_id, session_id, status, blood_group, confidence,
         scan_duration, error_message, fingerprint_data, api_response, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            scan.id.to_string(),
            scan.patient_id.to_string(),
            scan.session_id,
            scan.status().as_str(),
            prediction.map(|p| p.blood_group.as_str()),
            prediction.map(|p| p.confidence),
            prediction.map(|p| p.scan_duration),
            scan.outcome.error_message(),
            scan.fingerprint_data,
            scan.api_response,
            created_at,
        ],
    )
    .map_err(DatabaseError::from)
    .map_err(|e| {
        if e.is_unique_violation() {
            DatabaseError::Duplicate { field: "session_id" }
        } else {
            e
        }
    })?;
    Ok(())
}

pub fn get_scan(conn: &Connection, id: &Uuid) -> Result<Option<ScanRecord>, DatabaseError> {
    let sql = format!("SELECT {SCAN_COLUMNS} FROM scan_results s WHERE s.id = ?1");
    conn.query_row(&sql, params![id.to_string()], read_scan_row)
        .optional()?
        .map(ScanRow::into_record)
        .transpose()
}

pub fn get_scan_by_session(
    conn: &Connection,
    session_id: &str,
) -> Result<Option<ScanRecord>, DatabaseError> {
    let sql = format!("SELECT {SCAN_COLUMNS} FROM scan_results s WHERE s.session_id = ?1");
    conn.query_row(&sql, params![session_id], read_scan_row)
        .optional()?
        .map(ScanRow::into_record)
        .transpose()
}

/// Most recent scan for a patient created at or after `since`.
pub fn get_latest_scan_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
    since: &DateTime<Utc>,
) -> Result<Option<ScanRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {SCAN_COLUMNS} FROM scan_results s
         WHERE s.patient_id = ?1 AND s.created_at >= ?2
         ORDER BY s.created_at DESC LIMIT 1"
    );
    conn.query_row(
        &sql,
        params![patient_id.to_string(), to_db_timestamp(since)],
        read_scan_row,
    )
    .optional()?
    .map(ScanRow::into_record)
    .transpose()
}

/// Move a `processing` scan to a terminal outcome.
///
/// The update only matches while the row is still `processing`, so
/// concurrent writers of the same transition apply it exactly once.
/// Returns `true` when this call performed the transition.
pub fn apply_terminal_outcome(
    conn: &Connection,
    id: &Uuid,
    outcome: &ScanOutcome,
    api_response: Option<&str>,
) -> Result<bool, DatabaseError> {
    let now = to_db_timestamp(&Utc::now());
    let changed = match outcome {
        ScanOutcome::Processing => {
            return Err(DatabaseError::ConstraintViolation(
                "processing is not a terminal outcome".into(),
            ))
        }
        ScanOutcome::Completed(prediction) => conn.execute(
            "UPDATE scan_results
             SET status = 'completed', blood_group = ?2, confidence = ?3, scan_duration = ?4,
                 api_response = ?5, updated_at = ?6
             WHERE id = ?1 AND status = 'processing'",
            params![
                id.to_string(),
                prediction.blood_group.as_str(),
                prediction.confidence,
                prediction.scan_duration,
                api_response,
                now,
            ],
        )?,
        ScanOutcome::Failed { error_message } => conn.execute(
            "UPDATE scan_results
             SET status = 'failed', error_message = ?2, api_response = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'processing'",
            params![id.to_string(), error_message, api_response, now],
        )?,
    };
    Ok(changed == 1)
}

/// A scan row joined with its patient's display identity.
#[derive(Debug, Clone)]
pub struct ScanWithPatient {
    pub scan: ScanRecord,
    pub patient: PatientIdentity,
}

/// Page through scans, newest first, optionally for one patient.
///
/// Returns the page and the total number of matching scans.
pub fn list_scans(
    conn: &Connection,
    patient_id: Option<&Uuid>,
    limit: u32,
    offset: u32,
) -> Result<(Vec<ScanWithPatient>, i64), DatabaseError> {
    let patient_filter = patient_id.map(|id| id.to_string());

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM scan_results WHERE (?1 IS NULL OR patient_id = ?1)",
        params![patient_filter],
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {SCAN_COLUMNS}, p.first_name, p.last_name, p.email
         FROM scan_results s JOIN patients p ON p.id = s.patient_id
         WHERE (?1 IS NULL OR s.patient_id = ?1)
         ORDER BY s.created_at DESC LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![patient_filter, limit, offset], |row| {
            let scan = read_scan_row(row)?;
            let first: String = row.get(11)?;
            let last: String = row.get(12)?;
            let email: String = row.get(13)?;
            Ok((scan, format!("{first} {last}"), email))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut scans = Vec::with_capacity(rows.len());
    for (row, name, email) in rows {
        scans.push(ScanWithPatient {
            scan: row.into_record()?,
            patient: PatientIdentity { name, email },
        });
    }
    Ok((scans, total))
}
