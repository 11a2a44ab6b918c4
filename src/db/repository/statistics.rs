use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::{to_db_timestamp, DatabaseError};
use crate::models::*;

pub fn count_scans(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM scan_results", [], |row| row.get(0))?)
}

pub fn count_scans_since(conn: &Connection, since: &DateTime<Utc>) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM scan_results WHERE created_at >= ?1",
        params![to_db_timestamp(since)],
        |row| row.get(0),
    )?)
}

pub fn count_scans_with_status(
    conn: &Connection,
    status: ScanStatus,
) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM scan_results WHERE status = ?1",
        params![status.as_str()],
        |row| row.get(0),
    )?)
}

/// Completed scans per blood group, in canonical blood-group order.
///
/// Groups with no completed scans are omitted.
pub fn completed_blood_group_counts(
    conn: &Connection,
) -> Result<Vec<(BloodGroup, i64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT blood_group, COUNT(*) FROM scan_results
         WHERE status = 'completed' AND blood_group IS NOT NULL
         GROUP BY blood_group",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut counts = rows
        .into_iter()
        .map(|(group, count)| Ok((BloodGroup::from_str(&group)?, count)))
        .collect::<Result<Vec<_>, DatabaseError>>()?;
    counts.sort_by_key(|(group, _)| BloodGroup::ALL.iter().position(|g| g == group));
    Ok(counts)
}
