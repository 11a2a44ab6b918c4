use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::{parse_db_timestamp, to_db_timestamp, DatabaseError};
use crate::models::*;

/// Append an entry to the system log.
pub fn insert_system_log(
    conn: &Connection,
    action: &str,
    details: &str,
    level: LogLevel,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO system_logs (action, details, level, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![action, details, level.as_str(), to_db_timestamp(&Utc::now())],
    )?;
    Ok(())
}

/// Error entries created at or after `since`, newest first.
pub fn recent_errors(
    conn: &Connection,
    since: &DateTime<Utc>,
    limit: u32,
) -> Result<Vec<SystemLog>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, action, details, level, created_at FROM system_logs
         WHERE level = 'error' AND created_at >= ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![to_db_timestamp(since), limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, action, details, level, created_at)| {
            Ok(SystemLog {
                id,
                action,
                details,
                level: LogLevel::from_str(&level)?,
                created_at: parse_db_timestamp(&created_at)?,
            })
        })
        .collect()
}

/// Count entries with the given action, regardless of age.
#[cfg(test)]
pub fn count_logs_with_action(conn: &Connection, action: &str) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM system_logs WHERE action = ?1",
        params![action],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::test_db;

    fn backdate_all(conn: &Connection, hours: i64) {
        let ts = to_db_timestamp(&(Utc::now() - chrono::Duration::hours(hours)));
        conn.execute("UPDATE system_logs SET created_at = ?1", params![ts])
            .unwrap();
    }

    #[test]
    fn recent_errors_filters_level_and_caps() {
        let conn = test_db();
        insert_system_log(&conn, "Patient registered", "ok", LogLevel::Info).unwrap();
        for i in 0..7 {
            insert_system_log(
                &conn,
                "Blood group prediction failed",
                &format!("#{i}"),
                LogLevel::Error,
            )
            .unwrap();
        }

        let since = Utc::now() - chrono::Duration::hours(24);
        let errors = recent_errors(&conn, &since, 5).unwrap();
        assert_eq!(errors.len(), 5);
        assert!(errors.iter().all(|e| e.level == LogLevel::Error));
        // Newest first
        assert_eq!(errors[0].details, "#6");
    }

    #[test]
    fn recent_errors_excludes_old_entries() {
        let conn = test_db();
        insert_system_log(&conn, "Blood group prediction failed", "old", LogLevel::Error).unwrap();
        backdate_all(&conn, 25);

        let since = Utc::now() - chrono::Duration::hours(24);
        assert!(recent_errors(&conn, &since, 5).unwrap().is_empty());
    }

    #[test]
    fn counts_by_action() {
        let conn = test_db();
        insert_system_log(&conn, "Patient registered", "a", LogLevel::Info).unwrap();
        insert_system_log(&conn, "Patient registered", "b", LogLevel::Info).unwrap();
        assert_eq!(count_logs_with_action(&conn, "Patient registered").unwrap(), 2);
        assert_eq!(count_logs_with_action(&conn, "other").unwrap(), 0);
    }
}
