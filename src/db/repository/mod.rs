//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a borrowed `Connection`; callers decide how
//! long a connection lives.

mod patient;
mod scan;
mod statistics;
mod system_log;

pub use patient::*;
pub use scan::*;
pub use statistics::*;
pub use system_log::*;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{NaiveDate, Utc};
    use rusqlite::Connection;
    use uuid::Uuid;

    use crate::db::sqlite::{open_memory_database, Database};
    use crate::models::*;

    pub fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    /// On-disk database in a fresh temp dir, for code that opens its own
    /// connections. Keep the `TempDir` alive for the test's duration.
    pub fn temp_database() -> (Database, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let db = Database::open(tmp.path().join("bloodscan.db")).unwrap();
        (db, tmp)
    }

    /// Insert a patient whose first name is derived from the email's
    /// local part ("ana@..." becomes "Ana Lima").
    pub fn make_patient(conn: &Connection, email: &str) -> Patient {
        let local = email.split('@').next().unwrap_or("patient");
        let mut chars = local.chars();
        let first_name = match chars.next() {
            Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
            None => "Patient".to_string(),
        };
        let patient = Patient {
            id: Uuid::new_v4(),
            first_name,
            last_name: "Lima".into(),
            email: email.into(),
            phone: "+1 555 0100".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 12).unwrap(),
            gender: Gender::Female,
            address: None,
            emergency_contact: None,
            emergency_phone: None,
            created_at: Utc::now(),
        };
        super::insert_patient(conn, &patient).unwrap();
        patient
    }
}
