use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{parse_db_date, parse_db_timestamp, parse_db_uuid, to_db_timestamp, DatabaseError};
use crate::models::*;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, first_name, last_name, email, phone, date_of_birth, gender,
         address, emergency_contact, emergency_phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            patient.id.to_string(),
            patient.first_name,
            patient.last_name,
            patient.email,
            patient.phone,
            patient.date_of_birth.format("%Y-%m-%d").to_string(),
            patient.gender.as_str(),
            patient.address,
            patient.emergency_contact,
            patient.emergency_phone,
            to_db_timestamp(&patient.created_at),
        ],
    )
    .map_err(DatabaseError::from)
    .map_err(|e| {
        if e.is_unique_violation() {
            DatabaseError::Duplicate { field: "email" }
        } else {
            e
        }
    })?;
    Ok(())
}

type PatientRow = (
    String, String, String, String, String, String, String,
    Option<String>, Option<String>, Option<String>, String,
);

fn read_patient_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    let (
        id, first_name, last_name, email, phone, date_of_birth, gender,
        address, emergency_contact, emergency_phone, created_at,
    ) = row;
    Ok(Patient {
        id: parse_db_uuid(&id)?,
        first_name,
        last_name,
        email,
        phone,
        date_of_birth: parse_db_date(&date_of_birth)?,
        gender: Gender::from_str(&gender)?,
        address,
        emergency_contact,
        emergency_phone,
        created_at: parse_db_timestamp(&created_at)?,
    })
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        "SELECT id, first_name, last_name, email, phone, date_of_birth, gender,
         address, emergency_contact, emergency_phone, created_at
         FROM patients WHERE id = ?1",
        params![id.to_string()],
        read_patient_row,
    )
    .optional()?
    .map(patient_from_row)
    .transpose()
}

pub fn find_patient_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        "SELECT id, first_name, last_name, email, phone, date_of_birth, gender,
         address, emergency_contact, emergency_phone, created_at
         FROM patients WHERE email = ?1",
        params![email],
        read_patient_row,
    )
    .optional()?
    .map(patient_from_row)
    .transpose()
}

/// Name and email of a patient, for display alongside scans.
pub fn get_patient_identity(
    conn: &Connection,
    id: &Uuid,
) -> Result<PatientIdentity, DatabaseError> {
    conn.query_row(
        "SELECT first_name, last_name, email FROM patients WHERE id = ?1",
        params![id.to_string()],
        |row| {
            let first: String = row.get(0)?;
            let last: String = row.get(1)?;
            Ok(PatientIdentity {
                name: format!("{first} {last}"),
                email: row.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| DatabaseError::NotFound {
        entity_type: "patient".into(),
        id: id.to_string(),
    })
}

pub fn count_patients(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?)
}

/// Page through patients, newest first.
///
/// `search` matches first name, last name or email, case-insensitively.
/// Returns the page and the total number of matching patients.
pub fn list_patients(
    conn: &Connection,
    search: Option<&str>,
    limit: u32,
    offset: u32,
) -> Result<(Vec<PatientSummary>, i64), DatabaseError> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)));

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patients p
         WHERE ?1 IS NULL
            OR p.first_name LIKE ?1 ESCAPE '\\'
            OR p.last_name LIKE ?1 ESCAPE '\\'
            OR p.email LIKE ?1 ESCAPE '\\'",
        params![pattern],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT p.id, p.first_name, p.last_name, p.email, p.phone, p.date_of_birth, p.gender,
         p.created_at,
         (SELECT COUNT(*) FROM scan_results s WHERE s.patient_id = p.id) AS scan_count
         FROM patients p
         WHERE ?1 IS NULL
            OR p.first_name LIKE ?1 ESCAPE '\\'
            OR p.last_name LIKE ?1 ESCAPE '\\'
            OR p.email LIKE ?1 ESCAPE '\\'
         ORDER BY p.created_at DESC LIMIT ?2 OFFSET ?3",
    )?;

    let rows = stmt
        .query_map(params![pattern, limit, offset], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, i64>(8)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut patients = Vec::with_capacity(rows.len());
    for (id, first, last, email, phone, dob, gender, created_at, scan_count) in rows {
        patients.push(PatientSummary {
            id: parse_db_uuid(&id)?,
            name: format!("{first} {last}"),
            email,
            phone,
            date_of_birth: parse_db_date(&dob)?,
            gender: Gender::from_str(&gender)?,
            scan_count,
            created_at: parse_db_timestamp(&created_at)?,
        });
    }
    Ok((patients, total))
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
