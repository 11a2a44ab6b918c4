//! Patient registration and listing.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use rusqlite::TransactionBehavior;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, Database, DatabaseError};
use crate::error::ServiceError;
use crate::models::*;

pub const ACTION_PATIENT_REGISTERED: &str = "Patient registered";

/// Registration input, as submitted by clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    pub gender: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub emergency_phone: Option<String>,
}

fn is_valid_email(candidate: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"))
        .is_match(candidate)
}

fn required(value: &str, label: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidRequest(format!("{label} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl NewPatient {
    fn validate(self) -> Result<Patient, ServiceError> {
        let first_name = required(&self.first_name, "First name")?;
        let last_name = required(&self.last_name, "Last name")?;
        let phone = required(&self.phone, "Phone number")?;

        let email = self.email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(ServiceError::InvalidRequest("Invalid email address".into()));
        }

        let date_of_birth = NaiveDate::parse_from_str(self.date_of_birth.trim(), "%Y-%m-%d")
            .map_err(|_| {
                ServiceError::InvalidRequest("Date of birth must be formatted YYYY-MM-DD".into())
            })?;

        let gender = Gender::from_str(self.gender.trim()).map_err(|_| {
            ServiceError::InvalidRequest("Gender must be one of male, female, other".into())
        })?;

        Ok(Patient {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            email,
            phone,
            date_of_birth,
            gender,
            address: optional(self.address),
            emergency_contact: optional(self.emergency_contact),
            emergency_phone: optional(self.emergency_phone),
            created_at: Utc::now(),
        })
    }
}

/// Validate and store a new patient. A duplicate email is a `Conflict`.
pub fn register_patient(db: &Database, input: NewPatient) -> Result<Patient, ServiceError> {
    let patient = input.validate()?;

    let mut conn = db.connect()?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DatabaseError::from)?;
    db::insert_patient(&tx, &patient).map_err(|e| match e {
        DatabaseError::Duplicate { .. } => {
            ServiceError::Conflict("A patient with this email already exists".into())
        }
        other => other.into(),
    })?;
    db::insert_system_log(
        &tx,
        ACTION_PATIENT_REGISTERED,
        &format!("New patient: {} ({})", patient.display_name(), patient.email),
        LogLevel::Info,
    )?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(patient_id = %patient.id, "Patient registered");
    Ok(patient)
}

/// One page of patients, newest first, with optional name/email search.
pub fn list_patients(
    db: &Database,
    search: Option<&str>,
    page: PageRequest,
) -> Result<Page<PatientSummary>, ServiceError> {
    let conn = db.connect()?;
    let (items, total) = db::list_patients(&conn, search, page.limit, page.offset)?;
    Ok(Page {
        items,
        pagination: Pagination::new(page, total),
    })
}
