//! Error taxonomy shared by every operation.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Prediction service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal failure: {0}")]
    Internal(String),
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ServiceError::NotFound(format!("{entity_type} {id}"))
            }
            DatabaseError::Duplicate { field } => {
                ServiceError::Conflict(format!("duplicate {field}"))
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }
}
