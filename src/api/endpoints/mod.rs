//! API endpoint handlers.
//!
//! Handlers are thin: they extract input, call the operation modules and
//! wrap the result in the response envelope.

pub mod health;
pub mod patients;
pub mod predictions;
pub mod status;
