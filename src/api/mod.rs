//! HTTP API.
//!
//! Routes are nested under `/api/`. Every response is JSON: successes use
//! the `{ success, data, pagination? }` envelope, failures the
//! `{ error: { code, message } }` body.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server_on, ApiServer, ServerError};
pub use types::ApiContext;
