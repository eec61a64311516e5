//! # MailSift Gateway
//!
//! axum HTTP API mounted under `/api/v1`: user management, schedule
//! mutations, on-demand digests and a task-list diagnostic.

pub mod error;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, build_router, start};
