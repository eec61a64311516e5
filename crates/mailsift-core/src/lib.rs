//! # MailSift Core
//!
//! Shared vocabulary for every MailSift crate: the error type, the TOML
//! configuration, the user record with its scheduling and watermark fields,
//! and the collaborator traits the scheduler drives (mailbox, credentials,
//! summarizer, renderer, user store, notifier).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::MailSiftConfig;
pub use error::{ErrorClass, MailSiftError, Result};
pub use types::{Interval, MailMessage, MailboxCredentials, Report, User, UserPatch};
