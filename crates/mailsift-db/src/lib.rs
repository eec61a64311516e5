//! # MailSift DB
//!
//! SQLite persistence for user records. One file, WAL journal, schema
//! migrated on open. Implements [`mailsift_core::traits::UserStore`].

mod users;

pub use users::UserDb;
