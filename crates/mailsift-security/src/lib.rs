//! # MailSift Security
//!
//! Encryption of stored mailbox passwords.

pub mod cipher;

pub use cipher::AesCredentialCipher;
