//! Error type shared across all MailSift crates.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MailSiftError>;

/// Every failure MailSift can report.
#[derive(Debug, Error)]
pub enum MailSiftError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("No tags configured")]
    NoTagsConfigured,

    #[error("User {0} already has a task scheduled")]
    AlreadyScheduled(String),

    #[error("No task with interval {0}")]
    NoSuchGroup(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Folder error: {0}")]
    Folder(String),

    #[error("No emails found")]
    NoMessages,

    #[error("No emails found with tags: {0:?}")]
    NoMatchingMessages(Vec<String>),

    #[error("No summary: matching emails have no text")]
    EmptyBody,

    #[error("Security error: {0}")]
    Security(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// How a failure should be handled by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input or settings. Reported to the caller, never retried.
    Config,
    /// Mailbox unreachable or credentials rejected. Retried on the next tick.
    Transient,
    /// Nothing to summarize. Not a failure.
    Informational,
    /// Persistence failed. Logged.
    Storage,
    /// Outbound notification failed. Logged.
    Delivery,
    /// Anything else.
    Internal,
}

impl MailSiftError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_)
            | Self::InvalidInterval(_)
            | Self::NoTagsConfigured
            | Self::AlreadyScheduled(_)
            | Self::NoSuchGroup(_)
            | Self::NotFound(_) => ErrorClass::Config,
            Self::Auth(_) | Self::Connection(_) | Self::Folder(_) => ErrorClass::Transient,
            Self::NoMessages | Self::NoMatchingMessages(_) => ErrorClass::Informational,
            Self::Storage(_) => ErrorClass::Storage,
            Self::Delivery(_) => ErrorClass::Delivery,
            Self::EmptyBody
            | Self::Security(_)
            | Self::Render(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ErrorClass::Internal,
        }
    }

    /// True when the outcome means "nothing new to summarize".
    pub fn is_informational(&self) -> bool {
        self.class() == ErrorClass::Informational
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(MailSiftError::NoMessages.is_informational());
        assert!(MailSiftError::NoMatchingMessages(vec!["invoice".into()]).is_informational());
        assert_eq!(MailSiftError::Auth("bad".into()).class(), ErrorClass::Transient);
        assert_eq!(MailSiftError::NoTagsConfigured.class(), ErrorClass::Config);
        assert_eq!(MailSiftError::Storage("locked".into()).class(), ErrorClass::Storage);
        assert!(!MailSiftError::EmptyBody.is_informational());
    }

    #[test]
    fn test_display() {
        let err = MailSiftError::NoSuchGroup("30".into());
        assert_eq!(err.to_string(), "No task with interval 30");
    }
}
