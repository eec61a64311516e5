//! Domain types: users, scheduling intervals, mailbox messages, reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::MailSiftError;

/// Update period of a user's digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Interval {
    /// Not scheduled.
    #[default]
    Disabled,
    /// Every N minutes.
    Minutes(NonZeroU32),
}

impl Interval {
    pub fn minutes(n: u32) -> Self {
        NonZeroU32::new(n).map_or(Self::Disabled, Self::Minutes)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Minutes(_))
    }

    /// Minute count, `None` when disabled.
    pub fn as_minutes(&self) -> Option<u32> {
        match self {
            Self::Disabled => None,
            Self::Minutes(n) => Some(n.get()),
        }
    }
}

impl FromStr for Interval {
    type Err = MailSiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "0" || s.eq_ignore_ascii_case("disabled") {
            return Ok(Self::Disabled);
        }
        s.parse::<u32>()
            .map(Self::minutes)
            .map_err(|_| MailSiftError::InvalidInterval(s.to_string()))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "0"),
            Self::Minutes(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for Interval {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// User record as held by the user store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Mailbox login.
    pub email: String,
    /// Where digests are delivered.
    pub receiving_email: String,
    /// Encrypted mailbox password (base64, IV-prefixed).
    pub password: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub folder: String,
    pub tags: Vec<String>,
    pub blacklist_senders: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    /// Maximum sentences in a summary.
    pub summary_count: u32,
    /// Serialized tag → last processed mailbox id.
    pub last_watermark: String,
    pub update_interval: Interval,
    pub created_at: String,
}

impl User {
    /// A fresh record with the defaults new accounts start with.
    pub fn new(id: &str, name: &str, email: &str, receiving_email: &str, password: &str, imap_host: &str, imap_port: u16) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            receiving_email: receiving_email.to_string(),
            password: password.to_string(),
            imap_host: imap_host.to_string(),
            imap_port,
            folder: "INBOX".into(),
            tags: Vec::new(),
            blacklist_senders: Vec::new(),
            start_time: None,
            summary_count: 5,
            last_watermark: String::new(),
            update_interval: Interval::Disabled,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Copy with secrets and sync state removed, for API responses.
    pub fn redacted(&self) -> Self {
        Self {
            password: String::new(),
            last_watermark: String::new(),
            ..self.clone()
        }
    }
}

/// Partial update of a user record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub receiving_email: Option<String>,
    pub password: Option<String>,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub folder: Option<String>,
    pub tags: Option<Vec<String>>,
    pub blacklist_senders: Option<Vec<String>>,
    /// `Some(None)` clears the start time.
    pub start_time: Option<Option<DateTime<Utc>>>,
    pub summary_count: Option<u32>,
    pub last_watermark: Option<String>,
    pub update_interval: Option<Interval>,
}

impl UserPatch {
    pub fn interval(interval: Interval) -> Self {
        Self {
            update_interval: Some(interval),
            ..Self::default()
        }
    }

    pub fn watermark(serialized: String) -> Self {
        Self {
            last_watermark: Some(serialized),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.receiving_email.is_none()
            && self.password.is_none()
            && self.imap_host.is_none()
            && self.imap_port.is_none()
            && self.folder.is_none()
            && self.tags.is_none()
            && self.blacklist_senders.is_none()
            && self.start_time.is_none()
            && self.summary_count.is_none()
            && self.last_watermark.is_none()
            && self.update_interval.is_none()
    }

    /// Apply this patch to an in-memory record.
    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.name { user.name = v; }
        if let Some(v) = self.email { user.email = v; }
        if let Some(v) = self.receiving_email { user.receiving_email = v; }
        if let Some(v) = self.password { user.password = v; }
        if let Some(v) = self.imap_host { user.imap_host = v; }
        if let Some(v) = self.imap_port { user.imap_port = v; }
        if let Some(v) = self.folder { user.folder = v; }
        if let Some(v) = self.tags { user.tags = v; }
        if let Some(v) = self.blacklist_senders { user.blacklist_senders = v; }
        if let Some(v) = self.start_time { user.start_time = v; }
        if let Some(v) = self.summary_count { user.summary_count = v; }
        if let Some(v) = self.last_watermark { user.last_watermark = v; }
        if let Some(v) = self.update_interval { user.update_interval = v; }
    }
}

/// Plaintext login for a mailbox session.
#[derive(Debug, Clone)]
pub struct MailboxCredentials {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

/// One message as fetched from a mailbox.
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Mailbox sequence identifier (IMAP UID).
    pub id: u32,
    pub subject: String,
    /// Sender address.
    pub sender: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub text_body: String,
}

/// What gets mailed to a user after a pipeline run.
#[derive(Debug, Clone)]
pub struct Report {
    pub recipient: String,
    pub name: String,
    pub tags: Vec<String>,
    pub summary: String,
    pub artifact: Option<PathBuf>,
    /// Informational or error text. Empty on success.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_parse() {
        assert_eq!("".parse::<Interval>().unwrap(), Interval::Disabled);
        assert_eq!("0".parse::<Interval>().unwrap(), Interval::Disabled);
        assert_eq!("disabled".parse::<Interval>().unwrap(), Interval::Disabled);
        assert_eq!("30".parse::<Interval>().unwrap(), Interval::minutes(30));
        assert!(matches!("-5".parse::<Interval>(), Err(MailSiftError::InvalidInterval(_))));
        assert!(matches!("hourly".parse::<Interval>(), Err(MailSiftError::InvalidInterval(_))));
    }

    #[test]
    fn test_interval_display_roundtrip() {
        assert_eq!(Interval::minutes(60).to_string(), "60");
        assert_eq!(Interval::Disabled.to_string(), "0");
        let json = serde_json::to_string(&Interval::minutes(15)).unwrap();
        assert_eq!(json, "\"15\"");
    }

    #[test]
    fn test_patch_apply() {
        let mut user = User::new("u1", "Ann", "ann@x.io", "ann@y.io", "enc", "imap.x.io", 993);
        let patch = UserPatch {
            tags: Some(vec!["invoice".into()]),
            start_time: Some(None),
            ..UserPatch::default()
        };
        assert!(!patch.is_empty());
        patch.apply(&mut user);
        assert_eq!(user.tags, vec!["invoice".to_string()]);
        assert_eq!(user.folder, "INBOX");
        assert!(UserPatch::default().is_empty());
    }

    #[test]
    fn test_redacted() {
        let mut user = User::new("u1", "Ann", "ann@x.io", "ann@y.io", "secret", "imap.x.io", 993);
        user.last_watermark = "{\"a\":3}".into();
        let r = user.redacted();
        assert!(r.password.is_empty());
        assert!(r.last_watermark.is_empty());
        assert_eq!(r.email, "ann@x.io");
    }
}
