//! Collaborator contracts consumed by the scheduler and sync pipeline.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;
use crate::types::{MailMessage, MailboxCredentials, Report, User, UserPatch};

/// Ranked keywords, heaviest first.
pub type KeywordWeights = Vec<(String, f64)>;

/// Opens authenticated mailbox sessions.
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// Log in. Fails with `Auth` or `Connection`.
    async fn open(&self, credentials: &MailboxCredentials) -> Result<Box<dyn MailboxSession>>;
}

/// A live, logged-in mailbox connection.
#[async_trait]
pub trait MailboxSession: Send {
    async fn list_folders(&mut self) -> Result<Vec<String>>;

    /// Fails with `Folder` if the folder cannot be selected.
    async fn select_folder(&mut self, name: &str) -> Result<()>;

    /// Highest identifier in the selected folder, 0 when empty.
    async fn highest_identifier(&mut self) -> Result<u32>;

    /// Messages with id >= `from_id`, ascending.
    async fn fetch(&mut self, from_id: u32) -> Result<Vec<MailMessage>>;

    async fn close(self: Box<Self>);
}

/// Symmetric encryption for stored mailbox passwords.
pub trait CredentialCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// Extractive summarization and keyword ranking.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str, max_sentences: usize) -> String;
    fn extract_keywords(&self, text: &str) -> KeywordWeights;
}

/// Turns keyword weights into an image on disk.
pub trait Renderer: Send + Sync {
    fn render(&self, keywords: &KeywordWeights) -> Result<PathBuf>;
}

/// Persistent user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &User) -> Result<()>;
    /// Fails with `NotFound`.
    async fn read(&self, id: &str) -> Result<User>;
    async fn update(&self, id: &str, patch: UserPatch) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list_all(&self) -> Result<Vec<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Outbound delivery of digests.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Fails with `Delivery`.
    async fn send(&self, report: &Report) -> Result<()>;
}
