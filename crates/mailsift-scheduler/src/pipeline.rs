//! Incremental sync: one run of fetch → filter → summarize → render for a user.
//!
//! The watermark is advanced and persisted before filtering, so a message is
//! considered at most once per tag even when nothing matches. Runs for the
//! same user are serialized, and each one reads the user record afresh once
//! it holds that user's lock.

use mailsift_core::error::{MailSiftError, Result};
use mailsift_core::traits::{CredentialCipher, MailboxClient, MailboxSession, Renderer, Summarizer, UserStore};
use mailsift_core::types::{MailMessage, MailboxCredentials, User, UserPatch};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::watermark::{Thresholds, Watermark};

/// Separator between message bodies in the summarized corpus.
const BODY_DELIMITER: &str = ". ";

/// Successful run output.
#[derive(Debug, Clone)]
pub struct Digest {
    pub summary: String,
    pub artifact: PathBuf,
    /// Messages that passed the filters.
    pub matched: usize,
    /// Highest id fetched this run.
    pub watermark: u32,
}

/// Runs the sync for a single user against its collaborators.
pub struct SyncPipeline {
    store: Arc<dyn UserStore>,
    mailbox: Arc<dyn MailboxClient>,
    cipher: Arc<dyn CredentialCipher>,
    summarizer: Arc<dyn Summarizer>,
    renderer: Arc<dyn Renderer>,
    /// One async lock per user with a run in flight or queued.
    running: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncPipeline {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailbox: Arc<dyn MailboxClient>,
        cipher: Arc<dyn CredentialCipher>,
        summarizer: Arc<dyn Summarizer>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            store,
            mailbox,
            cipher,
            summarizer,
            renderer,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Run once for `user_id`, after any run already in flight for the same
    /// user. The mailbox session is closed whatever the outcome.
    pub async fn run(&self, user_id: &str) -> Result<Digest> {
        let gate = self.gate(user_id);
        let outcome = {
            let _held = gate.lock().await;
            self.run_exclusive(user_id).await
        };
        self.release(user_id, gate);
        outcome
    }

    async fn run_exclusive(&self, user_id: &str) -> Result<Digest> {
        let user = self.store.read(user_id).await?;
        if user.tags.is_empty() {
            return Err(MailSiftError::NoTagsConfigured);
        }

        let mut session = self.open(&user).await?;
        let outcome = self.sync(session.as_mut(), &user).await;
        session.close().await;
        outcome
    }

    fn gate(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        running.entry(user_id.to_string()).or_default().clone()
    }

    /// Forget the user's lock once nobody else holds or waits on it.
    fn release(&self, user_id: &str, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        // Map entry plus ours: every other clone is taken under this lock.
        if Arc::strong_count(&gate) == 2 {
            running.remove(user_id);
        }
    }

    /// Folders visible in the user's mailbox.
    pub async fn folders(&self, user: &User) -> Result<Vec<String>> {
        let mut session = self.open(user).await?;
        let folders = session.list_folders().await;
        session.close().await;
        folders
    }

    async fn open(&self, user: &User) -> Result<Box<dyn MailboxSession>> {
        let credentials = MailboxCredentials {
            username: user.email.clone(),
            password: self.cipher.decrypt(&user.password)?,
            host: user.imap_host.clone(),
            port: user.imap_port,
        };
        self.mailbox.open(&credentials).await
    }

    async fn sync(&self, session: &mut dyn MailboxSession, user: &User) -> Result<Digest> {
        session.select_folder(&user.folder).await?;

        let mut watermark = Watermark::parse(&user.last_watermark).unwrap_or_else(|e| {
            tracing::warn!(user_id = %user.id, "⚠️ Unreadable watermark, starting over: {e}");
            Watermark::default()
        });
        let thresholds = watermark.prepare(&user.tags);
        let mut lowest = watermark.lowest_mark(&user.tags);

        let highest = session.highest_identifier().await?;
        if highest == 0 {
            return Err(MailSiftError::NoMessages);
        }
        // Mailbox was compacted or renumbered below our marks.
        if lowest > highest {
            tracing::debug!(user_id = %user.id, lowest, highest, "Clamping fetch start to mailbox end");
            lowest = highest;
        }

        let fetched = session.fetch(lowest).await?;
        let Some(newest) = fetched.iter().map(|m| m.id).max() else {
            return Err(MailSiftError::NoMessages);
        };
        if !fetched.iter().any(|m| thresholds.values().any(|&t| m.id > t)) {
            return Err(MailSiftError::NoMessages);
        }

        watermark.advance(&user.tags, newest);
        self.store
            .update(&user.id, UserPatch::watermark(watermark.serialize()?))
            .await?;
        tracing::debug!(user_id = %user.id, from = lowest, to = newest, fetched = fetched.len(), "Watermark advanced");

        let matching = filter_messages(&fetched, user, &thresholds);
        if matching.is_empty() {
            return Err(MailSiftError::NoMatchingMessages(user.tags.clone()));
        }

        let corpus = build_corpus(&matching);
        if corpus.is_empty() {
            return Err(MailSiftError::EmptyBody);
        }

        let summary = self.summarizer.summarize(&corpus, user.summary_count.max(1) as usize);
        let keywords = self.summarizer.extract_keywords(&summary);
        let renderer = self.renderer.clone();
        let artifact = tokio::task::spawn_blocking(move || renderer.render(&keywords))
            .await
            .map_err(|e| MailSiftError::Render(format!("Render task failed: {e}")))??;

        tracing::info!(user_id = %user.id, matched = matching.len(), "📝 Digest ready");
        Ok(Digest {
            summary,
            artifact,
            matched: matching.len(),
            watermark: newest,
        })
    }
}

/// Messages whose subject names a tag that has not yet seen them, from a
/// sender outside the blacklist, sent after the start time.
pub fn filter_messages<'a>(messages: &'a [MailMessage], user: &User, thresholds: &Thresholds) -> Vec<&'a MailMessage> {
    let tags: Vec<(String, u32)> = user
        .tags
        .iter()
        .map(|t| (t.to_lowercase(), thresholds.get(t).copied().unwrap_or(0)))
        .collect();
    let blacklist: Vec<String> = user.blacklist_senders.iter().map(|s| s.trim().to_lowercase()).collect();

    messages
        .iter()
        .filter(|m| {
            let subject = m.subject.to_lowercase();
            tags.iter().any(|(tag, after)| m.id > *after && subject.contains(tag.as_str()))
        })
        .filter(|m| !blacklist.contains(&m.sender.trim().to_lowercase()))
        .filter(|m| match (user.start_time, m.sent_at) {
            (None, _) => true,
            (Some(start), Some(sent)) => sent > start,
            (Some(_), None) => false,
        })
        .collect()
}

/// Join bodies in id order into one terminated corpus.
fn build_corpus(messages: &[&MailMessage]) -> String {
    let mut sorted: Vec<&MailMessage> = messages.to_vec();
    sorted.sort_by_key(|m| m.id);

    let mut corpus = sorted
        .iter()
        .map(|m| m.text_body.trim().trim_end_matches('.'))
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join(BODY_DELIMITER);
    if !corpus.is_empty() && !corpus.ends_with(['.', '!', '?']) {
        corpus.push('.');
    }
    corpus
}
