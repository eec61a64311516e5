//! In-memory collaborators for scheduler and pipeline tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailsift_core::error::{MailSiftError, Result};
use mailsift_core::traits::{CredentialCipher, MailboxClient, MailboxSession, Notifier, UserStore};
use mailsift_core::types::{MailMessage, MailboxCredentials, Report, User, UserPatch};
use mailsift_digest::{SvgWordCloud, TextDigest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::pipeline::SyncPipeline;

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
    pub fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn with(users: Vec<User>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut map = store.users.lock().unwrap();
            for u in users {
                map.insert(u.id.clone(), u);
            }
        }
        Arc::new(store)
    }

    pub fn get(&self, id: &str) -> User {
        self.users.lock().unwrap()[id].clone()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: &User) -> Result<()> {
        self.users.lock().unwrap().insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<User> {
        self.users
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| MailSiftError::NotFound(format!("user {id}")))
    }

    async fn update(&self, id: &str, patch: UserPatch) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(MailSiftError::Storage("disk full".into()));
        }
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(id)
            .ok_or_else(|| MailSiftError::NotFound(format!("user {id}")))?;
        patch.apply(user);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.users.lock().unwrap().remove(id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        let mut all: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().values().find(|u| u.email == email).cloned())
    }
}

#[derive(Default)]
pub struct MailboxState {
    pub messages: Vec<MailMessage>,
    pub fetch_calls: Vec<u32>,
    pub opened: usize,
    pub closed: usize,
    pub reject_login: bool,
}

/// Mailbox whose contents tests mutate between runs.
#[derive(Clone, Default)]
pub struct FakeMailbox {
    pub state: Arc<Mutex<MailboxState>>,
}

impl FakeMailbox {
    pub fn with(messages: Vec<MailMessage>) -> Self {
        let mailbox = Self::default();
        mailbox.state.lock().unwrap().messages = messages;
        mailbox
    }

    pub fn push(&self, message: MailMessage) {
        self.state.lock().unwrap().messages.push(message);
    }
}

#[async_trait]
impl MailboxClient for FakeMailbox {
    async fn open(&self, credentials: &MailboxCredentials) -> Result<Box<dyn MailboxSession>> {
        let mut state = self.state.lock().unwrap();
        if state.reject_login || credentials.password != "secret" {
            return Err(MailSiftError::Auth("invalid credentials".into()));
        }
        state.opened += 1;
        Ok(Box::new(FakeSession { state: self.state.clone() }))
    }
}

struct FakeSession {
    state: Arc<Mutex<MailboxState>>,
}

#[async_trait]
impl MailboxSession for FakeSession {
    async fn list_folders(&mut self) -> Result<Vec<String>> {
        Ok(vec!["INBOX".into(), "Archive".into()])
    }

    async fn select_folder(&mut self, name: &str) -> Result<()> {
        if name == "INBOX" || name == "Archive" {
            Ok(())
        } else {
            Err(MailSiftError::Folder(format!("no folder {name}")))
        }
    }

    async fn highest_identifier(&mut self) -> Result<u32> {
        Ok(self.state.lock().unwrap().messages.iter().map(|m| m.id).max().unwrap_or(0))
    }

    async fn fetch(&mut self, from_id: u32) -> Result<Vec<MailMessage>> {
        // Give concurrent runs a chance to interleave.
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.fetch_calls.push(from_id);
        let mut out: Vec<MailMessage> = state.messages.iter().filter(|m| m.id >= from_id).cloned().collect();
        out.sort_by_key(|m| m.id);
        Ok(out)
    }

    async fn close(self: Box<Self>) {
        self.state.lock().unwrap().closed += 1;
    }
}

/// "Decrypts" by stripping an `enc:` prefix.
pub struct PlainCipher;

impl CredentialCipher for PlainCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(format!("enc:{plaintext}"))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        ciphertext
            .strip_prefix("enc:")
            .map(str::to_string)
            .ok_or_else(|| MailSiftError::Security("bad ciphertext".into()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Report>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, report: &Report) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailSiftError::Delivery("smtp down".into()));
        }
        self.sent.lock().unwrap().push(report.clone());
        Ok(())
    }
}

pub fn message(id: u32, subject: &str, sender: &str, body: &str) -> MailMessage {
    MailMessage {
        id,
        subject: subject.into(),
        sender: sender.into(),
        sent_at: DateTime::<Utc>::from_timestamp(1_750_000_000 + i64::from(id) * 60, 0),
        text_body: body.into(),
    }
}

pub fn user(id: &str, tags: &[&str]) -> User {
    let mut u = User::new(id, "Ann", &format!("{id}@x.io"), &format!("{id}@y.io"), "enc:secret", "imap.x.io", 993);
    u.tags = tags.iter().map(|t| t.to_string()).collect();
    u
}

pub fn pipeline(store: Arc<MemoryStore>, mailbox: FakeMailbox) -> SyncPipeline {
    let clouds = std::env::temp_dir().join("mailsift-test-scheduler-clouds");
    SyncPipeline::new(
        store,
        Arc::new(mailbox),
        Arc::new(PlainCipher),
        Arc::new(TextDigest::default()),
        Arc::new(SvgWordCloud::new(&clouds, 400, 300)),
    )
}
