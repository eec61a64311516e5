//! Email channel: async IMAP sessions and SMTP digest delivery.
//!
//! Reads mailboxes via async-imap over native TLS and parses messages with
//! mail-parser. Sends digests via SMTP (async lettre) as an HTML mail with the
//! word cloud embedded inline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor,
    message::header::ContentType,
    message::{Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
};
use mailsift_core::config::SmtpConfig;
use mailsift_core::error::{MailSiftError, Result};
use mailsift_core::traits::{MailboxClient, MailboxSession, Notifier};
use mailsift_core::types::{MailMessage, MailboxCredentials, Report};

use crate::template;

/// Longest text body kept per message.
const MAX_BODY_CHARS: usize = 20_000;

/// Content-ID of the inline word cloud.
pub const CLOUD_CID: &str = "wordcloud";

type ImapTlsStream = tokio_native_tls::TlsStream<tokio::net::TcpStream>;

/// Create TLS-wrapped IMAP connection (async, tokio-native).
async fn connect_imap_tls(host: &str, port: u16) -> Result<async_imap::Client<ImapTlsStream>> {
    let tcp = tokio::net::TcpStream::connect((host, port))
        .await
        .map_err(|e| MailSiftError::Connection(format!("TCP connect {host}:{port}: {e}")))?;

    let connector = native_tls::TlsConnector::new()
        .map_err(|e| MailSiftError::Connection(format!("TLS connector: {e}")))?;
    let connector = tokio_native_tls::TlsConnector::from(connector);

    let tls_stream = connector
        .connect(host, tcp)
        .await
        .map_err(|e| MailSiftError::Connection(format!("TLS handshake: {e}")))?;

    Ok(async_imap::Client::new(tls_stream))
}

/// Opens IMAP sessions over implicit TLS.
#[derive(Debug, Default, Clone)]
pub struct ImapMailboxClient;

impl ImapMailboxClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailboxClient for ImapMailboxClient {
    async fn open(&self, credentials: &MailboxCredentials) -> Result<Box<dyn MailboxSession>> {
        let client = connect_imap_tls(&credentials.host, credentials.port).await?;
        let session = client
            .login(&credentials.username, &credentials.password)
            .await
            .map_err(|e| MailSiftError::Auth(format!("IMAP login: {}", e.0)))?;
        tracing::debug!("📧 IMAP session opened for {}", credentials.username);
        Ok(Box::new(ImapSession { session }))
    }
}

/// A logged-in IMAP session.
pub struct ImapSession {
    session: async_imap::Session<ImapTlsStream>,
}

#[async_trait]
impl MailboxSession for ImapSession {
    async fn list_folders(&mut self) -> Result<Vec<String>> {
        let mut names = self
            .session
            .list(Some(""), Some("*"))
            .await
            .map_err(|e| MailSiftError::Connection(format!("List: {e}")))?;

        let mut folders = Vec::new();
        while let Some(name) = names.next().await {
            let name = name.map_err(|e| MailSiftError::Connection(format!("List entry: {e}")))?;
            folders.push(name.name().to_string());
        }
        Ok(folders)
    }

    async fn select_folder(&mut self, name: &str) -> Result<()> {
        self.session
            .select(name)
            .await
            .map_err(|e| MailSiftError::Folder(format!("Select {name}: {e}")))?;
        Ok(())
    }

    async fn highest_identifier(&mut self) -> Result<u32> {
        let uids = self
            .session
            .uid_search("ALL")
            .await
            .map_err(|e| MailSiftError::Connection(format!("Search: {e}")))?;
        Ok(uids.into_iter().max().unwrap_or(0))
    }

    async fn fetch(&mut self, from_id: u32) -> Result<Vec<MailMessage>> {
        let range = format!("{}:*", from_id.max(1));
        let mut messages = self
            .session
            .uid_fetch(&range, "(UID RFC822)")
            .await
            .map_err(|e| MailSiftError::Connection(format!("Fetch: {e}")))?;

        let mut fetched = Vec::new();
        while let Some(msg_result) = messages.next().await {
            let msg = msg_result.map_err(|e| MailSiftError::Connection(format!("Fetch msg: {e}")))?;
            let Some(uid) = msg.uid else { continue };
            if let Some(body) = msg.body()
                && let Some(parsed) = parse_email_bytes(body, uid)
            {
                fetched.push(parsed);
            }
        }
        drop(messages);

        fetched.sort_by_key(|m| m.id);
        tracing::debug!("📧 Fetched {} message(s) from uid {}", fetched.len(), from_id);
        Ok(fetched)
    }

    async fn close(mut self: Box<Self>) {
        self.session.logout().await.ok();
    }
}

/// Parse raw RFC 822 bytes into a mailbox message.
fn parse_email_bytes(raw: &[u8], uid: u32) -> Option<MailMessage> {
    use mail_parser::MessageParser;
    let parsed = MessageParser::default().parse(raw)?;

    let sender = parsed
        .from()
        .and_then(|a| a.first())
        .map(|a| a.address().unwrap_or_default().to_string())
        .unwrap_or_default();

    let subject = parsed.subject().unwrap_or_default().to_string();

    let sent_at = parsed
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0));

    let text_body = parsed
        .body_text(0)
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            parsed
                .body_html(0)
                .map(|h| strip_html(&h))
                .unwrap_or_default()
        });

    Some(MailMessage {
        id: uid,
        subject,
        sender,
        sent_at,
        text_body: text_body.chars().take(MAX_BODY_CHARS).collect(),
    })
}

fn strip_html(html: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Delivers digest reports over SMTP.
pub struct SmtpNotifier {
    config: SmtpConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        // 465 is implicit TLS, everything else negotiates STARTTLS.
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| MailSiftError::Config(format!("SMTP relay: {e}")))?;

        let mailer = builder.port(config.port).credentials(creds).build();
        Ok(Self { config, mailer })
    }

    async fn build_message(&self, report: &Report) -> Result<LettreMessage> {
        let from_mailbox: Mailbox = format!("{} <{}>", self.config.from_name, self.config.username)
            .parse()
            .map_err(|e| MailSiftError::Delivery(format!("Invalid from: {e}")))?;
        let to_mailbox: Mailbox = report
            .recipient
            .parse()
            .map_err(|e| MailSiftError::Delivery(format!("Invalid to: {e}")))?;

        let cloud = match &report.artifact {
            Some(path) => Some(tokio::fs::read(path).await?),
            None => None,
        };

        let html = template::render_html(report, &self.config.from_name, cloud.is_some());
        let text = template::render_text(report, &self.config.from_name);

        let mut related = MultiPart::related().singlepart(SinglePart::html(html));
        if let Some(bytes) = cloud {
            let content_type = ContentType::parse("image/svg+xml")
                .map_err(|e| MailSiftError::Delivery(format!("Content type: {e}")))?;
            related = related.singlepart(
                Attachment::new_inline(CLOUD_CID.to_string()).body(bytes, content_type),
            );
        }

        let body = MultiPart::alternative()
            .singlepart(SinglePart::plain(text))
            .multipart(related);

        LettreMessage::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(format!("{} Summary", self.config.from_name))
            .multipart(body)
            .map_err(|e| MailSiftError::Delivery(format!("Build email: {e}")))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, report: &Report) -> Result<()> {
        let email = self.build_message(report).await?;
        self.mailer
            .send(email)
            .await
            .map_err(|e| MailSiftError::Delivery(format!("SMTP send: {e}")))?;
        tracing::info!("📤 Digest sent to: {}", report.recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &[u8] = b"From: Billing <billing@acme.io>\r\n\
To: ann@example.com\r\n\
Subject: Invoice #42 ready\r\n\
Date: Tue, 1 Jul 2025 10:00:00 +0000\r\n\
Content-Type: text/plain\r\n\
\r\n\
Your invoice total is 120 EUR.\r\n";

    #[test]
    fn test_parse_email_bytes() {
        let msg = parse_email_bytes(RAW, 7).unwrap();
        assert_eq!(msg.id, 7);
        assert_eq!(msg.sender, "billing@acme.io");
        assert_eq!(msg.subject, "Invoice #42 ready");
        assert!(msg.text_body.contains("120 EUR"));
        assert_eq!(msg.sent_at.unwrap().to_rfc3339(), "2025-07-01T10:00:00+00:00");
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
    }

    fn notifier() -> SmtpNotifier {
        SmtpNotifier::new(SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "digest@example.com".into(),
            password: "pw".into(),
            from_name: "MailSift".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_message_with_cloud() {
        let dir = std::env::temp_dir().join("mailsift-test-smtp");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cloud.svg");
        std::fs::write(&path, "<svg xmlns=\"http://www.w3.org/2000/svg\"/>").unwrap();

        let report = Report {
            recipient: "ann@example.com".into(),
            name: "Ann".into(),
            tags: vec!["invoice".into()],
            summary: "Your invoice total is 120 EUR.".into(),
            artifact: Some(path),
            message: String::new(),
        };
        let msg = notifier().build_message(&report).await.unwrap();
        let raw = String::from_utf8_lossy(&msg.formatted()).to_string();
        assert!(raw.contains("Subject: MailSift Summary"));
        assert!(raw.contains("image/svg+xml"));
        assert!(raw.contains("Content-ID: <wordcloud>"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_build_message_rejects_bad_recipient() {
        let report = Report {
            recipient: "not an address".into(),
            name: "Ann".into(),
            tags: vec![],
            summary: String::new(),
            artifact: None,
            message: "No new emails to summarize.".into(),
        };
        let err = notifier().build_message(&report).await.unwrap_err();
        assert!(matches!(err, MailSiftError::Delivery(_)));
    }
}
