//! # MailSift Channels
//! Mailbox reading over IMAP and digest delivery over SMTP.

pub mod email;
pub mod template;

pub use email::{ImapMailboxClient, SmtpNotifier};
