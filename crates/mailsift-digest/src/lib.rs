//! # MailSift Digest
//!
//! Turns a corpus of matching email bodies into a digest.
//!
//! ## Pipeline
//! ```text
//! corpus ──TextRank──▶ summary (N sentences, original order)
//!   summary ──RAKE──▶ ranked keyword phrases
//!     keywords ──spiral layout──▶ SVG word cloud on disk
//! ```
//! Pure Rust, no models, no fonts. Deterministic for a given input.

pub mod keywords;
pub mod summarize;
pub mod wordcloud;

use mailsift_core::traits::{KeywordWeights, Summarizer};

pub use wordcloud::SvgWordCloud;

/// Default summarizer: TextRank sentences + RAKE keywords.
#[derive(Debug, Clone)]
pub struct TextDigest {
    max_keywords: usize,
}

impl TextDigest {
    pub fn new(max_keywords: usize) -> Self {
        Self { max_keywords }
    }
}

impl Default for TextDigest {
    fn default() -> Self {
        Self::new(60)
    }
}

impl Summarizer for TextDigest {
    fn summarize(&self, text: &str, max_sentences: usize) -> String {
        summarize::summarize(text, max_sentences.max(1))
    }

    fn extract_keywords(&self, text: &str) -> KeywordWeights {
        let mut ranked = keywords::rake(text);
        ranked.truncate(self.max_keywords);
        ranked
    }
}
