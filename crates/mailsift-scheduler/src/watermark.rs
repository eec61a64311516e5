//! Per-tag high-water marks.
//!
//! Persisted on the user record as a JSON object `{"tag": last_id}`. Only the
//! sync pipeline writes it.

use mailsift_core::error::Result;
use std::collections::BTreeMap;

/// Value a tag starts from: the beginning of the mailbox.
pub const START_OF_MAILBOX: u32 = 1;

/// Last processed mailbox id per tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark {
    marks: BTreeMap<String, u32>,
}

/// Per-tag lower bound (exclusive) on ids a run may consider.
pub type Thresholds = BTreeMap<String, u32>;

impl Watermark {
    /// Parse the persisted form. Empty input is an empty watermark.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let marks: BTreeMap<String, u32> = serde_json::from_str(raw)?;
        Ok(Self { marks })
    }

    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.marks)?)
    }

    pub fn get(&self, tag: &str) -> Option<u32> {
        self.marks.get(tag).copied()
    }

    /// Initialize missing or zero tags to [`START_OF_MAILBOX`].
    ///
    /// Returns what each tag may consider this run: freshly initialized tags
    /// see everything (threshold 0), others only ids above their mark.
    pub fn prepare(&mut self, tags: &[String]) -> Thresholds {
        let mut thresholds = Thresholds::new();
        for tag in tags {
            let mark = self.marks.entry(tag.clone()).or_insert(0);
            if *mark == 0 {
                *mark = START_OF_MAILBOX;
                thresholds.insert(tag.clone(), 0);
            } else {
                thresholds.insert(tag.clone(), *mark);
            }
        }
        thresholds
    }

    /// Earliest mark across `tags`; where the next fetch has to start.
    pub fn lowest_mark(&self, tags: &[String]) -> u32 {
        tags.iter()
            .map(|t| self.get(t).unwrap_or(0).max(START_OF_MAILBOX))
            .min()
            .unwrap_or(START_OF_MAILBOX)
    }

    /// Move every tag up to `highest`. Marks never go down.
    pub fn advance(&mut self, tags: &[String], highest: u32) {
        for tag in tags {
            let mark = self.marks.entry(tag.clone()).or_insert(0);
            *mark = (*mark).max(highest);
        }
    }
}
