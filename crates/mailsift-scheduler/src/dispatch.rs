//! Per-tick dispatch: run every member's sync concurrently, bounded, and mail
//! the outcome.

use async_trait::async_trait;
use mailsift_core::traits::{Notifier, UserStore};
use mailsift_core::types::{Report, User};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::pipeline::SyncPipeline;
use crate::worker::TickHandler;

/// Message sent when a run finds nothing to summarize.
pub const NOTHING_NEW: &str = "No new emails to summarize.";

/// Runs the sync pipeline for tick members and delivers reports.
#[derive(Clone)]
pub struct TickDispatcher {
    store: Arc<dyn UserStore>,
    pipeline: Arc<SyncPipeline>,
    notifier: Arc<dyn Notifier>,
    max_concurrent: usize,
}

impl TickDispatcher {
    pub fn new(
        store: Arc<dyn UserStore>,
        pipeline: Arc<SyncPipeline>,
        notifier: Arc<dyn Notifier>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            pipeline,
            notifier,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Sync one user and send the report. `None` if the user can't be read.
    pub async fn sync_user(&self, user_id: &str) -> Option<Report> {
        let user = match self.store.read(user_id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(user_id, "⚠️ Skipping scheduled sync: {e}");
                return None;
            }
        };

        let report = self.run(&user).await;
        if let Err(e) = self.notifier.send(&report).await {
            tracing::warn!(user_id, "⚠️ Digest delivery failed: {e}");
        }
        if let Some(path) = &report.artifact
            && let Err(e) = tokio::fs::remove_file(path).await
        {
            tracing::debug!(user_id, "Artifact cleanup failed for {}: {e}", path.display());
        }
        Some(report)
    }

    async fn run(&self, user: &User) -> Report {
        let mut report = Report {
            recipient: user.receiving_email.clone(),
            name: user.name.clone(),
            tags: user.tags.clone(),
            summary: String::new(),
            artifact: None,
            message: String::new(),
        };
        match self.pipeline.run(&user.id).await {
            Ok(digest) => {
                report.summary = digest.summary;
                report.artifact = Some(digest.artifact);
            }
            Err(e) if e.is_informational() => {
                tracing::debug!(user_id = %user.id, "{e}");
                report.message = NOTHING_NEW.into();
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, class = ?e.class(), "❌ Sync failed: {e}");
                report.message = format!("Error: {e}");
            }
        }
        report
    }
}

#[async_trait]
impl TickHandler for TickDispatcher {
    async fn on_tick(&self, minutes: u32, members: Vec<String>) {
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut jobs = JoinSet::new();

        for user_id in members {
            let Ok(permit) = permits.clone().acquire_owned().await else { break };
            let dispatcher = self.clone();
            jobs.spawn(async move {
                let _permit = permit;
                dispatcher.sync_user(&user_id).await;
            });
        }

        let mut done = 0usize;
        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(()) => done += 1,
                Err(e) => tracing::error!(interval = minutes, "💥 Sync job aborted: {e}"),
            }
        }
        tracing::info!(interval = minutes, done, "✅ Tick complete");
    }
}
