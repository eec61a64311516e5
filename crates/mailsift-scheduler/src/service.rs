//! Scheduler service: the registry's public face.
//!
//! Reads and writes the user store outside the registry lock, mutates the
//! registry under it, and owns the root cancellation token every worker
//! derives from.

use mailsift_core::error::{MailSiftError, Result};
use mailsift_core::traits::UserStore;
use mailsift_core::types::{Interval, UserPatch};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::registry::{GroupSnapshot, IntervalRegistry};
use crate::worker::{IntervalWorker, TickHandler};

pub struct SchedulerService {
    registry: Arc<IntervalRegistry>,
    store: Arc<dyn UserStore>,
    handler: Arc<dyn TickHandler>,
    /// Wall time of one interval unit (a minute in production).
    tick_unit: Duration,
    root: CancellationToken,
}

impl SchedulerService {
    pub fn new(store: Arc<dyn UserStore>, handler: Arc<dyn TickHandler>, tick_unit: Duration) -> Self {
        Self {
            registry: Arc::new(IntervalRegistry::new()),
            store,
            handler,
            tick_unit,
            root: CancellationToken::new(),
        }
    }

    fn add_to_group(&self, user_id: &str, minutes: u32) -> Result<bool> {
        let weak = Arc::downgrade(&self.registry);
        let period = self.tick_unit.saturating_mul(minutes);
        self.registry.add(user_id, minutes, || {
            IntervalWorker::spawn(minutes, period, &self.root, weak, self.handler.clone())
        })
    }

    /// Start scheduling a user who has none.
    pub async fn schedule_new_task(&self, user_id: &str, interval: Interval) -> Result<()> {
        let Some(minutes) = interval.as_minutes() else {
            return Err(MailSiftError::InvalidInterval(interval.to_string()));
        };
        let user = self.store.read(user_id).await?;
        if user.update_interval.is_enabled() {
            return Err(MailSiftError::AlreadyScheduled(user_id.to_string()));
        }

        self.add_to_group(user_id, minutes)?;
        if let Err(e) = self.store.update(user_id, UserPatch::interval(interval)).await {
            self.registry.remove_anywhere(user_id);
            return Err(e);
        }
        tracing::info!(user_id, interval = minutes, "📅 Scheduled");
        Ok(())
    }

    /// Remove a user from the group for `interval`. The store is only written
    /// once the registry held the user there.
    pub async fn delete_task(&self, user_id: &str, interval: Interval) -> Result<()> {
        let minutes = interval.as_minutes().unwrap_or(0);
        self.registry.remove(user_id, minutes)?;
        self.store.update(user_id, UserPatch::interval(Interval::Disabled)).await?;
        tracing::info!(user_id, interval = minutes, "🛑 Unscheduled");
        Ok(())
    }

    /// Remove a user from whatever group holds them.
    pub async fn delete_task_for_user(&self, user_id: &str) -> Result<()> {
        let removed = self.registry.remove_anywhere(user_id);
        self.store.update(user_id, UserPatch::interval(Interval::Disabled)).await?;
        if let Some(minutes) = removed {
            tracing::info!(user_id, interval = minutes, "🛑 Unscheduled");
        }
        Ok(())
    }

    /// Move a user between intervals. A failed delete aborts the move.
    pub async fn update_task(&self, user_id: &str, old: Interval, new: Interval) -> Result<()> {
        self.delete_task(user_id, old).await?;
        if new.is_enabled() {
            self.schedule_new_task(user_id, new).await?;
        }
        Ok(())
    }

    /// Populate the registry from persisted intervals. Returns how many users
    /// were scheduled.
    pub async fn bootstrap(&self) -> Result<usize> {
        let users = self.store.list_all().await?;
        let mut scheduled = 0;
        for user in users {
            let Some(minutes) = user.update_interval.as_minutes() else { continue };
            match self.add_to_group(&user.id, minutes) {
                Ok(_) => scheduled += 1,
                Err(e) => tracing::warn!(user_id = %user.id, "⚠️ Bootstrap skipped user: {e}"),
            }
        }
        tracing::info!(users = scheduled, groups = self.registry.len(), "📅 Scheduler bootstrapped");
        Ok(scheduled)
    }

    /// Interval → member ids.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.registry
            .snapshot()
            .into_iter()
            .map(|g| (g.interval.to_string(), g.members))
            .collect()
    }

    /// Groups with worker state.
    pub fn groups(&self) -> Vec<GroupSnapshot> {
        self.registry.snapshot()
    }

    /// Cancel every worker and empty the registry.
    pub fn shutdown(&self) {
        self.root.cancel();
        let groups = self.registry.clear();
        tracing::info!(groups, "⏹️ Scheduler shut down");
    }
}
