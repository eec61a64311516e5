//! Interval → members map, guarded by one lock.
//!
//! Every mutation and every tick snapshot goes through the same mutex, and no
//! I/O ever happens while it is held. A group exists only while it has
//! members, and each group owns exactly one running worker.

use mailsift_core::error::{MailSiftError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::worker::{IntervalWorker, WorkerState};

struct Group {
    members: Vec<String>,
    worker: IntervalWorker,
}

/// Diagnostic view of one group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSnapshot {
    pub interval: u32,
    pub members: Vec<String>,
    pub worker: WorkerState,
}

#[derive(Default)]
pub struct IntervalRegistry {
    groups: Mutex<BTreeMap<u32, Group>>,
}

impl IntervalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u32, Group>> {
        // The map stays consistent across a panicking holder: every mutation
        // is a single insert or remove.
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Interval whose group currently holds `user_id`.
    pub fn interval_of(&self, user_id: &str) -> Option<u32> {
        self.lock()
            .iter()
            .find(|(_, g)| g.members.iter().any(|m| m == user_id))
            .map(|(minutes, _)| *minutes)
    }

    /// Add a member, creating the group with `spawn`'s worker if needed.
    /// Returns true when a new group was created.
    pub fn add(&self, user_id: &str, minutes: u32, spawn: impl FnOnce() -> IntervalWorker) -> Result<bool> {
        let mut groups = self.lock();
        if groups.values().any(|g| g.members.iter().any(|m| m == user_id)) {
            return Err(MailSiftError::AlreadyScheduled(user_id.to_string()));
        }

        if let Some(group) = groups.get_mut(&minutes) {
            group.members.push(user_id.to_string());
            return Ok(false);
        }

        groups.insert(
            minutes,
            Group {
                members: vec![user_id.to_string()],
                worker: spawn(),
            },
        );
        tracing::info!(interval = minutes, user_id, "📅 Interval group created");
        Ok(true)
    }

    /// Remove a member from the group for `minutes`. Returns true when the
    /// group emptied and its worker was stopped. Fails with `NoSuchGroup` if
    /// the group is missing or does not hold `user_id`.
    pub fn remove(&self, user_id: &str, minutes: u32) -> Result<bool> {
        let mut groups = self.lock();
        let group = groups
            .get_mut(&minutes)
            .filter(|g| g.members.iter().any(|m| m == user_id))
            .ok_or_else(|| MailSiftError::NoSuchGroup(minutes.to_string()))?;
        group.members.retain(|m| m != user_id);
        Ok(Self::drop_if_empty(&mut groups, minutes))
    }

    /// Remove `user_id` from whichever group holds it.
    pub fn remove_anywhere(&self, user_id: &str) -> Option<u32> {
        let mut groups = self.lock();
        let minutes = groups
            .iter()
            .find(|(_, g)| g.members.iter().any(|m| m == user_id))
            .map(|(minutes, _)| *minutes)?;
        if let Some(group) = groups.get_mut(&minutes) {
            group.members.retain(|m| m != user_id);
        }
        Self::drop_if_empty(&mut groups, minutes);
        Some(minutes)
    }

    fn drop_if_empty(groups: &mut BTreeMap<u32, Group>, minutes: u32) -> bool {
        if groups.get(&minutes).is_some_and(|g| g.members.is_empty())
            && let Some(group) = groups.remove(&minutes)
        {
            group.worker.stop();
            tracing::info!(interval = minutes, "🗑️ Interval group removed");
            return true;
        }
        false
    }

    /// Members due for a tick, or `None` when the calling worker has been
    /// stopped or its group is gone.
    pub fn members(&self, minutes: u32, worker: &CancellationToken) -> Option<Vec<String>> {
        let groups = self.lock();
        if worker.is_cancelled() {
            return None;
        }
        groups.get(&minutes).map(|g| g.members.clone())
    }

    pub fn snapshot(&self) -> Vec<GroupSnapshot> {
        self.lock()
            .iter()
            .map(|(minutes, g)| GroupSnapshot {
                interval: *minutes,
                members: g.members.clone(),
                worker: g.worker.state(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stop every worker and drop every group. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut groups = self.lock();
        for group in groups.values() {
            group.worker.stop();
        }
        let removed = groups.len();
        groups.clear();
        removed
    }
}
