//! One periodic timer per active interval.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::registry::IntervalRegistry;

/// Receives the member snapshot of every tick.
#[async_trait]
pub trait TickHandler: Send + Sync {
    /// Awaited before the worker arms its next tick.
    async fn on_tick(&self, minutes: u32, members: Vec<String>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Running,
    Stopped,
}

/// Handle to a spawned timer loop. Stopping is final.
pub struct IntervalWorker {
    token: CancellationToken,
}

impl IntervalWorker {
    /// Spawn the timer loop. The first tick fires one `period` after start.
    pub fn spawn(
        minutes: u32,
        period: Duration,
        parent: &CancellationToken,
        registry: Weak<IntervalRegistry>,
        handler: Arc<dyn TickHandler>,
    ) -> Self {
        let token = parent.child_token();
        let loop_token = token.clone();
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let Some(registry) = registry.upgrade() else { break };
                let Some(members) = registry.members(minutes, &loop_token) else { break };
                drop(registry);

                tracing::debug!(interval = minutes, members = members.len(), "⏰ Tick");
                handler.on_tick(minutes, members).await;
            }
            tracing::info!(interval = minutes, "⏹️ Interval worker stopped");
        });

        tracing::info!(interval = minutes, ?period, "▶️ Interval worker started");
        Self { token }
    }

    pub fn state(&self) -> WorkerState {
        if self.token.is_cancelled() {
            WorkerState::Stopped
        } else {
            WorkerState::Running
        }
    }

    /// Cancel the timer. A tick already dispatched runs to completion.
    pub fn stop(&self) {
        self.token.cancel();
    }
}
