//! # MailSift Scheduler
//!
//! Recurring digests and the incremental mailbox sync behind them.
//!
//! ## Architecture
//! ```text
//! SchedulerService (API-facing mutations, bootstrap, shutdown)
//!   └── IntervalRegistry: { minutes → [user ids] } under one lock
//!         └── IntervalWorker per group (tokio interval + CancellationToken)
//!               └── on tick → TickDispatcher (JoinSet, Semaphore-bounded)
//!                     └── per user → SyncPipeline → Notifier
//!                           fetch from lowest watermark
//!                           advance + persist watermark
//!                           filter → summarize → keywords → word cloud
//! ```
//! A user sits in at most one group. A group exists only while it has
//! members, and it is the only owner of its worker.

pub mod dispatch;
pub mod pipeline;
pub mod registry;
pub mod service;
pub mod watermark;
pub mod worker;

#[cfg(test)]
mod testing;

pub use dispatch::{NOTHING_NEW, TickDispatcher};
pub use pipeline::{Digest, SyncPipeline};
pub use registry::{GroupSnapshot, IntervalRegistry};
pub use service::SchedulerService;
pub use watermark::Watermark;
pub use worker::{IntervalWorker, TickHandler, WorkerState};
