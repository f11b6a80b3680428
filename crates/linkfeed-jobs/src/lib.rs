//! # linkfeed-jobs
//!
//! Background update scheduler for linkfeed.
//!
//! This crate provides:
//! - A single-writer worker that refreshes the post store from upstream,
//!   throttled to at most one real fetch per interval
//! - A periodic beat that requests a refresh every interval
//! - Coalescing of concurrent refresh requests onto one fetch
//! - Completion status broadcast through a watch channel
//! - Exponential backoff after failed fetches
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use linkfeed_jobs::{SchedulerConfig, UpdateScheduler};
//!
//! let scheduler = UpdateScheduler::new(
//!     Arc::new(fetcher),
//!     Arc::new(db.posts.clone()),
//!     SchedulerConfig::from_env(),
//! );
//! let handle = scheduler.start();
//!
//! // Enqueue a refresh and wait until a cycle started after this call finishes.
//! let status = handle.trigger().request_and_await_refresh().await?;
//! println!("{:?}", status.last_outcome);
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod scheduler;

// Re-export core types
pub use linkfeed_core::*;

pub use scheduler::{
    backoff_delay, CycleOutcome, RefreshRequest, RefreshStatus, RefreshTrigger, SchedulerConfig,
    SchedulerHandle, SkipReason, UpdateScheduler,
};
