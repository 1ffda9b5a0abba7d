//! # alarmvisor
//!
//! **alarmvisor** is a concurrent alarm manager built on tokio.
//!
//! Callers submit timed alarms tagged with a short type code. A dispatcher
//! task periodically reconciles the alarm registry against a bounded pool of
//! display workers; each worker renders up to two alarms of one type until
//! they expire or are cancelled, and retires itself once it holds none.
//!
//! ## Architecture
//! ```text
//!    submit / modify / cancel                    snapshot
//!              │                                     │
//!              ▼                                     │
//! ┌──────────────────────────┐                       │
//! │ Registry (registry_lock) │  ascending by id      │
//! └────────────┬─────────────┘                       │
//!              │ every dispatch_interval             │
//!              ▼                                     ▼
//! ┌──────────────────────────┐      ┌─────────────────────────────────┐
//! │ Dispatcher               │ ───► │ WorkerPool (pool_lock)          │
//! │  expire → assign →       │      │  ≤ max_workers DisplayWorkers   │
//! │  reconcile types         │      │  ≤ worker_capacity alarms each  │
//! └────────────┬─────────────┘      └──────┬──────────┬──────────┬────┘
//!              │                           ▼          ▼          ▼
//!              │                       worker 1   worker 2   worker N
//!              │                      (render every render_interval)
//!              ▼                           │          │          │
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Bus (broadcast channel of Events)                │
//! └──────────────────────────────┬──────────────────────────────────────┘
//!                                ▼
//!                  SubscriberSet (LogWriter, custom subscribers)
//! ```
//!
//! ## Lock discipline
//! `registry_lock` may be held while taking `pool_lock` (dispatcher, modify,
//! cancel); `pool_lock` is never held while taking `registry_lock`. Display
//! workers take `pool_lock` only. Nothing blocks waiting for new work: the
//! dispatcher and workers poll on their own periods.
//!
//! ## Features
//! | Area              | Description                                              | Key types                         |
//! |-------------------|----------------------------------------------------------|-----------------------------------|
//! | **Commands**      | Submit, modify, cancel and inspect alarms.               | [`AlarmManager`]                  |
//! | **Data model**    | Validated alarm fields.                                  | [`Alarm`], [`TypeCode`], [`Message`] |
//! | **Events**        | Every printable outcome, with global ordering.           | [`Event`], [`EventKind`]          |
//! | **Subscribers**   | Non-blocking fan-out to event handlers.                  | [`Subscribe`], [`SubscriberSet`]  |
//! | **Configuration** | Periods, capacities and limits.                          | [`Config`]                        |
//! | **Errors**        | Typed, recoverable command errors.                       | [`AlarmError`]                    |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use alarmvisor::{AlarmManager, Config, Subscribe};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(alarmvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let manager = AlarmManager::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build();
//!     manager.start();
//!
//!     manager.submit(1, "wk", Duration::from_secs(2), "tea is ready").await?;
//!     tokio::time::sleep(Duration::from_secs(4)).await;
//!     assert!(manager.alarms().await.is_empty());
//!
//!     manager.shutdown();
//!     Ok(())
//! }
//! ```
mod alarm;
mod core;
mod error;
mod events;
mod subscribers;

// ---- Public re-exports ----

pub use alarm::{Alarm, AlarmId, Message, TypeCode, WorkerId};
pub use crate::core::{AlarmManager, Config, ManagerBuilder, PoolSnapshot, TickReport, WorkerSnapshot};
pub use error::AlarmError;
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
