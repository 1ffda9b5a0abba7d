//! # Event subscribers for the alarm manager.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and (behind the `logging` feature) the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Dispatcher / DisplayWorker ── publish(Event) ──► Bus ──► subscriber listener
//!                                                                 │
//!                                                                 ▼
//!                                                     SubscriberSet::emit(&Event)
//!                                                     ┌───────────┼───────────┐
//!                                                     ▼           ▼           ▼
//!                                                 LogWriter     Metrics     Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use alarmvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct ExpiryCounter;
//!
//! #[async_trait]
//! impl Subscribe for ExpiryCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::AlarmExpired {
//!             // increment counter
//!         }
//!     }
//!     fn name(&self) -> &'static str { "expiry-counter" }
//! }
//! ```

mod embedded;
mod set;
mod subscribe;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
