//! Runtime core: command API, dispatcher and worker pool.
//!
//! The only public API from this module is [`AlarmManager`] (plus its
//! builder, configuration and snapshot types).
//!
//! Internal modules:
//! - [`manager`]: submit / modify / cancel / snapshot over the two tables;
//! - [`dispatcher`]: per-tick expiry, assignment and type reconciliation;
//! - [`pool`]: bounded set of display workers behind `pool_lock`;
//! - [`worker`]: display worker state and its render loop;
//! - [`builder`]: wires bus, subscribers and tables together.

mod builder;
mod config;
mod dispatcher;
mod manager;
mod pool;
mod worker;

pub use builder::ManagerBuilder;
pub use config::Config;
pub use dispatcher::TickReport;
pub use manager::AlarmManager;
pub use pool::{PoolSnapshot, WorkerSnapshot};
