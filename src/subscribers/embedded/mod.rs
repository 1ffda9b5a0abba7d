//! # Built-in subscribers
//!
//! - [`LogWriter`]: prints events in a human-readable form, one line each.

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
