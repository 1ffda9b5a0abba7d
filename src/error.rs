//! Error types returned by the alarm manager.
//!
//! [`AlarmError`] covers the recoverable, user-facing failures: unknown ids,
//! duplicate ids, malformed type codes, out-of-range durations and a worker
//! pool at its ceiling.
//! Everything else (allocation failure) aborts the process.

use thiserror::Error;

use crate::alarm::AlarmId;

/// # Errors produced by the command API and the worker pool.
///
/// None of these change state: the caller is told, the loop continues.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlarmError {
    /// No alarm with this id is registered.
    #[error("ID not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: AlarmId,
    },

    /// An alarm with this id is already registered.
    #[error("alarm id {id} already exists")]
    DuplicateId {
        /// The id that was submitted twice.
        id: AlarmId,
    },

    /// The type code is empty, too long, or contains whitespace.
    #[error("invalid type code {code:?} (expected 1-2 non-whitespace characters)")]
    InvalidTypeCode {
        /// The rejected input.
        code: String,
    },

    /// The duration puts the deadline beyond what the clock can represent.
    #[error("invalid duration {secs}s (deadline out of range)")]
    InvalidDuration {
        /// The rejected duration, in whole seconds.
        secs: u64,
    },

    /// Every worker slot is taken and the pool may not grow.
    #[error("worker pool exhausted ({max_workers} workers)")]
    PoolExhausted {
        /// The configured worker ceiling.
        max_workers: usize,
    },
}

impl AlarmError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use alarmvisor::AlarmError;
    ///
    /// let err = AlarmError::NotFound { id: 99 };
    /// assert_eq!(err.as_label(), "alarm_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            AlarmError::NotFound { .. } => "alarm_not_found",
            AlarmError::DuplicateId { .. } => "alarm_duplicate_id",
            AlarmError::InvalidTypeCode { .. } => "alarm_invalid_type_code",
            AlarmError::InvalidDuration { .. } => "alarm_invalid_duration",
            AlarmError::PoolExhausted { .. } => "pool_exhausted",
        }
    }

    /// Returns true for errors caused by the caller's input rather than by load.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, AlarmError::PoolExhausted { .. })
    }
}
