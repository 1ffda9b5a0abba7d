//! # Alarm records.
//!
//! An [`Alarm`] is what callers submit and what workers render. The registry
//! wraps it in an `AlarmRecord` that also carries the dispatcher's state:
//! whether a worker owns it, and a weak back-reference to that worker
//! (a [`WorkerId`], which may name a worker that has since retired).
//!
//! ## Rules
//! - `expires_at` is fixed at submission (`submitted + interval`); modify never moves it
//! - messages are capped in bytes and cut on a UTF-8 boundary; the cut is flagged
//! - type codes are 1-2 non-whitespace characters

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;

use crate::error::AlarmError;

/// Caller-supplied alarm identifier; the registry's sort and lookup key.
pub type AlarmId = i64;

/// Identifier of a display worker, allocated by the pool in creation order.
///
/// Holding a `WorkerId` never keeps a worker alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(pub(crate) u64);

impl WorkerId {
    /// Raw numeric value (1-based, monotonic per pool).
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short alarm category used to group alarms onto workers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeCode(Arc<str>);

impl TypeCode {
    /// Maximum length in characters.
    pub const MAX_LEN: usize = 2;

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TypeCode {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars = s.chars().count();
        if chars == 0 || chars > Self::MAX_LEN || s.chars().any(char::is_whitespace) {
            return Err(AlarmError::InvalidTypeCode {
                code: s.to_string(),
            });
        }
        Ok(Self(Arc::from(s)))
    }
}

impl TryFrom<&str> for TypeCode {
    type Error = AlarmError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<TypeCode> for Arc<str> {
    fn from(code: TypeCode) -> Self {
        code.0
    }
}

/// Alarm text, capped to a byte limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    text: Arc<str>,
    truncated: bool,
}

impl Message {
    /// Builds a message from `input`, cutting it to at most `limit` bytes.
    ///
    /// The cut lands on the last char boundary at or before `limit`, so the
    /// stored text is always valid UTF-8.
    pub fn new(input: &str, limit: usize) -> Self {
        if input.len() <= limit {
            return Self {
                text: Arc::from(input),
                truncated: false,
            };
        }
        let mut end = limit;
        while !input.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            text: Arc::from(&input[..end]),
            truncated: true,
        }
    }

    /// The (possibly truncated) text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// True if the caller's input was longer than the limit.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub(crate) fn shared(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// One timed alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    /// Caller-supplied id.
    pub id: AlarmId,
    /// Grouping key for worker assignment.
    pub type_code: TypeCode,
    /// Requested duration; display-only once the alarm exists.
    pub interval: Duration,
    /// Wall-clock submission time.
    pub submitted_at: SystemTime,
    /// Monotonic expiry deadline.
    pub expires_at: Instant,
    /// Alarm text.
    pub message: Message,
}

impl Alarm {
    /// Creates an alarm expiring `interval` after `now`.
    ///
    /// # Errors
    /// [`AlarmError::InvalidDuration`] if the deadline is not representable.
    pub fn new(
        id: AlarmId,
        type_code: TypeCode,
        interval: Duration,
        message: Message,
        now: Instant,
    ) -> Result<Self, AlarmError> {
        let expires_at = now
            .checked_add(interval)
            .ok_or(AlarmError::InvalidDuration {
                secs: interval.as_secs(),
            })?;
        Ok(Self {
            id,
            type_code,
            interval,
            submitted_at: SystemTime::now(),
            expires_at,
            message,
        })
    }

    /// True once the deadline has passed.
    #[inline]
    pub fn is_due(&self, now: Instant) -> bool {
        self.expires_at <= now
    }

    /// Time left before expiry (zero when due).
    #[inline]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Registry entry: an alarm plus dispatcher bookkeeping.
#[derive(Debug)]
pub(crate) struct AlarmRecord {
    alarm: Alarm,
    assigned: bool,
    owner: Option<WorkerId>,
    /// Set once an assignment was refused at the ceiling (reported once).
    deferred: bool,
}

impl AlarmRecord {
    pub fn new(alarm: Alarm) -> Self {
        Self {
            alarm,
            assigned: false,
            owner: None,
            deferred: false,
        }
    }

    #[inline]
    pub fn id(&self) -> AlarmId {
        self.alarm.id
    }

    #[inline]
    pub fn alarm(&self) -> &Alarm {
        &self.alarm
    }

    #[inline]
    pub fn is_assigned(&self) -> bool {
        self.assigned
    }

    #[inline]
    pub fn owner(&self) -> Option<WorkerId> {
        self.owner
    }

    pub fn mark_assigned(&mut self, worker: WorkerId) {
        self.assigned = true;
        self.owner = Some(worker);
        self.deferred = false;
    }

    pub fn mark_unassigned(&mut self) {
        self.assigned = false;
        self.owner = None;
    }

    /// Flags the record as refused by the pool; returns true the first time.
    pub fn mark_deferred(&mut self) -> bool {
        !std::mem::replace(&mut self.deferred, true)
    }

    /// Replaces interval and message; type and deadline stay as they are.
    pub fn modify(&mut self, interval: Duration, message: Message) {
        self.alarm.interval = interval;
        self.alarm.message = message;
    }
}
