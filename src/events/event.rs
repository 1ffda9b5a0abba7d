//! # Events emitted by the command API, the dispatcher and display workers.
//!
//! Every printable outcome of the alarm manager is an [`Event`]. The
//! [`EventKind`] enum classifies them into four groups:
//! - **Command events**: results of submit / modify / cancel
//! - **Dispatcher events**: expiry, assignment, deferral, reassignment
//! - **Worker events**: creation, periodic display, retirement
//! - **Subscriber events**: overflow and panics in the fan-out layer
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use alarmvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::SlotCancelled)
//!     .with_alarm_id(4)
//!     .with_type_code("wk")
//!     .with_reason("cancel");
//!
//! assert_eq!(ev.kind, EventKind::SlotCancelled);
//! assert_eq!(ev.alarm, Some(4));
//! assert_eq!(ev.type_code.as_deref(), Some("wk"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::alarm::{Alarm, AlarmId, WorkerId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of alarm manager events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Command events ===
    /// Alarm accepted into the registry.
    ///
    /// Sets: `alarm`, `type_code`, `interval_secs`, `message`
    AlarmInserted,

    /// Alarm interval/message replaced.
    ///
    /// Sets: `alarm`, `type_code`, `interval_secs`, `message`, `worker` (if owned)
    AlarmChanged,

    /// Alarm removed by an explicit cancel.
    ///
    /// Sets: `alarm`, `type_code`, `interval_secs`, `message`
    AlarmCancelled,

    /// Caller's message exceeded the byte limit and was cut.
    ///
    /// Sets: `alarm`, `reason` (`"limit=<n>"`)
    MessageTruncated,

    /// A command referenced an id that is not registered.
    ///
    /// Sets: `alarm`, `reason` (the command: `"modify"`, `"cancel"`)
    AlarmNotFound,

    // === Dispatcher events ===
    /// Alarm reached its deadline and was freed by the dispatcher.
    ///
    /// Sets: `alarm`, `type_code`, `interval_secs`, `message`
    AlarmExpired,

    /// Alarm handed to a worker slot.
    ///
    /// Sets: `alarm`, `type_code`, `worker`
    AlarmAssigned,

    /// Pool is at its ceiling; the alarm stays queued in the registry.
    ///
    /// Sets: `alarm`, `type_code`, `reason`
    AssignmentDeferred,

    /// Alarm moved to another worker after a type mismatch.
    ///
    /// Sets: `alarm`, `type_code` (new), `worker` (new)
    AlarmReassigned,

    // === Worker events ===
    /// A display worker was created for a type.
    ///
    /// Sets: `worker`, `type_code`
    WorkerCreated,

    /// Periodic render of an active alarm.
    ///
    /// Sets: `alarm`, `type_code`, `interval_secs`, `message`, `worker`, `remaining_ms`
    AlarmDisplayed,

    /// A worker observed its alarm past the deadline and cleared the slot.
    ///
    /// Sets: `alarm`, `type_code`, `interval_secs`, `message`, `worker`
    AlarmDisplayExpired,

    /// A worker slot was cleared by a cancel.
    ///
    /// Sets: `alarm`, `type_code`, `message`, `worker`
    SlotCancelled,

    /// A worker holds no alarms and has left the pool for good.
    ///
    /// Sets: `worker`, `type_code`
    WorkerRetired,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason` (subscriber name and cause)
    SubscriberOverflow,
}

/// Alarm manager event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Alarm id, if the event concerns one alarm.
    pub alarm: Option<AlarmId>,
    /// Alarm or worker type code.
    pub type_code: Option<Arc<str>>,
    /// Display worker involved.
    pub worker: Option<WorkerId>,
    /// Requested alarm interval in seconds.
    pub interval_secs: Option<u64>,
    /// Time left before expiry in milliseconds.
    pub remaining_ms: Option<u64>,
    /// Alarm text.
    pub message: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            alarm: None,
            type_code: None,
            worker: None,
            interval_secs: None,
            remaining_ms: None,
            message: None,
            reason: None,
        }
    }

    /// Creates an event describing `alarm` (id, type, interval, message).
    pub fn for_alarm(kind: EventKind, alarm: &Alarm) -> Self {
        let mut ev = Self::new(kind).with_alarm_id(alarm.id);
        ev.type_code = Some(alarm.type_code.clone().into());
        ev.interval_secs = Some(alarm.interval.as_secs());
        ev.message = Some(alarm.message.shared());
        ev
    }

    /// Attaches an alarm id.
    #[inline]
    pub fn with_alarm_id(mut self, id: AlarmId) -> Self {
        self.alarm = Some(id);
        self
    }

    /// Attaches a type code.
    #[inline]
    pub fn with_type_code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.type_code = Some(code.into());
        self
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, worker: WorkerId) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attaches the remaining time (stored as milliseconds).
    #[inline]
    pub fn with_remaining(mut self, d: Duration) -> Self {
        let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        self.remaining_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::Message;
    use tokio::time::Instant;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::AlarmInserted);
        let b = Event::new(EventKind::AlarmInserted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn for_alarm_copies_display_fields() {
        let alarm = Alarm::new(
            3,
            "wk".parse().unwrap(),
            Duration::from_secs(12),
            Message::new("check oven", 127),
            Instant::now(),
        )
        .unwrap();
        let ev = Event::for_alarm(EventKind::AlarmExpired, &alarm);
        assert_eq!(ev.alarm, Some(3));
        assert_eq!(ev.type_code.as_deref(), Some("wk"));
        assert_eq!(ev.interval_secs, Some(12));
        assert_eq!(ev.message.as_deref(), Some("check oven"));
        assert!(ev.worker.is_none());
    }

    #[test]
    fn remaining_keeps_long_durations() {
        let sixty_days = Duration::from_secs(60 * 24 * 3600);
        let ev = Event::new(EventKind::AlarmDisplayed).with_remaining(sixty_days);
        assert_eq!(ev.remaining_ms, Some(5_184_000_000));

        let ev = Event::new(EventKind::AlarmDisplayed).with_remaining(Duration::MAX);
        assert_eq!(ev.remaining_ms, Some(u64::MAX));
    }
}
