//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout, one line each.
//!
//! ## Example output
//! ```text
//! [inserted] alarm=1 type="wk" interval=5s message="hi"
//! [worker-created] worker=1 type="wk"
//! [assigned] alarm=1 type="wk" worker=1
//! [display] alarm=1 type="wk" worker=1 remaining=4000ms message="hi"
//! [expired] alarm=1 type="wk" interval=5s message="hi"
//! [worker-retired] worker=1 type="wk"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Formats one event as a single line (without trailing newline).
    pub fn format(e: &Event) -> String {
        let alarm = e.alarm.map_or_else(|| "?".to_string(), |id| id.to_string());
        let ty = e.type_code.as_deref().unwrap_or("?");
        let worker = e.worker.map_or_else(|| "?".to_string(), |w| w.to_string());
        let msg = e.message.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("unknown");
        let interval = e.interval_secs.unwrap_or(0);

        match e.kind {
            EventKind::AlarmInserted => {
                format!("[inserted] alarm={alarm} type={ty:?} interval={interval}s message={msg:?}")
            }
            EventKind::AlarmChanged => {
                format!("[changed] alarm={alarm} type={ty:?} interval={interval}s message={msg:?}")
            }
            EventKind::AlarmCancelled => format!("[cancelled] alarm={alarm} type={ty:?}"),
            EventKind::MessageTruncated => {
                format!("[warning] alarm={alarm} message truncated ({reason})")
            }
            EventKind::AlarmNotFound => format!("[not-found] alarm={alarm} command={reason}"),
            EventKind::AlarmExpired => {
                format!("[expired] alarm={alarm} type={ty:?} interval={interval}s message={msg:?}")
            }
            EventKind::AlarmAssigned => {
                format!("[assigned] alarm={alarm} type={ty:?} worker={worker}")
            }
            EventKind::AssignmentDeferred => {
                format!("[deferred] alarm={alarm} type={ty:?} err={reason:?}")
            }
            EventKind::AlarmReassigned => {
                format!("[reassigned] alarm={alarm} type={ty:?} worker={worker}")
            }
            EventKind::WorkerCreated => format!("[worker-created] worker={worker} type={ty:?}"),
            EventKind::AlarmDisplayed => format!(
                "[display] alarm={alarm} type={ty:?} worker={worker} remaining={}ms message={msg:?}",
                e.remaining_ms.unwrap_or(0)
            ),
            EventKind::AlarmDisplayExpired => {
                format!("[display-expired] alarm={alarm} type={ty:?} worker={worker} message={msg:?}")
            }
            EventKind::SlotCancelled => {
                format!("[slot-cancelled] alarm={alarm} type={ty:?} worker={worker}")
            }
            EventKind::WorkerRetired => format!("[worker-retired] worker={worker} type={ty:?}"),
            EventKind::SubscriberOverflow => format!("[subscriber-overflow] {reason}"),
            EventKind::SubscriberPanicked => format!("[subscriber-panicked] {reason}"),
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        println!("{}", Self::format(e));
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_expiry_line() {
        let mut ev = Event::new(EventKind::AlarmExpired)
            .with_alarm_id(1)
            .with_type_code("wk");
        ev.interval_secs = Some(5);
        ev.message = Some("hi".into());
        assert_eq!(
            LogWriter::format(&ev),
            r#"[expired] alarm=1 type="wk" interval=5s message="hi""#
        );
    }

    #[test]
    fn missing_fields_render_as_placeholders() {
        let ev = Event::new(EventKind::WorkerRetired);
        assert_eq!(LogWriter::format(&ev), r#"[worker-retired] worker=? type="?""#);
    }
}
