//! Alarm data model and the ordered alarm registry.
//!
//! - [`Alarm`]: the caller-visible alarm (id, type, interval, expiry, message);
//! - [`TypeCode`] / [`Message`]: validated field types;
//! - `AlarmRecord`: an alarm plus the dispatcher's assignment bookkeeping;
//! - `Registry`: ascending-by-id collection of records behind `registry_lock`.

mod record;
mod registry;

pub use record::{Alarm, AlarmId, Message, TypeCode, WorkerId};

pub(crate) use record::AlarmRecord;
pub(crate) use registry::Registry;
