//! # Alarm registry: ordered records behind `registry_lock`.
//!
//! The registry is the only owner of alarm records outside a worker slot.
//! Every access goes through [`Registry::lock`], which hands back a
//! [`RegistryGuard`]; holding the guard *is* holding `registry_lock`.
//!
//! ## Rules
//! - records stay sorted ascending by id; a new record goes **before** the
//!   first record whose id is `>=` its own (equal ids land in front)
//! - uniqueness is not enforced here; lookups take the first match
//! - the guard may be held while acquiring `pool_lock`, never the reverse
//! - tokio mutexes do not poison, so acquiring the lock cannot fail

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::error::AlarmError;

use super::record::{AlarmId, AlarmRecord};

/// Ascending-by-id collection of alarm records.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    records: Mutex<Vec<AlarmRecord>>,
}

/// Exclusive access to the registry storage.
pub(crate) struct RegistryGuard<'a> {
    records: MutexGuard<'a, Vec<AlarmRecord>>,
}

/// Result of one classification pass.
///
/// `expired` records have already left the registry and are owned here;
/// `unassigned` lists ids that are still registered and have no worker.
#[derive(Debug, Default)]
pub(crate) struct Classified {
    pub expired: Vec<AlarmRecord>,
    pub unassigned: Vec<AlarmId>,
    pub assigned: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires `registry_lock`.
    pub async fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            records: self.records.lock().await,
        }
    }
}

impl RegistryGuard<'_> {
    /// Inserts keeping ascending id order (before any equal id).
    pub fn insert(&mut self, record: AlarmRecord) {
        let at = self
            .records
            .iter()
            .position(|r| r.id() >= record.id())
            .unwrap_or(self.records.len());
        self.records.insert(at, record);
    }

    /// Removes the first record with `id`, handing ownership to the caller.
    pub fn remove(&mut self, id: AlarmId) -> Result<AlarmRecord, AlarmError> {
        let at = self
            .records
            .iter()
            .position(|r| r.id() == id)
            .ok_or(AlarmError::NotFound { id })?;
        Ok(self.records.remove(at))
    }

    #[cfg(test)]
    pub fn find(&self, id: AlarmId) -> Result<&AlarmRecord, AlarmError> {
        self.records
            .iter()
            .find(|r| r.id() == id)
            .ok_or(AlarmError::NotFound { id })
    }

    pub fn find_mut(&mut self, id: AlarmId) -> Result<&mut AlarmRecord, AlarmError> {
        self.records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(AlarmError::NotFound { id })
    }

    pub fn contains(&self, id: AlarmId) -> bool {
        self.records.iter().any(|r| r.id() == id)
    }

    /// Read-only walk in id order.
    pub fn iter(&self) -> impl Iterator<Item = &AlarmRecord> {
        self.records.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Splits the registry into expired / unassigned / assigned at `now`.
    ///
    /// Expired records are removed before anything else is decided, so a
    /// record that is due is never offered for assignment.
    pub fn classify(&mut self, now: Instant) -> Classified {
        let mut out = Classified::default();
        let mut kept = Vec::with_capacity(self.records.len());

        for record in self.records.drain(..) {
            if record.alarm().is_due(now) {
                out.expired.push(record);
            } else {
                if record.is_assigned() {
                    out.assigned += 1;
                } else {
                    out.unassigned.push(record.id());
                }
                kept.push(record);
            }
        }
        *self.records = kept;
        out
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::alarm::{Alarm, Message, WorkerId};

    fn record(id: AlarmId, secs: u64, msg: &str, now: Instant) -> AlarmRecord {
        let alarm = Alarm::new(
            id,
            "wk".parse().unwrap(),
            Duration::from_secs(secs),
            Message::new(msg, 127),
            now,
        )
        .unwrap();
        AlarmRecord::new(alarm)
    }

    fn ids(guard: &RegistryGuard<'_>) -> Vec<AlarmId> {
        guard.iter().map(|r| r.id()).collect()
    }

    #[tokio::test]
    async fn insert_keeps_ascending_order() {
        let reg = Registry::new();
        let now = Instant::now();
        let mut g = reg.lock().await;
        for id in [5, 1, 9, 3, 7] {
            g.insert(record(id, 10, "m", now));
        }
        assert_eq!(ids(&g), vec![1, 3, 5, 7, 9]);
    }

    #[tokio::test]
    async fn equal_ids_land_before_existing_ones() {
        let reg = Registry::new();
        let now = Instant::now();
        let mut g = reg.lock().await;
        g.insert(record(2, 10, "first", now));
        g.insert(record(2, 10, "second", now));
        assert_eq!(g.find(2).unwrap().alarm().message.as_str(), "second");
        assert_eq!(g.len(), 2);
    }

    #[tokio::test]
    async fn remove_and_find_report_not_found() {
        let reg = Registry::new();
        let mut g = reg.lock().await;
        assert_eq!(g.remove(4).unwrap_err(), AlarmError::NotFound { id: 4 });
        assert_eq!(g.find(4).unwrap_err(), AlarmError::NotFound { id: 4 });
        assert!(!g.contains(4));
    }

    #[tokio::test]
    async fn remove_transfers_ownership() {
        let reg = Registry::new();
        let now = Instant::now();
        let mut g = reg.lock().await;
        g.insert(record(1, 10, "a", now));
        g.insert(record(2, 10, "b", now));
        let taken = g.remove(1).unwrap();
        assert_eq!(taken.id(), 1);
        assert_eq!(ids(&g), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn classify_removes_due_records_first() {
        let reg = Registry::new();
        let now = Instant::now();
        let mut g = reg.lock().await;
        g.insert(record(1, 5, "due", now));
        g.insert(record(2, 30, "fresh", now));
        g.insert(record(3, 30, "owned", now));
        g.find_mut(3).unwrap().mark_assigned(WorkerId(1));

        let out = g.classify(now + Duration::from_secs(5));
        assert_eq!(out.expired.iter().map(|r| r.id()).collect::<Vec<_>>(), vec![1]);
        assert_eq!(out.unassigned, vec![2]);
        assert_eq!(out.assigned, 1);
        assert_eq!(ids(&g), vec![2, 3]);
    }
}
