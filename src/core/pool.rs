//! # WorkerPool: bounded set of display workers behind `pool_lock`.
//!
//! The pool owns every [`DisplayWorker`]'s state and is the only place that
//! creates or purges workers. Worker tasks hold nothing but their id and a
//! child cancellation token.
//!
//! ## Operations
//! ```text
//! assign(alarm)          first worker (creation order) of that type with a free slot,
//!                        else a new worker if below max_workers, else PoolExhausted
//! cancel(id)             clear the slot, SlotCancelled, retire the worker if now idle
//! release(ids)           clear slots of alarms the dispatcher expired (no event)
//! refresh(alarm)         replace the rendered copy after a modify
//! reconcile(id, type)    cancel + assign under one lock acquisition
//! reconcile_types()      move every alarm whose type differs from its worker's
//! render(worker, now)    one display pass for a worker task
//! snapshot()             read-only copy of workers and their slots
//! ```
//!
//! ## Rules
//! - `pool_lock` is never held while acquiring `registry_lock`
//! - a worker reaching zero alarms is removed and its token cancelled in the
//!   same critical section ([`WorkerPool::retire_locked`]); later alarms of
//!   that type get a fresh worker
//! - iteration order is creation order (`BTreeMap` keyed by monotonic id)

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::alarm::{Alarm, AlarmId, TypeCode, WorkerId};
use crate::core::config::Config;
use crate::error::AlarmError;
use crate::events::{Bus, Event, EventKind};

use super::worker::{self, DisplayWorker, RenderOutcome};

/// Storage guarded by `pool_lock`.
#[derive(Debug, Default)]
pub(crate) struct PoolState {
    workers: BTreeMap<WorkerId, DisplayWorker>,
    next_id: u64,
}

/// Outcome of moving one alarm during type reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reassignment {
    pub id: AlarmId,
    pub result: Result<WorkerId, AlarmError>,
}

/// Bounded, self-purging pool of display workers.
pub(crate) struct WorkerPool {
    state: Mutex<PoolState>,
    bus: Bus,
    capacity: usize,
    max_workers: usize,
    render_period: Duration,
    runtime_token: CancellationToken,
}

impl WorkerPool {
    pub fn new(cfg: &Config, bus: Bus, runtime_token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PoolState::default()),
            bus,
            capacity: cfg.worker_capacity_clamped(),
            max_workers: cfg.max_workers_clamped(),
            render_period: cfg.render_period(),
            runtime_token,
        })
    }

    pub fn render_period(&self) -> Duration {
        self.render_period
    }

    /// Places `alarm` on a worker of its type, creating one if needed.
    pub async fn assign(self: &Arc<Self>, alarm: Alarm) -> Result<WorkerId, AlarmError> {
        let mut state = self.state.lock().await;
        let (id, ty) = (alarm.id, alarm.type_code.clone());
        let worker = self.assign_locked(&mut state, alarm)?;
        self.bus.publish(
            Event::new(EventKind::AlarmAssigned)
                .with_alarm_id(id)
                .with_type_code(ty)
                .with_worker(worker),
        );
        Ok(worker)
    }

    /// Clears the slot holding `id`; returns the worker it was on.
    ///
    /// The caller keeps ownership of its record for the duration of the call;
    /// only the pool's rendered copy is dropped here.
    pub async fn cancel(&self, id: AlarmId) -> Option<WorkerId> {
        let mut state = self.state.lock().await;
        let (worker, alarm) = Self::take_locked(&mut state, id)?;
        self.bus.publish(
            Event::for_alarm(EventKind::SlotCancelled, &alarm).with_worker(worker),
        );
        self.retire_if_idle(&mut state, worker);
        Some(worker)
    }

    /// Clears the slots of alarms the dispatcher has already expired.
    pub async fn release(&self, ids: &[AlarmId]) {
        if ids.is_empty() {
            return;
        }
        let mut state = self.state.lock().await;
        for &id in ids {
            if let Some((worker, _)) = Self::take_locked(&mut state, id) {
                self.retire_if_idle(&mut state, worker);
            }
        }
    }

    /// Replaces the rendered copy of `alarm` after a modify.
    pub async fn refresh(&self, alarm: &Alarm) -> Option<WorkerId> {
        let mut state = self.state.lock().await;
        state.workers.values_mut().find_map(|w| {
            let slot = w.get_mut(alarm.id)?;
            *slot = alarm.clone();
            Some(w.id())
        })
    }

    /// Moves alarm `id` onto a worker of `new_type` (cancel + assign, one lock).
    ///
    /// No command changes an alarm's type today, so only tests drive this.
    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn reconcile(
        self: &Arc<Self>,
        id: AlarmId,
        new_type: TypeCode,
    ) -> Result<WorkerId, AlarmError> {
        let mut state = self.state.lock().await;
        let (from, mut alarm) = Self::take_locked(&mut state, id).ok_or(AlarmError::NotFound { id })?;
        self.retire_if_idle(&mut state, from);
        alarm.type_code = new_type;
        self.reassign_locked(&mut state, alarm)
    }

    /// Re-homes every alarm whose type no longer matches its worker's.
    pub async fn reconcile_types(self: &Arc<Self>) -> Vec<Reassignment> {
        let mut state = self.state.lock().await;

        let mut moved = Vec::new();
        let mut emptied = Vec::new();
        for w in state.workers.values_mut() {
            let taken = w.take_mismatched();
            if !taken.is_empty() && w.is_idle() {
                emptied.push(w.id());
            }
            moved.extend(taken);
        }
        for id in emptied {
            self.retire_locked(&mut state, id);
        }

        moved
            .into_iter()
            .map(|alarm| Reassignment {
                id: alarm.id,
                result: self.reassign_locked(&mut state, alarm),
            })
            .collect()
    }

    /// One render pass for worker `id`.
    pub async fn render(&self, id: WorkerId, now: Instant) -> RenderOutcome {
        let mut state = self.state.lock().await;
        let Some(w) = state.workers.get_mut(&id) else {
            return RenderOutcome::Gone;
        };

        for alarm in w.take_due(now) {
            self.bus.publish(
                Event::for_alarm(EventKind::AlarmDisplayExpired, &alarm).with_worker(id),
            );
        }
        for alarm in w.alarms() {
            self.bus.publish(
                Event::for_alarm(EventKind::AlarmDisplayed, alarm)
                    .with_worker(id)
                    .with_remaining(alarm.remaining(now)),
            );
        }

        if w.is_idle() {
            self.retire_locked(&mut state, id);
            RenderOutcome::Retired
        } else {
            RenderOutcome::Active
        }
    }

    /// Read-only copy of every live worker and its occupied slots.
    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock().await;
        PoolSnapshot {
            workers: state
                .workers
                .values()
                .map(|w| WorkerSnapshot {
                    id: w.id(),
                    type_code: w.type_code().clone(),
                    capacity: w.capacity(),
                    alarms: w.alarms().cloned().collect(),
                })
                .collect(),
        }
    }

    // ---------------------------
    // Helpers (caller holds pool_lock)
    // ---------------------------

    fn assign_locked(
        self: &Arc<Self>,
        state: &mut PoolState,
        alarm: Alarm,
    ) -> Result<WorkerId, AlarmError> {
        if let Some(w) = state
            .workers
            .values_mut()
            .find(|w| w.accepts(&alarm.type_code))
        {
            w.place(alarm);
            return Ok(w.id());
        }

        if state.workers.len() >= self.max_workers {
            return Err(AlarmError::PoolExhausted {
                max_workers: self.max_workers,
            });
        }

        state.next_id += 1;
        let id = WorkerId(state.next_id);
        let token = self.runtime_token.child_token();
        let mut w = DisplayWorker::new(id, alarm.type_code.clone(), self.capacity, token.clone());
        self.bus.publish(
            Event::new(EventKind::WorkerCreated)
                .with_worker(id)
                .with_type_code(alarm.type_code.clone()),
        );
        w.place(alarm);
        state.workers.insert(id, w);

        tokio::spawn(worker::run(Arc::clone(self), id, token));
        Ok(id)
    }

    /// Assigns an alarm that was pulled off another worker, reporting the move.
    fn reassign_locked(
        self: &Arc<Self>,
        state: &mut PoolState,
        alarm: Alarm,
    ) -> Result<WorkerId, AlarmError> {
        let (id, ty) = (alarm.id, alarm.type_code.clone());
        match self.assign_locked(state, alarm) {
            Ok(worker) => {
                self.bus.publish(
                    Event::new(EventKind::AlarmReassigned)
                        .with_alarm_id(id)
                        .with_type_code(ty)
                        .with_worker(worker),
                );
                Ok(worker)
            }
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::AssignmentDeferred)
                        .with_alarm_id(id)
                        .with_type_code(ty)
                        .with_reason(e.to_string()),
                );
                Err(e)
            }
        }
    }

    fn take_locked(state: &mut PoolState, id: AlarmId) -> Option<(WorkerId, Alarm)> {
        state
            .workers
            .values_mut()
            .find_map(|w| w.take(id).map(|a| (w.id(), a)))
    }

    fn retire_if_idle(&self, state: &mut PoolState, id: WorkerId) {
        if state.workers.get(&id).is_some_and(DisplayWorker::is_idle) {
            self.retire_locked(state, id);
        }
    }

    /// Purges worker `id` and cancels its task.
    fn retire_locked(&self, state: &mut PoolState, id: WorkerId) {
        if let Some(w) = state.workers.remove(&id) {
            w.terminate();
            self.bus.publish(
                Event::new(EventKind::WorkerRetired)
                    .with_worker(id)
                    .with_type_code(w.type_code().clone()),
            );
        }
    }

    #[cfg(test)]
    pub(crate) async fn with_state<R>(&self, f: impl FnOnce(&mut PoolState) -> R) -> R {
        f(&mut *self.state.lock().await)
    }
}

#[cfg(test)]
impl PoolState {
    pub(crate) fn worker_mut(&mut self, id: WorkerId) -> Option<&mut DisplayWorker> {
        self.workers.get_mut(&id)
    }
}

/// Read-only view of one display worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSnapshot {
    /// Worker id (creation order).
    pub id: WorkerId,
    /// Type this worker renders.
    pub type_code: TypeCode,
    /// Slot count.
    pub capacity: usize,
    /// Occupied slots in slot order.
    pub alarms: Vec<Alarm>,
}

impl WorkerSnapshot {
    /// Ids held by this worker, in slot order.
    pub fn alarm_ids(&self) -> Vec<AlarmId> {
        self.alarms.iter().map(|a| a.id).collect()
    }
}

/// Read-only view of the worker pool, workers in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Live workers.
    pub workers: Vec<WorkerSnapshot>,
}

impl PoolSnapshot {
    /// True if any worker holds alarm `id`.
    pub fn contains(&self, id: AlarmId) -> bool {
        self.workers.iter().any(|w| w.alarms.iter().any(|a| a.id == id))
    }

    /// Workers rendering `type_code`.
    pub fn workers_of<'a>(&'a self, type_code: &'a str) -> impl Iterator<Item = &'a WorkerSnapshot> {
        self.workers
            .iter()
            .filter(move |w| w.type_code.as_str() == type_code)
    }

    /// Total number of assigned alarms.
    pub fn alarm_count(&self) -> usize {
        self.workers.iter().map(|w| w.alarms.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
