//! # Dispatcher: per-tick reconciliation of the registry against the pool.
//!
//! One dispatcher task runs for the manager's lifetime. Each tick:
//!
//! ```text
//! ┌─ registry_lock ────────────────────────────────────────────────┐
//! │ 1. classify: Expired | Unassigned-active | Assigned-active     │
//! │ 2. expired records leave the registry (owned by this tick now) │
//! │ 3. pool.release(expired ids)          (registry → pool order)  │
//! │ 4. pool.assign(alarm) for each unassigned record, mark owner   │
//! └────────────────────────────────────────────────────────────────┘
//! 5. outside any lock: AlarmExpired per expired record, then drop it
//! 6. pool.reconcile_types()             (pool_lock only)
//! 7. fix owner back-references for moved alarms (registry_lock)
//! 8. sleep until the next tick
//! ```
//!
//! ## Rules
//! - expiry is decided before assignment, so a due alarm is never assigned
//! - a record leaves the registry atomically with the decision to free it;
//!   a concurrent cancel either removed it first (and it is not seen here)
//!   or finds nothing
//! - an assignment refused at the ceiling leaves the record unassigned; it
//!   is retried every tick and reported once (`AssignmentDeferred`)

use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::alarm::{AlarmRecord, Registry};
use crate::events::{Bus, Event, EventKind};

use super::pool::WorkerPool;

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Records freed because their deadline passed.
    pub expired: usize,
    /// Records newly placed on a worker.
    pub assigned: usize,
    /// Records the pool could not take (ceiling reached).
    pub deferred: usize,
    /// Records moved to another worker after a type mismatch.
    pub reassigned: usize,
}

/// Reconciles the registry against the worker pool.
pub(crate) struct Dispatcher {
    registry: Arc<Registry>,
    pool: Arc<WorkerPool>,
    bus: Bus,
    period: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, pool: Arc<WorkerPool>, bus: Bus, period: Duration) -> Self {
        Self {
            registry,
            pool,
            bus,
            period,
        }
    }

    /// Runs ticks until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(period = ?self.period, "dispatcher started");

        loop {
            select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let report = self.tick(Instant::now()).await;
            if report != TickReport::default() {
                tracing::trace!(?report, "dispatcher tick");
            }
        }
        tracing::debug!("dispatcher stopped");
    }

    /// One reconciliation pass at `now`.
    pub async fn tick(&self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        let expired: Vec<AlarmRecord> = {
            let mut registry = self.registry.lock().await;
            let classified = registry.classify(now);
            tracing::trace!(
                expired = classified.expired.len(),
                unassigned = classified.unassigned.len(),
                assigned = classified.assigned,
                "registry classified"
            );

            let expired_ids: Vec<_> = classified.expired.iter().map(AlarmRecord::id).collect();
            self.pool.release(&expired_ids).await;

            for id in classified.unassigned {
                let Ok(record) = registry.find_mut(id) else {
                    continue;
                };
                match self.pool.assign(record.alarm().clone()).await {
                    Ok(worker) => {
                        record.mark_assigned(worker);
                        report.assigned += 1;
                    }
                    Err(e) => {
                        report.deferred += 1;
                        if record.mark_deferred() {
                            self.bus.publish(
                                Event::new(EventKind::AssignmentDeferred)
                                    .with_alarm_id(id)
                                    .with_type_code(record.alarm().type_code.clone())
                                    .with_reason(e.to_string()),
                            );
                        }
                    }
                }
            }
            classified.expired
        };

        report.expired = expired.len();
        for record in expired {
            self.bus
                .publish(Event::for_alarm(EventKind::AlarmExpired, record.alarm()));
        }

        let moves = self.pool.reconcile_types().await;
        if !moves.is_empty() {
            let mut registry = self.registry.lock().await;
            for mv in moves {
                let Ok(record) = registry.find_mut(mv.id) else {
                    continue;
                };
                match mv.result {
                    Ok(worker) => {
                        record.mark_assigned(worker);
                        report.reassigned += 1;
                    }
                    Err(_) => {
                        record.mark_unassigned();
                        record.mark_deferred();
                    }
                }
            }
        }

        report
    }
}
