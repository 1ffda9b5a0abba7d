//! # AlarmManager: the command API over the registry and the worker pool.
//!
//! The [`AlarmManager`] owns the two process-lifetime tables (registry and
//! pool), the event bus and the runtime cancellation token. Callers (a
//! command reader, a test, an embedding service) talk to it only through
//! [`submit`](AlarmManager::submit), [`modify`](AlarmManager::modify),
//! [`cancel`](AlarmManager::cancel) and [`snapshot`](AlarmManager::snapshot),
//! and receive printable [`Event`]s back.
//!
//! ## Lock order
//! ```text
//! submit    registry_lock
//! modify    registry_lock ─► pool_lock   (refresh the rendered copy)
//! cancel    registry_lock ─► pool_lock   (clear the worker slot)
//! snapshot                   pool_lock
//! ```
//! No operation sleeps or waits for the dispatcher.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use alarmvisor::{AlarmManager, Config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), alarmvisor::AlarmError> {
//!     let manager = AlarmManager::builder(Config::default()).build();
//!
//!     manager.submit(1, "wk", Duration::from_secs(30), "stand up").await?;
//!     manager.modify(1, Duration::from_secs(60), "stretch").await?;
//!
//!     // One reconciliation pass places the alarm on a fresh worker.
//!     manager.dispatch_once().await;
//!     assert!(manager.snapshot().await.contains(1));
//!
//!     manager.cancel(1).await?;
//!     assert!(!manager.snapshot().await.contains(1));
//!     manager.shutdown();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::alarm::{Alarm, AlarmId, AlarmRecord, Message, Registry, TypeCode};
use crate::error::AlarmError;
use crate::events::{Bus, Event, EventKind};

use super::builder::ManagerBuilder;
use super::config::Config;
use super::dispatcher::{Dispatcher, TickReport};
use super::pool::{PoolSnapshot, WorkerPool};

/// Concurrent alarm manager.
pub struct AlarmManager {
    cfg: Config,
    bus: Bus,
    registry: Arc<Registry>,
    pool: Arc<WorkerPool>,
    runtime_token: CancellationToken,
    started: AtomicBool,
}

impl AlarmManager {
    /// Starts building a manager with the given configuration.
    pub fn builder(cfg: Config) -> ManagerBuilder {
        ManagerBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: Config, bus: Bus, runtime_token: CancellationToken) -> Self {
        let pool = WorkerPool::new(&cfg, bus.clone(), runtime_token.clone());
        Self {
            cfg,
            bus,
            registry: Arc::new(Registry::new()),
            pool,
            runtime_token,
            started: AtomicBool::new(false),
        }
    }

    /// Spawns the dispatcher task (once; later calls are no-ops).
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let dispatcher = self.dispatcher();
        tokio::spawn(dispatcher.run(self.runtime_token.child_token()));
    }

    /// Runs one reconciliation pass now, without waiting for a tick.
    ///
    /// Useful for embedders that drive the manager from their own clock.
    pub async fn dispatch_once(&self) -> TickReport {
        self.dispatcher().tick(Instant::now()).await
    }

    /// Stops the dispatcher and every display worker.
    ///
    /// Registered alarms are dropped with the manager; nothing is persisted.
    pub fn shutdown(&self) {
        self.runtime_token.cancel();
    }

    /// True once [`shutdown`](Self::shutdown) was called or the manager dropped its token.
    pub fn is_shut_down(&self) -> bool {
        self.runtime_token.is_cancelled()
    }

    /// Registers a new alarm expiring `duration` from now.
    ///
    /// Messages longer than [`Config::message_limit`] bytes are cut and a
    /// `MessageTruncated` warning is published.
    ///
    /// # Errors
    /// - [`AlarmError::InvalidTypeCode`] if `type_code` is not 1-2 non-whitespace characters
    /// - [`AlarmError::InvalidDuration`] if `duration` overflows the deadline clock
    /// - [`AlarmError::DuplicateId`] if `id` is already registered
    pub async fn submit(
        &self,
        id: AlarmId,
        type_code: &str,
        duration: Duration,
        message: &str,
    ) -> Result<(), AlarmError> {
        let type_code: TypeCode = type_code.parse()?;
        let message = Message::new(message, self.cfg.message_limit);
        let alarm = Alarm::new(id, type_code, duration, message, Instant::now())?;

        {
            let mut registry = self.registry.lock().await;
            if registry.contains(id) {
                return Err(AlarmError::DuplicateId { id });
            }
            registry.insert(AlarmRecord::new(alarm.clone()));
        }

        if alarm.message.is_truncated() {
            self.bus.publish(
                Event::new(EventKind::MessageTruncated)
                    .with_alarm_id(id)
                    .with_reason(format!("limit={}", self.cfg.message_limit)),
            );
        }
        self.bus
            .publish(Event::for_alarm(EventKind::AlarmInserted, &alarm));
        Ok(())
    }

    /// Replaces the interval and message of alarm `id`.
    ///
    /// The deadline and type code stay as submitted. If a worker already
    /// renders the alarm, its copy is refreshed before this returns.
    ///
    /// # Errors
    /// [`AlarmError::NotFound`] if `id` is not registered.
    pub async fn modify(
        &self,
        id: AlarmId,
        duration: Duration,
        message: &str,
    ) -> Result<(), AlarmError> {
        let message = Message::new(message, self.cfg.message_limit);
        let truncated = message.is_truncated();

        let (alarm, worker) = {
            let mut registry = self.registry.lock().await;
            let record = match registry.find_mut(id) {
                Ok(record) => record,
                Err(e) => {
                    self.publish_not_found(id, "modify");
                    return Err(e);
                }
            };
            record.modify(duration, message);
            let alarm = record.alarm().clone();
            let worker = if record.is_assigned() {
                self.pool.refresh(&alarm).await
            } else {
                None
            };
            (alarm, worker)
        };

        if truncated {
            self.bus.publish(
                Event::new(EventKind::MessageTruncated)
                    .with_alarm_id(id)
                    .with_reason(format!("limit={}", self.cfg.message_limit)),
            );
        }
        let mut ev = Event::for_alarm(EventKind::AlarmChanged, &alarm);
        ev.worker = worker;
        self.bus.publish(ev);
        Ok(())
    }

    /// Removes alarm `id` from the registry and from whichever worker renders it.
    ///
    /// Both removals happen under `registry_lock`, so once this returns no
    /// [`snapshot`](Self::snapshot) shows the id again and the dispatcher
    /// cannot also expire it.
    ///
    /// # Errors
    /// [`AlarmError::NotFound`] if `id` is not registered.
    pub async fn cancel(&self, id: AlarmId) -> Result<(), AlarmError> {
        let record = {
            let mut registry = self.registry.lock().await;
            let record = match registry.remove(id) {
                Ok(record) => record,
                Err(e) => {
                    self.publish_not_found(id, "cancel");
                    return Err(e);
                }
            };
            self.pool.cancel(record.id()).await;
            record
        };

        self.bus
            .publish(Event::for_alarm(EventKind::AlarmCancelled, record.alarm()));
        Ok(())
    }

    /// Workers and their occupied slots, in worker creation order.
    pub async fn snapshot(&self) -> PoolSnapshot {
        self.pool.snapshot().await
    }

    /// Registered alarms, ascending by id (assigned or not).
    pub async fn alarms(&self) -> Vec<Alarm> {
        let registry = self.registry.lock().await;
        registry.iter().map(|r| r.alarm().clone()).collect()
    }

    /// New receiver for every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.pool),
            self.bus.clone(),
            self.cfg.dispatch_period(),
        )
    }

    fn publish_not_found(&self, id: AlarmId, command: &'static str) {
        self.bus.publish(
            Event::new(EventKind::AlarmNotFound)
                .with_alarm_id(id)
                .with_reason(command),
        );
    }
}

impl Drop for AlarmManager {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}
