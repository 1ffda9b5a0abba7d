use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::{
    core::config::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

use super::manager::AlarmManager;

/// Builder for constructing an [`AlarmManager`] with optional subscribers.
pub struct ManagerBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ManagerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive every alarm event through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the manager: bus, registry, pool and (if any) the subscriber fan-out.
    ///
    /// The dispatcher is not running yet; call [`AlarmManager::start`] or
    /// drive it with [`AlarmManager::dispatch_once`]. Must be called inside a
    /// tokio runtime when subscribers are configured.
    pub fn build(self) -> Arc<AlarmManager> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let subs = SubscriberSet::new(self.subscribers, bus.clone());
            spawn_subscriber_listener(&bus, subs, runtime_token.clone());
        }

        Arc::new(AlarmManager::new_internal(self.cfg, bus, runtime_token))
    }
}

/// Forwards bus events to the subscriber set until the runtime token is cancelled.
fn spawn_subscriber_listener(bus: &Bus, subs: SubscriberSet, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit(&ev),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                }
            }
        }
        // Drain events still queued for subscribers.
        while let Ok(ev) = rx.try_recv() {
            subs.emit(&ev);
        }
        subs.shutdown().await;
    });
}
