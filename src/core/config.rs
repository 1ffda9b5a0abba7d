//! # Global alarm manager configuration.
//!
//! Provides [`Config`], the centralized settings for the dispatcher, the
//! worker pool and the event bus.
//!
//! ## Sentinel values
//! - `worker_capacity = 0` and `max_workers = 0` are clamped to 1
//! - `dispatch_interval` / `render_interval` of `0s` are clamped to 1ms
//!   (`tokio::time::interval` rejects a zero period)

use std::time::Duration;

/// Global configuration for the alarm manager.
///
/// ## Field semantics
/// - `dispatch_interval`: dispatcher reconciliation period
/// - `render_interval`: display worker render period
/// - `worker_capacity`: alarms one display worker may hold
/// - `max_workers`: ceiling on live display workers
/// - `message_limit`: maximum alarm message length in bytes
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using the helper accessors to
/// avoid sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Period of the dispatcher's reconciliation tick.
    ///
    /// Alarms are assigned and expired with up to one period of staleness.
    pub dispatch_interval: Duration,

    /// Period of each display worker's render pass.
    pub render_interval: Duration,

    /// Maximum number of alarms one display worker holds.
    pub worker_capacity: usize,

    /// Maximum number of live display workers across all types.
    ///
    /// When reached, unassigned alarms wait in the registry and are retried
    /// on every dispatcher tick.
    pub max_workers: usize,

    /// Maximum alarm message length in bytes; longer input is cut and flagged.
    pub message_limit: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl Config {
    /// Dispatcher period, never zero.
    #[inline]
    pub fn dispatch_period(&self) -> Duration {
        self.dispatch_interval.max(Duration::from_millis(1))
    }

    /// Render period, never zero.
    #[inline]
    pub fn render_period(&self) -> Duration {
        self.render_interval.max(Duration::from_millis(1))
    }

    /// Per-worker capacity clamped to a minimum of 1.
    #[inline]
    pub fn worker_capacity_clamped(&self) -> usize {
        self.worker_capacity.max(1)
    }

    /// Worker ceiling clamped to a minimum of 1.
    #[inline]
    pub fn max_workers_clamped(&self) -> usize {
        self.max_workers.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `dispatch_interval = 1s`
    /// - `render_interval = 5s`
    /// - `worker_capacity = 2`
    /// - `max_workers = 10`
    /// - `message_limit = 127`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            dispatch_interval: Duration::from_secs(1),
            render_interval: Duration::from_secs(5),
            worker_capacity: 2,
            max_workers: 10,
            message_limit: 127,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_are_clamped() {
        let cfg = Config {
            dispatch_interval: Duration::ZERO,
            render_interval: Duration::ZERO,
            worker_capacity: 0,
            max_workers: 0,
            message_limit: 0,
            bus_capacity: 0,
        };
        assert_eq!(cfg.dispatch_period(), Duration::from_millis(1));
        assert_eq!(cfg.render_period(), Duration::from_millis(1));
        assert_eq!(cfg.worker_capacity_clamped(), 1);
        assert_eq!(cfg.max_workers_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
