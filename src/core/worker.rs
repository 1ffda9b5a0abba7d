//! # DisplayWorker: one task rendering up to `capacity` alarms of one type.
//!
//! The worker's *state* ([`DisplayWorker`]) lives inside the pool, under
//! `pool_lock`; the worker's *task* ([`run`]) only holds its id and a
//! cancellation token, and re-enters the pool on every tick.
//!
//! ## Loop
//! ```text
//! loop {
//!   ├─► wait for tick (render_period) or token cancelled ─► exit
//!   └─► pool.render(id, now)              (takes pool_lock only)
//!         ├─ due slot      ─► AlarmDisplayExpired, clear slot
//!         ├─ active slot   ─► AlarmDisplayed
//!         ├─ none left     ─► retire (WorkerRetired) ─► exit
//!         └─ id not found  ─► already retired          ─► exit
//! }
//! ```
//!
//! ## Rules
//! - `active` always equals the number of occupied slots
//! - a worker that drops to zero alarms is purged from the pool and its
//!   token cancelled in the same critical section; it is never reused

use std::sync::Arc;

use tokio::select;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::alarm::{Alarm, AlarmId, TypeCode, WorkerId};

use super::pool::WorkerPool;

/// Pool-side state of one display worker.
#[derive(Debug)]
pub(crate) struct DisplayWorker {
    id: WorkerId,
    type_code: TypeCode,
    slots: Vec<Option<Alarm>>,
    active: usize,
    token: CancellationToken,
}

impl DisplayWorker {
    pub fn new(id: WorkerId, type_code: TypeCode, capacity: usize, token: CancellationToken) -> Self {
        Self {
            id,
            type_code,
            slots: vec![None; capacity],
            active: 0,
            token,
        }
    }

    #[inline]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    #[inline]
    pub fn type_code(&self) -> &TypeCode {
        &self.type_code
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.active == 0
    }

    /// True if this worker can take another alarm of `type_code`.
    pub fn accepts(&self, type_code: &TypeCode) -> bool {
        &self.type_code == type_code && self.active < self.slots.len()
    }

    /// Puts `alarm` in the first free slot. Caller checks [`accepts`](Self::accepts).
    pub fn place(&mut self, alarm: Alarm) -> bool {
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(alarm);
                self.active += 1;
                true
            }
            None => false,
        }
    }

    /// Clears the slot holding `id`, returning its alarm.
    pub fn take(&mut self, id: AlarmId) -> Option<Alarm> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|a| a.id == id))?;
        self.active -= 1;
        slot.take()
    }

    /// Mutable access to the alarm held for `id`.
    pub fn get_mut(&mut self, id: AlarmId) -> Option<&mut Alarm> {
        self.slots.iter_mut().flatten().find(|a| a.id == id)
    }

    /// Clears every slot whose alarm no longer matches this worker's type.
    pub fn take_mismatched(&mut self) -> Vec<Alarm> {
        let mut out = Vec::new();
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|a| a.type_code != self.type_code) {
                out.extend(slot.take());
            }
        }
        self.active -= out.len();
        out
    }

    /// Clears every slot that is due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<Alarm> {
        let mut out = Vec::new();
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|a| a.is_due(now)) {
                out.extend(slot.take());
            }
        }
        self.active -= out.len();
        out
    }

    /// Occupied slots in slot order.
    pub fn alarms(&self) -> impl Iterator<Item = &Alarm> {
        self.slots.iter().flatten()
    }

    /// Marks the worker terminal; its task exits at the next wakeup.
    pub fn terminate(&self) {
        self.token.cancel();
    }

    #[cfg(test)]
    pub(crate) fn slots_mut(&mut self) -> &mut [Option<Alarm>] {
        &mut self.slots
    }
}

/// What the worker task should do after a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderOutcome {
    /// Still holds alarms; sleep until the next tick.
    Active,
    /// Dropped to zero alarms during this pass and left the pool.
    Retired,
    /// No longer in the pool (retired by a cancel or an expiry release).
    Gone,
}

/// Display worker task body.
///
/// Exits when the pool reports it retired or gone, or when `token` is
/// cancelled (retirement by another path, or manager shutdown).
pub(crate) async fn run(pool: Arc<WorkerPool>, id: WorkerId, token: CancellationToken) {
    let mut ticker = time::interval(pool.render_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match pool.render(id, Instant::now()).await {
            RenderOutcome::Active => continue,
            RenderOutcome::Retired | RenderOutcome::Gone => break,
        }
    }
    tracing::trace!(worker = id.get(), "display worker exited");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::alarm::Message;

    fn alarm(id: AlarmId, ty: &str, secs: u64, now: Instant) -> Alarm {
        Alarm::new(
            id,
            ty.parse().unwrap(),
            Duration::from_secs(secs),
            Message::new("m", 127),
            now,
        )
        .unwrap()
    }

    fn worker(ty: &str) -> DisplayWorker {
        DisplayWorker::new(WorkerId(1), ty.parse().unwrap(), 2, CancellationToken::new())
    }

    #[test]
    fn capacity_is_enforced() {
        let now = Instant::now();
        let mut w = worker("wk");
        let wk: TypeCode = "wk".parse().unwrap();
        assert!(w.accepts(&wk));
        assert!(w.place(alarm(1, "wk", 10, now)));
        assert!(w.place(alarm(2, "wk", 10, now)));
        assert!(!w.accepts(&wk));
        assert!(!w.place(alarm(3, "wk", 10, now)));
        assert_eq!(w.active(), 2);
    }

    #[test]
    fn other_types_are_not_accepted() {
        let w = worker("wk");
        assert!(!w.accepts(&"xy".parse().unwrap()));
    }

    #[test]
    fn take_frees_the_slot_for_reuse() {
        let now = Instant::now();
        let mut w = worker("wk");
        w.place(alarm(1, "wk", 10, now));
        w.place(alarm(2, "wk", 10, now));
        assert_eq!(w.take(1).map(|a| a.id), Some(1));
        assert!(w.take(1).is_none());
        assert_eq!(w.active(), 1);
        w.place(alarm(3, "wk", 10, now));
        let ids: Vec<_> = w.alarms().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn take_due_and_mismatched_keep_count_in_sync() {
        let now = Instant::now();
        let mut w = worker("wk");
        w.place(alarm(1, "wk", 1, now));
        w.place(alarm(2, "wk", 10, now));
        let due = w.take_due(now + Duration::from_secs(1));
        assert_eq!(due.len(), 1);
        assert_eq!(w.active(), 1);

        w.slots_mut()[1].as_mut().unwrap().type_code = "zz".parse().unwrap();
        let moved = w.take_mismatched();
        assert_eq!(moved.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2]);
        assert!(w.is_idle());
    }

    #[test]
    fn terminate_cancels_the_token() {
        let token = CancellationToken::new();
        let w = DisplayWorker::new(WorkerId(4), "wk".parse().unwrap(), 2, token.clone());
        w.terminate();
        assert!(token.is_cancelled());
    }
}
