//! Deferred actions
//!
//! The collector never sleeps itself; it hands a callback and a delay to a
//! `Scheduler`. Production uses the tokio timer, tests drive a
//! `ManualScheduler` by hand.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Action run once when its delay elapses
pub type DeferredAction = Box<dyn FnOnce() + Send + 'static>;

/// Deferred-action scheduler
///
/// Scheduled actions cannot be cancelled.
pub trait Scheduler: Send + Sync + 'static {
    /// Run `action` once, `delay` from now
    fn schedule(&self, delay: Duration, action: DeferredAction);
}

/// Scheduler backed by `tokio::time::sleep`
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, action: DeferredAction) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });
    }
}

struct PendingAction {
    due: Duration,
    seq: u64,
    action: DeferredAction,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingAction>,
}

/// Scheduler with a virtual clock advanced explicitly
///
/// Clones share the same clock and queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of actions not yet fired
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Move the clock forward and fire every action that became due,
    /// earliest deadline first (ties in scheduling order).
    ///
    /// Actions run without the internal lock held, so they may schedule
    /// further actions; those fire in the same call if already due.
    /// Returns the number of actions fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = {
            let mut state = self.lock();
            state.now += by;
            state.now
        };

        let mut fired = 0;
        while let Some(action) = self.pop_due(target) {
            action();
            fired += 1;
        }
        fired
    }

    fn pop_due(&self, target: Duration) -> Option<DeferredAction> {
        let mut state = self.lock();
        let idx = state
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= target)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(idx, _)| idx)?;
        Some(state.pending.swap_remove(idx).action)
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, action: DeferredAction) {
        let mut state = self.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(PendingAction { due, seq, action });
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}
