//! Recluster Scheduler
//!
//! Coordinates concurrent recluster requests through a small state
//! machine: `Idle -> Pending -> Running -> Cooldown -> Idle`.
//!
//! - `request()` from Idle or Cooldown enters Pending and (re)starts the
//!   debounce timer; repeated requests while Pending only reset it.
//! - On expiry the single run loop acquires the single-flight lock and
//!   executes the full pass. Requests that arrive mid-run set a
//!   pending-again flag instead of starting a second execution.
//! - After a run the scheduler re-enters Pending if pending-again was
//!   set, otherwise it cools down; requests during cooldown are
//!   recorded and honored when the cooldown lapses.
//!
//! Guarantees: at most one pass executes at any instant, and no request
//! is silently dropped; it runs, merges into the pending batch, or is
//! deferred to the next cycle. There is no mid-run cancellation.

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Scheduler states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Pending,
    Running,
    Cooldown,
}

impl SchedulerState {
    /// Valid state-machine transitions
    pub fn can_transition_to(&self, target: SchedulerState) -> bool {
        matches!(
            (self, target),
            (SchedulerState::Idle, SchedulerState::Pending)
                | (SchedulerState::Pending, SchedulerState::Running)
                | (SchedulerState::Running, SchedulerState::Pending)
                | (SchedulerState::Running, SchedulerState::Cooldown)
                | (SchedulerState::Cooldown, SchedulerState::Pending)
                | (SchedulerState::Cooldown, SchedulerState::Idle)
        )
    }
}

/// Timing configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Debounce window before a requested pass starts
    pub debounce: Duration,
    /// Cooldown after a completed pass
    pub cooldown: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            cooldown: Duration::from_secs(5),
        }
    }
}

pub struct ReclusterScheduler {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    /// Bumped by every request; the debounce loop waits until a full
    /// window passes with no bump
    generation: AtomicU64,
    /// Request arrived while Running
    pending_again: AtomicBool,
    /// Request arrived while Cooldown
    requested_in_cooldown: AtomicBool,
    /// Wakes the run loop when a request opens a new cycle
    notify: Notify,
    /// Single-flight lock around the running pass
    run_lock: tokio::sync::Mutex<()>,
    /// Completed passes (observable for tests and status reporting)
    completed_runs: AtomicU64,
}

impl ReclusterScheduler {
    pub fn new(config: SchedulerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(SchedulerState::Idle),
            generation: AtomicU64::new(0),
            pending_again: AtomicBool::new(false),
            requested_in_cooldown: AtomicBool::new(false),
            notify: Notify::new(),
            run_lock: tokio::sync::Mutex::new(()),
            completed_runs: AtomicU64::new(0),
        })
    }

    /// Request a recluster. Callable from any task at any time.
    pub fn request(&self) {
        let mut state = self.state.lock();
        match *state {
            SchedulerState::Idle => {
                *state = SchedulerState::Pending;
                self.generation.fetch_add(1, Ordering::SeqCst);
                self.notify.notify_one();
            }
            SchedulerState::Pending => {
                // Only resets the debounce timer
                self.generation.fetch_add(1, Ordering::SeqCst);
            }
            SchedulerState::Running => {
                self.pending_again.store(true, Ordering::SeqCst);
            }
            SchedulerState::Cooldown => {
                self.requested_in_cooldown.store(true, Ordering::SeqCst);
            }
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    pub fn completed_runs(&self) -> u64 {
        self.completed_runs.load(Ordering::SeqCst)
    }

    /// Drive the scheduler forever, invoking `job` for every pass.
    /// The job is the full clustering + synchronization + reconciliation
    /// pipeline; it always runs to completion once started.
    pub async fn run<F, Fut>(self: Arc<Self>, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            if self.state() != SchedulerState::Pending {
                self.notify.notified().await;
            }
            if self.state() != SchedulerState::Pending {
                continue;
            }

            // Debounce: wait until a full window passes with no new request
            loop {
                let gen = self.generation.load(Ordering::SeqCst);
                tokio::time::sleep(self.config.debounce).await;
                if self.generation.load(Ordering::SeqCst) == gen {
                    break;
                }
            }

            {
                let _flight = self.run_lock.lock().await;
                self.set_state(SchedulerState::Running);
                self.pending_again.store(false, Ordering::SeqCst);

                job().await;

                self.completed_runs.fetch_add(1, Ordering::SeqCst);
            }

            if self.pending_again.swap(false, Ordering::SeqCst) {
                // Changes arrived mid-run; catch them with a fresh cycle
                self.set_state(SchedulerState::Pending);
                continue;
            }

            self.set_state(SchedulerState::Cooldown);
            tokio::time::sleep(self.config.cooldown).await;

            // Flags are re-read under the state lock so a request landing
            // right at the transition is deferred, never dropped
            let mut state = self.state.lock();
            let follow_up = self.requested_in_cooldown.swap(false, Ordering::SeqCst)
                || self.pending_again.swap(false, Ordering::SeqCst);
            *state = if follow_up {
                SchedulerState::Pending
            } else {
                SchedulerState::Idle
            };
            drop(state);
        }
    }

    fn set_state(&self, target: SchedulerState) {
        let mut state = self.state.lock();
        debug_assert!(
            state.can_transition_to(target),
            "invalid scheduler transition {:?} -> {:?}",
            *state,
            target
        );
        *state = target;
    }
}
