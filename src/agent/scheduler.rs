//! Delayed, cancellable callbacks for pacing agent replies.
//!
//! [`ManualScheduler`] runs on a virtual clock that only moves when
//! [`ManualScheduler::advance`] is called. [`ThreadScheduler`] waits on the
//! wall clock, one worker thread per pending callback.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::error::CompanionError;

/// Work to run once a delay has elapsed.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

pub trait TurnScheduler: Send + Sync {
    /// Run `callback` once, after `delay`, unless cancelled first.
    ///
    /// Fails with [`CompanionError::SchedulerUnavailable`] when the callback
    /// could not be armed; it will then never run.
    fn after(&self, delay: Duration, callback: Callback) -> Result<(), CompanionError>;

    /// Drop every callback that has not fired yet.
    ///
    /// Once this returns, no previously scheduled callback runs.
    fn cancel_all(&self);
}

// ---------------------------------------------------------------------------
// Virtual clock
// ---------------------------------------------------------------------------

struct Timer {
    deadline: Duration,
    seq: u64,
    callback: Callback,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    timers: Vec<Timer>,
}

/// Scheduler driven by an explicit virtual clock.
///
/// Meant to be advanced from a single thread; callbacks run on the thread
/// that calls [`ManualScheduler::advance`].
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on the virtual clock.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of callbacks waiting to fire.
    pub fn pending(&self) -> usize {
        self.lock().timers.len()
    }

    /// Move the clock forward, firing every callback that falls due.
    ///
    /// Callbacks fire in deadline order, ties in scheduling order. A callback
    /// may schedule more work; it fires in this call if it is due by the new
    /// time. Returns the number of callbacks fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now + by;
        let mut fired = 0;
        loop {
            let callback = {
                let mut state = self.lock();
                let next = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(_, t)| (t.deadline, t.seq))
                    .map(|(i, _)| i);
                match next {
                    Some(i) => {
                        let timer = state.timers.remove(i);
                        state.now = timer.deadline;
                        timer.callback
                    }
                    None => {
                        state.now = target;
                        break;
                    }
                }
            };
            // Lock released so the callback can schedule again.
            callback();
            fired += 1;
        }
        fired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TurnScheduler for ManualScheduler {
    fn after(&self, delay: Duration, callback: Callback) -> Result<(), CompanionError> {
        let mut state = self.lock();
        let deadline = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.timers.push(Timer {
            deadline,
            seq,
            callback,
        });
        Ok(())
    }

    fn cancel_all(&self) {
        let dropped = std::mem::take(&mut self.lock().timers);
        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), "cancelled pending callbacks");
        }
    }
}

// ---------------------------------------------------------------------------
// Wall clock
// ---------------------------------------------------------------------------

/// Scheduler that waits on the wall clock in detached worker threads.
///
/// `cancel_all` bumps an epoch and wakes every worker; workers armed under an
/// older epoch exit without running their callback. Callbacks run while
/// holding the run gate, so `cancel_all` waits for one already running and
/// a callback must not call `cancel_all` itself.
#[derive(Default)]
pub struct ThreadScheduler {
    epoch: Arc<(Mutex<u64>, Condvar)>,
    gate: Arc<Mutex<()>>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TurnScheduler for ThreadScheduler {
    fn after(&self, delay: Duration, callback: Callback) -> Result<(), CompanionError> {
        let shared = Arc::clone(&self.epoch);
        let gate = Arc::clone(&self.gate);
        let armed = *shared.0.lock().unwrap_or_else(PoisonError::into_inner);

        std::thread::Builder::new()
            .name("companion-reply".into())
            .spawn(move || {
                let (lock, cvar) = &*shared;
                let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                let (guard, _) = cvar
                    .wait_timeout_while(guard, delay, |epoch| *epoch == armed)
                    .unwrap_or_else(PoisonError::into_inner);
                drop(guard);

                // Lock order: gate, then epoch.
                let _running = gate.lock().unwrap_or_else(PoisonError::into_inner);
                if *lock.lock().unwrap_or_else(PoisonError::into_inner) != armed {
                    tracing::trace!("{}", CompanionError::SchedulerAlreadyCancelled);
                    return;
                }
                callback();
            })
            .map(drop)
            .map_err(|e| {
                tracing::error!("failed to spawn reply timer: {e}");
                CompanionError::SchedulerUnavailable(e.to_string())
            })
    }

    fn cancel_all(&self) {
        let _running = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let (lock, cvar) = &*self.epoch;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        cvar.notify_all();
    }
}
