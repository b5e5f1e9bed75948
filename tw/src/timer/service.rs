//! Timer service with callback error containment

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Operation, TickError};
use crate::event_loop::{EventLoop, TimerHandle};
use crate::promise::{Deferred, Outcome, Promise};

/// Invoke a user callback, turning errors and panics into a [`TickError`]
pub(crate) fn contain<T, F>(f: F) -> Outcome<T>
where
    F: FnOnce() -> eyre::Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(report)) => Err(TickError::from(report)),
        Err(payload) => Err(TickError::from_panic(payload)),
    }
}

/// Timing primitives over an [`EventLoop`]
///
/// Every callback runs behind an error boundary: nothing a callback returns
/// or panics with reaches the loop.
#[derive(Clone)]
pub struct TimerService {
    event_loop: EventLoop,
}

impl TimerService {
    /// Create a timer service on the given loop
    pub fn new(event_loop: &EventLoop) -> Self {
        Self {
            event_loop: event_loop.clone(),
        }
    }

    /// The loop this service schedules on
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Run `f` once after `delay`; its failure is dropped
    pub fn after<F>(&self, delay: Duration, f: F) -> TimerHandle
    where
        F: FnOnce() -> eyre::Result<()> + 'static,
    {
        debug!(?delay, "TimerService::after: called");
        self.event_loop.schedule_once(delay, move || {
            if let Err(e) = contain(f) {
                debug!(error = %e, "TimerService::after: callback failed, ignoring");
            }
        })
    }

    /// Run `f` every `interval` until cancelled
    ///
    /// `f` receives the timer's handle as its argument. If `f` fails once,
    /// the timer is cancelled and never runs `f` again.
    pub fn every<F>(&self, interval: Duration, mut f: F) -> TimerHandle
    where
        F: FnMut(&TimerHandle) -> eyre::Result<()> + 'static,
    {
        debug!(?interval, "TimerService::every: called");
        self.event_loop.schedule_repeating(interval, move |timer| {
            if let Err(e) = contain(|| f(timer)) {
                warn!(timer_id = timer.id(), error = %e, "Repeating callback failed, cancelling timer");
                timer.cancel();
            }
        })
    }

    /// Cancel a timer; safe to call on fired or cancelled timers
    pub fn cancel(&self, timer: &TimerHandle) -> bool {
        debug!(timer_id = timer.id(), "TimerService::cancel: called");
        self.event_loop.cancel(timer)
    }

    /// Run `f` on the next loop iteration
    ///
    /// The promise resolves with `f`'s value or rejects with its failure.
    /// Cancelling it before the tick keeps `f` from running and rejects with
    /// a `nextTick` cancellation.
    pub fn next_tick<T, F>(&self, f: F) -> Promise<T>
    where
        T: Clone + 'static,
        F: FnOnce() -> eyre::Result<T> + 'static,
    {
        debug!("TimerService::next_tick: called");
        let runnable = Rc::new(Cell::new(true));

        let guard = runnable.clone();
        let deferred = Deferred::with_canceller(move |d: &Deferred<T>| {
            guard.set(false);
            d.reject(TickError::cancelled(Operation::NextTick));
        });

        let settler = deferred.clone();
        self.event_loop.schedule_next_tick(move || {
            if !runnable.get() {
                debug!("TimerService::next_tick: cancelled before tick, skipping");
                return;
            }
            settler.settle(contain(f));
        });
        deferred.promise()
    }
}
