//! Event loop implementation

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use eyre::Context;
use tokio::runtime::{Builder, Runtime};
use tokio::task::LocalSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::TickError;
use crate::promise::{Outcome, Promise};

use super::config::{ClockMode, LoopConfig};
use super::handle::{TimerHandle, TimerKind, Tracker};
use super::tick::TickQueue;

/// Deadline used when `now + delay` overflows the clock (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Internal state shared by all handles to one loop
struct LoopInner {
    config: LoopConfig,

    /// Spawned timer tasks; declared before the runtime so it drops first
    local: LocalSet,

    runtime: Runtime,

    /// Live tasks and the stop flag
    tracker: Rc<Tracker>,

    /// Next-tick callbacks, run ahead of due timers
    ticks: TickQueue,

    running: Cell<bool>,
    next_id: Cell<u64>,
}

/// Single-threaded event loop
///
/// A tokio current-thread runtime driving a `LocalSet`. Callbacks are
/// scheduled with [`schedule_once`](Self::schedule_once),
/// [`schedule_repeating`](Self::schedule_repeating) and
/// [`schedule_next_tick`](Self::schedule_next_tick), and only run while
/// [`run`](Self::run) or [`wait`](Self::wait) drive the loop. Clones share
/// the same loop.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

/// Clears the running flag when a run ends, even by unwinding
struct RunGuard<'a>(&'a Cell<bool>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl EventLoop {
    /// Create a new event loop with the given configuration
    pub fn new(config: LoopConfig) -> eyre::Result<Self> {
        debug!(?config, "EventLoop::new: called");
        let mut builder = Builder::new_current_thread();
        builder.enable_all();
        if config.clock == ClockMode::Paused {
            debug!("EventLoop::new: starting with paused clock");
            builder.start_paused(true);
        }
        let runtime = builder.build().context("Failed to build tokio runtime")?;

        Ok(Self {
            inner: Rc::new(LoopInner {
                config,
                local: LocalSet::new(),
                runtime,
                tracker: Tracker::new(),
                ticks: TickQueue::new(),
                running: Cell::new(false),
                next_id: Cell::new(1),
            }),
        })
    }

    /// Loop configuration
    pub fn config(&self) -> &LoopConfig {
        &self.inner.config
    }

    /// Current loop time
    pub fn now(&self) -> Instant {
        let _enter = self.inner.runtime.enter();
        Instant::now()
    }

    /// Check if `run` or `wait` is currently driving the loop
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Number of scheduled callbacks still holding the loop open
    pub fn pending(&self) -> usize {
        self.inner.tracker.live()
    }

    /// `delay` from now, saturating far in the future instead of overflowing
    fn deadline(&self, delay: Duration) -> Instant {
        let now = self.now();
        now.checked_add(delay)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now)
    }

    fn new_handle(&self, kind: TimerKind) -> TimerHandle {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        TimerHandle::new(id, kind, &self.inner.tracker)
    }

    fn spawn<F>(&self, handle: &TimerHandle, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        let join = self.inner.local.spawn_local(task);
        handle.set_abort(join.abort_handle());
    }

    /// Run `f` once, `delay` from now
    pub fn schedule_once<F>(&self, delay: Duration, f: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        let handle = self.new_handle(TimerKind::Once);
        let deadline = self.deadline(delay);
        debug!(timer_id = handle.id(), ?delay, "EventLoop::schedule_once: called");

        let timer = handle.clone();
        let ticks = self.inner.ticks.clone();
        self.spawn(&handle, async move {
            let _live = timer.live_guard();
            tokio::time::sleep_until(deadline).await;
            ticks.drain();
            if timer.is_cancelled() {
                return;
            }
            timer.mark_fired();
            f();
        });
        handle
    }

    /// Run `f` every `interval`, starting one interval from now
    ///
    /// `f` receives the timer's own handle so it can cancel itself.
    pub fn schedule_repeating<F>(&self, interval: Duration, mut f: F) -> TimerHandle
    where
        F: FnMut(&TimerHandle) + 'static,
    {
        let interval = interval.clamp(self.inner.config.min_interval(), FAR_FUTURE);
        let handle = self.new_handle(TimerKind::Repeating);
        let start = self.deadline(interval);
        debug!(timer_id = handle.id(), ?interval, "EventLoop::schedule_repeating: called");

        let timer = handle.clone();
        let ticks = self.inner.ticks.clone();
        self.spawn(&handle, async move {
            let _live = timer.live_guard();
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                ticks.drain();
                if timer.is_cancelled() {
                    break;
                }
                timer.mark_fired();
                f(&timer);
                if timer.is_cancelled() {
                    break;
                }
            }
        });
        handle
    }

    /// Run `f` on the next loop iteration
    ///
    /// Queued ticks run in order, ahead of any timer callback due on the same
    /// turn.
    pub fn schedule_next_tick<F>(&self, f: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        let handle = self.new_handle(TimerKind::Tick);
        debug!(timer_id = handle.id(), "EventLoop::schedule_next_tick: called");
        self.inner.ticks.push(handle.clone(), Box::new(f));

        let timer = handle.clone();
        let ticks = self.inner.ticks.clone();
        self.spawn(&handle, async move {
            let _live = timer.live_guard();
            ticks.drain();
        });
        handle
    }

    /// Cancel a scheduled callback
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        handle.cancel()
    }

    /// Ask a running loop to return from `run`
    pub fn stop(&self) {
        debug!(running = self.is_running(), "EventLoop::stop: called");
        self.inner.tracker.stop();
    }

    fn enter_run(&self) -> Result<RunGuard<'_>, TickError> {
        if self.inner.running.replace(true) {
            return Err(TickError::LoopRunning);
        }
        self.inner.tracker.reset_stop();
        Ok(RunGuard(&self.inner.running))
    }

    /// Drive the loop until nothing is scheduled or `stop` is called
    pub fn run(&self) -> Result<(), TickError> {
        debug!(pending = self.pending(), "EventLoop::run: called");
        let _running = self.enter_run()?;
        let started = self.now();

        let tracker = &self.inner.tracker;
        self.inner
            .runtime
            .block_on(self.inner.local.run_until(tracker.drained()));

        info!(
            elapsed = ?self.now().duration_since(started),
            stopped = tracker.is_stopped(),
            pending = tracker.live(),
            "Event loop returned"
        );
        Ok(())
    }

    /// Drive the loop until `promise` settles and return its outcome
    ///
    /// Only valid while the loop is idle. With a timeout (explicit, or the
    /// configured default) the run ends with [`TickError::Timeout`] when it
    /// elapses first. A `stop()` while the promise is still pending ends the
    /// run with [`TickError::Stalled`], and so does a loop that drains when
    /// no timeout is set.
    pub fn wait<T>(&self, promise: &Promise<T>, timeout: Option<Duration>) -> Outcome<T>
    where
        T: Clone + 'static,
    {
        let timeout = timeout.or_else(|| self.inner.config.wait_timeout());
        debug!(?timeout, ?promise, "EventLoop::wait: called");
        let _running = self.enter_run()?;

        let promise = promise.clone();
        let tracker = &self.inner.tracker;
        let limit = timeout.map(|limit| (limit, self.deadline(limit)));
        let outcome = self.inner.runtime.block_on(self.inner.local.run_until(async move {
            match limit {
                Some((limit, deadline)) => {
                    tokio::select! {
                        biased;
                        outcome = promise => outcome,
                        _ = tracker.stopped() => Err(TickError::Stalled),
                        _ = tokio::time::sleep_until(deadline) => Err(TickError::Timeout(limit)),
                    }
                }
                None => {
                    tokio::select! {
                        biased;
                        outcome = promise => outcome,
                        _ = tracker.drained() => Err(TickError::Stalled),
                    }
                }
            }
        }));

        debug!(ok = outcome.is_ok(), "EventLoop::wait: finished");
        outcome
    }
}
