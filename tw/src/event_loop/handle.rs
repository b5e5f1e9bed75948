//! Timer handles and live-task tracking

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tracing::debug;

/// Kind of scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Once,
    Repeating,
    Tick,
}

/// Counts tasks that keep the loop alive
///
/// `run()` returns once this drops to zero or a stop was requested.
pub(crate) struct Tracker {
    live: Cell<usize>,
    stopped: Cell<bool>,
    notify: Notify,
}

impl Tracker {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            live: Cell::new(0),
            stopped: Cell::new(false),
            notify: Notify::new(),
        })
    }

    pub(crate) fn live(&self) -> usize {
        self.live.get()
    }

    fn acquire(&self) {
        self.live.set(self.live.get() + 1);
    }

    fn release(&self) {
        let live = self.live.get().saturating_sub(1);
        self.live.set(live);
        if live == 0 {
            self.notify.notify_one();
        }
    }

    pub(crate) fn stop(&self) {
        self.stopped.set(true);
        self.notify.notify_one();
    }

    pub(crate) fn reset_stop(&self) {
        self.stopped.set(false);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Resolve once the loop has nothing left to do or was stopped
    pub(crate) async fn drained(&self) {
        while !self.is_stopped() && self.live() > 0 {
            self.notify.notified().await;
        }
    }

    /// Resolve once a stop was requested
    pub(crate) async fn stopped(&self) {
        while !self.is_stopped() {
            self.notify.notified().await;
        }
    }
}

struct TimerState {
    id: u64,
    kind: TimerKind,
    cancelled: Cell<bool>,
    fired: Cell<bool>,
    live: Cell<bool>,
    abort: RefCell<Option<AbortHandle>>,
    tracker: Rc<Tracker>,
}

impl TimerState {
    fn release(&self) {
        if self.live.replace(false) {
            self.tracker.release();
        }
    }
}

/// Reference to a scheduled callback
///
/// Clones refer to the same timer. Cancelling is idempotent, and cancelling a
/// one-shot timer or tick that already fired does nothing.
#[derive(Clone)]
pub struct TimerHandle {
    state: Rc<TimerState>,
}

impl TimerHandle {
    pub(crate) fn new(id: u64, kind: TimerKind, tracker: &Rc<Tracker>) -> Self {
        tracker.acquire();
        Self {
            state: Rc::new(TimerState {
                id,
                kind,
                cancelled: Cell::new(false),
                fired: Cell::new(false),
                live: Cell::new(true),
                abort: RefCell::new(None),
                tracker: Rc::clone(tracker),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.state.id
    }

    pub fn kind(&self) -> TimerKind {
        self.state.kind
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.get()
    }

    /// True once the callback has started at least once
    pub fn has_fired(&self) -> bool {
        self.state.fired.get()
    }

    /// True while the timer can still run its callback
    pub fn is_active(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        match self.kind() {
            TimerKind::Repeating => self.state.live.get(),
            TimerKind::Once | TimerKind::Tick => !self.has_fired(),
        }
    }

    /// Cancel the timer; returns true if this call stopped it
    pub fn cancel(&self) -> bool {
        let state = &self.state;
        if state.cancelled.get() {
            return false;
        }
        if state.kind != TimerKind::Repeating && state.fired.get() {
            debug!(timer_id = state.id, kind = ?state.kind, "TimerHandle::cancel: already fired, ignoring");
            return false;
        }

        debug!(timer_id = state.id, kind = ?state.kind, "TimerHandle::cancel: cancelling");
        state.cancelled.set(true);
        if let Some(abort) = state.abort.borrow_mut().take() {
            abort.abort();
        }
        state.release();
        true
    }

    pub(crate) fn set_abort(&self, abort: AbortHandle) {
        *self.state.abort.borrow_mut() = Some(abort);
    }

    pub(crate) fn mark_fired(&self) {
        self.state.fired.set(true);
    }

    /// Release the timer's hold on the loop without cancelling it
    pub(crate) fn release(&self) {
        self.state.release();
    }

    /// Guard that releases the timer's hold on the loop when dropped
    pub(crate) fn live_guard(&self) -> LiveGuard {
        LiveGuard(self.clone())
    }
}

impl PartialEq for TimerHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for TimerHandle {}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.state.id)
            .field("kind", &self.state.kind)
            .field("cancelled", &self.state.cancelled.get())
            .field("fired", &self.state.fired.get())
            .finish()
    }
}

/// Held by a timer's task; dropping it (completion or abort) frees the loop
pub(crate) struct LiveGuard(TimerHandle);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.state.release();
    }
}
