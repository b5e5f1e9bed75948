//! Next-tick queue

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::debug;

use super::handle::TimerHandle;

/// A queued next-tick callback
struct QueuedTick {
    timer: TimerHandle,
    callback: Box<dyn FnOnce()>,
}

/// FIFO of next-tick callbacks
///
/// Drained at the start of every loop turn, before any due timer callback
/// runs. Each tick also has its own task so an otherwise idle loop still
/// gets to it.
#[derive(Clone, Default)]
pub(crate) struct TickQueue {
    queue: Rc<RefCell<VecDeque<QueuedTick>>>,
}

impl TickQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, timer: TimerHandle, callback: Box<dyn FnOnce()>) {
        self.queue.borrow_mut().push_back(QueuedTick { timer, callback });
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run the ticks queued before this call, in order
    ///
    /// Ticks queued by a running tick wait for the next drain, so a tick that
    /// reschedules itself cannot starve timers. Cancelled ticks are skipped.
    pub(crate) fn drain(&self) -> usize {
        let batch = self.len();
        let mut ran = 0;
        for _ in 0..batch {
            let Some(tick) = self.queue.borrow_mut().pop_front() else {
                break;
            };
            if tick.timer.is_cancelled() {
                continue;
            }
            tick.timer.mark_fired();
            (tick.callback)();
            tick.timer.release();
            ran += 1;
        }
        if ran > 0 {
            debug!(ran, "TickQueue::drain: ran ticks");
        }
        ran
    }
}
