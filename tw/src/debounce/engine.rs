//! Debounce engine implementation

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Operation, TickError};
use crate::event_loop::TimerHandle;
use crate::identity::identity_of;
use crate::promise::{Deferred, Promise};
use crate::timer::{TimerService, contain};

/// Registry entry for a pending burst
struct DebounceEntry<T> {
    id: u64,
    promise: Promise<T>,
    deferred: Deferred<T>,
    timer: TimerHandle,
}

/// Per-key debounce
///
/// Each call for a key restarts that key's timer with a fresh `delay`. When a
/// timer finally fires, the callback from the most recent call runs once and
/// settles the promise every caller in the burst received.
pub struct DebounceEngine<T> {
    timers: TimerService,
    registry: Rc<RefCell<HashMap<String, DebounceEntry<T>>>>,
    next_id: Rc<Cell<u64>>,
}

impl<T> Clone for DebounceEngine<T> {
    fn clone(&self) -> Self {
        Self {
            timers: self.timers.clone(),
            registry: Rc::clone(&self.registry),
            next_id: Rc::clone(&self.next_id),
        }
    }
}

impl<T: Clone + 'static> DebounceEngine<T> {
    /// Create a debounce engine with an empty registry
    pub fn new(timers: &TimerService) -> Self {
        debug!("DebounceEngine::new: called");
        Self {
            timers: timers.clone(),
            registry: Rc::new(RefCell::new(HashMap::new())),
            next_id: Rc::new(Cell::new(1)),
        }
    }

    fn schedule<F>(&self, delay: Duration, deferred: &Deferred<T>, callback: F) -> TimerHandle
    where
        F: FnOnce() -> eyre::Result<T> + 'static,
    {
        let settler = deferred.clone();
        self.timers.after(delay, move || {
            settler.settle(contain(callback));
            Ok(())
        })
    }

    /// Debounce `callback` under `key`
    ///
    /// Restarts the timer for `key` and returns the promise shared by the
    /// current burst, creating both if `key` has nothing pending.
    pub fn debounce_by_id<F>(&self, key: impl Into<String>, delay: Duration, callback: F) -> Promise<T>
    where
        F: FnOnce() -> eyre::Result<T> + 'static,
    {
        let key = key.into();
        debug!(%key, ?delay, "DebounceEngine::debounce_by_id: called");

        let pending = self
            .registry
            .borrow()
            .get(&key)
            .map(|entry| (entry.promise.clone(), entry.deferred.clone(), entry.timer.clone()));

        if let Some((promise, deferred, stale)) = pending {
            debug!(%key, timer_id = stale.id(), "DebounceEngine::debounce_by_id: burst pending, restarting timer");
            stale.cancel();
            let timer = self.schedule(delay, &deferred, callback);
            if let Some(entry) = self.registry.borrow_mut().get_mut(&key) {
                entry.timer = timer;
            }
            return promise;
        }

        debug!(%key, "DebounceEngine::debounce_by_id: starting burst");
        let cancel_key = key.clone();
        let deferred = Deferred::with_canceller(move |d: &Deferred<T>| {
            debug!(key = %cancel_key, "DebounceEngine: promise cancelled");
            d.reject(TickError::cancelled_key(Operation::DebounceById, cancel_key));
        });
        let timer = self.schedule(delay, &deferred, callback);

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let promise = deferred.promise();
        self.registry.borrow_mut().insert(
            key.clone(),
            DebounceEntry {
                id,
                promise: promise.clone(),
                deferred,
                timer,
            },
        );

        let registry = Rc::downgrade(&self.registry);
        promise.always(move || {
            let removed = registry.upgrade().and_then(|registry| {
                let mut registry = registry.borrow_mut();
                if registry.get(&key).is_some_and(|entry| entry.id == id) {
                    registry.remove(&key)
                } else {
                    None
                }
            });
            if let Some(entry) = removed {
                debug!(%key, "DebounceEngine: burst settled");
                entry.timer.cancel();
            }
        });

        promise
    }

    /// Debounce `callback` keyed by its own identity
    pub fn debounce<F>(&self, delay: Duration, callback: F) -> Promise<T>
    where
        F: FnOnce() -> eyre::Result<T> + 'static,
    {
        let key = identity_of(&callback);
        self.debounce_by_id(key, delay, callback)
    }

    /// Check if `key` has a pending burst
    pub fn is_pending(&self, key: &str) -> bool {
        self.registry.borrow().contains_key(key)
    }

    /// Promise of the pending burst for `key`, if any
    pub fn get(&self, key: &str) -> Option<Promise<T>> {
        self.registry.borrow().get(key).map(|entry| entry.promise.clone())
    }

    /// Cancel the pending burst for `key`; returns false if none
    pub fn cancel(&self, key: &str) -> bool {
        debug!(%key, "DebounceEngine::cancel: called");
        match self.get(key) {
            Some(promise) => promise.cancel(),
            None => false,
        }
    }

    /// Number of pending bursts
    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }
}
