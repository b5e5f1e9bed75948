//! Throttle engine implementation

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Operation, TickError};
use crate::identity::identity_of;
use crate::promise::{Deferred, Promise};
use crate::timer::{TimerService, contain};

/// Registry entry for an outstanding window
struct ThrottleEntry<T> {
    id: u64,
    promise: Promise<T>,
}

/// Per-key throttle
///
/// The first call for a key opens a window of `delay`: its callback runs when
/// the window closes, and every other call for that key inside the window gets
/// the same promise back without scheduling anything.
pub struct ThrottleEngine<T> {
    timers: TimerService,
    registry: Rc<RefCell<HashMap<String, ThrottleEntry<T>>>>,
    next_id: Rc<Cell<u64>>,
}

impl<T> Clone for ThrottleEngine<T> {
    fn clone(&self) -> Self {
        Self {
            timers: self.timers.clone(),
            registry: Rc::clone(&self.registry),
            next_id: Rc::clone(&self.next_id),
        }
    }
}

impl<T: Clone + 'static> ThrottleEngine<T> {
    /// Create a throttle engine with an empty registry
    pub fn new(timers: &TimerService) -> Self {
        debug!("ThrottleEngine::new: called");
        Self {
            timers: timers.clone(),
            registry: Rc::new(RefCell::new(HashMap::new())),
            next_id: Rc::new(Cell::new(1)),
        }
    }

    /// Throttle `callback` under `key`
    ///
    /// Returns the outstanding promise for `key` if there is one. Otherwise
    /// schedules `callback` `delay` from now and returns a new promise that
    /// settles with its outcome. Cancelling the promise cancels the timer.
    pub fn throttle_by_id<F>(&self, key: impl Into<String>, delay: Duration, callback: F) -> Promise<T>
    where
        F: FnOnce() -> eyre::Result<T> + 'static,
    {
        let key = key.into();
        debug!(%key, ?delay, "ThrottleEngine::throttle_by_id: called");

        if let Some(entry) = self.registry.borrow().get(&key) {
            debug!(%key, "ThrottleEngine::throttle_by_id: window open, returning outstanding promise");
            return entry.promise.clone();
        }

        debug!(%key, "ThrottleEngine::throttle_by_id: opening window");
        let cancel_key = key.clone();
        let deferred = Deferred::with_canceller(move |d: &Deferred<T>| {
            debug!(key = %cancel_key, "ThrottleEngine: promise cancelled");
            d.reject(TickError::cancelled_key(Operation::ThrottleById, cancel_key));
        });

        let settler = deferred.clone();
        let timer = self.timers.after(delay, move || {
            settler.settle(contain(callback));
            Ok(())
        });

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let promise = deferred.promise();
        self.registry.borrow_mut().insert(
            key.clone(),
            ThrottleEntry {
                id,
                promise: promise.clone(),
            },
        );

        let registry = Rc::downgrade(&self.registry);
        promise.always(move || {
            if let Some(registry) = registry.upgrade() {
                let mut registry = registry.borrow_mut();
                if registry.get(&key).is_some_and(|entry| entry.id == id) {
                    debug!(%key, "ThrottleEngine: window closed");
                    registry.remove(&key);
                }
            }
            timer.cancel();
        });

        promise
    }

    /// Throttle `callback` keyed by its own identity
    pub fn throttle<F>(&self, delay: Duration, callback: F) -> Promise<T>
    where
        F: FnOnce() -> eyre::Result<T> + 'static,
    {
        let key = identity_of(&callback);
        self.throttle_by_id(key, delay, callback)
    }

    /// Check if `key` has an open window
    pub fn is_pending(&self, key: &str) -> bool {
        self.registry.borrow().contains_key(key)
    }

    /// Outstanding promise for `key`, if any
    pub fn get(&self, key: &str) -> Option<Promise<T>> {
        self.registry.borrow().get(key).map(|entry| entry.promise.clone())
    }

    /// Cancel the outstanding promise for `key`; returns false if none
    pub fn cancel(&self, key: &str) -> bool {
        debug!(%key, "ThrottleEngine::cancel: called");
        match self.get(key) {
            Some(promise) => promise.cancel(),
            None => false,
        }
    }

    /// Number of open windows
    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }
}
