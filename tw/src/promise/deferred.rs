//! Settle-once deferred value with a cancellation hook

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use tracing::debug;

use crate::error::TickError;

/// Result a promise settles with
pub type Outcome<T> = Result<T, TickError>;

type Continuation<T> = Box<dyn FnOnce(Outcome<T>)>;
type Canceller<T> = Box<dyn FnOnce(&Deferred<T>)>;

/// State shared by a deferred and all of its promises
struct Shared<T> {
    outcome: Option<Outcome<T>>,
    continuations: Vec<Continuation<T>>,
    canceller: Option<Canceller<T>>,
    wakers: Vec<Waker>,
}

impl<T> Shared<T> {
    fn new(canceller: Option<Canceller<T>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            outcome: None,
            continuations: Vec::new(),
            canceller,
            wakers: Vec::new(),
        }))
    }
}

/// Settle `shared` with `outcome` unless it already settled.
///
/// The borrow is released before continuations run so they can register
/// further continuations or touch other promises.
fn settle<T: Clone>(shared: &Rc<RefCell<Shared<T>>>, outcome: Outcome<T>) -> bool {
    let (continuations, wakers) = {
        let mut state = shared.borrow_mut();
        if state.outcome.is_some() {
            return false;
        }
        state.outcome = Some(outcome.clone());
        state.canceller = None;
        (mem::take(&mut state.continuations), mem::take(&mut state.wakers))
    };

    for continuation in continuations {
        continuation(outcome.clone());
    }
    for waker in wakers {
        waker.wake();
    }
    true
}

/// Settling side of a promise
///
/// Only code holding a `Deferred` can resolve or reject; observers get a
/// [`Promise`] from [`Deferred::promise`].
pub struct Deferred<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T: Clone + 'static> Deferred<T> {
    /// Create a deferred whose promise ignores `cancel()`
    pub fn new() -> Self {
        Self {
            shared: Shared::new(None),
        }
    }

    /// Create a deferred with a cancel hook
    ///
    /// The hook runs synchronously, at most once, when a holder cancels the
    /// promise while it is still pending. It is expected to reject the
    /// deferred it is handed.
    pub fn with_canceller<F>(canceller: F) -> Self
    where
        F: FnOnce(&Deferred<T>) + 'static,
    {
        Self {
            shared: Shared::new(Some(Box::new(canceller))),
        }
    }

    /// Observing handle sharing this deferred's state
    pub fn promise(&self) -> Promise<T> {
        Promise {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Fulfil with `value`; returns false if already settled
    pub fn resolve(&self, value: T) -> bool {
        settle(&self.shared, Ok(value))
    }

    /// Reject with `error`; returns false if already settled
    pub fn reject(&self, error: TickError) -> bool {
        settle(&self.shared, Err(error))
    }

    /// Settle with a ready outcome
    pub fn settle(&self, outcome: Outcome<T>) -> bool {
        settle(&self.shared, outcome)
    }

    /// Check if the deferred is still pending
    pub fn is_pending(&self) -> bool {
        self.shared.borrow().outcome.is_none()
    }
}

impl<T: Clone + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

/// Observing side of a deferred value
///
/// Clones share state: every clone sees the same single settlement. A
/// promise can be cancelled, observed through continuations, or awaited as a
/// [`Future`] from a task running on the event loop.
pub struct Promise<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T: Clone + 'static> Promise<T> {
    /// Promise that is already fulfilled
    pub fn resolved(value: T) -> Self {
        let deferred = Deferred::new();
        deferred.resolve(value);
        deferred.promise()
    }

    /// Promise that is already rejected
    pub fn rejected(error: TickError) -> Self {
        let deferred = Deferred::new();
        deferred.reject(error);
        deferred.promise()
    }

    /// Check if the promise is still pending
    pub fn is_pending(&self) -> bool {
        self.shared.borrow().outcome.is_none()
    }

    /// Settled outcome, if any
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.shared.borrow().outcome.clone()
    }

    /// Check if two handles observe the same deferred
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Cancel the promise
    ///
    /// Runs the cancel hook if the promise is pending and has one. Returns
    /// true if a hook ran. After settlement this is a no-op.
    pub fn cancel(&self) -> bool {
        let canceller = {
            let mut state = self.shared.borrow_mut();
            if state.outcome.is_some() {
                return false;
            }
            state.canceller.take()
        };

        match canceller {
            Some(canceller) => {
                debug!("Promise::cancel: running cancel hook");
                canceller(&Deferred {
                    shared: Rc::clone(&self.shared),
                });
                true
            }
            None => {
                debug!("Promise::cancel: no cancel hook, ignoring");
                false
            }
        }
    }

    /// Register a continuation for the settled outcome
    ///
    /// Continuations run in registration order. Registered after settlement,
    /// the continuation runs immediately.
    pub fn on_settled<F>(&self, continuation: F)
    where
        F: FnOnce(Outcome<T>) + 'static,
    {
        let settled = {
            let mut state = self.shared.borrow_mut();
            match &state.outcome {
                Some(outcome) => Some(outcome.clone()),
                None => {
                    state.continuations.push(Box::new(continuation));
                    return;
                }
            }
        };
        if let Some(outcome) = settled {
            continuation(outcome);
        }
    }

    /// Register a continuation for fulfilment only
    pub fn on_success<F>(&self, f: F)
    where
        F: FnOnce(T) + 'static,
    {
        self.on_settled(move |outcome| {
            if let Ok(value) = outcome {
                f(value);
            }
        });
    }

    /// Register a continuation for rejection only
    pub fn on_failure<F>(&self, f: F)
    where
        F: FnOnce(TickError) + 'static,
    {
        self.on_settled(move |outcome| {
            if let Err(error) = outcome {
                f(error);
            }
        });
    }

    /// Register a continuation that runs however the promise settles
    pub fn always<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        self.on_settled(move |_| f());
    }

    /// Chain a transformation of the fulfilled value
    ///
    /// Rejections pass through untouched. Cancelling the returned promise
    /// cancels this one.
    pub fn then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Outcome<U> + 'static,
    {
        let upstream = self.clone();
        let chained = Deferred::with_canceller(move |_: &Deferred<U>| {
            upstream.cancel();
        });
        let settler = chained.clone();
        self.on_settled(move |outcome| {
            settler.settle(outcome.and_then(f));
        });
        chained.promise()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.shared.borrow().outcome {
            None => "pending",
            Some(Ok(_)) => "fulfilled",
            Some(Err(_)) => "rejected",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

impl<T: Clone> Future for Promise<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.borrow_mut();
        if let Some(outcome) = &state.outcome {
            return Poll::Ready(outcome.clone());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
