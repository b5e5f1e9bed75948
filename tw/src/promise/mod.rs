//! Cancellable promises
//!
//! A [`Deferred`] settles exactly once; any number of [`Promise`] handles
//! observe that settlement. Cancellation runs an owner-supplied hook
//! synchronously while the promise is pending.

mod deferred;

pub use deferred::{Deferred, Outcome, Promise};
