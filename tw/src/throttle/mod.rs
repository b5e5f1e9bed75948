//! Throttling
//!
//! At most one scheduled invocation per key per window.

mod engine;

pub use engine::ThrottleEngine;
