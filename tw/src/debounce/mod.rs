//! Debouncing
//!
//! Bursts of calls for one key collapse into a single trailing invocation.

mod engine;

pub use engine::DebounceEngine;
