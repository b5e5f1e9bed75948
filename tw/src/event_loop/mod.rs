//! Single-threaded event loop
//!
//! Wraps a tokio current-thread runtime and `LocalSet` behind the small
//! contract the timing primitives need: one-shot, repeating and next-tick
//! scheduling, cancellation, and run/stop/wait.

mod config;
mod core;
mod handle;
mod tick;

pub use config::{ClockMode, LoopConfig};
pub use self::core::EventLoop;
pub use handle::{TimerHandle, TimerKind};
