//! Tickwork - timing primitives for a single-threaded event loop
//!
//! Tickwork layers delayed, repeating and next-tick execution, throttling and
//! debouncing over a tokio current-thread loop. Every user callback runs
//! behind an error boundary, and every keyed operation hands back a
//! cancellable promise whose cancellation also cancels the timer behind it.
//!
//! # Modules
//!
//! - [`event_loop`] - the loop: scheduling, cancellation, run/stop/wait
//! - [`timer`] - `after`, `every` and `next_tick` with contained failures
//! - [`promise`] - settle-once promises with cancel hooks
//! - [`identity`] - stable keys derived from callables
//! - [`throttle`] - one invocation per key per window
//! - [`debounce`] - one trailing invocation per burst per key
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface
//!
//! ```no_run
//! use std::time::Duration;
//! use tickwork::{EventLoop, LoopConfig, ThrottleEngine, TimerService};
//!
//! let event_loop = EventLoop::new(LoopConfig::default())?;
//! let timers = TimerService::new(&event_loop);
//! let throttle = ThrottleEngine::new(&timers);
//!
//! let first = throttle.throttle_by_id("save", Duration::from_millis(300), || Ok(1));
//! let second = throttle.throttle_by_id("save", Duration::from_millis(300), || Ok(2));
//! assert!(first.ptr_eq(&second));
//!
//! assert_eq!(event_loop.wait(&first, None)?, 1);
//! # Ok::<(), eyre::Report>(())
//! ```

pub mod cli;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event_loop;
pub mod identity;
pub mod promise;
pub mod throttle;
pub mod timer;

// Re-export commonly used types
pub use config::{Config, DemoConfig};
pub use debounce::DebounceEngine;
pub use error::{Operation, TickError};
pub use event_loop::{ClockMode, EventLoop, LoopConfig, TimerHandle, TimerKind};
pub use identity::{Callable, identity, identity_of};
pub use promise::{Deferred, Outcome, Promise};
pub use throttle::ThrottleEngine;
pub use timer::{TimerService, delay_from_secs};
