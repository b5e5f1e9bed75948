//! Event loop configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Clock the loop's timers run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockMode {
    /// Wall-clock time
    #[default]
    Real,

    /// Virtual time that jumps to the next timer whenever the loop is idle
    Paused,
}

/// Event loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Clock mode
    #[serde(default)]
    pub clock: ClockMode,

    /// Shortest interval a repeating timer may use, in microseconds
    #[serde(rename = "min-interval-us", default = "default_min_interval_us")]
    pub min_interval_us: u64,

    /// Timeout applied by `wait` when the caller passes none
    #[serde(rename = "wait-timeout-ms", default)]
    pub wait_timeout_ms: Option<u64>,
}

fn default_min_interval_us() -> u64 {
    1
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            clock: ClockMode::Real,
            min_interval_us: 1,
            wait_timeout_ms: None,
        }
    }
}

impl LoopConfig {
    /// Configuration with a paused clock
    pub fn paused() -> Self {
        Self {
            clock: ClockMode::Paused,
            ..Default::default()
        }
    }

    /// Get the minimum repeating interval as a Duration
    pub fn min_interval(&self) -> Duration {
        Duration::from_micros(self.min_interval_us.max(1))
    }

    /// Get the default wait timeout as a Duration
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }
}
