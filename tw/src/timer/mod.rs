//! Timer service
//!
//! One-shot, repeating and next-tick callbacks with contained failures.

mod service;

pub(crate) use service::contain;
pub use service::TimerService;

use std::time::Duration;

/// Convert a delay in seconds to a Duration
///
/// Negative and NaN inputs clamp to zero, which schedules for the next timer
/// pass. Delays too large to represent, including infinity, saturate to
/// `Duration::MAX` and so never come due.
pub fn delay_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_from_secs() {
        assert_eq!(delay_from_secs(0.25), Duration::from_millis(250));
        assert_eq!(delay_from_secs(2.0), Duration::from_secs(2));
        assert_eq!(delay_from_secs(0.0), Duration::ZERO);
        assert_eq!(delay_from_secs(-1.5), Duration::ZERO);
        assert_eq!(delay_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(delay_from_secs(f64::NEG_INFINITY), Duration::ZERO);
    }

    #[test]
    fn test_delay_from_secs_saturates() {
        assert_eq!(delay_from_secs(1e300), Duration::MAX);
        assert_eq!(delay_from_secs(f64::INFINITY), Duration::MAX);
    }
}
