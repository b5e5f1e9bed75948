//! Scheduling error types

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Operation that produced a cancellable promise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    NextTick,
    ThrottleById,
    DebounceById,
}

impl Operation {
    /// Label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            Operation::NextTick => "nextTick",
            Operation::ThrottleById => "throttleById",
            Operation::DebounceById => "debounceById",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors that settle a promise or abort a loop run
#[derive(Debug, Clone, Error)]
pub enum TickError {
    #[error("Callback failed: {0}")]
    Callback(Arc<eyre::Report>),

    #[error("Callback panicked: {0}")]
    Panicked(String),

    #[error("{operation}() was cancelled")]
    Cancelled { operation: Operation, key: Option<String> },

    #[error("Event loop is already running")]
    LoopRunning,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Event loop drained before the promise settled")]
    Stalled,
}

impl TickError {
    /// Build a cancellation error for an operation without a key
    pub fn cancelled(operation: Operation) -> Self {
        TickError::Cancelled { operation, key: None }
    }

    /// Build a cancellation error for a keyed operation
    pub fn cancelled_key(operation: Operation, key: impl Into<String>) -> Self {
        TickError::Cancelled {
            operation,
            key: Some(key.into()),
        }
    }

    /// Convert a caught panic payload
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        TickError::Panicked(message)
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TickError::Cancelled { .. })
    }

    /// Check if this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, TickError::Timeout(_))
    }

    /// Check if a user callback failed (error or panic)
    pub fn is_callback_failure(&self) -> bool {
        matches!(self, TickError::Callback(_) | TickError::Panicked(_))
    }

    /// Operation that was cancelled, if any
    pub fn operation(&self) -> Option<Operation> {
        match self {
            TickError::Cancelled { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Key of the cancelled operation, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            TickError::Cancelled { key, .. } => key.as_deref(),
            _ => None,
        }
    }
}

impl From<eyre::Report> for TickError {
    fn from(report: eyre::Report) -> Self {
        TickError::Callback(Arc::new(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_messages() {
        assert_eq!(
            TickError::cancelled(Operation::NextTick).to_string(),
            "nextTick() was cancelled"
        );
        assert_eq!(
            TickError::cancelled_key(Operation::ThrottleById, "k").to_string(),
            "throttleById() was cancelled"
        );
        assert_eq!(
            TickError::cancelled_key(Operation::DebounceById, "k").to_string(),
            "debounceById() was cancelled"
        );
    }

    #[test]
    fn test_cancelled_carries_operation_and_key() {
        let err = TickError::cancelled_key(Operation::DebounceById, "search");
        assert!(err.is_cancelled());
        assert_eq!(err.operation(), Some(Operation::DebounceById));
        assert_eq!(err.key(), Some("search"));

        let err = TickError::cancelled(Operation::NextTick);
        assert_eq!(err.key(), None);
    }

    #[test]
    fn test_predicates() {
        assert!(TickError::Timeout(Duration::from_millis(500)).is_timeout());
        assert!(!TickError::Stalled.is_timeout());
        assert!(TickError::Panicked("boom".to_string()).is_callback_failure());
        assert!(TickError::from(eyre::eyre!("bad")).is_callback_failure());
        assert!(!TickError::LoopRunning.is_callback_failure());
        assert_eq!(TickError::LoopRunning.operation(), None);
    }

    #[test]
    fn test_callback_message_includes_report() {
        let err = TickError::from(eyre::eyre!("division by zero"));
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_from_panic_payloads() {
        let err = TickError::from_panic(Box::new("static str"));
        assert_eq!(err.to_string(), "Callback panicked: static str");

        let err = TickError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.to_string(), "Callback panicked: owned");

        let err = TickError::from_panic(Box::new(42u32));
        assert!(err.to_string().contains("non-string"));
    }
}
