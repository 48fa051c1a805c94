//! Error types for the object pool

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of [`ObjectPool`](crate::ObjectPool).
///
/// Failures raised by a [`Manager`](crate::Manager) never show up here as
/// distinct variants: a failed construction degrades to [`PoolError::PoolFull`],
/// and failed validation or destruction are only logged and counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool is closed")]
    PoolClosed,

    #[error("Pool is at maximum capacity")]
    PoolFull,

    #[error("Timed out waiting for the fork lock; the pool was copied while another process held it")]
    ChildDeadlocked,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[cfg(feature = "metrics")]
    #[error("Failed to export metrics: {0}")]
    MetricsExport(String),
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(PoolError::PoolClosed.to_string(), "Pool is closed");
        assert_eq!(
            PoolError::InvalidConfiguration("max_size must be greater than 0".into()).to_string(),
            "Invalid pool configuration: max_size must be greater than 0"
        );
        assert!(
            PoolError::Timeout(Duration::from_millis(5))
                .to_string()
                .contains("5ms")
        );
    }
}
