//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use std::time::Duration;

/// Default maximum number of live resources.
pub const DEFAULT_MAX_SIZE: usize = 10;

/// Default bound on the wait for the fork lock.
pub const DEFAULT_FORK_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for object pool behavior
///
/// # Examples
///
/// ```
/// use forkpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_size(4)
///     .with_acquire_timeout(Duration::from_secs(2));
///
/// assert_eq!(config.max_size, 4);
/// assert_eq!(config.acquire_timeout, Some(Duration::from_secs(2)));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Maximum number of resources alive at once, idle and borrowed together
    pub max_size: usize,

    /// Upper bound for [`acquire_async`](crate::ObjectPool::acquire_async);
    /// `None` waits indefinitely
    pub acquire_timeout: Option<Duration>,

    /// How often an async acquirer re-checks an exhausted pool
    pub async_poll_interval: Duration,

    /// Reset pool state when the pool is used from a forked child process
    pub fork_safety: bool,

    /// How long a forked child waits for the fork lock before giving up
    pub fork_lock_timeout: Duration,

    /// Source of the current process identity
    pub process_id_source: fn() -> u32,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            acquire_timeout: None,
            async_poll_interval: Duration::from_millis(10),
            fork_safety: true,
            fork_lock_timeout: DEFAULT_FORK_LOCK_TIMEOUT,
            process_id_source: std::process::id,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live resources
    ///
    /// # Examples
    ///
    /// ```
    /// use forkpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_max_size(50);
    /// assert_eq!(config.max_size, 50);
    /// ```
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Bound async acquisition
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Set the async re-check interval
    pub fn with_async_poll_interval(mut self, interval: Duration) -> Self {
        self.async_poll_interval = interval;
        self
    }

    /// Enable or disable fork detection
    pub fn with_fork_safety(mut self, enabled: bool) -> Self {
        self.fork_safety = enabled;
        self
    }

    /// Set the bounded wait on the fork lock
    pub fn with_fork_lock_timeout(mut self, timeout: Duration) -> Self {
        self.fork_lock_timeout = timeout;
        self
    }

    /// Replace the process identity source.
    ///
    /// Mostly useful to simulate a fork in tests.
    pub fn with_process_id_source(mut self, source: fn() -> u32) -> Self {
        self.process_id_source = source;
        self
    }

    /// Check the configuration for values the pool cannot work with.
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_size must be greater than 0".to_string(),
            ));
        }
        if self.fork_safety && self.fork_lock_timeout.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "fork_lock_timeout must be greater than zero".to_string(),
            ));
        }
        if self.async_poll_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "async_poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.max_size, 10);
        assert_eq!(config.acquire_timeout, None);
        assert!(config.fork_safety);
        assert_eq!(config.fork_lock_timeout, Duration::from_secs(5));
        assert_eq!((config.process_id_source)(), std::process::id());
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let err = PoolConfiguration::new().with_max_size(0).validate().unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_validate_fork_lock_timeout() {
        let config = PoolConfiguration::new().with_fork_lock_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
        assert!(config.with_fork_safety(false).validate().is_ok());
    }
}
