//! Health monitoring for object pools

/// Health status of an object pool
///
/// # Examples
///
/// ```
/// use forkpool::{ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::from_factory(|| 0u64, PoolConfiguration::default()).unwrap();
/// assert!(!pool.get_health_status().is_healthy());
///
/// pool.open().unwrap();
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.total_capacity, 10);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Whether the pool accepts acquisitions
    pub is_open: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Live resources over capacity (0.0 to 1.0)
    pub utilization: f64,

    /// Idle resources count
    pub idle_objects: usize,

    /// Borrowed resources count
    pub borrowed_objects: usize,

    /// Threads blocked waiting for a resource
    pub waiting_acquirers: usize,

    /// Total capacity
    pub total_capacity: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn new(is_open: bool, idle: usize, borrowed: usize, waiting: usize, capacity: usize) -> Self {
        let utilization = if capacity > 0 {
            (idle + borrowed) as f64 / capacity as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = is_open;

        if !is_open {
            warnings.push("Pool is closed".to_string());
        }

        if borrowed >= capacity && capacity > 0 {
            warnings.push(format!("All {} resources are borrowed", capacity));
            is_healthy = false;
        } else if borrowed as f64 / capacity.max(1) as f64 > 0.9 {
            warnings.push(format!(
                "High utilization: {:.1}%",
                borrowed as f64 * 100.0 / capacity as f64
            ));
        }

        if waiting > 0 {
            warnings.push(format!("{} acquirers waiting", waiting));
        }

        Self {
            is_healthy,
            is_open,
            warning_count: warnings.len(),
            utilization,
            idle_objects: idle,
            borrowed_objects: borrowed,
            waiting_acquirers: waiting,
            total_capacity: capacity,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_pool_is_unhealthy() {
        let health = HealthStatus::new(true, 0, 4, 2, 4);
        assert!(!health.is_healthy());
        assert_eq!(health.warning_count, 2);
        assert!((health.utilization - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_closed_pool_is_unhealthy() {
        let health = HealthStatus::new(false, 0, 0, 0, 10);
        assert!(!health.is_healthy());
        assert_eq!(health.warnings, vec!["Pool is closed".to_string()]);
    }

    #[test]
    fn test_idle_pool_is_healthy() {
        let health = HealthStatus::new(true, 3, 1, 0, 10);
        assert!(health.is_healthy());
        assert_eq!(health.warning_count, 0);
    }
}
