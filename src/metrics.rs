//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "metrics")]
use crate::errors::{PoolError, PoolResult};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use forkpool::{ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::from_factory(|| 7u32, PoolConfiguration::default()).unwrap();
/// pool.open().unwrap();
///
/// {
///     let _obj = pool.acquire().unwrap();
///     let metrics = pool.get_metrics();
///     assert_eq!(metrics.created, 1);
///     assert_eq!(metrics.borrowed_objects, 1);
/// }
///
/// assert_eq!(pool.get_metrics().total_returned, 1);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Resources built by the manager
    pub created: usize,

    /// Resources handed to the manager for destruction
    pub destroyed: usize,

    /// Destructions that reported an error
    pub destroy_failures: usize,

    /// Constructions that reported an error
    pub creation_failures: usize,

    /// Successful acquisitions
    pub total_retrieved: usize,

    /// Resources recycled onto the idle queue
    pub total_returned: usize,

    /// Returned resources that failed validation
    pub validation_failures: usize,

    /// Times an acquirer had to block on an exhausted pool
    pub wait_events: usize,

    /// State resets caused by a process identity change
    pub process_resets: usize,

    /// Current idle resources
    pub idle_objects: usize,

    /// Current borrowed resources
    pub borrowed_objects: usize,

    /// Current live resources, idle and borrowed
    pub live_objects: usize,

    /// Maximum number of live resources
    pub max_size: usize,

    /// Live resources over maximum (0.0 to 1.0)
    pub utilization: f64,

    /// Whether the pool accepts acquisitions
    pub is_open: bool,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("created".to_string(), self.created.to_string());
        metrics.insert("destroyed".to_string(), self.destroyed.to_string());
        metrics.insert("destroy_failures".to_string(), self.destroy_failures.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("total_retrieved".to_string(), self.total_retrieved.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("validation_failures".to_string(), self.validation_failures.to_string());
        metrics.insert("wait_events".to_string(), self.wait_events.to_string());
        metrics.insert("process_resets".to_string(), self.process_resets.to_string());
        metrics.insert("idle_objects".to_string(), self.idle_objects.to_string());
        metrics.insert("borrowed_objects".to_string(), self.borrowed_objects.to_string());
        metrics.insert("live_objects".to_string(), self.live_objects.to_string());
        metrics.insert("max_size".to_string(), self.max_size.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("is_open".to_string(), self.is_open.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus text exposition format
    ///
    /// Every series carries a `pool` label plus the given tags.
    ///
    /// # Examples
    ///
    /// ```
    /// use forkpool::{ObjectPool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = ObjectPool::from_factory(|| 1u8, PoolConfiguration::default()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("forkpool_resources_live"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

        let mut labels = tags.cloned().unwrap_or_default();
        labels.insert("pool".to_string(), pool_name.to_string());
        let registry = Registry::new_custom(None, Some(labels)).map_err(export_error)?;

        let gauges = [
            ("forkpool_resources_idle", "Current idle resources", metrics.idle_objects),
            ("forkpool_resources_borrowed", "Current borrowed resources", metrics.borrowed_objects),
            ("forkpool_resources_live", "Current live resources", metrics.live_objects),
            ("forkpool_resources_max", "Maximum live resources", metrics.max_size),
            ("forkpool_open", "Whether the pool accepts acquisitions", usize::from(metrics.is_open)),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::new(name, help).map_err(export_error)?;
            gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
            registry.register(Box::new(gauge)).map_err(export_error)?;
        }

        let utilization = Gauge::new("forkpool_utilization", "Live resources over maximum")
            .map_err(export_error)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(export_error)?;

        let counters = [
            ("forkpool_resources_created_total", "Resources created", metrics.created),
            ("forkpool_resources_destroyed_total", "Resources destroyed", metrics.destroyed),
            ("forkpool_destroy_failures_total", "Destroy failures", metrics.destroy_failures),
            ("forkpool_creation_failures_total", "Creation failures", metrics.creation_failures),
            ("forkpool_resources_retrieved_total", "Resources retrieved", metrics.total_retrieved),
            ("forkpool_resources_returned_total", "Resources returned", metrics.total_returned),
            ("forkpool_validation_failures_total", "Validation failures", metrics.validation_failures),
            ("forkpool_wait_events_total", "Blocking waits on an exhausted pool", metrics.wait_events),
            ("forkpool_process_resets_total", "Resets after a process identity change", metrics.process_resets),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::new(name, help).map_err(export_error)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(export_error)?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(export_error)?;
        String::from_utf8(buffer).map_err(|e| PoolError::MetricsExport(e.to_string()))
    }
}

#[cfg(feature = "metrics")]
fn export_error(err: prometheus::Error) -> PoolError {
    PoolError::MetricsExport(err.to_string())
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub destroy_failures: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub total_retrieved: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub validation_failures: AtomicUsize,
    pub wait_events: AtomicUsize,
    pub process_resets: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, idle: usize, live: usize, max_size: usize, is_open: bool) -> PoolMetrics {
        let utilization = if max_size > 0 {
            live as f64 / max_size as f64
        } else {
            0.0
        };

        PoolMetrics {
            created: self.created.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            destroy_failures: self.destroy_failures.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            total_retrieved: self.total_retrieved.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            wait_events: self.wait_events.load(Ordering::Relaxed),
            process_resets: self.process_resets.load(Ordering::Relaxed),
            idle_objects: idle,
            borrowed_objects: live.saturating_sub(idle),
            live_objects: live,
            max_size,
            utilization,
            is_open,
        }
    }
}
