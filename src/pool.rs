//! Core object pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::generation::{Generation, Wake};
use crate::health::HealthStatus;
use crate::manager::{FactoryManager, Manager};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::process_guard::ProcessGuard;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A borrowed resource that goes back to the pool when dropped
///
/// Dropping the handle runs [`Manager::validate_and_reset`]; a valid resource
/// is queued for the next borrower, an invalid one is destroyed and its slot
/// freed. Either way one blocked acquirer is woken.
///
/// If the fork check fails during that drop (see
/// [`PoolError::ChildDeadlocked`]), the resource is leaked without being
/// recycled or destroyed, and its capacity slot is never handed back.
pub struct PooledObject<M: Manager> {
    value: Option<M::Resource>,
    generation: Arc<Generation<M::Resource>>,
    shared: Arc<Shared<M>>,
}

impl<M: Manager> PooledObject<M> {
    fn new(value: M::Resource, generation: Arc<Generation<M::Resource>>, shared: Arc<Shared<M>>) -> Self {
        Self {
            value: Some(value),
            generation,
            shared,
        }
    }

    /// Take the resource out of the pool for good.
    ///
    /// Its capacity slot is freed right away; [`Manager::destroy`] is not
    /// called, the resource now belongs to the caller.
    pub fn detach(mut self) -> M::Resource {
        let value = self.value.take().expect("Value already taken");
        self.generation.release_slot();
        value
    }
}

impl<M: Manager> Deref for PooledObject<M> {
    type Target = M::Resource;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<M: Manager> DerefMut for PooledObject<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<M: Manager> Drop for PooledObject<M> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.shared.release(value, &self.generation);
        }
    }
}

impl<M> fmt::Debug for PooledObject<M>
where
    M: Manager,
    M::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("value", &self.value)
            .field("generation", &self.generation.id())
            .finish()
    }
}

struct Shared<M: Manager> {
    manager: M,
    config: PoolConfiguration,
    generation: RwLock<Arc<Generation<M::Resource>>>,
    guard: Option<ProcessGuard>,
    metrics: MetricsTracker,
}

impl<M: Manager> Shared<M> {
    fn current(&self) -> Arc<Generation<M::Resource>> {
        Arc::clone(&self.generation.read())
    }

    /// The current generation, after giving the fork check a chance to reset it.
    fn observe(&self) -> Arc<Generation<M::Resource>> {
        if let Err(err) = self.check_process() {
            tracing::error!(error = %err, "reporting pool state without fork reset");
        }
        self.current()
    }

    fn check_process(&self) -> PoolResult<()> {
        let Some(guard) = &self.guard else {
            return Ok(());
        };
        if guard.check(|| self.reset())? {
            MetricsTracker::record(&self.metrics.process_resets);
        }
        Ok(())
    }

    /// Swaps in a fresh generation after a fork, keeping the open state.
    fn reset(&self) {
        let inherited = {
            let mut current = self.generation.write();
            let fresh = if current.is_retired() {
                Generation::retired(self.config.max_size)
            } else {
                Generation::new(self.config.max_size, current.is_open())
            };
            let fresh = Arc::new(fresh);
            mem::replace(&mut *current, fresh)
        };
        // Idle resources wrap the parent's handles; leak them untouched.
        let leaked = inherited.abandon();
        tracing::warn!(
            generation = inherited.id(),
            leaked = leaked.len(),
            "abandoned generation inherited from parent process"
        );
        leaked.into_iter().for_each(mem::forget);
    }

    fn release(&self, mut resource: M::Resource, generation: &Generation<M::Resource>) {
        if let Err(err) = self.check_process() {
            tracing::error!(error = %err, "returned resource leaked");
            mem::forget(resource);
            return;
        }

        if !generation.is_open() {
            self.discard(resource, generation);
            return;
        }

        match self.manager.validate_and_reset(&mut resource) {
            Ok(()) => match generation.recycle(resource) {
                Ok(()) => MetricsTracker::record(&self.metrics.total_returned),
                Err(resource) => self.discard(resource, generation),
            },
            Err(err) => {
                MetricsTracker::record(&self.metrics.validation_failures);
                tracing::debug!(
                    generation = generation.id(),
                    error = %err,
                    "returned resource failed validation"
                );
                self.discard(resource, generation);
            }
        }
    }

    /// Destroys a resource and hands its slot back to the generation.
    fn discard(&self, resource: M::Resource, generation: &Generation<M::Resource>) {
        if generation.is_abandoned() {
            mem::forget(resource);
            return;
        }
        self.destroy(resource);
        generation.release_slot();
    }

    fn destroy(&self, resource: M::Resource) {
        MetricsTracker::record(&self.metrics.destroyed);
        if let Err(err) = self.manager.destroy(resource) {
            MetricsTracker::record(&self.metrics.destroy_failures);
            tracing::warn!(error = %err, "failed to destroy pooled resource");
        }
    }
}

/// Thread-safe bounded pool of resources built on demand by a [`Manager`]
///
/// The pool starts closed. After [`open`](Self::open), [`acquire`](Self::acquire)
/// hands out an idle resource, builds a new one while fewer than `max_size`
/// are alive, or blocks until a borrower returns one.
///
/// When fork safety is enabled and the pool is used from a forked child, the
/// state inherited from the parent is dropped without calling
/// [`Manager::destroy`] (the resources are leaked, their handles still belong
/// to the parent) and the child starts over with an empty pool.
///
/// # Examples
///
/// ```
/// use forkpool::{ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::from_factory(|| vec![0u8; 1024], PoolConfiguration::default()).unwrap();
/// pool.open().unwrap();
/// {
///     let buf = pool.acquire().unwrap();
///     assert_eq!(buf.len(), 1024);
///     // Returned to the pool when `buf` goes out of scope
/// }
/// assert_eq!(pool.idle_count(), 1);
///
/// pool.close().unwrap();
/// assert!(pool.acquire().is_err());
/// ```
pub struct ObjectPool<M: Manager> {
    shared: Arc<Shared<M>>,
}

impl<M: Manager> Clone for ObjectPool<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, F> ObjectPool<FactoryManager<F>>
where
    T: Send + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    /// Create a pool whose resources come from an infallible factory
    pub fn from_factory(factory: F, config: PoolConfiguration) -> PoolResult<Self> {
        Self::new(FactoryManager::new(factory), config)
    }
}

impl<M: Manager> ObjectPool<M> {
    /// Create a new, closed pool
    pub fn new(manager: M, config: PoolConfiguration) -> PoolResult<Self> {
        config.validate()?;

        let guard = config
            .fork_safety
            .then(|| ProcessGuard::new(config.process_id_source, config.fork_lock_timeout));

        tracing::info!(
            max_size = config.max_size,
            fork_safety = config.fork_safety,
            "object pool created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                generation: RwLock::new(Arc::new(Generation::new(config.max_size, false))),
                manager,
                config,
                guard,
                metrics: MetricsTracker::new(),
            }),
        })
    }

    /// Start accepting acquisitions. Opening an open pool does nothing.
    ///
    /// A pool that has been closed stays closed: opening it again fails with
    /// [`PoolError::PoolClosed`].
    pub fn open(&self) -> PoolResult<()> {
        self.shared.check_process()?;
        // Held across the flag change so a concurrent close cannot retire
        // the generation in between.
        let generation = self.shared.generation.read();
        if generation.open()? {
            tracing::info!(generation = generation.id(), "object pool opened");
        }
        Ok(())
    }

    /// Stop accepting acquisitions and destroy every idle resource.
    ///
    /// Blocked acquirers fail with [`PoolError::PoolClosed`]. Borrowed
    /// resources are destroyed when their borrowers drop them. Closing a
    /// closed pool does nothing. Closing is final.
    pub fn close(&self) -> PoolResult<()> {
        self.shared.check_process()?;

        let (closed, drained) = {
            let mut current = self.shared.generation.write();
            if !current.is_open() {
                return Ok(());
            }
            let fresh = Arc::new(Generation::retired(self.shared.config.max_size));
            let closed = mem::replace(&mut *current, fresh);
            let drained = closed.shut_down();
            (closed, drained)
        };

        let count = drained.len();
        for resource in drained {
            self.shared.destroy(resource);
            closed.capacity().release();
        }

        tracing::info!(
            generation = closed.id(),
            destroyed = count,
            still_borrowed = closed.capacity().in_use(),
            "object pool closed"
        );
        Ok(())
    }

    /// Whether the pool currently accepts acquisitions
    pub fn is_open(&self) -> bool {
        self.shared.observe().is_open()
    }

    /// Get a resource, blocking while the pool is exhausted
    ///
    /// Fails with [`PoolError::PoolClosed`] if the pool is closed, also when it
    /// gets closed during the wait, and with [`PoolError::PoolFull`] if a new
    /// resource was needed and the manager failed to build it.
    pub fn acquire(&self) -> PoolResult<PooledObject<M>> {
        self.acquire_until(None)
    }

    /// Like [`acquire`](Self::acquire), giving up with [`PoolError::Timeout`]
    /// once `timeout` has elapsed
    pub fn acquire_timeout(&self, timeout: Duration) -> PoolResult<PooledObject<M>> {
        self.acquire_until(Some((Instant::now() + timeout, timeout)))
    }

    /// Get a resource without blocking
    ///
    /// An exhausted pool reports [`PoolError::PoolFull`].
    pub fn try_acquire(&self) -> PoolResult<PooledObject<M>> {
        self.shared.check_process()?;
        let generation = self.shared.current();
        self.take(&generation)?.ok_or(PoolError::PoolFull)
    }

    /// Get a resource asynchronously
    ///
    /// Re-checks an exhausted pool every `async_poll_interval`, bounded by the
    /// configured `acquire_timeout`. Dropping the future abandons the attempt
    /// without holding anything.
    pub async fn acquire_async(&self) -> PoolResult<PooledObject<M>> {
        match self.shared.config.acquire_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.poll_acquire())
                .await
                .map_err(|_| PoolError::Timeout(timeout))?,
            None => self.poll_acquire().await,
        }
    }

    async fn poll_acquire(&self) -> PoolResult<PooledObject<M>> {
        let poll_interval = self.shared.config.async_poll_interval;
        let mut waited = false;
        loop {
            self.shared.check_process()?;
            let generation = self.shared.current();
            if let Some(object) = self.take(&generation)? {
                return Ok(object);
            }
            drop(generation);

            if !waited {
                MetricsTracker::record(&self.shared.metrics.wait_events);
                waited = true;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn acquire_until(&self, deadline: Option<(Instant, Duration)>) -> PoolResult<PooledObject<M>> {
        self.shared.check_process()?;
        let generation = self.shared.current();

        let mut waited = false;
        loop {
            if let Some(object) = self.take(&generation)? {
                return Ok(object);
            }

            if !waited {
                MetricsTracker::record(&self.shared.metrics.wait_events);
                waited = true;
            }
            tracing::trace!(generation = generation.id(), "pool exhausted, waiting");

            if generation.wait(deadline.map(|(at, _)| at)) == Wake::TimedOut {
                let timeout = deadline.map(|(_, timeout)| timeout).unwrap_or_default();
                return Err(PoolError::Timeout(timeout));
            }
        }
    }

    /// One pass over the acquire steps: idle queue, then a new resource.
    ///
    /// `Ok(None)` means the generation is exhausted.
    fn take(&self, generation: &Arc<Generation<M::Resource>>) -> PoolResult<Option<PooledObject<M>>> {
        if !generation.is_open() {
            return Err(PoolError::PoolClosed);
        }

        let resource = match generation.pop_idle() {
            Some(resource) => resource,
            None => {
                if !generation.capacity().try_acquire() {
                    return Ok(None);
                }
                match self.shared.manager.create() {
                    Ok(resource) => {
                        MetricsTracker::record(&self.shared.metrics.created);
                        tracing::debug!(generation = generation.id(), "created pooled resource");
                        resource
                    }
                    Err(err) => {
                        MetricsTracker::record(&self.shared.metrics.creation_failures);
                        tracing::warn!(
                            generation = generation.id(),
                            error = %err,
                            "failed to create pooled resource"
                        );
                        generation.release_slot();
                        return Err(PoolError::PoolFull);
                    }
                }
            }
        };

        // Closed while the resource was being taken; close has drained or
        // will never see it.
        if !generation.is_open() {
            self.shared.discard(resource, generation);
            return Err(PoolError::PoolClosed);
        }

        MetricsTracker::record(&self.shared.metrics.total_retrieved);
        Ok(Some(PooledObject::new(
            resource,
            Arc::clone(generation),
            Arc::clone(&self.shared),
        )))
    }

    /// The manager this pool was built with
    pub fn manager(&self) -> &M {
        &self.shared.manager
    }

    /// Maximum number of live resources
    pub fn max_size(&self) -> usize {
        self.shared.config.max_size
    }

    /// Get idle count
    pub fn idle_count(&self) -> usize {
        self.shared.observe().idle_len()
    }

    /// Get live count, idle and borrowed together
    pub fn live_count(&self) -> usize {
        self.shared.observe().capacity().in_use()
    }

    /// Get borrowed count
    pub fn borrowed_count(&self) -> usize {
        let generation = self.shared.observe();
        generation.capacity().in_use().saturating_sub(generation.idle_len())
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        let generation = self.shared.observe();
        let idle = generation.idle_len();
        let live = generation.capacity().in_use();
        HealthStatus::new(
            generation.is_open(),
            idle,
            live.saturating_sub(idle),
            generation.waiting(),
            generation.capacity().max(),
        )
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let generation = self.shared.observe();
        self.shared.metrics.get_metrics(
            generation.idle_len(),
            generation.capacity().in_use(),
            generation.capacity().max(),
            generation.is_open(),
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

impl<M: Manager> fmt::Debug for ObjectPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let generation = self.shared.current();
        f.debug_struct("ObjectPool")
            .field("max_size", &self.shared.config.max_size)
            .field("is_open", &generation.is_open())
            .field("idle", &generation.idle_len())
            .field("live", &generation.capacity().in_use())
            .finish()
    }
}
