//! Resource lifecycle contract

use std::convert::Infallible;
use std::error::Error;

/// Creates, recycles and destroys the resources held by an
/// [`ObjectPool`](crate::ObjectPool).
///
/// All three operations run on the caller's thread without any pool lock held,
/// so they may block for as long as they need to.
///
/// # Examples
///
/// ```
/// use forkpool::{Manager, ObjectPool, PoolConfiguration};
/// use std::io;
///
/// struct Buffers;
///
/// impl Manager for Buffers {
///     type Resource = Vec<u8>;
///     type Error = io::Error;
///
///     fn create(&self) -> Result<Vec<u8>, io::Error> {
///         Ok(Vec::with_capacity(4096))
///     }
///
///     fn validate_and_reset(&self, buf: &mut Vec<u8>) -> Result<(), io::Error> {
///         buf.clear();
///         Ok(())
///     }
/// }
///
/// let pool = ObjectPool::new(Buffers, PoolConfiguration::new().with_max_size(2)).unwrap();
/// pool.open().unwrap();
/// let mut buf = pool.acquire().unwrap();
/// buf.extend_from_slice(b"hello");
/// ```
pub trait Manager: Send + Sync + 'static {
    /// Type of the pooled resources.
    type Resource: Send + 'static;

    /// Error reported by the lifecycle operations.
    type Error: Error + Send + Sync + 'static;

    /// Builds a brand-new resource.
    ///
    /// A failure here is reported to the acquirer as
    /// [`PoolError::PoolFull`](crate::PoolError::PoolFull).
    fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Checks a returned resource and prepares it for the next borrower.
    ///
    /// Returning an error retires the resource: it is destroyed and its
    /// capacity slot is handed back to the pool.
    fn validate_and_reset(&self, resource: &mut Self::Resource) -> Result<(), Self::Error>;

    /// Releases whatever the resource holds. Errors are logged, never raised.
    fn destroy(&self, resource: Self::Resource) -> Result<(), Self::Error> {
        drop(resource);
        Ok(())
    }
}

/// A [`Manager`] built from an infallible constructor.
///
/// Returned resources are always considered valid.
pub struct FactoryManager<F> {
    factory: F,
}

impl<F> FactoryManager<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<T, F> Manager for FactoryManager<F>
where
    T: Send + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    type Resource = T;
    type Error = Infallible;

    fn create(&self) -> Result<T, Infallible> {
        Ok((self.factory)())
    }

    fn validate_and_reset(&self, _resource: &mut T) -> Result<(), Infallible> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_manager() {
        let manager = FactoryManager::new(|| String::from("conn"));
        let mut resource = manager.create().unwrap();
        assert_eq!(resource, "conn");
        assert!(manager.validate_and_reset(&mut resource).is_ok());
        assert!(manager.destroy(resource).is_ok());
    }
}
