//! # forkpool
//!
//! Bounded, thread-safe object pool for resources that are expensive to
//! build, such as network connections.
//!
//! ## Features
//!
//! - At most `max_size` resources alive at once; acquirers block while the
//!   pool is exhausted
//! - Automatic return of objects via RAII (Drop trait)
//! - Validation and reset on return; failing resources are destroyed and
//!   their slot reclaimed
//! - Explicit open/close lifecycle with draining of idle resources
//! - Fork detection: state inherited by a forked child is reset once
//! - Timed, non-blocking and async acquisition
//! - Health monitoring and metrics
//! - Prometheus metrics export
//!
//! ## Quick Start
//!
//! ```rust
//! use forkpool::{ObjectPool, PoolConfiguration};
//!
//! let pool = ObjectPool::from_factory(|| String::from("conn"), PoolConfiguration::default()).unwrap();
//! pool.open().unwrap();
//! {
//!     let obj = pool.acquire().unwrap();
//!     println!("Got: {}", *obj);
//!     // Object automatically returned when `obj` goes out of scope
//! }
//! pool.close().unwrap();
//! ```

mod config;
mod errors;
mod generation;
mod health;
mod manager;
mod metrics;
mod pool;
mod process_guard;

pub use config::{DEFAULT_FORK_LOCK_TIMEOUT, DEFAULT_MAX_SIZE, PoolConfiguration};
pub use errors::{PoolError, PoolResult};
pub use health::HealthStatus;
pub use manager::{FactoryManager, Manager};
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::{ObjectPool, PooledObject};
