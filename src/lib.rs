//! # esox_leasepool
//!
//! Leased object pool for expensive-to-build objects. Callers lease an
//! instance by key, mutate it, and release it now or after a delay; the pool
//! restores the instance's captured state so the next holder gets it as if it
//! were freshly built.
//!
//! ## Features
//!
//! - Leases with a deadline; expired leases are reclaimed lazily on the next
//!   acquisition instead of by one timer per object
//! - Delayed release guarded by lease tickets, so a superseded timer never
//!   releases an entry that was leased again
//! - Snapshot and restore of schema-listed properties across an instance tree
//! - Growable pools, or fixed-capacity pools with pre-warming and
//!   wait-for-availability
//! - Named aliases for prototypes
//! - Health status, metrics and Prometheus export
//!
//! The environment is pluggable: a [`Host`] manufactures instances and
//! exposes their properties, a [`Scheduler`] provides time and timers.
//! [`MemoryHost`] and [`ManualScheduler`] are complete in-memory versions.
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_leasepool::{
//!     ManualScheduler, MemoryHost, NodeClass, ObjectPooler, PoolConfiguration, PoolKey,
//!     PropertyValue, RestorationSchema,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let host = Arc::new(MemoryHost::new());
//! let scheduler = Arc::new(ManualScheduler::new());
//! let crate_model = host.create(
//!     NodeClass::primitive("Part"),
//!     [("Transparency", PropertyValue::Number(0.0))],
//! );
//!
//! let pooler = ObjectPooler::new(
//!     Arc::clone(&host),
//!     scheduler.clone(),
//!     RestorationSchema::visual_defaults(),
//!     PoolConfiguration::default().with_lenient_properties(),
//! );
//!
//! let entry = pooler.get_object(&PoolKey::Direct(crate_model)).unwrap().unwrap();
//! host.set(*entry.instance(), "Transparency", 0.5);
//! entry.release_after(Duration::from_secs(1));
//!
//! scheduler.advance(Duration::from_secs(1));
//! assert_eq!(host.property(*entry.instance(), "Transparency"), Some(PropertyValue::Number(0.0)));
//! ```

mod config;
mod entry;
mod errors;
mod health;
mod host;
mod lease;
mod memory;
mod metrics;
mod pool;
mod scheduler;
mod schema;
mod snapshot;
mod value;

pub use config::{CapacityPolicy, PoolConfiguration};
pub use entry::PooledEntry;
pub use errors::{HostError, PoolError, PoolResult};
pub use health::HealthStatus;
pub use host::{Host, Subscription};
pub use lease::{Availability, Lease, LeaseState};
pub use memory::{MemoryHost, MemoryHostError, NodeId};
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::{ObjectPooler, PoolKey};
pub use scheduler::{Continuation, ManualScheduler, Scheduler, TokioScheduler};
pub use schema::{Kind, NodeClass, RestorationSchema, RestorationSchemaBuilder};
pub use snapshot::{DescendantSnapshot, PropertyMap, Snapshot, SnapshotRecorder};
pub use value::{Color3, PropertyValue, Vector3};
