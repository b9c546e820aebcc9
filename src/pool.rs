//! Pool manager: keyed collections of leased entries

use crate::config::{CapacityPolicy, PoolConfiguration};
use crate::entry::{EntryContext, PooledEntry};
use crate::errors::{PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::host::Host;
use crate::lease::Availability;
use crate::metrics::{EntryCounts, MetricsTracker, PoolMetrics};
use crate::scheduler::Scheduler;
use crate::schema::RestorationSchema;
use crate::snapshot::SnapshotRecorder;

use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// Identifies one pool
///
/// A `Named` key resolves to its prototype through the alias table and must
/// be registered with [`ObjectPooler::register_alias`] first. A direct key and
/// an alias for the same prototype are separate pools.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey<P> {
    Direct(P),
    Named(String),
}

impl<P> PoolKey<P> {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl<P> From<&str> for PoolKey<P> {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl<P> From<String> for PoolKey<P> {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl<P: fmt::Debug> fmt::Display for PoolKey<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(prototype) => write!(f, "{prototype:?}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Leased object pool over a [`Host`]
///
/// Owns one insertion-ordered collection of entries per [`PoolKey`] and the
/// alias table. Acquisition is first-fit over a collection: the first entry
/// that is available, or whose lease has run out, is leased and returned.
///
/// # Examples
///
/// ```
/// use esox_leasepool::{
///     Kind, ManualScheduler, MemoryHost, NodeClass, ObjectPooler, PoolConfiguration, PoolKey,
///     PropertyValue, RestorationSchema,
/// };
/// use std::sync::Arc;
///
/// let host = Arc::new(MemoryHost::new());
/// let bullet = host.create(
///     NodeClass::primitive("Part"),
///     [("Transparency", PropertyValue::Number(0.0))],
/// );
/// let schema = RestorationSchema::builder()
///     .kind(Kind::BasePrimitive, ["Transparency"])
///     .build();
///
/// let pooler = ObjectPooler::new(
///     Arc::clone(&host),
///     Arc::new(ManualScheduler::new()),
///     schema,
///     PoolConfiguration::default(),
/// );
/// pooler.register_alias("Bullet", bullet).unwrap();
///
/// let key = PoolKey::named("Bullet");
/// let entry = pooler.get_object(&key).unwrap().unwrap();
/// host.set(*entry.instance(), "Transparency", 1.0);
///
/// entry.release().unwrap();
/// assert_eq!(host.property(*entry.instance(), "Transparency"), Some(PropertyValue::Number(0.0)));
///
/// let again = pooler.get_object(&key).unwrap().unwrap();
/// assert_eq!(again, entry);
/// ```
pub struct ObjectPooler<H: Host> {
    host: Arc<H>,
    scheduler: Arc<dyn Scheduler>,
    schema: RestorationSchema,
    config: PoolConfiguration,
    pools: DashMap<PoolKey<H::Prototype>, Vec<PooledEntry<H>>>,
    aliases: DashMap<String, H::Prototype>,
    metrics: Arc<MetricsTracker>,
    next_id: AtomicUsize,
}

impl<H: Host> ObjectPooler<H> {
    /// Create a pooler with empty registry and alias table
    pub fn new(
        host: Arc<H>,
        scheduler: Arc<dyn Scheduler>,
        schema: RestorationSchema,
        config: PoolConfiguration,
    ) -> Self {
        Self {
            host,
            scheduler,
            schema,
            config,
            pools: DashMap::new(),
            aliases: DashMap::new(),
            metrics: Arc::new(MetricsTracker::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.config
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Point `name` at `prototype` and start an empty pool under it.
    ///
    /// Entries already pooled under the name are destroyed first. Every
    /// entry is torn down even if one fails; the first failure is returned.
    pub fn register_alias(
        &self,
        name: impl Into<String>,
        prototype: H::Prototype,
    ) -> PoolResult<()> {
        let name = name.into();
        let key = PoolKey::Named(name.clone());

        let retired = match self.pools.remove(&key) {
            Some((_, entries)) => Self::retire_all(entries),
            None => Ok(0),
        };

        self.pools.insert(key, Vec::new());
        debug!(alias = %name, ?prototype, "alias registered");
        self.aliases.insert(name, prototype);

        retired.map(|_| ())
    }

    /// Manufacture a new entry for `key`, lease it, append it to the key's
    /// collection and return it.
    pub fn add_to_pool(&self, key: &PoolKey<H::Prototype>) -> PoolResult<PooledEntry<H>> {
        let prototype = self.resolve(key)?;
        let entry = self.manufacture(key, &prototype)?;
        entry.secure();

        self.pools.entry(key.clone()).or_default().push(entry.clone());
        MetricsTracker::bump(&self.metrics.total_acquired);
        Ok(entry)
    }

    /// Lease the first claimable entry for `key`.
    ///
    /// With [`CapacityPolicy::Growable`] a new entry is manufactured when
    /// nothing can be claimed, so the result is always `Some`. With
    /// [`CapacityPolicy::Fixed`] the result is `None` instead.
    pub fn get_object(&self, key: &PoolKey<H::Prototype>) -> PoolResult<Option<PooledEntry<H>>> {
        self.resolve(key)?;

        if let Some(entry) = self.claim_existing(key)? {
            return Ok(Some(entry));
        }

        match self.config.capacity_policy {
            CapacityPolicy::Growable => self.add_to_pool(key).map(Some),
            CapacityPolicy::Fixed => {
                MetricsTracker::bump(&self.metrics.exhausted_events);
                trace!(pool = %key, "no entry available");
                Ok(None)
            }
        }
    }

    /// Lease an entry for `key`, waiting for one to come back if the pool is
    /// fixed-capacity and exhausted.
    ///
    /// Polls once per scheduler tick with no timeout; drop the future to stop
    /// waiting.
    pub async fn get_object_async(
        &self,
        key: &PoolKey<H::Prototype>,
    ) -> PoolResult<PooledEntry<H>> {
        loop {
            if let Some(entry) = self.get_object(key)? {
                return Ok(entry);
            }
            MetricsTracker::bump(&self.metrics.wait_ticks);
            self.scheduler.wait_next_tick().await;
        }
    }

    /// Top the key's collection up to `target` unleased entries.
    ///
    /// Never shrinks a pool. Returns how many entries were created. If
    /// manufacturing fails part way, the entries made so far are kept.
    pub fn create_pool(&self, key: &PoolKey<H::Prototype>, target: usize) -> PoolResult<usize> {
        let prototype = self.resolve(key)?;
        let missing = target.saturating_sub(self.pool_size(key));

        let mut created = Vec::with_capacity(missing);
        let mut failure = None;
        for _ in 0..missing {
            match self.manufacture(key, &prototype) {
                Ok(entry) => created.push(entry),
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        let count = created.len();
        self.pools.entry(key.clone()).or_default().extend(created);
        debug!(pool = %key, created = count, target, "pool warmed");

        match failure {
            Some(error) => Err(error),
            None => Ok(count),
        }
    }

    /// Destroy every entry for `key` and forget the key.
    ///
    /// A named key also loses its alias. Returns the number of entries
    /// destroyed; on failure the remaining entries are still destroyed and
    /// the first error is returned.
    pub fn clear_pool(&self, key: &PoolKey<H::Prototype>) -> PoolResult<usize> {
        let entries = self.pools.remove(key).map(|(_, entries)| entries).unwrap_or_default();
        if let PoolKey::Named(name) = key {
            self.aliases.remove(name);
        }

        let count = entries.len();
        let result = Self::retire_all(entries);
        debug!(pool = %key, destroyed = count, "pool cleared");
        result
    }

    /// Number of entries pooled under `key`
    pub fn pool_size(&self, key: &PoolKey<H::Prototype>) -> usize {
        self.pools.get(key).map_or(0, |entries| entries.len())
    }

    /// Handles to every entry under `key`, in insertion order
    pub fn entries(&self, key: &PoolKey<H::Prototype>) -> Vec<PooledEntry<H>> {
        self.pools.get(key).map(|entries| entries.clone()).unwrap_or_default()
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Get health status of the pool behind `key`
    pub fn get_health_status(&self, key: &PoolKey<H::Prototype>) -> HealthStatus {
        let counts = Self::count(self.entries(key).iter());
        HealthStatus::new(counts.available, counts.leased, counts.expired)
    }

    /// Get metrics across every pool
    pub fn get_metrics(&self) -> PoolMetrics {
        let entries: Vec<PooledEntry<H>> = self
            .pools
            .iter()
            .flat_map(|pool| pool.value().clone())
            .collect();

        let mut counts = Self::count(entries.iter());
        counts.pools = self.pools.len();
        self.metrics.get_metrics(counts)
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
        crate::metrics::MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    fn resolve(&self, key: &PoolKey<H::Prototype>) -> PoolResult<H::Prototype> {
        match key {
            PoolKey::Direct(prototype) => Ok(prototype.clone()),
            PoolKey::Named(name) => self
                .aliases
                .get(name)
                .map(|prototype| prototype.value().clone())
                .ok_or_else(|| PoolError::UnknownAlias(name.clone())),
        }
    }

    fn claim_existing(&self, key: &PoolKey<H::Prototype>) -> PoolResult<Option<PooledEntry<H>>> {
        let Some(entries) = self.pools.get(key) else {
            return Ok(None);
        };

        let now = self.scheduler.now();
        for entry in entries.iter() {
            if entry.try_claim(now)? {
                MetricsTracker::bump(&self.metrics.total_acquired);
                trace!(pool = %key, entry = entry.id(), "claimed");
                return Ok(Some(entry.clone()));
            }
        }

        Ok(None)
    }

    fn manufacture(
        &self,
        key: &PoolKey<H::Prototype>,
        prototype: &H::Prototype,
    ) -> PoolResult<PooledEntry<H>> {
        let instance = self.host.manufacture(prototype)?;
        let snapshot = SnapshotRecorder::new(self.host.as_ref(), &self.schema)
            .with_descendants(self.config.restore_descendants)
            .with_strict_properties(self.config.strict_properties)
            .capture(&instance);

        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(error) => {
                // The instance never made it into a pool
                if let Err(destroy_error) = self.host.destroy(&instance) {
                    debug!(pool = %key, %destroy_error, "cleanup after failed capture failed");
                }
                return Err(error);
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        MetricsTracker::bump(&self.metrics.total_manufactured);
        debug!(
            pool = %key,
            entry = id,
            ?instance,
            properties = snapshot.properties().len(),
            descendants = snapshot.descendants().len(),
            "entry manufactured"
        );

        Ok(PooledEntry::new(id, instance, snapshot, self.entry_context()))
    }

    fn entry_context(&self) -> EntryContext<H> {
        EntryContext {
            host: Arc::clone(&self.host),
            scheduler: Arc::clone(&self.scheduler),
            release_timeout: self.config.release_timeout,
            metrics: Arc::clone(&self.metrics),
        }
    }

    fn count<'a>(entries: impl Iterator<Item = &'a PooledEntry<H>>) -> EntryCounts {
        let mut counts = EntryCounts::default();
        for entry in entries {
            counts.total += 1;
            match entry.availability() {
                Availability::Available => counts.available += 1,
                Availability::Leased => counts.leased += 1,
                Availability::Expired => counts.expired += 1,
                Availability::Retired => {}
            }
        }
        counts
    }

    fn retire_all(entries: Vec<PooledEntry<H>>) -> PoolResult<usize> {
        let count = entries.len();
        let mut first_error = None;

        for entry in entries {
            if let Err(error) = entry.retire() {
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(count),
        }
    }
}
