//! Metrics collection and export for the lease pool

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Metrics data for an [`ObjectPooler`](crate::ObjectPooler)
///
/// # Examples
///
/// ```
/// use esox_leasepool::{
///     ManualScheduler, MemoryHost, NodeClass, ObjectPooler, PoolConfiguration, PoolKey,
///     PropertyValue, RestorationSchema,
/// };
/// use std::sync::Arc;
///
/// let host = Arc::new(MemoryHost::new());
/// let prototype = host.create(NodeClass::named("Model"), Vec::<(String, PropertyValue)>::new());
/// let pooler = ObjectPooler::new(
///     Arc::clone(&host),
///     Arc::new(ManualScheduler::new()),
///     RestorationSchema::default(),
///     PoolConfiguration::default(),
/// );
///
/// let _entry = pooler.get_object(&PoolKey::Direct(prototype)).unwrap();
/// let metrics = pooler.get_metrics();
/// assert_eq!(metrics.total_manufactured, 1);
/// assert_eq!(metrics.leased_entries, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolMetrics {
    /// Instances cloned from prototypes
    pub total_manufactured: usize,

    /// Entries handed out to callers
    pub total_acquired: usize,

    /// Immediate releases performed, including those fired by a delay
    pub total_released: usize,

    /// Snapshot restores applied
    pub total_restored: usize,

    /// Delayed releases that found their lease superseded
    pub stale_releases: usize,

    /// Fixed-capacity acquisitions that found nothing to claim
    pub exhausted_events: usize,

    /// Ticks spent waiting for a fixed-capacity pool
    pub wait_ticks: usize,

    /// Instances destroyed by clearing a pool
    pub total_destroyed: usize,

    /// Keys with a registered collection
    pub pools: usize,

    /// Live entries across all pools
    pub total_entries: usize,

    /// Entries currently under an unexpired lease
    pub leased_entries: usize,

    /// Entries that can be claimed right now
    pub available_entries: usize,

    /// Leased share of all entries (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_manufactured".to_string(), self.total_manufactured.to_string());
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_restored".to_string(), self.total_restored.to_string());
        metrics.insert("stale_releases".to_string(), self.stale_releases.to_string());
        metrics.insert("exhausted_events".to_string(), self.exhausted_events.to_string());
        metrics.insert("wait_ticks".to_string(), self.wait_ticks.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("pools".to_string(), self.pools.to_string());
        metrics.insert("total_entries".to_string(), self.total_entries.to_string());
        metrics.insert("leased_entries".to_string(), self.leased_entries.to_string());
        metrics.insert("available_entries".to_string(), self.available_entries.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Render metrics in the Prometheus text exposition format.
    ///
    /// Every sample carries a `pool` label plus one label per tag.
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> crate::PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            labels.extend(tags.iter().map(|(key, value)| (key.clone(), value.clone())));
        }

        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let gauges = [
            (
                "leasepool_entries_leased",
                "Entries under an unexpired lease",
                metrics.leased_entries,
            ),
            (
                "leasepool_entries_available",
                "Entries claimable right now",
                metrics.available_entries,
            ),
            ("leasepool_entries_total", "Live entries across all pools", metrics.total_entries),
            ("leasepool_pools", "Keys with a registered collection", metrics.pools),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help)).map_err(to_pool_error)?;
            gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
            registry.register(Box::new(gauge)).map_err(to_pool_error)?;
        }

        let utilization =
            Gauge::with_opts(opts("leasepool_utilization", "Leased share of all entries"))
                .map_err(to_pool_error)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(to_pool_error)?;

        let counters = [
            (
                "leasepool_manufactured_total",
                "Instances cloned from prototypes",
                metrics.total_manufactured,
            ),
            ("leasepool_acquired_total", "Entries handed out", metrics.total_acquired),
            ("leasepool_released_total", "Releases performed", metrics.total_released),
            ("leasepool_restored_total", "Snapshot restores applied", metrics.total_restored),
            (
                "leasepool_stale_releases_total",
                "Superseded delayed releases",
                metrics.stale_releases,
            ),
            (
                "leasepool_exhausted_total",
                "Fixed-capacity acquisitions with nothing to claim",
                metrics.exhausted_events,
            ),
            (
                "leasepool_wait_ticks_total",
                "Ticks spent waiting for availability",
                metrics.wait_ticks,
            ),
            (
                "leasepool_destroyed_total",
                "Instances destroyed by clearing",
                metrics.total_destroyed,
            ),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help)).map_err(to_pool_error)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(to_pool_error)?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(to_pool_error)?;
        String::from_utf8(buffer).map_err(|error| crate::PoolError::Metrics(error.to_string()))
    }
}

#[cfg(feature = "metrics")]
fn to_pool_error(error: prometheus::Error) -> crate::PoolError {
    crate::PoolError::Metrics(error.to_string())
}

/// Internal metrics tracker shared by the pooler and its entries
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub total_manufactured: AtomicUsize,
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_restored: AtomicUsize,
    pub stale_releases: AtomicUsize,
    pub exhausted_events: AtomicUsize,
    pub wait_ticks: AtomicUsize,
    pub total_destroyed: AtomicUsize,
}

/// Point-in-time entry counts the tracker cannot know by itself
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EntryCounts {
    pub pools: usize,
    pub total: usize,
    pub leased: usize,
    pub available: usize,
    pub expired: usize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, counts: EntryCounts) -> PoolMetrics {
        let utilization = if counts.total > 0 {
            counts.leased as f64 / counts.total as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_manufactured: self.total_manufactured.load(Ordering::Relaxed),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_restored: self.total_restored.load(Ordering::Relaxed),
            stale_releases: self.stale_releases.load(Ordering::Relaxed),
            exhausted_events: self.exhausted_events.load(Ordering::Relaxed),
            wait_ticks: self.wait_ticks.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            pools: counts.pools,
            total_entries: counts.total,
            leased_entries: counts.leased,
            available_entries: counts.available,
            utilization,
        }
    }
}
