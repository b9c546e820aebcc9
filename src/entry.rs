//! Pooled entries: one manufactured instance plus its lease state machine

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::errors::{PoolError, PoolResult};
use crate::host::{Host, Subscription};
use crate::lease::{Availability, Lease, LeaseCell, LeaseState};
use crate::metrics::MetricsTracker;
use crate::scheduler::{Scheduler, deadline_after};
use crate::snapshot::Snapshot;

/// Everything an entry needs from the pooler that manufactured it
pub(crate) struct EntryContext<H: Host> {
    pub host: Arc<H>,
    pub scheduler: Arc<dyn Scheduler>,
    pub release_timeout: Duration,
    pub metrics: Arc<MetricsTracker>,
}

impl<H: Host> Clone for EntryContext<H> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            scheduler: Arc::clone(&self.scheduler),
            release_timeout: self.release_timeout,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

struct EntryInner<H: Host> {
    id: usize,
    instance: H::Instance,
    snapshot: Snapshot<H::Instance>,
    context: EntryContext<H>,
    lease: Mutex<LeaseCell>,
    subscriptions: Mutex<Vec<Box<dyn Subscription>>>,
}

/// A pooled instance handed out by [`ObjectPooler`](crate::ObjectPooler).
///
/// Handles are cheap clones of one shared entry; the pool keeps one and the
/// caller gets another. Leasing is tracked by the entry itself, not by who
/// holds a handle: dropping a handle does not release anything.
///
/// # Examples
///
/// ```
/// use esox_leasepool::{
///     ManualScheduler, MemoryHost, NodeClass, ObjectPooler, PoolConfiguration, PoolKey,
///     PropertyValue, RestorationSchema,
/// };
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let host = Arc::new(MemoryHost::new());
/// let scheduler = Arc::new(ManualScheduler::new());
/// let prototype = host.create(NodeClass::named("Model"), Vec::<(String, PropertyValue)>::new());
/// let pooler = ObjectPooler::new(
///     Arc::clone(&host),
///     scheduler.clone(),
///     RestorationSchema::default(),
///     PoolConfiguration::default(),
/// );
///
/// let entry = pooler.get_object(&PoolKey::Direct(prototype)).unwrap().unwrap();
/// entry.release_after(Duration::from_secs(2));
/// assert!(!entry.is_available());
///
/// scheduler.advance(Duration::from_secs(2));
/// assert!(entry.is_available());
/// ```
pub struct PooledEntry<H: Host> {
    inner: Arc<EntryInner<H>>,
}

impl<H: Host> PooledEntry<H> {
    pub(crate) fn new(
        id: usize,
        instance: H::Instance,
        snapshot: Snapshot<H::Instance>,
        context: EntryContext<H>,
    ) -> Self {
        Self {
            inner: Arc::new(EntryInner {
                id,
                instance,
                snapshot,
                context,
                lease: Mutex::new(LeaseCell::default()),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Identifier unique within the pooler that made this entry
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// The manufactured instance
    pub fn instance(&self) -> &H::Instance {
        &self.inner.instance
    }

    /// State captured when the instance was manufactured
    pub fn snapshot(&self) -> &Snapshot<H::Instance> {
        &self.inner.snapshot
    }

    pub fn lease_state(&self) -> LeaseState {
        self.inner.lease.lock().state()
    }

    /// Deadline of the current lease, `None` when not leased
    pub fn secured_until(&self) -> Option<Instant> {
        match self.lease_state() {
            LeaseState::Leased(lease) => Some(lease.until),
            LeaseState::Available | LeaseState::Retired => None,
        }
    }

    pub fn availability(&self) -> Availability {
        self.inner.lease.lock().availability(self.inner.context.scheduler.now())
    }

    /// Whether an acquisition right now could claim this entry
    pub fn is_available(&self) -> bool {
        self.availability().is_claimable()
    }

    /// Lease the entry for the configured release timeout.
    ///
    /// Always replaces the current lease, which also supersedes any pending
    /// delayed release. Has no effect on a retired entry.
    pub fn secure(&self) {
        let until = self.inner.context.scheduler.deadline(self.inner.context.release_timeout);
        match self.inner.lease.lock().lease_until(until) {
            Some(lease) => trace!(entry = self.inner.id, ticket = lease.ticket, "secured"),
            None => trace!(entry = self.inner.id, "secure ignored, entry retired"),
        }
    }

    /// Release immediately: disconnect subscriptions, park the instance,
    /// restore its snapshot and make it available.
    ///
    /// No-op on a retired entry or one already being released. If parking or
    /// restoring fails, the subscriptions are already gone but the entry
    /// keeps its lease; once that runs out, the next claim retries the
    /// restore.
    pub fn release(&self) -> PoolResult<()> {
        self.release_lease(None).map(|_| ())
    }

    /// Keep the entry leased for `delay`, then release it.
    ///
    /// The release only happens if nothing replaced this lease in the
    /// meantime: a [`secure`](Self::secure), a manual
    /// [`release`](Self::release) or another `release_after` all supersede it.
    pub fn release_after(&self, delay: Duration) {
        let until = self.inner.context.scheduler.deadline(delay);
        let Some(lease) = self.inner.lease.lock().lease_until(until) else {
            trace!(entry = self.inner.id, "delayed release ignored, entry retired");
            return;
        };

        trace!(entry = self.inner.id, ticket = lease.ticket, ?delay, "release scheduled");

        let entry = Arc::downgrade(&self.inner);
        self.inner.context.scheduler.after(
            delay,
            Box::new(move || {
                if let Some(inner) = entry.upgrade() {
                    PooledEntry { inner }.release_if_current(&lease);
                }
            }),
        );
    }

    /// Reapply the captured snapshot without touching the lease
    pub fn restore(&self) -> PoolResult<()> {
        self.inner
            .snapshot
            .apply(self.inner.context.host.as_ref(), &self.inner.instance)?;
        MetricsTracker::bump(&self.inner.context.metrics.total_restored);
        Ok(())
    }

    /// Register a subscription to disconnect when the entry is released.
    ///
    /// A retired entry disconnects it straight away.
    pub fn track(&self, subscription: impl Subscription) {
        if self.lease_state() == LeaseState::Retired {
            Box::new(subscription).disconnect();
            return;
        }
        self.inner.subscriptions.lock().push(Box::new(subscription));
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    /// Lease the entry if it is available or its lease has run out.
    ///
    /// Reclaiming an expired entry drops the previous holder's subscriptions
    /// and restores the snapshot. If that restore fails the expired lease is
    /// put back, so the next scan can retry.
    pub(crate) fn try_claim(&self, now: Instant) -> PoolResult<bool> {
        let reclaimed = {
            let mut lease = self.inner.lease.lock();
            let availability = lease.availability(now);
            if !availability.is_claimable() {
                return Ok(false);
            }
            let previous = lease.state();
            let until = deadline_after(now, self.inner.context.release_timeout);
            let Some(granted) = lease.lease_until(until) else {
                return Ok(false);
            };
            (availability == Availability::Expired).then_some((previous, granted))
        };

        if let Some((previous, granted)) = reclaimed {
            trace!(entry = self.inner.id, "reclaiming expired lease");
            self.disconnect_subscriptions();
            if let Err(error) = self.restore() {
                self.inner.lease.lock().revert(&granted, previous);
                return Err(error);
            }
        }

        Ok(true)
    }

    /// Destroy the instance; the entry ignores every later lease operation
    pub(crate) fn retire(&self) -> PoolResult<()> {
        self.inner.lease.lock().retire();
        self.disconnect_subscriptions();
        self.inner.context.host.destroy(&self.inner.instance)?;
        MetricsTracker::bump(&self.inner.context.metrics.total_destroyed);
        Ok(())
    }

    fn release_if_current(&self, lease: &Lease) {
        match self.release_lease(Some(lease)) {
            Ok(true) => {}
            Ok(false) => {
                MetricsTracker::bump(&self.inner.context.metrics.stale_releases);
                trace!(entry = self.inner.id, ticket = lease.ticket, "delayed release superseded");
            }
            Err(error) => warn!(entry = self.inner.id, %error, "delayed release failed"),
        }
    }

    /// Park, restore and free the entry. With `expected` set, the entry is only
    /// freed if that lease is current both before and after the reset.
    ///
    /// Returns whether the entry became available.
    fn release_lease(&self, expected: Option<&Lease>) -> PoolResult<bool> {
        if !self.inner.lease.lock().begin_release(expected) {
            trace!(entry = self.inner.id, "release skipped");
            return Ok(false);
        }

        self.disconnect_subscriptions();
        let reset = self
            .inner
            .context
            .host
            .park(&self.inner.instance)
            .map_err(PoolError::from)
            .and_then(|()| self.restore());

        let released = {
            let mut lease = self.inner.lease.lock();
            if let Err(error) = reset {
                lease.abort_release();
                return Err(error);
            }
            lease.finish_release(expected)
        };

        if released {
            MetricsTracker::bump(&self.inner.context.metrics.total_released);
            trace!(entry = self.inner.id, "released");
        }
        Ok(released)
    }

    fn disconnect_subscriptions(&self) {
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.lock());
        for subscription in subscriptions {
            subscription.disconnect();
        }
    }
}

impl<H: Host> Clone for PooledEntry<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Handles are equal when they refer to the same entry
impl<H: Host> PartialEq for PooledEntry<H> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<H: Host> Eq for PooledEntry<H> {}

impl<H: Host> fmt::Debug for PooledEntry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledEntry")
            .field("id", &self.inner.id)
            .field("instance", &self.inner.instance)
            .field("lease", &self.lease_state())
            .finish_non_exhaustive()
    }
}
