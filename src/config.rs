//! Pool configuration options

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a pool reacts when every entry for a key is leased
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CapacityPolicy {
    /// Manufacture a new entry whenever no existing one can be claimed
    #[default]
    Growable,

    /// Only hand out entries that already exist (see
    /// [`ObjectPooler::create_pool`](crate::ObjectPooler::create_pool));
    /// report unavailability or wait for an entry to come back
    Fixed,
}

/// Configuration for pool behavior
///
/// # Examples
///
/// ```
/// use esox_leasepool::{CapacityPolicy, PoolConfiguration};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_release_timeout(Duration::from_secs(10))
///     .with_capacity_policy(CapacityPolicy::Fixed)
///     .without_descendants();
///
/// assert_eq!(config.release_timeout, Duration::from_secs(10));
/// assert_eq!(config.capacity_policy, CapacityPolicy::Fixed);
/// assert!(!config.restore_descendants);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfiguration {
    /// How long a handed-out entry stays leased before the pool may reclaim it
    pub release_timeout: Duration,

    /// Growable or fixed-capacity acquisition
    pub capacity_policy: CapacityPolicy,

    /// Whether snapshots also cover every descendant of the instance
    pub restore_descendants: bool,

    /// Whether a schema property missing on an instance fails the capture.
    /// When off, the schema entry is intersected with what the node has.
    pub strict_properties: bool,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            release_timeout: Duration::from_secs(30),
            capacity_policy: CapacityPolicy::Growable,
            restore_descendants: true,
            strict_properties: true,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lease duration applied by every secure
    pub fn with_release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout = timeout;
        self
    }

    /// Set the capacity policy
    pub fn with_capacity_policy(mut self, policy: CapacityPolicy) -> Self {
        self.capacity_policy = policy;
        self
    }

    /// Only snapshot the root instance, not its descendants
    pub fn without_descendants(mut self) -> Self {
        self.restore_descendants = false;
        self
    }

    /// Skip schema properties an instance does not have instead of failing
    pub fn with_lenient_properties(mut self) -> Self {
        self.strict_properties = false;
        self
    }
}
