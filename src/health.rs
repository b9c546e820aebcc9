//! Health monitoring for individual pools

#[cfg(feature = "serde")]
use serde::Serialize;

/// Health status of the pool behind one key
///
/// # Examples
///
/// ```
/// use esox_leasepool::HealthStatus;
///
/// let health = HealthStatus::new(3, 1, 0);
/// assert!(health.is_healthy());
/// assert_eq!(health.total_entries, 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Share of entries under an unexpired lease (0.0 to 1.0)
    pub utilization: f64,

    /// Entries never leased or already released
    pub available_entries: usize,

    /// Entries under an unexpired lease
    pub leased_entries: usize,

    /// Entries whose lease ran out; the next acquisition reclaims them
    pub expired_entries: usize,

    /// All entries in the pool
    pub total_entries: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub fn new(available: usize, leased: usize, expired: usize) -> Self {
        let total = available + leased + expired;
        let utilization = if total > 0 {
            leased as f64 / total as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if available + expired == 0 && total > 0 {
            warnings.push("Every entry is leased".to_string());
        }

        if expired > 0 {
            warnings.push(format!("{expired} expired lease(s) awaiting reclaim"));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            available_entries: available,
            leased_entries: leased,
            expired_entries: expired,
            total_entries: total,
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
    fn fully_leased_pool_is_unhealthy() {
        let health = HealthStatus::new(0, 4, 0);

        assert!(!health.is_healthy());
        assert_eq!(health.warning_count, 2);
        assert!(health.warnings.iter().any(|w| w == "Every entry is leased"));
    }

    #[test]
    fn expired_leases_are_reported_but_claimable() {
        let health = HealthStatus::new(0, 1, 2);

        assert!(health.is_healthy());
        assert_eq!(health.warnings, ["2 expired lease(s) awaiting reclaim"]);
    }

    #[test]
    fn empty_pool_has_no_warnings() {
        let health = HealthStatus::new(0, 0, 0);
        assert!(health.is_healthy());
        assert!(health.warnings.is_empty());
    }
}
