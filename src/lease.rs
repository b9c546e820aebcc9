//! Lease state of a pooled entry

use std::time::Instant;

/// One grant of an entry to a holder
///
/// Every lease an entry hands out carries a ticket that no earlier lease of
/// the same entry had, so two leases compare equal only if they are the same
/// grant. A delayed release remembers its lease and fires only while that
/// exact lease is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub until: Instant,
    pub ticket: u64,
}

impl Lease {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.until
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaseState {
    #[default]
    Available,
    Leased(Lease),
    /// The entry's pool was cleared and its instance destroyed
    Retired,
}

/// How an acquisition scan sees an entry at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// Leased, but the deadline has passed; reclaimable after a restore
    Expired,
    Leased,
    Retired,
}

impl Availability {
    pub fn is_claimable(self) -> bool {
        matches!(self, Self::Available | Self::Expired)
    }
}

/// Lease bookkeeping guarded by the entry's mutex
///
/// While a release is parking and restoring the instance outside the lock,
/// `releasing` keeps the entry unclaimable.
#[derive(Debug, Default)]
pub(crate) struct LeaseCell {
    state: LeaseState,
    issued: u64,
    releasing: bool,
}

impl LeaseCell {
    pub fn state(&self) -> LeaseState {
        self.state
    }

    /// Replace whatever lease is current with a fresh one ending at `until`
    pub fn lease_until(&mut self, until: Instant) -> Option<Lease> {
        if self.state == LeaseState::Retired {
            return None;
        }

        self.issued += 1;
        let lease = Lease {
            until,
            ticket: self.issued,
        };
        self.state = LeaseState::Leased(lease);
        Some(lease)
    }

    pub fn availability(&self, now: Instant) -> Availability {
        match self.state {
            LeaseState::Retired => Availability::Retired,
            _ if self.releasing => Availability::Leased,
            LeaseState::Available => Availability::Available,
            LeaseState::Leased(lease) if lease.is_expired(now) => Availability::Expired,
            LeaseState::Leased(_) => Availability::Leased,
        }
    }

    pub fn holds(&self, lease: &Lease) -> bool {
        self.state == LeaseState::Leased(*lease)
    }

    /// Start a release. With `expected` set, only that lease may be released.
    ///
    /// Returns `false` if the entry is retired, already being released, or
    /// no longer holds `expected`.
    pub fn begin_release(&mut self, expected: Option<&Lease>) -> bool {
        if self.releasing || self.state == LeaseState::Retired {
            return false;
        }
        if expected.is_some_and(|lease| !self.holds(lease)) {
            return false;
        }

        self.releasing = true;
        true
    }

    /// Complete a release begun with the same `expected` lease.
    ///
    /// The entry only becomes available if it was not retired or leased again
    /// while the release ran.
    pub fn finish_release(&mut self, expected: Option<&Lease>) -> bool {
        self.releasing = false;
        if self.state == LeaseState::Retired {
            return false;
        }
        if expected.is_some_and(|lease| !self.holds(lease)) {
            return false;
        }

        self.state = LeaseState::Available;
        true
    }

    pub fn abort_release(&mut self) {
        self.releasing = false;
    }

    /// Put `previous` back if `granted` is still the current lease
    pub fn revert(&mut self, granted: &Lease, previous: LeaseState) {
        if self.holds(granted) {
            self.state = previous;
        }
    }

    pub fn retire(&mut self) {
        self.state = LeaseState::Retired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn every_lease_gets_a_new_ticket() {
        let mut cell = LeaseCell::default();
        let deadline = Instant::now() + Duration::from_secs(30);

        let first = cell.lease_until(deadline).unwrap();
        let second = cell.lease_until(deadline).unwrap();

        assert_ne!(first, second);
        assert!(!cell.holds(&first));
        assert!(cell.holds(&second));
    }

    #[test]
    fn availability_tracks_the_deadline() {
        let mut cell = LeaseCell::default();
        let now = Instant::now();
        assert_eq!(cell.availability(now), Availability::Available);

        cell.lease_until(now + Duration::from_secs(5));
        assert_eq!(cell.availability(now), Availability::Leased);
        assert_eq!(cell.availability(now + Duration::from_secs(4)), Availability::Leased);
        assert_eq!(cell.availability(now + Duration::from_secs(5)), Availability::Expired);

        assert!(cell.begin_release(None));
        assert!(cell.finish_release(None));
        assert_eq!(cell.availability(now), Availability::Available);
    }

    #[test]
    fn release_in_progress_is_not_claimable() {
        let mut cell = LeaseCell::default();
        let now = Instant::now();
        let lease = cell.lease_until(now).unwrap();
        assert_eq!(cell.availability(now), Availability::Expired);

        assert!(cell.begin_release(Some(&lease)));
        assert_eq!(cell.availability(now), Availability::Leased);
        assert!(!cell.begin_release(None));

        assert!(cell.finish_release(Some(&lease)));
        assert_eq!(cell.availability(now), Availability::Available);
    }

    #[test]
    fn release_of_a_replaced_lease_does_not_free_the_entry() {
        let mut cell = LeaseCell::default();
        let now = Instant::now();
        let old = cell.lease_until(now).unwrap();

        assert!(cell.begin_release(Some(&old)));
        let new = cell.lease_until(now + Duration::from_secs(30)).unwrap();

        assert!(!cell.finish_release(Some(&old)));
        assert!(cell.holds(&new));
        assert!(!cell.begin_release(Some(&old)));
    }

    #[test]
    fn aborted_release_keeps_the_lease() {
        let mut cell = LeaseCell::default();
        let now = Instant::now();
        let lease = cell.lease_until(now + Duration::from_secs(5)).unwrap();

        assert!(cell.begin_release(None));
        cell.abort_release();

        assert!(cell.holds(&lease));
        assert_eq!(cell.availability(now + Duration::from_secs(5)), Availability::Expired);
    }

    #[test]
    fn revert_only_undoes_the_granted_lease() {
        let mut cell = LeaseCell::default();
        let now = Instant::now();
        let expired = cell.lease_until(now).unwrap();
        let previous = cell.state();

        let granted = cell.lease_until(now + Duration::from_secs(30)).unwrap();
        cell.revert(&granted, previous);
        assert!(cell.holds(&expired));

        let granted = cell.lease_until(now + Duration::from_secs(30)).unwrap();
        let newer = cell.lease_until(now + Duration::from_secs(60)).unwrap();
        cell.revert(&granted, previous);
        assert!(cell.holds(&newer));
    }

    #[test]
    fn retired_cells_stay_retired() {
        let mut cell = LeaseCell::default();
        cell.retire();

        assert!(cell.lease_until(Instant::now()).is_none());
        assert!(!cell.begin_release(None));
        assert!(!cell.finish_release(None));
        assert_eq!(cell.state(), LeaseState::Retired);
        assert!(!cell.availability(Instant::now()).is_claimable());
    }
}
