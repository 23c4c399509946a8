//! Per-lease renewal state machine.
//!
//! A lease with no record is implicitly active and immediately eligible; the
//! record is created by the first successful renewal. Suspension
//! (`active == false`) blocks all attempts and is lifted by an external
//! collaborator, never by this module.

use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::types::{BlockHeight, LeaseId, RenewalStatus};

impl RenewalStatus {
    /// Check whether a renewal attempt may proceed at block `now`.
    ///
    /// Suspension is checked before the eligibility window, so a suspended
    /// lease reports `RenewalInProgress` even when its window has passed.
    pub fn ensure_eligible(&self, now: BlockHeight) -> Result<(), EngineError> {
        if !self.active {
            return Err(EngineError::RenewalInProgress);
        }
        if now < self.next_eligible {
            return Err(EngineError::GracePeriodExceeded);
        }
        Ok(())
    }
}

/// Holds renewal status records, one per lease that has ever renewed.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    statuses: BTreeMap<LeaseId, RenewalStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored status for a lease, if any. Pure read.
    pub fn get(&self, lease_id: LeaseId) -> Option<&RenewalStatus> {
        self.statuses.get(&lease_id)
    }

    /// Status for a lease, defaulting to the initial record when absent.
    ///
    /// Resolve-or-default: reading never creates storage.
    pub fn resolve(&self, lease_id: LeaseId) -> RenewalStatus {
        self.statuses
            .get(&lease_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Record a successful renewal at block `now`.
    ///
    /// Sets `last_renewed = now`, `next_eligible = now + period`, re-asserts
    /// the active flag, and increments the extension count on top of
    /// `prior_extensions`.
    pub fn record_renewal(
        &mut self,
        lease_id: LeaseId,
        now: BlockHeight,
        period: u64,
        prior_extensions: u64,
    ) {
        self.statuses.insert(
            lease_id,
            RenewalStatus {
                last_renewed: now,
                next_eligible: now + period,
                active: true,
                extensions: prior_extensions + 1,
            },
        );
    }

    /// Overwrite a lease's status record. Host/fixture wiring, not part of
    /// the evaluation path.
    pub fn insert(&mut self, lease_id: LeaseId, status: RenewalStatus) {
        self.statuses.insert(lease_id, status);
    }
}
