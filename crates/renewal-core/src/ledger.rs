//! External collaborator interfaces.
//!
//! The engine delegates payment-history storage to a payment tracker and
//! lease-term mutation to a lease factory. Both are narrow, synchronous,
//! failure-reporting seams; the engine never retries a collaborator call and
//! surfaces its failure verbatim.
//!
//! The in-memory implementations back tests and the CLI's fixture files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{LeaseId, PaymentRecord};

/// Read-only view of a lease's payment history.
pub trait PaymentTracker {
    /// Ordered payment sequence for a lease.
    ///
    /// Fails with `NoPaymentHistory` when the lease is unknown to the tracker.
    fn history(&self, lease_id: LeaseId) -> Result<Vec<PaymentRecord>, EngineError>;
}

/// Owner of lease terms.
pub trait LeaseFactory {
    /// Current term for a lease; `LeaseNotFound` when absent.
    fn term(&self, lease_id: LeaseId) -> Result<u64, EngineError>;

    /// Persist a new term; `UpdateFailed` when the factory rejects it.
    fn update_term(&mut self, lease_id: LeaseId, new_term: u64) -> Result<(), EngineError>;
}

/// In-memory payment tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryPaymentTracker {
    histories: BTreeMap<LeaseId, Vec<PaymentRecord>>,
}

impl MemoryPaymentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the history for a lease.
    pub fn set_history(&mut self, lease_id: LeaseId, payments: Vec<PaymentRecord>) {
        self.histories.insert(lease_id, payments);
    }

    /// Append one payment to a lease's history, creating it if absent.
    pub fn record_payment(&mut self, lease_id: LeaseId, payment: PaymentRecord) {
        self.histories.entry(lease_id).or_default().push(payment);
    }
}

impl PaymentTracker for MemoryPaymentTracker {
    fn history(&self, lease_id: LeaseId) -> Result<Vec<PaymentRecord>, EngineError> {
        self.histories
            .get(&lease_id)
            .cloned()
            .ok_or(EngineError::NoPaymentHistory)
    }
}

/// In-memory lease factory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryLeaseFactory {
    terms: BTreeMap<LeaseId, u64>,
}

impl MemoryLeaseFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_term(&mut self, lease_id: LeaseId, term: u64) {
        self.terms.insert(lease_id, term);
    }
}

impl LeaseFactory for MemoryLeaseFactory {
    fn term(&self, lease_id: LeaseId) -> Result<u64, EngineError> {
        self.terms
            .get(&lease_id)
            .copied()
            .ok_or(EngineError::LeaseNotFound)
    }

    fn update_term(&mut self, lease_id: LeaseId, new_term: u64) -> Result<(), EngineError> {
        self.terms.insert(lease_id, new_term);
        Ok(())
    }
}
