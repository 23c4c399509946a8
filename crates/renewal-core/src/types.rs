//! Core data types for renewal evaluation.
//!
//! These are the records the engine stores and the values it exchanges with
//! its collaborators. Time fields hold block heights, never wall-clock time;
//! the host sequences the block counter.

use serde::{Deserialize, Serialize};

/// Identifier of a renewable lease. Zero is reserved and never addressable.
pub type LeaseId = u64;

/// Host-advanced block counter; the engine's only notion of time.
pub type BlockHeight = u64;

/// An opaque caller identity.
///
/// The engine only ever compares principals for equality; it attaches no
/// meaning to the contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renewal rules for one lease, or the global default tuple.
///
/// All fields are validated when the rules are written; stored rules are
/// assumed valid for their lifetime and are not re-checked on read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaseRules {
    /// Minimum on-time ratio, as an integer percent in `1..=100`.
    pub threshold: u64,

    /// Lookback window, in payment-count units. Also the cooldown between
    /// successful renewals, in blocks.
    pub period: u64,

    /// Term units added to the lease on a successful renewal.
    pub duration_extension: u64,

    /// Minimum number of recorded payments before a lease can renew.
    pub min_payments: u64,

    /// Per-lease grace allowance; bounded by the global ceiling at write time.
    pub grace_days: u64,
}

/// One payment as reported by the payment tracker.
///
/// Owned and mutated exclusively by the tracker; the engine reads an ordered
/// sequence per lease and only ever looks at `on_time`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentRecord {
    pub amount: u64,
    pub timestamp: BlockHeight,
    pub on_time: bool,
}

impl PaymentRecord {
    /// An on-time payment at the given block.
    pub fn on_time(amount: u64, timestamp: BlockHeight) -> Self {
        Self {
            amount,
            timestamp,
            on_time: true,
        }
    }

    /// A late payment at the given block.
    pub fn late(amount: u64, timestamp: BlockHeight) -> Self {
        Self {
            amount,
            timestamp,
            on_time: false,
        }
    }
}

/// Per-lease renewal state, created lazily on the first renewal attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenewalStatus {
    /// Block of the last successful renewal; zero if never renewed.
    pub last_renewed: BlockHeight,

    /// Renewal attempts before this block are rejected.
    pub next_eligible: BlockHeight,

    /// False while renewal is administratively suspended; blocks all attempts.
    pub active: bool,

    /// Count of successful renewals.
    pub extensions: u64,
}

impl Default for RenewalStatus {
    fn default() -> Self {
        Self {
            last_renewed: 0,
            next_eligible: 0,
            active: true,
            extensions: 0,
        }
    }
}

/// One immutable audit record of a renewal decision.
///
/// Records are write-once, keyed by lease id and a process-wide monotonic
/// evaluation id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationRecord {
    /// Block at which the evaluation ran.
    pub timestamp: BlockHeight,

    /// Whether the threshold was met.
    pub met_threshold: bool,

    /// On-time payments across the whole history at evaluation time.
    pub on_time_count: u64,

    /// Total payments across the whole history at evaluation time.
    pub total_count: u64,

    /// The computed on-time ratio, integer percent.
    pub ratio: u64,
}
