//! Engine error taxonomy.
//!
//! Every fallible operation in the engine returns one of these kinds, and
//! callers branch on the kind. Each kind carries a stable numeric code so the
//! taxonomy stays wire-compatible with the ledger the engine reports into.

use thiserror::Error;

/// Errors surfaced by the renewal engine and its collaborators.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Caller attempted to transfer the oracle role without holding it.
    #[error("caller is not authorized")]
    NotAuthorized,

    /// Lease id zero is reserved and never addressable.
    #[error("invalid lease id")]
    InvalidLeaseId,

    /// The payment tracker has no record of the lease.
    #[error("no payment history for lease")]
    NoPaymentHistory,

    /// The renewal attempt did not clear the eligibility bar.
    #[error("payment threshold not met")]
    ThresholdFailed,

    /// A rule document could not be read into a rule set.
    #[error("malformed rules document")]
    InvalidRules,

    /// Renewal is administratively suspended for the lease.
    #[error("renewal already in progress")]
    RenewalInProgress,

    /// The ratio sample was empty.
    #[error("lookback period does not match payment history")]
    PeriodMismatch,

    /// Checked ratio arithmetic overflowed.
    #[error("ratio calculation overflowed")]
    CalculationOverflow,

    /// A gated operation was invoked by a principal other than the oracle.
    #[error("oracle identity not verified")]
    OracleNotVerified,

    /// Either `grace_days` exceeds the global ceiling at rule-write time, or a
    /// renewal was attempted before the lease's next-eligible block.
    #[error("grace period exceeded")]
    GracePeriodExceeded,

    /// Rule validation rejected a zero minimum-payment count.
    #[error("minimum payment count not met")]
    MinPaymentsNotMet,

    /// Threshold outside the valid `1..=100` percent range.
    #[error("threshold out of range")]
    InvalidThreshold,

    /// Lookback period of zero payments.
    #[error("period must be positive")]
    InvalidPeriod,

    /// The lease factory has no term recorded for the lease.
    #[error("lease not found")]
    LeaseNotFound,

    /// The lease factory rejected the term update.
    #[error("lease term update failed")]
    UpdateFailed,
}

impl EngineError {
    /// Stable numeric code for this kind.
    pub fn code(&self) -> u32 {
        match self {
            EngineError::NotAuthorized => 100,
            EngineError::InvalidLeaseId => 101,
            EngineError::NoPaymentHistory => 102,
            EngineError::ThresholdFailed => 103,
            EngineError::InvalidRules => 104,
            EngineError::RenewalInProgress => 105,
            EngineError::PeriodMismatch => 106,
            EngineError::CalculationOverflow => 107,
            EngineError::OracleNotVerified => 108,
            EngineError::GracePeriodExceeded => 109,
            EngineError::MinPaymentsNotMet => 110,
            EngineError::InvalidThreshold => 111,
            EngineError::InvalidPeriod => 112,
            EngineError::LeaseNotFound => 113,
            EngineError::UpdateFailed => 114,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let table = [
            (EngineError::NotAuthorized, 100),
            (EngineError::InvalidLeaseId, 101),
            (EngineError::NoPaymentHistory, 102),
            (EngineError::ThresholdFailed, 103),
            (EngineError::InvalidRules, 104),
            (EngineError::RenewalInProgress, 105),
            (EngineError::PeriodMismatch, 106),
            (EngineError::CalculationOverflow, 107),
            (EngineError::OracleNotVerified, 108),
            (EngineError::GracePeriodExceeded, 109),
            (EngineError::MinPaymentsNotMet, 110),
            (EngineError::InvalidThreshold, 111),
            (EngineError::InvalidPeriod, 112),
            (EngineError::LeaseNotFound, 113),
            (EngineError::UpdateFailed, 114),
        ];
        for (kind, code) in table {
            assert_eq!(kind.code(), code);
        }
    }
}
