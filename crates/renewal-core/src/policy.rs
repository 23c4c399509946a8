//! Global renewal policy: defaults, grace ceiling, and the oracle gate.
//!
//! One `Policy` lives inside each engine instance. Administrative setters
//! verify the caller against the oracle principal before touching anything;
//! a failed check leaves the policy unchanged.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{LeaseRules, Principal};

/// Duration extension used when a lease has no stored rules.
pub const FALLBACK_DURATION_EXTENSION: u64 = 12;

/// Minimum payment count used when a lease has no stored rules.
pub const FALLBACK_MIN_PAYMENTS: u64 = 6;

/// Global policy state for one engine instance.
///
/// Deserializes from the `policy:` section of a fixture or config file; every
/// field except the oracle principal has a default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Policy {
    /// The single principal authorized for administrative actions.
    pub oracle: Principal,

    /// Default eligibility threshold, integer percent.
    #[serde(default = "default_threshold")]
    pub default_threshold: u64,

    /// Default lookback window, payment-count units.
    #[serde(default = "default_period")]
    pub default_period: u64,

    /// Ceiling for any lease's `grace_days` at rule-write time.
    #[serde(default = "default_grace_period")]
    pub grace_period: u64,

    /// Advisory ceiling on the evaluation counter. Not enforced; the engine
    /// logs once the counter passes it.
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: u64,
}

fn default_threshold() -> u64 {
    90
}

fn default_period() -> u64 {
    12
}

fn default_grace_period() -> u64 {
    30
}

fn default_max_evaluations() -> u64 {
    500
}

impl Policy {
    /// Create a policy with the given oracle and stock defaults.
    pub fn new(oracle: Principal) -> Self {
        Self {
            oracle,
            default_threshold: default_threshold(),
            default_period: default_period(),
            grace_period: default_grace_period(),
            max_evaluations: default_max_evaluations(),
        }
    }

    /// Succeeds iff `caller` is the oracle.
    pub fn verify_oracle(&self, caller: &Principal) -> Result<(), EngineError> {
        if *caller == self.oracle {
            Ok(())
        } else {
            Err(EngineError::OracleNotVerified)
        }
    }

    /// Transfer the oracle role.
    ///
    /// Unlike the other setters, a caller mismatch here is `NotAuthorized`
    /// rather than `OracleNotVerified`; the two code paths are distinct in the
    /// taxonomy and callers branch on them.
    pub fn set_oracle(
        &mut self,
        caller: &Principal,
        new_oracle: Principal,
    ) -> Result<(), EngineError> {
        if *caller != self.oracle {
            return Err(EngineError::NotAuthorized);
        }
        self.oracle = new_oracle;
        Ok(())
    }

    /// Set the default threshold; rejects values outside `1..=100`.
    pub fn set_default_threshold(
        &mut self,
        caller: &Principal,
        threshold: u64,
    ) -> Result<(), EngineError> {
        self.verify_oracle(caller)?;
        if threshold == 0 || threshold > 100 {
            return Err(EngineError::InvalidThreshold);
        }
        self.default_threshold = threshold;
        Ok(())
    }

    /// Set the default lookback period; rejects zero.
    pub fn set_default_period(
        &mut self,
        caller: &Principal,
        period: u64,
    ) -> Result<(), EngineError> {
        self.verify_oracle(caller)?;
        if period == 0 {
            return Err(EngineError::InvalidPeriod);
        }
        self.default_period = period;
        Ok(())
    }

    /// Set the grace-period ceiling.
    ///
    /// No range validation: the ceiling setter accepts any value, while
    /// lease-level `grace_days` is bounded by the ceiling at rule-write time.
    /// The asymmetry is intentional and preserved.
    pub fn set_grace_period(&mut self, caller: &Principal, grace: u64) -> Result<(), EngineError> {
        self.verify_oracle(caller)?;
        self.grace_period = grace;
        Ok(())
    }

    /// Rule tuple for a lease with no stored rules.
    ///
    /// Computed fresh from the current defaults at each evaluation, never
    /// stored; a later change to the defaults changes the fallback.
    pub fn default_rules(&self) -> LeaseRules {
        LeaseRules {
            threshold: self.default_threshold,
            period: self.default_period,
            duration_extension: FALLBACK_DURATION_EXTENSION,
            min_payments: FALLBACK_MIN_PAYMENTS,
            grace_days: self.grace_period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> Principal {
        Principal::from("ST1TEST")
    }

    fn intruder() -> Principal {
        Principal::from("ST2FAKE")
    }

    #[test]
    fn stock_defaults() {
        let policy = Policy::new(oracle());
        assert_eq!(policy.default_threshold, 90);
        assert_eq!(policy.default_period, 12);
        assert_eq!(policy.grace_period, 30);
        assert_eq!(policy.max_evaluations, 500);
    }

    #[test]
    fn set_oracle_requires_current_oracle() {
        let mut policy = Policy::new(oracle());
        let err = policy.set_oracle(&intruder(), intruder()).unwrap_err();
        assert_eq!(err, EngineError::NotAuthorized);
        assert_eq!(policy.oracle, oracle());

        policy.set_oracle(&oracle(), intruder()).unwrap();
        assert_eq!(policy.oracle, intruder());
        // The old oracle no longer passes verification.
        assert_eq!(
            policy.verify_oracle(&oracle()),
            Err(EngineError::OracleNotVerified)
        );
    }

    #[test]
    fn threshold_setter_validates_range() {
        let mut policy = Policy::new(oracle());
        policy.set_default_threshold(&oracle(), 80).unwrap();
        assert_eq!(policy.default_threshold, 80);

        assert_eq!(
            policy.set_default_threshold(&oracle(), 101),
            Err(EngineError::InvalidThreshold)
        );
        assert_eq!(
            policy.set_default_threshold(&oracle(), 0),
            Err(EngineError::InvalidThreshold)
        );
        // Failed setters leave the value alone.
        assert_eq!(policy.default_threshold, 80);
    }

    #[test]
    fn period_setter_rejects_zero() {
        let mut policy = Policy::new(oracle());
        assert_eq!(
            policy.set_default_period(&oracle(), 0),
            Err(EngineError::InvalidPeriod)
        );
        policy.set_default_period(&oracle(), 6).unwrap();
        assert_eq!(policy.default_period, 6);
    }

    #[test]
    fn grace_setter_is_unbounded() {
        let mut policy = Policy::new(oracle());
        policy.set_grace_period(&oracle(), u64::MAX).unwrap();
        assert_eq!(policy.grace_period, u64::MAX);
        policy.set_grace_period(&oracle(), 0).unwrap();
        assert_eq!(policy.grace_period, 0);
    }

    #[test]
    fn setters_gate_on_oracle_first() {
        let mut policy = Policy::new(oracle());
        // Even an in-range value is rejected before validation runs.
        assert_eq!(
            policy.set_default_threshold(&intruder(), 50),
            Err(EngineError::OracleNotVerified)
        );
        assert_eq!(
            policy.set_default_period(&intruder(), 6),
            Err(EngineError::OracleNotVerified)
        );
        assert_eq!(
            policy.set_grace_period(&intruder(), 10),
            Err(EngineError::OracleNotVerified)
        );
    }

    #[test]
    fn default_rules_track_current_policy() {
        let mut policy = Policy::new(oracle());
        let rules = policy.default_rules();
        assert_eq!(rules.threshold, 90);
        assert_eq!(rules.period, 12);
        assert_eq!(rules.duration_extension, FALLBACK_DURATION_EXTENSION);
        assert_eq!(rules.min_payments, FALLBACK_MIN_PAYMENTS);
        assert_eq!(rules.grace_days, 30);

        policy.set_default_threshold(&oracle(), 70).unwrap();
        policy.set_grace_period(&oracle(), 45).unwrap();
        let rules = policy.default_rules();
        assert_eq!(rules.threshold, 70);
        assert_eq!(rules.grace_days, 45);
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: Policy = serde_yaml::from_str("oracle: \"ST1TEST\"").unwrap();
        assert_eq!(policy.oracle, oracle());
        assert_eq!(policy.default_threshold, 90);

        let policy: Policy =
            serde_yaml::from_str("oracle: \"ST1TEST\"\ndefault_threshold: 75").unwrap();
        assert_eq!(policy.default_threshold, 75);
    }
}
