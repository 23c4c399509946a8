//! Per-lease rule storage and validation.
//!
//! Rules are validated once, at write time, against the grace ceiling in
//! force at that moment. A stored rule set is assumed valid for its lifetime;
//! lowering the ceiling later does not retro-invalidate it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::EngineError;
use crate::types::{LeaseId, LeaseRules};

impl LeaseRules {
    /// Parse a rules document from YAML.
    ///
    /// Parsing only checks shape; range validation happens when the rules are
    /// written to a store.
    pub fn from_yaml(yaml: &str) -> Result<Self, EngineError> {
        serde_yaml::from_str(yaml).map_err(|_| EngineError::InvalidRules)
    }

    /// Parse a rules document from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path).map_err(|_| EngineError::InvalidRules)?;
        Self::from_yaml(&contents)
    }
}

/// Holds per-lease renewal rules.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    rules: BTreeMap<LeaseId, LeaseRules>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store rules for a lease, replacing any existing record.
    ///
    /// Validation order is fixed: lease id, threshold, period, minimum
    /// payments, grace days against `grace_ceiling`. The first violated
    /// conjunct decides the error kind, and nothing is written on failure.
    pub fn set(
        &mut self,
        lease_id: LeaseId,
        rules: LeaseRules,
        grace_ceiling: u64,
    ) -> Result<(), EngineError> {
        if lease_id == 0 {
            return Err(EngineError::InvalidLeaseId);
        }
        if rules.threshold == 0 || rules.threshold > 100 {
            return Err(EngineError::InvalidThreshold);
        }
        if rules.period == 0 {
            return Err(EngineError::InvalidPeriod);
        }
        if rules.min_payments == 0 {
            return Err(EngineError::MinPaymentsNotMet);
        }
        if rules.grace_days > grace_ceiling {
            return Err(EngineError::GracePeriodExceeded);
        }
        self.rules.insert(lease_id, rules);
        Ok(())
    }

    /// Stored rules for a lease, if any.
    pub fn get(&self, lease_id: LeaseId) -> Option<&LeaseRules> {
        self.rules.get(&lease_id)
    }
}
