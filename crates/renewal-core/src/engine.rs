//! The renewal engine.
//!
//! Orchestrates a full renewal attempt: rule resolution, payment-history
//! fetch, threshold evaluation, term extension through the lease factory,
//! state-machine advance, and the append-only audit record.
//!
//! The engine runs single-writer and serialized: each public operation is one
//! indivisible step against engine state, with no internal suspension point.
//! Validation fully precedes mutation, so no failure path leaves a partial
//! write behind. Time is the host-advanced block counter; the engine never
//! advances it.

use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::ledger::{LeaseFactory, MemoryLeaseFactory, MemoryPaymentTracker, PaymentTracker};
use crate::policy::Policy;
use crate::ratio::{meets_threshold, on_time_count, on_time_ratio};
use crate::rules::RuleStore;
use crate::status::StatusTracker;
use crate::types::{BlockHeight, EvaluationRecord, LeaseId, LeaseRules, Principal, RenewalStatus};

/// The lease-renewal policy engine.
pub struct RenewalEngine {
    policy: Policy,
    rules: RuleStore,
    statuses: StatusTracker,
    evaluations: BTreeMap<(LeaseId, u64), EvaluationRecord>,
    next_evaluation_id: u64,
    block_height: BlockHeight,
    payments: Box<dyn PaymentTracker>,
    leases: Box<dyn LeaseFactory>,
}

impl RenewalEngine {
    /// Engine with the given policy and empty in-memory collaborators.
    pub fn new(policy: Policy) -> Self {
        EngineBuilder::new(policy).build()
    }

    pub fn builder(policy: Policy) -> EngineBuilder {
        EngineBuilder::new(policy)
    }

    // --- host hooks ---

    /// Advance the block counter. Host-only; the counter is expected to be
    /// monotonic and the engine never moves it itself.
    pub fn set_block_height(&mut self, height: BlockHeight) {
        self.block_height = height;
    }

    pub fn block_height(&self) -> BlockHeight {
        self.block_height
    }

    /// Seed a lease's status record, e.g. a suspension carried over from the
    /// host. Fixture wiring; the evaluation path never calls this.
    pub fn prime_status(&mut self, lease_id: LeaseId, status: RenewalStatus) {
        self.statuses.insert(lease_id, status);
    }

    // --- administrative surface (oracle-gated) ---

    pub fn set_oracle(
        &mut self,
        caller: &Principal,
        new_oracle: Principal,
    ) -> Result<(), EngineError> {
        self.policy.set_oracle(caller, new_oracle)
    }

    pub fn set_default_threshold(
        &mut self,
        caller: &Principal,
        threshold: u64,
    ) -> Result<(), EngineError> {
        self.policy.set_default_threshold(caller, threshold)
    }

    pub fn set_default_period(
        &mut self,
        caller: &Principal,
        period: u64,
    ) -> Result<(), EngineError> {
        self.policy.set_default_period(caller, period)
    }

    pub fn set_grace_period(&mut self, caller: &Principal, grace: u64) -> Result<(), EngineError> {
        self.policy.set_grace_period(caller, grace)
    }

    // --- open surface ---

    /// Validate and store per-lease rules against the current grace ceiling.
    pub fn set_lease_rules(
        &mut self,
        lease_id: LeaseId,
        rules: LeaseRules,
    ) -> Result<(), EngineError> {
        self.rules.set(lease_id, rules, self.policy.grace_period)
    }

    /// Attempt an automatic renewal; returns the new term on success.
    ///
    /// The check sequence is fixed: lease id, rule resolution, history fetch,
    /// suspension, eligibility window, threshold, current term, factory
    /// update. Engine state is only touched after the factory accepts the new
    /// term.
    pub fn check_and_renew(&mut self, lease_id: LeaseId) -> Result<u64, EngineError> {
        if lease_id == 0 {
            return Err(EngineError::InvalidLeaseId);
        }
        let rules = self.resolve_rules(lease_id);
        let history = self.payments.history(lease_id)?;
        let status = self.statuses.resolve(lease_id);
        status.ensure_eligible(self.block_height)?;
        if !meets_threshold(&history, &rules) {
            return Err(EngineError::ThresholdFailed);
        }
        let current_term = self.leases.term(lease_id)?;
        let new_term = current_term + rules.duration_extension;
        self.leases.update_term(lease_id, new_term)?;

        // The factory accepted the term; everything past this point must land.
        self.statuses
            .record_renewal(lease_id, self.block_height, rules.period, status.extensions);
        let ratio = on_time_ratio(&history, rules.period).unwrap_or(0);
        self.append_evaluation(
            lease_id,
            EvaluationRecord {
                timestamp: self.block_height,
                met_threshold: true,
                on_time_count: on_time_count(&history),
                total_count: history.len() as u64,
                ratio,
            },
        );
        tracing::debug!(
            lease = lease_id,
            new_term,
            ratio,
            block = self.block_height,
            "lease renewed"
        );
        Ok(new_term)
    }

    /// Oracle-triggered evaluation of a single lease.
    ///
    /// Distinguishes "ran but did not renew" (`Ok(false)`) from "could not
    /// run" (an error). A failure inside the delegated renewal is reported as
    /// `Ok(false)`; the underlying kind is logged but never surfaced.
    pub fn manual_evaluation(
        &mut self,
        caller: &Principal,
        lease_id: LeaseId,
    ) -> Result<bool, EngineError> {
        self.policy.verify_oracle(caller)?;
        if lease_id == 0 {
            return Err(EngineError::InvalidLeaseId);
        }
        let rules = self.resolve_rules(lease_id);
        let history = self.payments.history(lease_id)?;
        if !meets_threshold(&history, &rules) {
            return Ok(false);
        }
        match self.check_and_renew(lease_id) {
            Ok(_) => Ok(true),
            Err(err) => {
                tracing::debug!(lease = lease_id, code = err.code(), "manual evaluation did not renew");
                Ok(false)
            }
        }
    }

    // --- read-only surface ---

    /// Stored rules for a lease; `None` when the lease rides the defaults.
    pub fn lease_rules(&self, lease_id: LeaseId) -> Option<&LeaseRules> {
        self.rules.get(lease_id)
    }

    /// Audit record for one evaluation, if it exists.
    pub fn evaluation(&self, lease_id: LeaseId, evaluation_id: u64) -> Option<&EvaluationRecord> {
        self.evaluations.get(&(lease_id, evaluation_id))
    }

    /// All audit records for a lease, in evaluation order.
    pub fn evaluations_for(&self, lease_id: LeaseId) -> Vec<(u64, &EvaluationRecord)> {
        self.evaluations
            .range((lease_id, 0)..=(lease_id, u64::MAX))
            .map(|((_, id), record)| (*id, record))
            .collect()
    }

    /// Renewal status for a lease; `None` until the first successful renewal.
    pub fn renewal_status(&self, lease_id: LeaseId) -> Option<&RenewalStatus> {
        self.statuses.get(lease_id)
    }

    /// Process-wide count of evaluations recorded so far.
    pub fn evaluation_count(&self) -> u64 {
        self.next_evaluation_id
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    // --- internals ---

    /// Stored rules, or the default tuple computed from current policy.
    fn resolve_rules(&self, lease_id: LeaseId) -> LeaseRules {
        self.rules
            .get(lease_id)
            .cloned()
            .unwrap_or_else(|| self.policy.default_rules())
    }

    fn append_evaluation(&mut self, lease_id: LeaseId, record: EvaluationRecord) {
        self.evaluations
            .insert((lease_id, self.next_evaluation_id), record);
        self.next_evaluation_id += 1;
        if self.next_evaluation_id > self.policy.max_evaluations {
            // Advisory ceiling only; renewals keep flowing past it.
            tracing::warn!(
                count = self.next_evaluation_id,
                ceiling = self.policy.max_evaluations,
                "evaluation count passed the advisory ceiling"
            );
        }
    }
}

/// Builder wiring collaborators and initial block height into an engine.
pub struct EngineBuilder {
    policy: Policy,
    payments: Box<dyn PaymentTracker>,
    leases: Box<dyn LeaseFactory>,
    block_height: BlockHeight,
}

impl EngineBuilder {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            payments: Box::new(MemoryPaymentTracker::new()),
            leases: Box::new(MemoryLeaseFactory::new()),
            block_height: 0,
        }
    }

    pub fn payment_tracker(mut self, tracker: impl PaymentTracker + 'static) -> Self {
        self.payments = Box::new(tracker);
        self
    }

    pub fn lease_factory(mut self, factory: impl LeaseFactory + 'static) -> Self {
        self.leases = Box::new(factory);
        self
    }

    pub fn block_height(mut self, height: BlockHeight) -> Self {
        self.block_height = height;
        self
    }

    pub fn build(self) -> RenewalEngine {
        RenewalEngine {
            policy: self.policy,
            rules: RuleStore::new(),
            statuses: StatusTracker::new(),
            evaluations: BTreeMap::new(),
            next_evaluation_id: 0,
            block_height: self.block_height,
            payments: self.payments,
            leases: self.leases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentRecord;

    fn oracle() -> Principal {
        Principal::from("ST1TEST")
    }

    fn on_time_history(n: usize) -> Vec<PaymentRecord> {
        (0..n).map(|i| PaymentRecord::on_time(100, i as u64)).collect()
    }

    /// Engine primed with one lease: `n` on-time payments and a term of 12.
    fn engine_with_lease(n: usize) -> RenewalEngine {
        let mut payments = MemoryPaymentTracker::new();
        payments.set_history(1, on_time_history(n));
        let mut leases = MemoryLeaseFactory::new();
        leases.set_term(1, 12);
        RenewalEngine::builder(Policy::new(oracle()))
            .payment_tracker(payments)
            .lease_factory(leases)
            .block_height(100)
            .build()
    }

    #[test]
    fn renews_on_default_rules() {
        let mut engine = engine_with_lease(13);
        assert_eq!(engine.check_and_renew(1).unwrap(), 24);

        let status = engine.renewal_status(1).unwrap();
        assert_eq!(status.last_renewed, 100);
        assert_eq!(status.next_eligible, 112);
        assert!(status.active);
        assert_eq!(status.extensions, 1);

        let record = engine.evaluation(1, 0).unwrap();
        assert!(record.met_threshold);
        assert_eq!(record.on_time_count, 13);
        assert_eq!(record.total_count, 13);
        assert_eq!(record.ratio, 100);
        assert_eq!(engine.evaluation_count(), 1);
    }

    #[test]
    fn rejects_lease_id_zero_before_anything_else() {
        let mut engine = engine_with_lease(13);
        assert_eq!(engine.check_and_renew(0), Err(EngineError::InvalidLeaseId));
        assert_eq!(engine.evaluation_count(), 0);
    }

    #[test]
    fn propagates_missing_history() {
        let mut engine = engine_with_lease(13);
        assert_eq!(engine.check_and_renew(2), Err(EngineError::NoPaymentHistory));
    }

    #[test]
    fn late_history_fails_threshold() {
        let mut payments = MemoryPaymentTracker::new();
        payments.set_history(1, vec![PaymentRecord::late(100, 50), PaymentRecord::late(100, 60)]);
        let mut leases = MemoryLeaseFactory::new();
        leases.set_term(1, 12);
        let mut engine = RenewalEngine::builder(Policy::new(oracle()))
            .payment_tracker(payments)
            .lease_factory(leases)
            .block_height(100)
            .build();

        assert_eq!(engine.check_and_renew(1), Err(EngineError::ThresholdFailed));
        // Nothing was mutated on the failure path.
        assert!(engine.renewal_status(1).is_none());
        assert_eq!(engine.evaluation_count(), 0);
    }

    #[test]
    fn suspended_lease_reports_renewal_in_progress() {
        let mut engine = engine_with_lease(13);
        engine.prime_status(
            1,
            RenewalStatus {
                last_renewed: 0,
                next_eligible: 0,
                active: false,
                extensions: 0,
            },
        );
        assert_eq!(engine.check_and_renew(1), Err(EngineError::RenewalInProgress));
    }

    #[test]
    fn eligibility_window_blocks_even_a_perfect_history() {
        let mut engine = engine_with_lease(13);
        engine.prime_status(
            1,
            RenewalStatus {
                last_renewed: 0,
                next_eligible: 200,
                active: true,
                extensions: 0,
            },
        );
        assert_eq!(
            engine.check_and_renew(1),
            Err(EngineError::GracePeriodExceeded)
        );

        // Once the host advances past the window, the same lease renews.
        engine.set_block_height(200);
        assert_eq!(engine.check_and_renew(1).unwrap(), 24);
    }

    #[test]
    fn missing_term_is_lease_not_found() {
        let mut payments = MemoryPaymentTracker::new();
        payments.set_history(1, on_time_history(13));
        let mut engine = RenewalEngine::builder(Policy::new(oracle()))
            .payment_tracker(payments)
            .block_height(100)
            .build();
        assert_eq!(engine.check_and_renew(1), Err(EngineError::LeaseNotFound));
    }

    #[test]
    fn factory_rejection_leaves_state_untouched() {
        struct RejectingFactory;
        impl LeaseFactory for RejectingFactory {
            fn term(&self, _lease_id: LeaseId) -> Result<u64, EngineError> {
                Ok(12)
            }
            fn update_term(&mut self, _lease_id: LeaseId, _new_term: u64) -> Result<(), EngineError> {
                Err(EngineError::UpdateFailed)
            }
        }

        let mut payments = MemoryPaymentTracker::new();
        payments.set_history(1, on_time_history(13));
        let mut engine = RenewalEngine::builder(Policy::new(oracle()))
            .payment_tracker(payments)
            .lease_factory(RejectingFactory)
            .block_height(100)
            .build();

        assert_eq!(engine.check_and_renew(1), Err(EngineError::UpdateFailed));
        assert!(engine.renewal_status(1).is_none());
        assert_eq!(engine.evaluation_count(), 0);
    }

    #[test]
    fn stored_rules_override_defaults() {
        let mut engine = engine_with_lease(6);
        // Defaults need 6 payments at 90; these rules ask for more payments.
        engine
            .set_lease_rules(
                1,
                LeaseRules {
                    threshold: 50,
                    period: 10,
                    duration_extension: 7,
                    min_payments: 7,
                    grace_days: 20,
                },
            )
            .unwrap();
        assert_eq!(engine.check_and_renew(1), Err(EngineError::ThresholdFailed));

        engine
            .set_lease_rules(
                1,
                LeaseRules {
                    threshold: 50,
                    period: 10,
                    duration_extension: 7,
                    min_payments: 5,
                    grace_days: 20,
                },
            )
            .unwrap();
        // duration_extension of 7 on a term of 12.
        assert_eq!(engine.check_and_renew(1).unwrap(), 19);
    }

    #[test]
    fn repeated_renewal_counts_extensions() {
        let mut engine = engine_with_lease(13);
        assert_eq!(engine.check_and_renew(1).unwrap(), 24);
        // Still inside the cooldown window.
        assert_eq!(
            engine.check_and_renew(1),
            Err(EngineError::GracePeriodExceeded)
        );
        engine.set_block_height(112);
        assert_eq!(engine.check_and_renew(1).unwrap(), 36);

        let status = engine.renewal_status(1).unwrap();
        assert_eq!(status.extensions, 2);
        assert_eq!(status.next_eligible, 124);
        assert_eq!(engine.evaluation_count(), 2);
        assert!(engine.evaluation(1, 0).is_some());
        assert!(engine.evaluation(1, 1).is_some());
    }

    #[test]
    fn manual_evaluation_gates_on_oracle_before_lookups() {
        let mut engine = engine_with_lease(13);
        // Lease 99 has no history; a non-oracle caller still fails on identity.
        assert_eq!(
            engine.manual_evaluation(&Principal::from("ST2FAKE"), 99),
            Err(EngineError::OracleNotVerified)
        );
    }

    #[test]
    fn manual_evaluation_reports_renewal() {
        let mut engine = engine_with_lease(13);
        assert!(engine.manual_evaluation(&oracle(), 1).unwrap());
        assert_eq!(engine.renewal_status(1).unwrap().extensions, 1);
    }

    #[test]
    fn manual_evaluation_below_threshold_is_ok_false() {
        let mut engine = engine_with_lease(3);
        assert!(!engine.manual_evaluation(&oracle(), 1).unwrap());
        // Ran, did not renew; not an error, and no state was written.
        assert!(engine.renewal_status(1).is_none());
    }

    #[test]
    fn manual_evaluation_swallows_inner_failure() {
        // Threshold is met but the lease factory knows nothing about the
        // lease, so the delegated renewal fails with LeaseNotFound. The
        // caller sees Ok(false), not the underlying kind.
        let mut payments = MemoryPaymentTracker::new();
        payments.set_history(1, on_time_history(13));
        let mut engine = RenewalEngine::builder(Policy::new(oracle()))
            .payment_tracker(payments)
            .block_height(100)
            .build();
        assert!(!engine.manual_evaluation(&oracle(), 1).unwrap());
    }

    #[test]
    fn manual_evaluation_propagates_missing_history() {
        let mut engine = engine_with_lease(13);
        assert_eq!(
            engine.manual_evaluation(&oracle(), 42),
            Err(EngineError::NoPaymentHistory)
        );
    }

    #[test]
    fn evaluations_for_lists_only_that_lease() {
        let mut payments = MemoryPaymentTracker::new();
        payments.set_history(1, on_time_history(13));
        payments.set_history(2, on_time_history(13));
        let mut leases = MemoryLeaseFactory::new();
        leases.set_term(1, 12);
        leases.set_term(2, 36);
        let mut engine = RenewalEngine::builder(Policy::new(oracle()))
            .payment_tracker(payments)
            .lease_factory(leases)
            .block_height(100)
            .build();

        engine.check_and_renew(1).unwrap();
        engine.check_and_renew(2).unwrap();

        let first = engine.evaluations_for(1);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].0, 0);
        let second = engine.evaluations_for(2);
        assert_eq!(second.len(), 1);
        // Evaluation ids are process-wide, not per-lease.
        assert_eq!(second[0].0, 1);
    }

    #[test]
    fn default_rules_shift_with_policy_changes() {
        let mut engine = engine_with_lease(13);
        // A perfect history still clears a tightened default threshold.
        engine.set_default_threshold(&oracle(), 100).unwrap();
        assert_eq!(engine.check_and_renew(1).unwrap(), 24);

        engine.set_default_period(&oracle(), 5).unwrap();
        engine.set_block_height(112);
        // Cooldown now derives from the new default period.
        assert_eq!(engine.check_and_renew(1).unwrap(), 36);
        assert_eq!(engine.renewal_status(1).unwrap().next_eligible, 117);
    }
}
