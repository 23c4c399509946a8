//! # renewal-core
//!
//! Deterministic lease-renewal policy engine.
//!
//! Given a lease's payment record and a set of per-lease (or default) rules,
//! the engine decides whether the lease may renew, extends its term through
//! the lease factory, and appends an immutable audit record of the decision.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same state and block height always produce the same
//!    verdict
//! 2. **Serialized**: each operation is one indivisible step; no failure path
//!    leaves a partial write
//! 3. **Traceable**: every successful renewal appends a write-once evaluation
//!    record
//! 4. **Gated**: administrative policy changes require the oracle principal
//!
//! ## Example
//!
//! ```rust,ignore
//! use renewal_core::{MemoryLeaseFactory, MemoryPaymentTracker, Policy, Principal, RenewalEngine};
//!
//! let mut payments = MemoryPaymentTracker::new();
//! payments.set_history(1, history);
//! let mut leases = MemoryLeaseFactory::new();
//! leases.set_term(1, 12);
//!
//! let mut engine = RenewalEngine::builder(Policy::new(Principal::from("ST1TEST")))
//!     .payment_tracker(payments)
//!     .lease_factory(leases)
//!     .block_height(100)
//!     .build();
//!
//! match engine.check_and_renew(1) {
//!     Ok(new_term) => println!("renewed to {new_term}"),
//!     Err(err) => println!("rejected: {err} (code {})", err.code()),
//! }
//! ```

pub mod engine;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod ratio;
pub mod rules;
pub mod status;
pub mod types;

// Re-export main types at crate root
pub use engine::{EngineBuilder, RenewalEngine};
pub use error::EngineError;
pub use ledger::{LeaseFactory, MemoryLeaseFactory, MemoryPaymentTracker, PaymentTracker};
pub use policy::{Policy, FALLBACK_DURATION_EXTENSION, FALLBACK_MIN_PAYMENTS};
pub use ratio::{meets_threshold, on_time_ratio};
pub use rules::RuleStore;
pub use status::StatusTracker;
pub use types::{
    BlockHeight, EvaluationRecord, LeaseId, LeaseRules, PaymentRecord, Principal, RenewalStatus,
};
