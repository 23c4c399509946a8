//! On-time ratio calculation and the threshold predicate.
//!
//! The ratio divides the whole-history on-time count by a sample size capped
//! at `min(total, period)`. A long successful history is never diluted by an
//! oversized period setting, and the result is *not* a sliding-window average
//! over recency. That shape is load-bearing for behavioral compatibility and
//! must not be reinterpreted.

use crate::error::EngineError;
use crate::types::{LeaseRules, PaymentRecord};

/// Count of payments classified on-time across the whole history.
pub fn on_time_count(history: &[PaymentRecord]) -> u64 {
    history.iter().filter(|p| p.on_time).count() as u64
}

/// On-time ratio as an integer percent in `[0, 100]`.
///
/// `sample = min(history.len(), period)`; an empty sample fails with
/// `PeriodMismatch` (only reachable with an empty history, since periods are
/// validated positive elsewhere). The quotient is floored and clamped at 100.
pub fn on_time_ratio(history: &[PaymentRecord], period: u64) -> Result<u64, EngineError> {
    let total = history.len() as u64;
    let on_time = on_time_count(history);
    let sample = total.min(period);
    if sample == 0 {
        return Err(EngineError::PeriodMismatch);
    }
    let scaled = on_time
        .checked_mul(100)
        .ok_or(EngineError::CalculationOverflow)?;
    Ok((scaled / sample).min(100))
}

/// True iff the history is long enough and the ratio clears the threshold.
///
/// Both conjuncts are required; a calculation failure counts as ratio zero.
/// Pure predicate, no side effects.
pub fn meets_threshold(history: &[PaymentRecord], rules: &LeaseRules) -> bool {
    let total = history.len() as u64;
    let ratio = on_time_ratio(history, rules.period).unwrap_or(0);
    total >= rules.min_payments && ratio >= rules.threshold
}
