//! Shared spending budget.
//!
//! The budget is the only mutable state shared across graph executions. It is
//! a cheap-to-clone handle over an atomic cell holding the remaining amount
//! as `f64` bits.
//!
//! An invocation's cost is only known once it returns, so admission and
//! payment are split: [`Budget::reserve`] checks the remaining amount and
//! holds back the largest cost seen so far in one CAS, and the returned
//! [`Reservation`] is settled with the actual cost or refunded on drop.
//! Concurrent callers therefore see each other's in-flight calls, and the
//! overspend is bounded by how far an actual cost exceeds that estimate
//! (one full call for the first calls, before any cost has been seen).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::errors::CapabilityError;

/// Monotonically decreasing allowance for external invocations.
#[derive(Debug, Clone)]
pub struct Budget {
    remaining_bits: Arc<AtomicU64>,
    largest_cost_bits: Arc<AtomicU64>,
    initial: f64,
}

impl Budget {
    /// Create a budget with `amount` remaining.
    pub fn new(amount: f64) -> Self {
        Self {
            remaining_bits: Arc::new(AtomicU64::new(amount.to_bits())),
            largest_cost_bits: Arc::new(AtomicU64::new(0.0f64.to_bits())),
            initial: amount,
        }
    }

    /// Remaining allowance, net of open reservations. Negative once an
    /// invocation overspent.
    pub fn remaining(&self) -> f64 {
        f64::from_bits(self.remaining_bits.load(Ordering::SeqCst))
    }

    /// Amount the budget was created with.
    pub const fn initial(&self) -> f64 {
        self.initial
    }

    /// Total charged or held so far.
    pub fn spent(&self) -> f64 {
        self.initial - self.remaining()
    }

    /// No invocation may start once this returns true.
    pub fn is_depleted(&self) -> bool {
        self.remaining() <= 0.0
    }

    /// Largest single invocation cost charged so far.
    pub fn cost_estimate(&self) -> f64 {
        f64::from_bits(self.largest_cost_bits.load(Ordering::SeqCst))
    }

    /// Admit one invocation: fails when nothing remains, otherwise holds back
    /// [`Budget::cost_estimate`] until the reservation is settled or dropped.
    pub fn reserve(&self) -> Result<Reservation, CapabilityError> {
        let estimate = self.cost_estimate();
        let admitted_at = self
            .remaining_bits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                let remaining = f64::from_bits(bits);
                (remaining > 0.0).then(|| (remaining - estimate).to_bits())
            })
            .map_err(|bits| CapabilityError::BudgetExhausted {
                remaining: f64::from_bits(bits),
            })?;

        Ok(Reservation {
            budget: self.clone(),
            held: estimate,
            admitted_at: f64::from_bits(admitted_at),
        })
    }

    fn record_cost(&self, cost: f64) {
        // Non-negative finite f64 bit patterns order like the values.
        self.largest_cost_bits.fetch_max(cost.to_bits(), Ordering::SeqCst);
    }

    fn adjust(&self, delta: f64) -> f64 {
        let previous = self
            .remaining_bits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            })
            .unwrap_or_else(|bits| bits);
        f64::from_bits(previous) + delta
    }
}

/// Negative or non-finite costs would break monotonicity and are charged as
/// zero.
fn valid_cost(cost: f64) -> f64 {
    if cost.is_finite() && cost >= 0.0 {
        cost
    } else {
        tracing::warn!(cost, "ignoring invalid invocation cost");
        0.0
    }
}

/// Admission for one in-flight invocation. Dropping it unsettled refunds the
/// held amount.
#[derive(Debug)]
#[must_use = "an unsettled reservation is refunded on drop"]
pub struct Reservation {
    budget: Budget,
    held: f64,
    admitted_at: f64,
}

impl Reservation {
    /// Pay the actual `cost` in place of the held estimate and return the new
    /// remaining amount.
    pub fn settle(mut self, cost: f64) -> f64 {
        let cost = valid_cost(cost);
        self.budget.record_cost(cost);
        let held = std::mem::take(&mut self.held);
        let remaining = self.budget.adjust(held - cost);
        if remaining <= 0.0 && self.admitted_at > 0.0 {
            tracing::info!(remaining, "budget depleted");
        }
        remaining
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.held > 0.0 {
            self.budget.adjust(self.held);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_until_depleted() {
        let budget = Budget::new(0.05);

        let after_first = budget.reserve().unwrap().settle(0.03);
        assert!((after_first - 0.02).abs() < 1e-12);
        assert!(!budget.is_depleted());

        let after_second = budget.reserve().unwrap().settle(0.03);
        assert!((after_second + 0.01).abs() < 1e-12);
        assert!(budget.is_depleted());
        assert!(matches!(
            budget.reserve(),
            Err(CapabilityError::BudgetExhausted { .. })
        ));
        assert!((budget.spent() - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_negative_cost_is_ignored() {
        let budget = Budget::new(1.0);
        budget.reserve().unwrap().settle(-5.0);
        budget.reserve().unwrap().settle(f64::NAN);
        assert!((budget.remaining() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_budget_is_depleted() {
        assert!(Budget::new(0.0).is_depleted());
    }

    #[test]
    fn test_clones_share_state() {
        let budget = Budget::new(1.0);
        let handle = budget.clone();
        handle.reserve().unwrap().settle(0.25);
        assert!((budget.remaining() - 0.75).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_concurrent_charges_sum_exactly() {
        let budget = Budget::new(100.0);
        let handles: Vec<_> = (0..50)
            .map(|_| {
                let b = budget.clone();
                tokio::spawn(async move { b.reserve().unwrap().settle(1.0) })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task panicked");
        }
        assert!((budget.remaining() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_reservation_blocks_concurrent_admission() {
        let budget = Budget::new(1.0);
        budget.reserve().unwrap().settle(0.6);
        assert!((budget.cost_estimate() - 0.6).abs() < f64::EPSILON);

        let in_flight = budget.reserve().unwrap();
        assert!(budget.is_depleted());
        assert!(matches!(
            budget.reserve(),
            Err(CapabilityError::BudgetExhausted { .. })
        ));

        let remaining = in_flight.settle(0.5);
        assert!((remaining - (-0.1)).abs() < 1e-12);
        assert!((budget.spent() - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_dropped_reservation_is_refunded() {
        let budget = Budget::new(1.0);
        budget.reserve().unwrap().settle(0.25);

        let failed = budget.reserve().unwrap();
        assert!((budget.remaining() - 0.5).abs() < 1e-12);
        drop(failed);

        assert!((budget.remaining() - 0.75).abs() < 1e-12);
        assert!(budget.reserve().is_ok());
    }

    #[test]
    fn test_first_reservation_holds_nothing() {
        let budget = Budget::new(0.05);
        let reservation = budget.reserve().unwrap();
        assert!((budget.remaining() - 0.05).abs() < f64::EPSILON);
        reservation.settle(0.08);
        assert!(budget.is_depleted());
        assert!((budget.cost_estimate() - 0.08).abs() < f64::EPSILON);
    }
}
