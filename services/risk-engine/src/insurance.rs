//! The insurance fund
//!
//! A single decimal balance with monotonic in/out accumulators, behind its
//! own lock so the liquidation monitor can settle without the engine lock.
//! The balance never goes below zero: a shortfall beyond the balance is
//! only partially covered and the caller decides what to do with the rest.

use rust_decimal::Decimal;
use std::sync::RwLock;
use types::liquidation::InsuranceFundState;

struct FundInner {
    balance: Decimal,
    total_in: Decimal,
    total_out: Decimal,
    updated_at: i64,
}

pub struct InsuranceFund {
    inner: RwLock<FundInner>,
}

impl InsuranceFund {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            inner: RwLock::new(FundInner {
                balance: initial_balance,
                total_in: Decimal::ZERO,
                total_out: Decimal::ZERO,
                updated_at: 0,
            }),
        }
    }

    /// Current balance.
    pub fn balance(&self) -> Decimal {
        self.inner.read().expect("fund lock poisoned").balance
    }

    /// Full state snapshot.
    pub fn state(&self) -> InsuranceFundState {
        let inner = self.inner.read().expect("fund lock poisoned");
        InsuranceFundState {
            balance: inner.balance,
            total_in: inner.total_in,
            total_out: inner.total_out,
            updated_at: inner.updated_at,
        }
    }

    /// Credit a liquidation surplus (margin exceeded the loss).
    pub fn absorb_surplus(&self, amount: Decimal, timestamp: i64) {
        debug_assert!(amount >= Decimal::ZERO);
        let mut inner = self.inner.write().expect("fund lock poisoned");
        inner.balance += amount;
        inner.total_in += amount;
        inner.updated_at = timestamp;
    }

    /// Pay a liquidation shortfall out of the fund, up to its balance.
    /// Returns the amount actually covered; the residual is forgiven by the
    /// caller.
    pub fn cover_shortfall(&self, amount: Decimal, timestamp: i64) -> Decimal {
        debug_assert!(amount >= Decimal::ZERO);
        let mut inner = self.inner.write().expect("fund lock poisoned");
        let covered = amount.min(inner.balance);
        inner.balance -= covered;
        inner.total_out += covered;
        inner.updated_at = timestamp;
        covered
    }
}
