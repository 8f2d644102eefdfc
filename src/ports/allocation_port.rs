//! Fund allocation port trait.

use crate::domain::ledger::Ledger;
use crate::domain::order::Side;

/// Computes how much of `fund` to commit to a prospective trade on `asset`.
///
/// May be arbitrarily expensive. It runs while the account's balance lock is
/// held and reads balances through `ledger`; it must not try to lock the
/// account again.
pub trait AllocationComputer {
    fn compute_raw_allocation(&mut self, ledger: &Ledger, asset: &str, fund: &str, side: Side)
        -> f64;
}

impl<F> AllocationComputer for F
where
    F: FnMut(&Ledger, &str, &str, Side) -> f64,
{
    fn compute_raw_allocation(&mut self, ledger: &Ledger, asset: &str, fund: &str, side: Side) -> f64 {
        self(ledger, asset, fund, side)
    }
}
