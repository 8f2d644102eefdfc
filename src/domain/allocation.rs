//! Memoised fund allocations, invalidated by balance update versions.
//!
//! An entry stays valid while neither the asset's nor the fund's update
//! version moves. Results involving a symbol that was never updated
//! (version 0) are returned but not stored.

use std::collections::HashMap;

use super::ledger::Ledger;
use super::order::Side;
use crate::ports::allocation_port::AllocationComputer;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AllocationKey {
    pub account: String,
    pub asset: String,
    pub fund: String,
    pub side: Side,
}

impl AllocationKey {
    pub fn new(account: &str, asset: &str, fund: &str, side: Side) -> Self {
        AllocationKey {
            account: account.to_string(),
            asset: asset.to_string(),
            fund: fund.to_string(),
            side,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CachedAllocation {
    asset_version: u64,
    fund_version: u64,
    funds: f64,
}

#[derive(Debug, Default)]
pub struct AllocationCache {
    entries: HashMap<AllocationKey, CachedAllocation>,
}

impl AllocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the allocation for (`account`, `asset`, `fund`, `side`),
    /// calling `computer` only when no entry matches the current versions.
    ///
    /// Taking `&Ledger` ties every access to a held balance lock.
    pub fn allocate<C>(
        &mut self,
        ledger: &Ledger,
        account: &str,
        asset: &str,
        fund: &str,
        side: Side,
        computer: &mut C,
    ) -> f64
    where
        C: AllocationComputer + ?Sized,
    {
        let asset_version = ledger.version(asset);
        let fund_version = ledger.version(fund);
        let key = AllocationKey::new(account, asset, fund, side);

        match self.entries.get_mut(&key) {
            Some(cached)
                if cached.asset_version == asset_version && cached.fund_version == fund_version =>
            {
                cached.funds
            }
            Some(cached) => {
                let funds = computer.compute_raw_allocation(ledger, asset, fund, side);
                *cached = CachedAllocation {
                    asset_version,
                    fund_version,
                    funds,
                };
                funds
            }
            None => {
                let funds = computer.compute_raw_allocation(ledger, asset, fund, side);
                if asset_version > 0 && fund_version > 0 {
                    self.entries.insert(
                        key,
                        CachedAllocation {
                            asset_version,
                            fund_version,
                            funds,
                        },
                    );
                }
                funds
            }
        }
    }
}
