//! Balance map, update counters and snapshot array of one account.
//!
//! A [`Ledger`] is only reachable through the account's lock strategy, so
//! holding a `&Ledger` or `&mut Ledger` means the coarse balance lock is held.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::balance::Balance;
use super::versions::UpdateVersions;

/// Symbol-ordered view over the balance slots of a ledger, valid for the
/// generation it was built at. Iterating it indexes the slot vector directly.
#[derive(Debug, Clone)]
pub struct SnapshotArray {
    generation: u64,
    order: Arc<[usize]>,
}

impl SnapshotArray {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// True when both arrays share the same cached storage.
    pub fn is_same(&self, other: &SnapshotArray) -> bool {
        Arc::ptr_eq(&self.order, &other.order)
    }

    /// Balances in symbol order. `ledger` must be the ledger this array was
    /// taken from, with no insertion in between.
    pub fn balances<'a>(&'a self, ledger: &'a Ledger) -> impl Iterator<Item = &'a Balance> + 'a {
        debug_assert_eq!(self.generation, ledger.generation);
        self.order.iter().filter_map(|&slot| ledger.slots.get(slot))
    }
}

#[derive(Debug)]
pub struct Ledger {
    slots: Vec<Balance>,
    index: HashMap<String, usize>,
    versions: UpdateVersions,
    generation: u64,
    snapshot_array: Option<SnapshotArray>,
    last_refresh: Option<DateTime<Utc>>,
}

impl Ledger {
    pub(crate) fn new() -> Self {
        Ledger {
            slots: Vec::new(),
            index: HashMap::new(),
            versions: UpdateVersions::new(),
            generation: 0,
            snapshot_array: None,
            last_refresh: None,
        }
    }

    /// Returns the balance for `symbol`, inserting a zeroed one if absent.
    /// Insertion invalidates the snapshot array.
    pub(crate) fn get_or_create(&mut self, symbol: &str) -> &mut Balance {
        let slot = match self.index.get(symbol) {
            Some(&slot) => slot,
            None => {
                self.invalidate_snapshot_array();
                self.slots.push(Balance::new(symbol));
                self.index.insert(symbol.to_string(), self.slots.len() - 1);
                self.slots.len() - 1
            }
        };
        &mut self.slots[slot]
    }

    pub fn get(&self, symbol: &str) -> Option<&Balance> {
        self.index.get(symbol).and_then(|&slot| self.slots.get(slot))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn free(&self, symbol: &str) -> f64 {
        self.get(symbol).map(|b| b.free).unwrap_or(0.0)
    }

    pub fn shorted(&self, symbol: &str) -> f64 {
        self.get(symbol).map(|b| b.shorted).unwrap_or(0.0)
    }

    /// Applies `f` to the balance of `symbol` and bumps its update version.
    pub fn modify<R>(&mut self, symbol: &str, f: impl FnOnce(&mut Balance) -> R) -> R {
        let out = f(self.get_or_create(symbol));
        self.versions.bump(symbol);
        out
    }

    /// Reads the balance of `symbol`, creating it if absent. Never bumps the
    /// update version.
    pub fn query<R>(&mut self, symbol: &str, f: impl FnOnce(&Balance) -> R) -> R {
        f(self.get_or_create(symbol))
    }

    pub fn version(&self, symbol: &str) -> u64 {
        self.versions.version(symbol)
    }

    pub fn lock_trading(&mut self, symbol: &str) -> bool {
        let balance = self.get_or_create(symbol);
        if balance.is_trading_locked() {
            return false;
        }
        balance.lock_trading();
        true
    }

    pub fn unlock_trading(&mut self, symbol: &str) {
        self.get_or_create(symbol).unlock_trading();
    }

    /// Symbol order of every balance slot, cached until the next structural
    /// change. Mutating a balance in place keeps the cached array.
    pub fn snapshot_array(&mut self) -> SnapshotArray {
        if let Some(cached) = &self.snapshot_array {
            if cached.generation == self.generation {
                return cached.clone();
            }
        }
        let mut order: Vec<usize> = (0..self.slots.len()).collect();
        order.sort_by(|&a, &b| self.slots[a].symbol.cmp(&self.slots[b].symbol));
        let array = SnapshotArray {
            generation: self.generation,
            order: order.into(),
        };
        self.snapshot_array = Some(array.clone());
        array
    }

    /// Deep copy of every balance.
    pub fn snapshot(&self) -> HashMap<String, Balance> {
        self.slots
            .iter()
            .map(|balance| (balance.symbol.clone(), balance.clone()))
            .collect()
    }

    pub(crate) fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    pub(crate) fn mark_refreshed(&mut self, at: DateTime<Utc>) {
        self.last_refresh = Some(at);
    }

    /// Swaps in freshly fetched balances. Trading locks held on symbols that
    /// survive the swap are kept. Every incoming symbol and every symbol the
    /// swap drops gets a version bump.
    pub(crate) fn replace_all(&mut self, incoming: HashMap<String, Balance>) {
        for dropped in self.slots.iter().filter(|b| !incoming.contains_key(&b.symbol)) {
            self.versions.bump(&dropped.symbol);
        }

        let mut slots = Vec::with_capacity(incoming.len());
        let mut index = HashMap::with_capacity(incoming.len());
        for (symbol, mut balance) in incoming {
            balance.symbol = symbol.clone();
            if self.get(&symbol).is_some_and(|current| current.is_trading_locked()) {
                balance.lock_trading();
            }
            self.versions.bump(&symbol);
            index.insert(symbol, slots.len());
            slots.push(balance);
        }
        self.slots = slots;
        self.index = index;
        self.invalidate_snapshot_array();
    }

    fn invalidate_snapshot_array(&mut self) {
        self.generation += 1;
        self.snapshot_array = None;
    }
}
