//! Per-symbol holdings record.

use std::collections::HashMap;

/// Holdings of one symbol for one account.
///
/// `margin_reserves` maps the symbol of a shorted asset to the amount of this
/// symbol held as collateral against that short.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Balance {
    pub symbol: String,
    pub free: f64,
    pub locked: f64,
    pub shorted: f64,
    margin_reserves: HashMap<String, f64>,
    trading_locked: bool,
}

impl Balance {
    pub fn new(symbol: &str) -> Self {
        Balance {
            symbol: symbol.to_string(),
            ..Balance::default()
        }
    }

    pub fn with_free(symbol: &str, free: f64) -> Self {
        Balance {
            free,
            ..Balance::new(symbol)
        }
    }

    pub fn total(&self) -> f64 {
        self.free + self.locked
    }

    pub fn margin_reserve(&self, shorted_symbol: &str) -> f64 {
        self.margin_reserves
            .get(shorted_symbol)
            .copied()
            .unwrap_or(0.0)
    }

    /// Sets the reserve held against `shorted_symbol`. A non-positive amount
    /// releases the reserve entirely.
    pub fn set_margin_reserve(&mut self, shorted_symbol: &str, amount: f64) {
        if amount > 0.0 {
            self.margin_reserves
                .insert(shorted_symbol.to_string(), amount);
        } else {
            self.margin_reserves.remove(shorted_symbol);
        }
    }

    /// Symbols of the assets this balance holds margin reserves against.
    pub fn shorted_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.margin_reserves.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn is_trading_locked(&self) -> bool {
        self.trading_locked
    }

    pub(crate) fn lock_trading(&mut self) {
        self.trading_locked = true;
    }

    pub(crate) fn unlock_trading(&mut self) {
        self.trading_locked = false;
    }
}
