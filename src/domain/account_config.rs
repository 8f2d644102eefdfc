//! Account configuration: reference currency, traded pairs and refresh cadence.

use chrono::Duration;
use std::collections::{BTreeMap, BTreeSet};

use super::error::LedgerError;
use super::price_table::pair_key;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_ACCOUNT_ID: &str = "default";
pub const DEFAULT_REFRESH_INTERVAL_SECS: i64 = 15;
pub const DEFAULT_MARGIN_RESERVE_PCT: f64 = 150.0;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SymbolPair {
    pub asset: String,
    pub fund: String,
}

impl SymbolPair {
    pub fn new(asset: &str, fund: &str) -> Self {
        SymbolPair {
            asset: asset.to_string(),
            fund: fund.to_string(),
        }
    }

    pub fn symbol(&self) -> String {
        pair_key(&self.asset, &self.fund)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountConfig {
    pub id: String,
    pub reference_currency: String,
    pub pairs: Vec<SymbolPair>,
    pub shorting_enabled: bool,
    pub refresh_interval: Duration,
}

impl AccountConfig {
    pub fn new(id: &str, reference_currency: &str, pairs: Vec<SymbolPair>) -> Self {
        AccountConfig {
            id: id.to_string(),
            reference_currency: reference_currency.to_string(),
            pairs,
            shorting_enabled: false,
            refresh_interval: Duration::seconds(DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }

    /// Every traded asset and fund plus the reference currency.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut symbols: BTreeSet<String> = self
            .pairs
            .iter()
            .flat_map(|p| [p.asset.clone(), p.fund.clone()])
            .collect();
        if !self.reference_currency.trim().is_empty() {
            symbols.insert(self.reference_currency.clone());
        }
        symbols
    }

    /// Pairs keyed by their concatenated symbol, e.g. `BTCUSDT`.
    pub fn symbol_pairs(&self) -> BTreeMap<String, SymbolPair> {
        self.pairs.iter().map(|p| (p.symbol(), p.clone())).collect()
    }
}

/// Parses a comma-separated `ASSET/FUND` list. Blank entries are skipped.
pub fn parse_pairs(input: &str) -> Result<Vec<SymbolPair>, LedgerError> {
    let mut pairs = Vec::new();
    for raw in input.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let (asset, fund) = raw.split_once('/').ok_or_else(|| {
            LedgerError::invalid("account", "pairs", format!("expected ASSET/FUND, got '{raw}'"))
        })?;
        let (asset, fund) = (asset.trim().to_uppercase(), fund.trim().to_uppercase());
        if asset.is_empty() || fund.is_empty() {
            return Err(LedgerError::invalid(
                "account",
                "pairs",
                format!("expected ASSET/FUND, got '{raw}'"),
            ));
        }
        let pair = SymbolPair { asset, fund };
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
    }
    Ok(pairs)
}

pub fn build_account_config(config: &dyn ConfigPort) -> Result<AccountConfig, LedgerError> {
    let id = config
        .get_string("account", "id")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ACCOUNT_ID.to_string());
    let reference_currency = config
        .get_string("account", "reference_currency")
        .map(|s| s.trim().to_uppercase())
        .unwrap_or_default();
    let pairs = parse_pairs(&config.get_string("account", "pairs").unwrap_or_default())?;
    let refresh_secs =
        config.get_int("account", "refresh_interval_secs", DEFAULT_REFRESH_INTERVAL_SECS);

    Ok(AccountConfig {
        id,
        reference_currency,
        pairs,
        shorting_enabled: config.get_bool("account", "shorting_enabled", false),
        refresh_interval: Duration::seconds(refresh_secs.max(0)),
    })
}
