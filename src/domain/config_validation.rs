//! Configuration validation.
//!
//! Validates the `[account]` section before an account is built.

use crate::domain::account_config::{
    parse_pairs, DEFAULT_MARGIN_RESERVE_PCT, DEFAULT_REFRESH_INTERVAL_SECS,
};
use crate::domain::error::LedgerError;
use crate::ports::config_port::ConfigPort;

pub fn validate_account_config(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    validate_reference_currency(config)?;
    validate_pairs(config)?;
    validate_margin_reserve(config)?;
    validate_refresh_interval(config)?;
    Ok(())
}

fn validate_reference_currency(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    match config.get_string("account", "reference_currency") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(LedgerError::missing("account", "reference_currency")),
    }
}

fn validate_pairs(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let raw = config.get_string("account", "pairs").unwrap_or_default();
    if parse_pairs(&raw)?.is_empty() {
        return Err(LedgerError::missing("account", "pairs"));
    }
    Ok(())
}

fn validate_margin_reserve(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let value = config.get_double("account", "margin_reserve_pct", DEFAULT_MARGIN_RESERVE_PCT);
    if value < 100.0 {
        return Err(LedgerError::invalid(
            "account",
            "margin_reserve_pct",
            "margin_reserve_pct must be at least 100",
        ));
    }
    Ok(())
}

fn validate_refresh_interval(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let value = config.get_int("account", "refresh_interval_secs", DEFAULT_REFRESH_INTERVAL_SECS);
    if value < 0 {
        return Err(LedgerError::invalid(
            "account",
            "refresh_interval_secs",
            "refresh_interval_secs must be non-negative",
        ));
    }
    Ok(())
}
