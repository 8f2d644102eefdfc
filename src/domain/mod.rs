//! Core domain types and logic.

pub mod account;
pub mod account_config;
pub mod allocation;
pub mod balance;
pub mod config_validation;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod order;
pub mod price_table;
pub mod valuation;
pub mod versions;
