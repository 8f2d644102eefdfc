//! Port traits for the collaborators the ledger depends on.

pub mod account_port;
pub mod allocation_port;
pub mod config_port;
