//! External account port trait.

use std::collections::HashMap;

use crate::domain::balance::Balance;
use crate::domain::error::LedgerError;
use crate::domain::order::{Order, OrderRequest};

/// A real or simulated trading venue holding the account's funds.
///
/// Implementations are shared with every thread that touches the account.
pub trait ExternalAccountAdapter: Send + Sync {
    /// Current balances keyed by symbol. An empty map means the venue had
    /// nothing to report this time.
    fn fetch_balances(&self) -> Result<HashMap<String, Balance>, LedgerError>;

    fn is_simulated(&self) -> bool;

    fn margin_reserve_percentage(&self) -> f64;

    fn execute_order(&self, request: &OrderRequest) -> Result<Order, LedgerError>;

    fn update_order_status(&self, order: &Order) -> Result<Order, LedgerError>;

    fn cancel(&self, order: &Order) -> Result<(), LedgerError>;
}
