#![allow(dead_code)]

use ledgerkeep::domain::account_config::{AccountConfig, SymbolPair};
use ledgerkeep::domain::balance::Balance;
use ledgerkeep::domain::error::LedgerError;
use ledgerkeep::domain::order::{Order, OrderRequest, OrderStatus};
use ledgerkeep::domain::price_table::PriceTable;
use ledgerkeep::ports::account_port::ExternalAccountAdapter;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct MockAccountAdapter {
    pub balances: Mutex<HashMap<String, Balance>>,
    pub simulated: bool,
    pub margin_pct: f64,
    pub fetches: AtomicUsize,
    pub orders: AtomicUsize,
    pub order_status: OrderStatus,
}

impl MockAccountAdapter {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            simulated: false,
            margin_pct: 150.0,
            fetches: AtomicUsize::new(0),
            orders: AtomicUsize::new(0),
            order_status: OrderStatus::New,
        }
    }

    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }

    pub fn with_margin_pct(mut self, pct: f64) -> Self {
        self.margin_pct = pct;
        self
    }

    pub fn with_order_status(mut self, status: OrderStatus) -> Self {
        self.order_status = status;
        self
    }

    pub fn with_free(self, symbol: &str, free: f64) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(symbol.to_string(), Balance::with_free(symbol, free));
        self
    }

    pub fn with_balance(self, balance: Balance) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(balance.symbol.clone(), balance);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn order_count(&self) -> usize {
        self.orders.load(Ordering::SeqCst)
    }
}

impl ExternalAccountAdapter for MockAccountAdapter {
    fn fetch_balances(&self) -> Result<HashMap<String, Balance>, LedgerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.balances.lock().unwrap().clone())
    }

    fn is_simulated(&self) -> bool {
        self.simulated
    }

    fn margin_reserve_percentage(&self) -> f64 {
        self.margin_pct
    }

    fn execute_order(&self, request: &OrderRequest) -> Result<Order, LedgerError> {
        let id = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Order::from_request(&id.to_string(), request, self.order_status))
    }

    fn update_order_status(&self, order: &Order) -> Result<Order, LedgerError> {
        Ok(Order {
            status: OrderStatus::Filled,
            executed_quantity: order.quantity,
            ..order.clone()
        })
    }

    fn cancel(&self, _order: &Order) -> Result<(), LedgerError> {
        Ok(())
    }
}

pub fn btc_usdt_config() -> AccountConfig {
    AccountConfig::new(
        "acc",
        "USDT",
        vec![SymbolPair::new("BTC", "USDT"), SymbolPair::new("ETH", "USDT")],
    )
}

pub fn prices(entries: &[(&str, f64)]) -> PriceTable {
    entries
        .iter()
        .map(|(pair, price)| (pair.to_string(), *price))
        .collect()
}

pub fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
