//! CSV-backed simulated account and price table loading.
//!
//! Balances file columns: `symbol,free,locked,shorted`.
//! Margin reserves file columns: `symbol,shorted_symbol,reserve`.
//! Price file columns: `pair,price`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::balance::Balance;
use crate::domain::error::LedgerError;
use crate::domain::order::{Order, OrderRequest};
use crate::domain::price_table::PriceTable;
use crate::ports::account_port::ExternalAccountAdapter;

/// Read-only simulated account whose balances are re-read from disk on every
/// fetch.
pub struct CsvAccountAdapter {
    balances_path: PathBuf,
    reserves_path: Option<PathBuf>,
    margin_reserve_pct: f64,
}

impl CsvAccountAdapter {
    pub fn new(balances_path: PathBuf, margin_reserve_pct: f64) -> Self {
        Self {
            balances_path,
            reserves_path: None,
            margin_reserve_pct,
        }
    }

    pub fn with_margin_reserves(mut self, reserves_path: PathBuf) -> Self {
        self.reserves_path = Some(reserves_path);
        self
    }
}

impl ExternalAccountAdapter for CsvAccountAdapter {
    fn fetch_balances(&self) -> Result<HashMap<String, Balance>, LedgerError> {
        let mut balances = HashMap::new();
        for record in read_records(&self.balances_path)? {
            let symbol = text_field(&record, 0, "symbol", &self.balances_path)?;
            let mut balance = Balance::new(&symbol);
            balance.free = number_field(&record, 1, "free", &self.balances_path)?;
            balance.locked = number_field(&record, 2, "locked", &self.balances_path)?;
            balance.shorted = number_field(&record, 3, "shorted", &self.balances_path)?;
            balances.insert(symbol, balance);
        }

        if let Some(path) = &self.reserves_path {
            for record in read_records(path)? {
                let holder = text_field(&record, 0, "symbol", path)?;
                let shorted = text_field(&record, 1, "shorted_symbol", path)?;
                let reserve = number_field(&record, 2, "reserve", path)?;
                balances
                    .entry(holder.clone())
                    .or_insert_with(|| Balance::new(&holder))
                    .set_margin_reserve(&shorted, reserve);
            }
        }

        Ok(balances)
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn margin_reserve_percentage(&self) -> f64 {
        self.margin_reserve_pct
    }

    fn execute_order(&self, request: &OrderRequest) -> Result<Order, LedgerError> {
        Err(LedgerError::Adapter {
            reason: format!(
                "cannot place {} order on {}: csv account is read-only",
                request.side,
                request.symbol()
            ),
        })
    }

    fn update_order_status(&self, order: &Order) -> Result<Order, LedgerError> {
        Ok(order.clone())
    }

    fn cancel(&self, order: &Order) -> Result<(), LedgerError> {
        Err(LedgerError::Adapter {
            reason: format!("cannot cancel order {}: csv account is read-only", order.order_id),
        })
    }
}

/// Loads a price table keyed by concatenated pair, e.g. `BTCUSDT,20000`.
/// Every failure, including unreadable files and missing columns, is
/// reported as [`LedgerError::PriceData`].
pub fn load_price_table(path: &Path) -> Result<PriceTable, LedgerError> {
    read_price_table(path).map_err(|e| match e {
        LedgerError::Adapter { reason } => LedgerError::PriceData { reason },
        other => other,
    })
}

fn read_price_table(path: &Path) -> Result<PriceTable, LedgerError> {
    let mut prices = PriceTable::new();
    for record in read_records(path)? {
        let pair = text_field(&record, 0, "pair", path)?;
        let price = number_field(&record, 1, "price", path)?;
        prices.insert(pair, price);
    }
    Ok(prices)
}

fn read_records(path: &Path) -> Result<Vec<csv::StringRecord>, LedgerError> {
    let content = fs::read_to_string(path).map_err(|e| LedgerError::Adapter {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    rdr.records()
        .map(|r| {
            r.map_err(|e| LedgerError::Adapter {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })
        })
        .collect()
}

fn text_field(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    path: &Path,
) -> Result<String, LedgerError> {
    match record.get(index) {
        Some(value) if !value.is_empty() => Ok(value.to_uppercase()),
        _ => Err(LedgerError::Adapter {
            reason: format!("missing {} column in {}", name, path.display()),
        }),
    }
}

fn number_field(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    path: &Path,
) -> Result<f64, LedgerError> {
    record
        .get(index)
        .ok_or_else(|| LedgerError::Adapter {
            reason: format!("missing {} column in {}", name, path.display()),
        })?
        .parse()
        .map_err(|e| LedgerError::Adapter {
            reason: format!("invalid {} value in {}: {}", name, path.display(), e),
        })
}
