//! Account valuation in an arbitrary currency, including margin reserves and
//! the profit/loss of open short positions.

use super::balance::Balance;
use super::error::LedgerError;
use super::ledger::Ledger;
use super::price_table::{convert, PriceTable};

/// Collateral reserved per unit of short exposure, always >= 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginReserveFactor(f64);

impl MarginReserveFactor {
    pub fn from_percentage(percentage: f64) -> Result<Self, LedgerError> {
        if !percentage.is_finite() || percentage < 100.0 {
            return Err(LedgerError::invalid(
                "account",
                "margin_reserve_pct",
                format!("margin reserve percentage must be at least 100%, got {percentage}"),
            ));
        }
        Ok(MarginReserveFactor(percentage / 100.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarginValuation {
    factor: MarginReserveFactor,
}

impl MarginValuation {
    pub fn new(factor: MarginReserveFactor) -> Self {
        MarginValuation { factor }
    }

    pub fn factor(&self) -> MarginReserveFactor {
        self.factor
    }

    /// Total value of every balance in the ledger expressed in `currency`.
    pub fn total_funds_in(&self, ledger: &mut Ledger, currency: &str, prices: &PriceTable) -> f64 {
        let array = ledger.snapshot_array();
        let ledger: &Ledger = ledger;
        array
            .balances(ledger)
            .map(|balance| self.balance_value(ledger, balance, currency, prices))
            .sum()
    }

    /// Contribution of a single balance: its holdings converted to `currency`
    /// plus the value of every margin reserve it carries.
    pub fn balance_value(
        &self,
        ledger: &Ledger,
        balance: &Balance,
        currency: &str,
        prices: &PriceTable,
    ) -> f64 {
        let holdings = if balance.symbol == currency {
            balance.total()
        } else {
            convert(balance.total(), &balance.symbol, currency, prices)
        };

        let reserves: f64 = balance
            .shorted_symbols()
            .iter()
            .map(|shorted| self.short_value(ledger, balance, shorted, prices))
            .sum();

        holdings + reserves
    }

    /// Reserve above the unleveraged baseline plus the P&L of the short on
    /// `shorted`, in units of the reserve holder's symbol.
    pub fn short_value(
        &self,
        ledger: &Ledger,
        holder: &Balance,
        shorted: &str,
        prices: &PriceTable,
    ) -> f64 {
        let reserve = holder.margin_reserve(shorted);
        let without_reserve = reserve / self.factor.value();
        let balance_for_margin = reserve - without_reserve;

        let shorted_quantity = ledger.shorted(shorted);
        // A reserve whose short is already closed out values at its unleveraged part.
        let investment = if shorted_quantity > 0.0 {
            let entry_price = without_reserve / shorted_quantity;
            shorted_quantity * entry_price
        } else {
            without_reserve
        };
        let at_current_price = convert(shorted_quantity, shorted, &holder.symbol, prices);
        let profit_loss = investment - at_current_price;

        balance_for_margin + profit_loss
    }
}
