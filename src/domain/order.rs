//! Order requests and results exchanged with the account adapter.

use std::fmt;

use super::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub asset: String,
    pub fund: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: f64,
    pub cancelled: bool,
}

impl OrderRequest {
    pub fn new(asset: &str, fund: &str, side: Side, order_type: OrderType) -> Self {
        OrderRequest {
            asset: asset.to_string(),
            fund: fund.to_string(),
            side,
            order_type,
            quantity: 0.0,
            price: 0.0,
            cancelled: false,
        }
    }

    pub fn symbol(&self) -> String {
        format!("{}{}", self.asset, self.fund)
    }

    /// Rejects requests the venue could never fill: no quantity, or a limit
    /// order without a price.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.quantity == 0.0 {
            return Err(LedgerError::InvalidOrder {
                reason: format!("no quantity specified for {} {}", self.side, self.symbol()),
            });
        }
        if self.price == 0.0 && self.order_type == OrderType::Limit {
            return Err(LedgerError::InvalidOrder {
                reason: format!("no price specified for LIMIT order on {}", self.symbol()),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub asset: String,
    pub fund: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: f64,
    pub executed_quantity: f64,
    pub status: OrderStatus,
}

impl Order {
    pub fn from_request(order_id: &str, request: &OrderRequest, status: OrderStatus) -> Self {
        Order {
            order_id: order_id.to_string(),
            asset: request.asset.clone(),
            fund: request.fund.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price,
            executed_quantity: 0.0,
            status,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }
}
