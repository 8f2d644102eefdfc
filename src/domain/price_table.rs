//! Latest prices keyed by concatenated symbol pair (e.g. `BTCUSDT`).

use std::collections::HashMap;

pub type PriceTable = HashMap<String, f64>;

pub fn pair_key(base: &str, quote: &str) -> String {
    format!("{base}{quote}")
}

/// Converts `quantity` of `from` into `to` using the direct pair `from+to`,
/// falling back to the inverse pair `to+from`. Non-positive or missing prices
/// count as no price and yield 0.
pub fn convert(quantity: f64, from: &str, to: &str, prices: &PriceTable) -> f64 {
    if let Some(&price) = prices.get(&pair_key(from, to)) {
        if price > 0.0 {
            return quantity * price;
        }
    }
    if let Some(&price) = prices.get(&pair_key(to, from)) {
        if price > 0.0 {
            return quantity / price;
        }
    }
    0.0
}
