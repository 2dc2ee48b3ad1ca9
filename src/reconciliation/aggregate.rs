//! Per order line aggregation of receipt records

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::ReconciliationConfig;
use crate::documents::Receipt;

/// Everything received against one purchase order line
///
/// Quantities and totals are running sums. Unit prices, currencies and
/// descriptions are kept as sets of distinct observed values, so price or
/// currency drift between receipts stays visible instead of being averaged away.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregatedReceiptData {
    pub quantity: BigDecimal,
    pub total: BigDecimal,
    /// Distinct unit prices, rounded to the configured scale
    pub unit_prices: BTreeSet<BigDecimal>,
    pub currencies: BTreeSet<String>,
    pub descriptions: BTreeSet<String>,
    /// Receipts that contributed, in arrival order
    pub receipt_ids: Vec<i64>,
}

impl AggregatedReceiptData {
    /// Mean of the distinct receipt unit prices, zero when none were recorded
    pub fn average_unit_price(&self) -> BigDecimal {
        if self.unit_prices.is_empty() {
            return BigDecimal::from(0);
        }
        let sum: BigDecimal = self.unit_prices.iter().sum();
        sum / BigDecimal::from(self.unit_prices.len() as u64)
    }

    pub fn price_list(&self) -> Vec<BigDecimal> {
        self.unit_prices.iter().cloned().collect()
    }

    pub fn currency_list(&self) -> Vec<String> {
        self.currencies.iter().cloned().collect()
    }

    pub fn description_list(&self) -> Vec<String> {
        self.descriptions.iter().cloned().collect()
    }

    fn add(&mut self, receipt: &Receipt, price_scale: i64) {
        self.quantity += &receipt.quantity;
        self.total += &receipt.line_total;
        self.unit_prices.insert(round_price(&receipt.unit_price, price_scale));

        if let Some(currency) = &receipt.currency {
            self.currencies.insert(currency.clone());
        }
        if let Some(description) = receipt.description.as_deref() {
            if !description.trim().is_empty() {
                self.descriptions.insert(description.to_string());
            }
        }
        self.receipt_ids.push(receipt.id);
    }
}

/// Aggregated receipt data keyed by order line id
pub type ReceiptAggregates = BTreeMap<String, AggregatedReceiptData>;

/// Round a unit price before it joins a price set
pub fn round_price(price: &BigDecimal, scale: i64) -> BigDecimal {
    price.round(scale)
}

/// Group receipts by order line id, skipping voided receipts and receipts
/// that do not reference an order line.
pub fn aggregate_receipts<'a, I>(receipts: I, config: &ReconciliationConfig) -> ReceiptAggregates
where
    I: IntoIterator<Item = &'a Receipt>,
{
    let mut aggregates = ReceiptAggregates::new();

    for receipt in receipts {
        if receipt.has_status(&config.voided_status) {
            tracing::debug!(receipt_id = receipt.id, "Skipping voided receipt");
            continue;
        }

        let Some(order_line_id) = receipt.order_line_id.as_deref() else {
            tracing::debug!(receipt_id = receipt.id, "Skipping receipt without order line");
            continue;
        };

        aggregates
            .entry(order_line_id.to_string())
            .or_default()
            .add(receipt, config.price_scale);
    }

    aggregates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn receipt(id: i64, line: Option<&str>, qty: &str, price: &str, total: &str) -> Receipt {
        Receipt {
            id,
            status: Some("created".to_string()),
            order_line_id: line.map(str::to_string),
            order_header_id: Some("4187".to_string()),
            quantity: dec(qty),
            unit_price: dec(price),
            line_total: dec(total),
            currency: Some("USD".to_string()),
            description: Some("Dock".to_string()),
            transaction_date: None,
        }
    }

    #[test]
    fn test_sums_per_order_line() {
        let receipts = vec![
            receipt(1, Some("6106"), "1.0", "250.00", "250.00"),
            receipt(2, Some("6106"), "1.0", "250.00", "250.00"),
            receipt(3, Some("6105"), "1.0", "1050.00", "1050.00"),
        ];
        let aggregates = aggregate_receipts(&receipts, &ReconciliationConfig::default());

        assert_eq!(aggregates.len(), 2);
        let dock = &aggregates["6106"];
        assert_eq!(dock.quantity, dec("2"));
        assert_eq!(dock.total, dec("500"));
        assert_eq!(dock.unit_prices.len(), 1);
        assert_eq!(dock.receipt_ids, vec![1, 2]);
        assert_eq!(aggregates["6105"].total, dec("1050"));
    }

    #[test]
    fn test_near_duplicate_prices_collapse() {
        let receipts = vec![
            receipt(1, Some("6106"), "1", "100.001", "100.00"),
            receipt(2, Some("6106"), "1", "100.004", "100.00"),
        ];
        let aggregates = aggregate_receipts(&receipts, &ReconciliationConfig::default());

        let prices = aggregates["6106"].price_list();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0], dec("100.0"));
    }

    #[test]
    fn test_voided_and_unlinked_receipts_are_skipped() {
        let mut voided = receipt(1, Some("6106"), "5", "250.00", "1250.00");
        voided.status = Some("voided".to_string());
        let unlinked = receipt(2, None, "1", "250.00", "250.00");
        let kept = receipt(3, Some("6106"), "1", "250.00", "250.00");

        let receipts = vec![voided, unlinked, kept];
        let aggregates = aggregate_receipts(&receipts, &ReconciliationConfig::default());

        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates["6106"].quantity, dec("1"));
        assert_eq!(aggregates["6106"].receipt_ids, vec![3]);
    }

    #[test]
    fn test_distinct_currencies_and_descriptions_are_kept() {
        let first = receipt(1, Some("6106"), "1", "240.00", "240.00");
        let mut second = receipt(2, Some("6106"), "1", "260.00", "260.00");
        second.currency = Some("EUR".to_string());
        second.description = Some("Docking station".to_string());

        let receipts = vec![first, second];
        let aggregates = aggregate_receipts(&receipts, &ReconciliationConfig::default());
        let data = &aggregates["6106"];

        assert_eq!(data.currency_list(), vec!["EUR".to_string(), "USD".to_string()]);
        assert_eq!(data.descriptions.len(), 2);
        assert_eq!(data.average_unit_price(), dec("250"));
    }

    #[test]
    fn test_average_of_empty_price_set_is_zero() {
        assert_eq!(
            AggregatedReceiptData::default().average_unit_price(),
            BigDecimal::from(0)
        );
    }
}
