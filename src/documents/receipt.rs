//! Goods receipts (receiving transactions)

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::*;
use crate::utils::validation::*;

/// One receiving transaction against a purchase order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    pub status: Option<String>,
    /// Purchase order line received against
    pub order_line_id: Option<String>,
    /// Purchase order the received line belongs to
    pub order_header_id: Option<String>,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub line_total: BigDecimal,
    /// Currency of the charged account type
    pub currency: Option<String>,
    /// Description taken from the embedded order line snapshot
    pub description: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
}

impl Receipt {
    /// Build a receipt from a raw API document
    pub fn from_document(doc: &Value) -> ReconResult<Self> {
        let id = require_id(doc)?;
        let order_line = field(doc, "order-line");

        let order_line_id = order_line
            .and_then(reference_id)
            .or_else(|| optional_string(doc, "order-line-id"));

        let (order_header_id, description) = match order_line {
            Some(snapshot) if snapshot.is_object() => (
                optional_string(snapshot, "order-header-id"),
                optional_string(snapshot, "description"),
            ),
            _ => (None, None),
        };

        let currency = field(doc, "account")
            .and_then(|account| field(account, "account-type"))
            .and_then(|account_type| field(account_type, "currency"))
            .and_then(currency_code);

        Ok(Self {
            id,
            status: optional_string(doc, "status"),
            order_line_id,
            order_header_id,
            quantity: coerce_amount(doc, "quantity")?,
            unit_price: coerce_amount(doc, "price")?,
            line_total: coerce_amount(doc, "total")?,
            currency,
            description: description.or_else(|| optional_string(doc, "description")),
            transaction_date: field(doc, "transaction-date").and_then(parse_timestamp),
        })
    }

    /// Whether the receipt carries the given (voided) status
    pub fn has_status(&self, status: &str) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(status))
    }
}
