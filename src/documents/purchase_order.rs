//! Purchase orders

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::*;
use crate::utils::validation::*;

/// How a purchase order line is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderLineType {
    /// `OrderQuantityLine`: a quantity of units at a unit price
    #[default]
    Quantity,
    /// `OrderAmountLine`: a flat amount with no meaningful unit price
    Amount,
}

impl OrderLineType {
    /// Parse the external line type name. Unknown names fall back to `Quantity`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("OrderAmountLine") => OrderLineType::Amount,
            Some("OrderQuantityLine") | None => OrderLineType::Quantity,
            Some(other) => {
                tracing::warn!(
                    line_type = other,
                    fallback = OrderLineType::Quantity.external_name(),
                    "Unknown order line type"
                );
                OrderLineType::Quantity
            }
        }
    }

    pub fn external_name(&self) -> &'static str {
        match self {
            OrderLineType::Quantity => "OrderQuantityLine",
            OrderLineType::Amount => "OrderAmountLine",
        }
    }
}

/// Purchase order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    /// Order line identifier, same id space as `InvoiceLine::order_line_id`
    pub id: String,
    pub line_type: OrderLineType,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub line_total: BigDecimal,
    pub description: Option<String>,
    /// Line currency, falling back to the order header currency
    pub currency: Option<String>,
}

impl PurchaseOrderLine {
    fn from_document(doc: &Value, header_currency: Option<&str>) -> ReconResult<Self> {
        let id = field(doc, "id")
            .and_then(scalar_string)
            .ok_or_else(|| ReconError::MissingField("order-lines[].id".to_string()))?;

        let currency = field(doc, "currency")
            .and_then(currency_code)
            .or_else(|| header_currency.map(str::to_string));

        Ok(Self {
            id,
            line_type: OrderLineType::parse(optional_string(doc, "type").as_deref()),
            quantity: coerce_amount(doc, "quantity")?,
            unit_price: coerce_amount(doc, "price")?,
            line_total: coerce_amount(doc, "total")?,
            description: optional_string(doc, "description"),
            currency,
        })
    }
}

/// Purchase order snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: i64,
    pub po_number: Option<String>,
    pub currency: Option<String>,
    pub total_with_estimated_tax: BigDecimal,
    pub status: Option<String>,
    pub lines: Vec<PurchaseOrderLine>,
}

impl PurchaseOrder {
    /// Build a purchase order from a raw API document
    pub fn from_document(doc: &Value) -> ReconResult<Self> {
        let id = require_id(doc)?;
        let currency = field(doc, "currency").and_then(currency_code);

        let lines = match field(doc, "order-lines") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| PurchaseOrderLine::from_document(item, currency.as_deref()))
                .collect::<ReconResult<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(Self {
            id,
            po_number: optional_string(doc, "po-number"),
            currency,
            total_with_estimated_tax: coerce_amount(doc, "total-with-estimated-tax")?,
            status: optional_string(doc, "status"),
            lines,
        })
    }

    /// Find an order line by id
    pub fn line(&self, order_line_id: &str) -> Option<&PurchaseOrderLine> {
        self.lines.iter().find(|line| line.id == order_line_id)
    }
}
