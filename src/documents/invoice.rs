//! Supplier invoices

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::*;
use crate::utils::validation::*;

/// A single invoice line, linked to a purchase order line by `order_line_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Invoice line identifier
    pub id: Option<String>,
    /// Purchase order line this line bills against (the reconciliation join key)
    pub order_line_id: Option<String>,
    /// Purchase order reference printed on the line
    pub po_number: Option<String>,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub line_total: BigDecimal,
    pub description: Option<String>,
    /// Currency inherited from the invoice header
    pub currency: Option<String>,
}

impl InvoiceLine {
    fn from_document(doc: &Value, currency: Option<&str>) -> ReconResult<Self> {
        let order_line_id = optional_string(doc, "order-line-id")
            .or_else(|| field(doc, "order-line").and_then(reference_id));

        Ok(Self {
            id: field(doc, "id").and_then(scalar_string),
            order_line_id,
            po_number: optional_string(doc, "po-number"),
            quantity: coerce_amount(doc, "quantity")?,
            unit_price: coerce_amount(doc, "price")?,
            line_total: coerce_amount(doc, "total")?,
            description: optional_string(doc, "description"),
            currency: currency.map(str::to_string),
        })
    }
}

/// Supplier invoice snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: Option<String>,
    pub currency: Option<String>,
    pub total_with_taxes: BigDecimal,
    pub status: Option<String>,
    pub invoice_date: Option<DateTime<Utc>>,
    pub lines: Vec<InvoiceLine>,
}

impl Invoice {
    /// Build an invoice from a raw API document
    pub fn from_document(doc: &Value) -> ReconResult<Self> {
        let id = require_id(doc)?;
        let currency = field(doc, "currency").and_then(currency_code);

        let lines = match field(doc, "invoice-lines") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| InvoiceLine::from_document(item, currency.as_deref()))
                .collect::<ReconResult<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(Self {
            id,
            invoice_number: optional_string(doc, "invoice-number"),
            currency,
            total_with_taxes: coerce_amount(doc, "total-with-taxes")?,
            status: optional_string(doc, "status"),
            invoice_date: field(doc, "invoice-date").and_then(parse_timestamp),
            lines,
        })
    }

    /// First non-empty PO reference found across the invoice lines
    pub fn po_reference(&self) -> Option<&str> {
        self.lines
            .iter()
            .filter_map(|line| line.po_number.as_deref())
            .find(|po| !po.trim().is_empty())
    }

    /// Resolve the purchase order id this invoice bills against
    pub fn resolve_po_id(&self) -> ReconResult<i64> {
        let reference = self.po_reference().ok_or_else(|| {
            ReconError::InvalidReference(format!("No PO reference found on invoice {}", self.id))
        })?;

        parse_po_reference(reference).map_err(|_| {
            ReconError::InvalidReference(format!(
                "Invalid PO reference '{}' on invoice {}",
                reference, self.id
            ))
        })
    }

    /// Distinct order line ids referenced by the invoice, in line order
    pub fn order_line_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for id in self.lines.iter().filter_map(|l| l.order_line_id.as_deref()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Sum of the line totals of lines linked to a purchase order line
    pub fn linked_lines_total(&self) -> BigDecimal {
        self.lines
            .iter()
            .filter(|line| line.order_line_id.is_some())
            .map(|line| &line.line_total)
            .sum()
    }
}
