//! Discrepancy payloads, result records and message assembly

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::types::*;

/// Message returned when every compared field agreed
pub const APPROVED_MESSAGE: &str = "All fields match, no action needed";
/// Error recorded when an invoice line has no counterpart on the purchase order
pub const LINE_NOT_IN_PO: &str = "Line item not found in PO";
/// Error recorded when an order line has no aggregated receipts
pub const NO_MATCHING_RECEIPTS: &str = "No matching receipts";

/// Field categories a discrepancy can be reported on, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MismatchKind {
    Quantity,
    UnitPrice,
    LineTotal,
    Currency,
    Description,
}

impl MismatchKind {
    pub const ALL: [MismatchKind; 5] = [
        MismatchKind::Quantity,
        MismatchKind::UnitPrice,
        MismatchKind::LineTotal,
        MismatchKind::Currency,
        MismatchKind::Description,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MismatchKind::Quantity => "Quantity",
            MismatchKind::UnitPrice => "Unit price",
            MismatchKind::LineTotal => "Line total",
            MismatchKind::Currency => "Currency",
            MismatchKind::Description => "Description",
        }
    }
}

/// Values that differ between an invoice line and its purchase order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoicePoMismatch<T> {
    pub invoice: T,
    pub po: T,
}

/// Values that differ between an invoice line and the receipts for its order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceReceiptMismatch<I, R = I> {
    pub invoice: I,
    pub receipts: R,
}

/// Values that differ between a purchase order line and its receipts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoReceiptMismatch<P, R = P> {
    pub po: P,
    pub receipts: R,
}

/// Receipt side of a unit price comparison: every distinct price and their mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptPrices {
    pub prices: Vec<BigDecimal>,
    pub average: BigDecimal,
}

/// Error payload used by the invoice vs receipts comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingReceipts {
    pub message: String,
}

impl Default for MissingReceipts {
    fn default() -> Self {
        Self {
            message: NO_MATCHING_RECEIPTS.to_string(),
        }
    }
}

/// Common view over the three discrepancy records
pub trait LineDiscrepancy {
    /// Error recorded instead of field comparisons, if any
    fn error_message(&self) -> Option<&str>;

    /// Field categories that differ, in reporting order
    fn mismatches(&self) -> Vec<MismatchKind>;

    /// Fold another comparison of the same order line into this one
    fn merge(&mut self, other: Self);

    fn is_empty(&self) -> bool {
        self.error_message().is_none() && self.mismatches().is_empty()
    }
}

fn kinds(flags: [(MismatchKind, bool); 5]) -> Vec<MismatchKind> {
    flags
        .into_iter()
        .filter(|(_, present)| *present)
        .map(|(kind, _)| kind)
        .collect()
}

/// Per line discrepancies between an invoice and its purchase order.
/// A field is present only when it differs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvoicePoDiscrepancy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<InvoicePoMismatch<BigDecimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<InvoicePoMismatch<BigDecimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_total: Option<InvoicePoMismatch<BigDecimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<InvoicePoMismatch<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<InvoicePoMismatch<Option<String>>>,
}

impl LineDiscrepancy for InvoicePoDiscrepancy {
    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn mismatches(&self) -> Vec<MismatchKind> {
        kinds([
            (MismatchKind::Quantity, self.quantity.is_some()),
            (MismatchKind::UnitPrice, self.unit_price.is_some()),
            (MismatchKind::LineTotal, self.line_total.is_some()),
            (MismatchKind::Currency, self.currency.is_some()),
            (MismatchKind::Description, self.description.is_some()),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.error = self.error.take().or(other.error);
        self.quantity = self.quantity.take().or(other.quantity);
        self.unit_price = self.unit_price.take().or(other.unit_price);
        self.line_total = self.line_total.take().or(other.line_total);
        self.currency = self.currency.take().or(other.currency);
        self.description = self.description.take().or(other.description);
    }
}

/// Per line discrepancies between an invoice and the aggregated receipts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvoiceReceiptDiscrepancy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<MissingReceipts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<InvoiceReceiptMismatch<BigDecimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<InvoiceReceiptMismatch<BigDecimal, ReceiptPrices>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<InvoiceReceiptMismatch<Option<String>, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<InvoiceReceiptMismatch<Option<String>, Vec<String>>>,
}

impl LineDiscrepancy for InvoiceReceiptDiscrepancy {
    fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    fn mismatches(&self) -> Vec<MismatchKind> {
        kinds([
            (MismatchKind::Quantity, self.quantity.is_some()),
            (MismatchKind::UnitPrice, self.unit_price.is_some()),
            (MismatchKind::LineTotal, false),
            (MismatchKind::Currency, self.currency.is_some()),
            (MismatchKind::Description, self.description.is_some()),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.error = self.error.take().or(other.error);
        self.quantity = self.quantity.take().or(other.quantity);
        self.unit_price = self.unit_price.take().or(other.unit_price);
        self.currency = self.currency.take().or(other.currency);
        self.description = self.description.take().or(other.description);
    }
}

/// Per line discrepancies between a purchase order and the aggregated receipts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoReceiptDiscrepancy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<PoReceiptMismatch<BigDecimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<PoReceiptMismatch<BigDecimal, ReceiptPrices>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_total: Option<PoReceiptMismatch<BigDecimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<PoReceiptMismatch<Option<String>, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<PoReceiptMismatch<Option<String>, Vec<String>>>,
}

impl LineDiscrepancy for PoReceiptDiscrepancy {
    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn mismatches(&self) -> Vec<MismatchKind> {
        kinds([
            (MismatchKind::Quantity, self.quantity.is_some()),
            (MismatchKind::UnitPrice, self.unit_price.is_some()),
            (MismatchKind::LineTotal, self.line_total.is_some()),
            (MismatchKind::Currency, self.currency.is_some()),
            (MismatchKind::Description, self.description.is_some()),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.error = self.error.take().or(other.error);
        self.quantity = self.quantity.take().or(other.quantity);
        self.unit_price = self.unit_price.take().or(other.unit_price);
        self.line_total = self.line_total.take().or(other.line_total);
        self.currency = self.currency.take().or(other.currency);
        self.description = self.description.take().or(other.description);
    }
}

/// Outcome of comparing one order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineComparison<D> {
    pub matched: bool,
    pub discrepancy: D,
}

impl<D: LineDiscrepancy> LineComparison<D> {
    /// Build from a discrepancy record; the line matches when nothing was recorded
    pub fn from_discrepancy(discrepancy: D) -> Self {
        Self {
            matched: discrepancy.is_empty(),
            discrepancy,
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.matched &= other.matched;
        self.discrepancy.merge(other.discrepancy);
    }
}

/// Line comparisons keyed by order line id
pub type LineComparisons<D> = BTreeMap<String, LineComparison<D>>;

/// Insert a comparison, folding it into an earlier one for the same line
pub fn record_comparison<D: LineDiscrepancy>(
    comparisons: &mut LineComparisons<D>,
    order_line_id: &str,
    comparison: LineComparison<D>,
) {
    match comparisons.get_mut(order_line_id) {
        Some(existing) => existing.merge(comparison),
        None => {
            comparisons.insert(order_line_id.to_string(), comparison);
        }
    }
}

/// Whether every line in the map matched
pub fn all_matched<D>(comparisons: &LineComparisons<D>) -> bool {
    comparisons.values().all(|c| c.matched)
}

/// Discrepancy records for every compared line, including empty ones
pub fn discrepancy_map<D: Clone>(comparisons: &LineComparisons<D>) -> BTreeMap<String, D> {
    comparisons
        .iter()
        .map(|(id, c)| (id.clone(), c.discrepancy.clone()))
        .collect()
}

/// Discrepancy records for lines that did not match
pub fn failing_discrepancies<D: Clone>(comparisons: &LineComparisons<D>) -> BTreeMap<String, D> {
    comparisons
        .iter()
        .filter(|(_, c)| !c.matched)
        .map(|(id, c)| (id.clone(), c.discrepancy.clone()))
        .collect()
}

/// One message per problem: line-level errors first, then field mismatches
/// grouped by kind (quantity, unit price, line total, currency, description).
pub fn mismatch_messages<D: LineDiscrepancy>(discrepancies: &BTreeMap<String, D>) -> Vec<String> {
    let mut messages: Vec<String> = discrepancies
        .iter()
        .filter_map(|(line, d)| d.error_message().map(|e| format!("{} (line {})", e, line)))
        .collect();

    for kind in MismatchKind::ALL {
        for (line, discrepancy) in discrepancies {
            if discrepancy.mismatches().contains(&kind) {
                messages.push(format!("{} mismatch on line {}", kind.label(), line));
            }
        }
    }

    messages
}

/// Ids of the lines that did not match
pub fn failing_lines<D>(comparisons: &LineComparisons<D>) -> Vec<String> {
    comparisons
        .iter()
        .filter(|(_, c)| !c.matched)
        .map(|(id, _)| id.clone())
        .collect()
}

/// Envelope returned by the single-document tools
///
/// `success` reports whether the call could be evaluated at all. Documents
/// that disagree still produce `success == true` with a `BLOCKED` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse<T> {
    pub success: bool,
    pub result: T,
}

impl<T> ToolResponse<T> {
    pub fn new(status: MatchStatus, result: T) -> Self {
        Self {
            success: !status.is_error(),
            result,
        }
    }
}

/// Result of reconciling an invoice against a purchase order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoicePoMatchResult {
    pub invoice_id: i64,
    pub po_id: i64,
    pub status: MatchStatus,
    pub message: String,
    /// Invoice total with taxes equals the PO total with estimated tax
    pub total_amount_match: bool,
    pub quantity_match: BTreeMap<String, bool>,
    pub unit_price_match: BTreeMap<String, bool>,
    pub line_total_match: BTreeMap<String, bool>,
    /// Only lines that did not match
    pub line_item_discrepancies: BTreeMap<String, InvoicePoDiscrepancy>,
}

impl InvoicePoMatchResult {
    pub fn error(invoice_id: i64, po_id: i64, message: impl Into<String>) -> Self {
        Self {
            invoice_id,
            po_id,
            status: MatchStatus::Error,
            message: message.into(),
            total_amount_match: false,
            quantity_match: BTreeMap::new(),
            unit_price_match: BTreeMap::new(),
            line_total_match: BTreeMap::new(),
            line_item_discrepancies: BTreeMap::new(),
        }
    }
}

/// Result of reconciling an invoice against the receipts of its purchase order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceReceiptMatchResult {
    pub invoice_id: i64,
    pub po_id: i64,
    pub status: MatchStatus,
    pub message: String,
    /// Sum of invoice line totals equals the received total within tolerance
    pub total_amount_match: bool,
    pub quantity_match: BTreeMap<String, bool>,
    pub unit_price_match: BTreeMap<String, bool>,
    /// Only lines that did not match
    pub line_item_discrepancies: BTreeMap<String, InvoiceReceiptDiscrepancy>,
}

impl InvoiceReceiptMatchResult {
    pub fn terminal(invoice_id: i64, po_id: i64, status: MatchStatus, message: impl Into<String>) -> Self {
        Self {
            invoice_id,
            po_id,
            status,
            message: message.into(),
            total_amount_match: false,
            quantity_match: BTreeMap::new(),
            unit_price_match: BTreeMap::new(),
            line_item_discrepancies: BTreeMap::new(),
        }
    }
}

/// Result of reconciling a purchase order against all of its receipts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoReceiptsMatchResult {
    pub purchase_order_id: i64,
    pub overall_status: MatchStatus,
    pub message: String,
    pub line_match: BTreeMap<String, bool>,
    /// Only lines that did not match
    pub line_item_discrepancies: BTreeMap<String, PoReceiptDiscrepancy>,
}

impl PoReceiptsMatchResult {
    pub fn terminal(purchase_order_id: i64, status: MatchStatus, message: impl Into<String>) -> Self {
        Self {
            purchase_order_id,
            overall_status: status,
            message: message.into(),
            line_match: BTreeMap::new(),
            line_item_discrepancies: BTreeMap::new(),
        }
    }
}

/// Result of a full invoice / purchase order / receipts reconciliation
///
/// Each discrepancy map holds an entry for every order line on the invoice,
/// empty when that comparison found nothing. Sub-statuses are `None` when
/// the call stopped before any comparison ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreeWayComparisonResult {
    pub invoice_id: i64,
    /// Resolved purchase order id, `0` when it could not be resolved
    pub po_id: i64,
    pub overall_status: MatchStatus,
    pub invoice_po_status: Option<MatchStatus>,
    pub invoice_receipts_status: Option<MatchStatus>,
    pub po_receipts_status: Option<MatchStatus>,
    pub message: String,
    pub invoice_po_discrepancies: BTreeMap<String, InvoicePoDiscrepancy>,
    pub invoice_receipts_discrepancies: BTreeMap<String, InvoiceReceiptDiscrepancy>,
    pub po_receipts_discrepancies: BTreeMap<String, PoReceiptDiscrepancy>,
    /// Non-voided receipts that took part in the comparison
    pub receipt_count: usize,
    pub checked_at: DateTime<Utc>,
}

impl ThreeWayComparisonResult {
    /// Result for a call that stopped before comparing anything
    pub fn terminal(invoice_id: i64, po_id: i64, status: MatchStatus, message: impl Into<String>) -> Self {
        Self {
            invoice_id,
            po_id,
            overall_status: status,
            invoice_po_status: None,
            invoice_receipts_status: None,
            po_receipts_status: None,
            message: message.into(),
            invoice_po_discrepancies: BTreeMap::new(),
            invoice_receipts_discrepancies: BTreeMap::new(),
            po_receipts_discrepancies: BTreeMap::new(),
            receipt_count: 0,
            checked_at: Utc::now(),
        }
    }
}

/// Result of reconciling many invoices in one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub total_invoices: usize,
    pub successful_matches: usize,
    pub blocked_matches: usize,
    pub error_matches: usize,
    /// One result per requested invoice, in request order
    pub results: Vec<ThreeWayComparisonResult>,
    pub summary: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BatchResult {
    /// Tally per-invoice results into a batch summary
    pub fn from_results(results: Vec<ThreeWayComparisonResult>, started_at: DateTime<Utc>) -> Self {
        let count = |status: MatchStatus| {
            results
                .iter()
                .filter(|r| r.overall_status == status)
                .count()
        };

        let successful_matches = count(MatchStatus::Approved);
        let blocked_matches = count(MatchStatus::Blocked);
        let error_matches = count(MatchStatus::Error);
        let total_invoices = results.len();

        let summary = format!(
            "Processed {} invoices: {} approved, {} blocked, {} errors",
            total_invoices, successful_matches, blocked_matches, error_matches
        );

        Self {
            batch_id: Uuid::new_v4(),
            total_invoices,
            successful_matches,
            blocked_matches,
            error_matches,
            results,
            summary,
            started_at,
            completed_at: Utc::now(),
        }
    }
}
