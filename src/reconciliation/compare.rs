//! Pairwise line comparators
//!
//! Invoice vs purchase order uses exact equality: both sides are entered once.
//! Anything compared against receipts uses the configured absolute tolerance
//! for quantities and totals, since the receipt side is a sum of separately
//! rounded records. Unit prices are always compared exactly, against the mean
//! of the distinct receipt prices.

use bigdecimal::BigDecimal;
use std::collections::BTreeSet;

use crate::config::ReconciliationConfig;
use crate::documents::{Invoice, InvoiceLine, OrderLineType, PurchaseOrder, PurchaseOrderLine};
use crate::reconciliation::aggregate::{AggregatedReceiptData, ReceiptAggregates};
use crate::reconciliation::report::*;

/// `|left - right| > tolerance`; a difference equal to the tolerance passes
pub fn exceeds_tolerance(left: &BigDecimal, right: &BigDecimal, tolerance: &BigDecimal) -> bool {
    (left - right).abs() > *tolerance
}

/// A receipt currency set agrees with a document currency only when it holds
/// exactly that one currency.
fn currency_drift(expected: Option<&str>, observed: &BTreeSet<String>) -> bool {
    observed.len() > 1 || expected.is_none_or(|code| !observed.contains(code))
}

/// Only checked when both sides carry a description.
fn description_drift(expected: Option<&str>, observed: &BTreeSet<String>) -> bool {
    match expected {
        Some(text) if !observed.is_empty() => observed.len() > 1 || !observed.contains(text),
        _ => false,
    }
}

fn receipt_prices(receipts: &AggregatedReceiptData) -> ReceiptPrices {
    ReceiptPrices {
        prices: receipts.price_list(),
        average: receipts.average_unit_price(),
    }
}

/// Compare one invoice line with its purchase order line
pub fn compare_invoice_line_to_po(
    line: &InvoiceLine,
    po_line: Option<&PurchaseOrderLine>,
    config: &ReconciliationConfig,
) -> LineComparison<InvoicePoDiscrepancy> {
    let Some(po_line) = po_line else {
        return LineComparison::from_discrepancy(InvoicePoDiscrepancy {
            error: Some(LINE_NOT_IN_PO.to_string()),
            ..Default::default()
        });
    };

    let mut discrepancy = InvoicePoDiscrepancy::default();

    if line.quantity != po_line.quantity {
        discrepancy.quantity = Some(InvoicePoMismatch {
            invoice: line.quantity.clone(),
            po: po_line.quantity.clone(),
        });
    }

    if line.unit_price != po_line.unit_price {
        discrepancy.unit_price = Some(InvoicePoMismatch {
            invoice: line.unit_price.clone(),
            po: po_line.unit_price.clone(),
        });
    }

    if line.line_total != po_line.line_total {
        discrepancy.line_total = Some(InvoicePoMismatch {
            invoice: line.line_total.clone(),
            po: po_line.line_total.clone(),
        });
    }

    if line.currency != po_line.currency {
        discrepancy.currency = Some(InvoicePoMismatch {
            invoice: line.currency.clone(),
            po: po_line.currency.clone(),
        });
    }

    let both_described = line.description.is_some() && po_line.description.is_some();
    if config.compare_descriptions && both_described && line.description != po_line.description {
        discrepancy.description = Some(InvoicePoMismatch {
            invoice: line.description.clone(),
            po: po_line.description.clone(),
        });
    }

    LineComparison::from_discrepancy(discrepancy)
}

/// Compare one invoice line with everything received against its order line
pub fn compare_invoice_line_to_receipts(
    line: &InvoiceLine,
    receipts: Option<&AggregatedReceiptData>,
    config: &ReconciliationConfig,
) -> LineComparison<InvoiceReceiptDiscrepancy> {
    let Some(receipts) = receipts else {
        return LineComparison::from_discrepancy(InvoiceReceiptDiscrepancy {
            error: Some(MissingReceipts::default()),
            ..Default::default()
        });
    };

    let mut discrepancy = InvoiceReceiptDiscrepancy::default();

    if exceeds_tolerance(&line.quantity, &receipts.quantity, &config.tolerance) {
        discrepancy.quantity = Some(InvoiceReceiptMismatch {
            invoice: line.quantity.clone(),
            receipts: receipts.quantity.clone(),
        });
    }

    let prices = receipt_prices(receipts);
    if line.unit_price != prices.average {
        discrepancy.unit_price = Some(InvoiceReceiptMismatch {
            invoice: line.unit_price.clone(),
            receipts: prices,
        });
    }

    if currency_drift(line.currency.as_deref(), &receipts.currencies) {
        discrepancy.currency = Some(InvoiceReceiptMismatch {
            invoice: line.currency.clone(),
            receipts: receipts.currency_list(),
        });
    }

    if config.compare_descriptions
        && description_drift(line.description.as_deref(), &receipts.descriptions)
    {
        discrepancy.description = Some(InvoiceReceiptMismatch {
            invoice: line.description.clone(),
            receipts: receipts.description_list(),
        });
    }

    LineComparison::from_discrepancy(discrepancy)
}

/// Compare one purchase order line with everything received against it
///
/// Amount lines carry no meaningful unit price, so only their total and
/// currency are compared.
pub fn compare_po_line_to_receipts(
    po_line: &PurchaseOrderLine,
    receipts: Option<&AggregatedReceiptData>,
    config: &ReconciliationConfig,
) -> LineComparison<PoReceiptDiscrepancy> {
    let Some(receipts) = receipts else {
        return LineComparison::from_discrepancy(PoReceiptDiscrepancy {
            error: Some(NO_MATCHING_RECEIPTS.to_string()),
            ..Default::default()
        });
    };

    let mut discrepancy = PoReceiptDiscrepancy::default();

    if po_line.line_type == OrderLineType::Quantity {
        if exceeds_tolerance(&po_line.quantity, &receipts.quantity, &config.tolerance) {
            discrepancy.quantity = Some(PoReceiptMismatch {
                po: po_line.quantity.clone(),
                receipts: receipts.quantity.clone(),
            });
        }

        let prices = receipt_prices(receipts);
        if po_line.unit_price != prices.average {
            discrepancy.unit_price = Some(PoReceiptMismatch {
                po: po_line.unit_price.clone(),
                receipts: prices,
            });
        }
    }

    if exceeds_tolerance(&po_line.line_total, &receipts.total, &config.tolerance) {
        discrepancy.line_total = Some(PoReceiptMismatch {
            po: po_line.line_total.clone(),
            receipts: receipts.total.clone(),
        });
    }

    if currency_drift(po_line.currency.as_deref(), &receipts.currencies) {
        discrepancy.currency = Some(PoReceiptMismatch {
            po: po_line.currency.clone(),
            receipts: receipts.currency_list(),
        });
    }

    if config.compare_descriptions
        && description_drift(po_line.description.as_deref(), &receipts.descriptions)
    {
        discrepancy.description = Some(PoReceiptMismatch {
            po: po_line.description.clone(),
            receipts: receipts.description_list(),
        });
    }

    LineComparison::from_discrepancy(discrepancy)
}

/// Compare every linked invoice line with the purchase order
pub fn compare_invoice_to_po(
    invoice: &Invoice,
    po: &PurchaseOrder,
    config: &ReconciliationConfig,
) -> LineComparisons<InvoicePoDiscrepancy> {
    let mut comparisons = LineComparisons::new();
    for line in &invoice.lines {
        let Some(order_line_id) = line.order_line_id.as_deref() else {
            continue;
        };
        let comparison = compare_invoice_line_to_po(line, po.line(order_line_id), config);
        record_comparison(&mut comparisons, order_line_id, comparison);
    }
    comparisons
}

/// Compare every linked invoice line with the aggregated receipts
pub fn compare_invoice_to_receipts(
    invoice: &Invoice,
    aggregates: &ReceiptAggregates,
    config: &ReconciliationConfig,
) -> LineComparisons<InvoiceReceiptDiscrepancy> {
    let mut comparisons = LineComparisons::new();
    for line in &invoice.lines {
        let Some(order_line_id) = line.order_line_id.as_deref() else {
            continue;
        };
        let comparison =
            compare_invoice_line_to_receipts(line, aggregates.get(order_line_id), config);
        record_comparison(&mut comparisons, order_line_id, comparison);
    }
    comparisons
}

/// Compare every purchase order line with the aggregated receipts
pub fn compare_po_to_receipts(
    po: &PurchaseOrder,
    aggregates: &ReceiptAggregates,
    config: &ReconciliationConfig,
) -> LineComparisons<PoReceiptDiscrepancy> {
    let mut comparisons = LineComparisons::new();
    for po_line in &po.lines {
        let comparison = compare_po_line_to_receipts(po_line, aggregates.get(&po_line.id), config);
        record_comparison(&mut comparisons, &po_line.id, comparison);
    }
    comparisons
}

/// Compare the purchase order lines an invoice bills against with the
/// aggregated receipts. Invoice lines missing from the order get a
/// line-not-found entry so every invoice line is accounted for.
pub fn compare_billed_po_lines_to_receipts(
    invoice: &Invoice,
    po: &PurchaseOrder,
    aggregates: &ReceiptAggregates,
    config: &ReconciliationConfig,
) -> LineComparisons<PoReceiptDiscrepancy> {
    let mut comparisons = LineComparisons::new();
    for order_line_id in invoice.order_line_ids() {
        let comparison = match po.line(order_line_id) {
            Some(po_line) => {
                compare_po_line_to_receipts(po_line, aggregates.get(order_line_id), config)
            }
            None => LineComparison::from_discrepancy(PoReceiptDiscrepancy {
                error: Some(LINE_NOT_IN_PO.to_string()),
                ..Default::default()
            }),
        };
        record_comparison(&mut comparisons, order_line_id, comparison);
    }
    comparisons
}
