//! Reconciliation orchestrator: fetch chain, three-way matching, peer tools and batches

use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};

use crate::config::ReconciliationConfig;
use crate::documents::{Invoice, PurchaseOrder, Receipt};
use crate::reconciliation::aggregate::{aggregate_receipts, ReceiptAggregates};
use crate::reconciliation::compare::*;
use crate::reconciliation::report::*;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{field, parse_document_id};

/// Reconciles invoices, purchase orders and receipts read from a [`DocumentSource`]
///
/// Every call fetches fresh snapshots; nothing is cached between calls. All
/// fetches are awaited one after another.
pub struct Reconciler<S: DocumentSource> {
    source: S,
    config: ReconciliationConfig,
}

impl<S: DocumentSource> Reconciler<S> {
    /// Create a reconciler with the default configuration
    pub fn new(source: S) -> Self {
        Self::with_config(source, ReconciliationConfig::default())
    }

    /// Create a reconciler with a custom configuration
    pub fn with_config(source: S, config: ReconciliationConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // Fetch chain

    /// Fetch and normalize an invoice
    pub async fn fetch_invoice(&self, invoice_id: i64) -> ReconResult<Invoice> {
        let resource = self.config.resources.invoice(invoice_id);
        let document = self
            .source
            .fetch_document(&resource)
            .await?
            .ok_or_else(|| ReconError::not_found(DocumentKind::Invoice, invoice_id))?;

        Invoice::from_document(&document)
            .map_err(|err| missing_id_as_not_found(err, DocumentKind::Invoice, invoice_id))
    }

    /// Fetch and normalize a purchase order
    pub async fn fetch_purchase_order(&self, po_id: i64) -> ReconResult<PurchaseOrder> {
        let resource = self.config.resources.purchase_order(po_id);
        let document = self
            .source
            .fetch_document(&resource)
            .await?
            .ok_or_else(|| ReconError::not_found(DocumentKind::PurchaseOrder, po_id))?;

        PurchaseOrder::from_document(&document)
            .map_err(|err| missing_id_as_not_found(err, DocumentKind::PurchaseOrder, po_id))
    }

    /// Fetch every receipt recorded against a purchase order
    ///
    /// The list endpoint only yields ids, so each receipt is fetched
    /// individually. Listed ids that no longer resolve are skipped.
    pub async fn fetch_receipts(&self, po_id: i64) -> ReconResult<Vec<Receipt>> {
        let resources = &self.config.resources;
        let mut params = HashMap::new();
        params.insert(resources.receipt_po_filter.clone(), po_id.to_string());

        let listed = self
            .source
            .fetch_document_list(&resources.receipts, &params)
            .await?;

        let mut receipts = Vec::with_capacity(listed.len());
        for partial in &listed {
            let Some(raw_id) = field(partial, "id") else {
                tracing::warn!(po_id, "Receipt listing entry without id, skipping");
                continue;
            };
            let receipt_id = parse_document_id(raw_id)?;

            match self.source.fetch_document(&resources.receipt(receipt_id)).await? {
                Some(document) => receipts.push(Receipt::from_document(&document)?),
                None => {
                    let missing = ReconError::not_found(DocumentKind::Receipt, receipt_id);
                    tracing::warn!(po_id, error = %missing, "Listed receipt skipped");
                }
            }
        }

        tracing::debug!(po_id, count = receipts.len(), "Fetched receipts");
        Ok(receipts)
    }

    fn aggregate(&self, receipts: &[Receipt]) -> ReceiptAggregates {
        aggregate_receipts(receipts, &self.config)
    }

    fn active_receipt_count(&self, receipts: &[Receipt]) -> usize {
        receipts
            .iter()
            .filter(|r| !r.has_status(&self.config.voided_status))
            .count()
    }

    // Three-way matching

    /// Reconcile an invoice against its purchase order and that order's receipts
    ///
    /// Never fails: missing documents, bad references and source errors are
    /// reported as an `error` result, missing receipts as `BLOCKED`.
    pub async fn three_way_matching(&self, invoice_id: i64) -> ThreeWayComparisonResult {
        tracing::info!(invoice_id, "Starting three-way match");

        let invoice = match self.fetch_invoice(invoice_id).await {
            Ok(invoice) => invoice,
            Err(err) => return three_way_error(invoice_id, 0, err),
        };

        let po_id = match invoice.resolve_po_id() {
            Ok(po_id) => po_id,
            Err(err) => return three_way_error(invoice_id, 0, err),
        };

        let po = match self.fetch_purchase_order(po_id).await {
            Ok(po) => po,
            Err(err) => return three_way_error(invoice_id, po_id, err),
        };

        let receipts = match self.fetch_receipts(po_id).await {
            Ok(receipts) => receipts,
            Err(err) => return three_way_error(invoice_id, po_id, err),
        };

        if receipts.is_empty() {
            tracing::info!(invoice_id, po_id, "No receipts found, blocking");
            return ThreeWayComparisonResult::terminal(
                invoice_id,
                po_id,
                MatchStatus::Blocked,
                format!("No receipts found for PO {}", po_id),
            );
        }

        let result = self.compare_three_way(&invoice, &po, &receipts);
        tracing::info!(
            invoice_id,
            po_id,
            status = %result.overall_status,
            "Three-way match finished"
        );
        result
    }

    /// Run the three comparators over already fetched documents
    pub fn compare_three_way(
        &self,
        invoice: &Invoice,
        po: &PurchaseOrder,
        receipts: &[Receipt],
    ) -> ThreeWayComparisonResult {
        let unlinked = invoice
            .lines
            .iter()
            .filter(|line| line.order_line_id.is_none())
            .count();
        if unlinked > 0 {
            tracing::warn!(
                invoice_id = invoice.id,
                unlinked,
                "Invoice lines without order line reference are not reconciled"
            );
        }

        if invoice.order_line_ids().is_empty() {
            return ThreeWayComparisonResult::terminal(
                invoice.id,
                po.id,
                MatchStatus::Blocked,
                format!("Invoice {} has no lines linked to PO {}", invoice.id, po.id),
            );
        }

        let aggregates = self.aggregate(receipts);

        let invoice_po = compare_invoice_to_po(invoice, po, &self.config);
        let invoice_receipts = compare_invoice_to_receipts(invoice, &aggregates, &self.config);
        let po_receipts = compare_billed_po_lines_to_receipts(invoice, po, &aggregates, &self.config);

        let invoice_po_status = MatchStatus::from_matched(all_matched(&invoice_po));
        let invoice_receipts_status = MatchStatus::from_matched(all_matched(&invoice_receipts));
        let po_receipts_status = MatchStatus::from_matched(all_matched(&po_receipts));

        tracing::debug!(
            invoice_id = invoice.id,
            ?invoice_po_status,
            ?invoice_receipts_status,
            ?po_receipts_status,
            "Pairwise comparisons finished"
        );

        let overall_status = if [invoice_po_status, invoice_receipts_status, po_receipts_status]
            .contains(&MatchStatus::Blocked)
        {
            MatchStatus::Blocked
        } else {
            MatchStatus::Approved
        };

        let message = match overall_status {
            MatchStatus::Approved => APPROVED_MESSAGE.to_string(),
            _ => {
                let sections = [
                    ("Invoice vs PO", failing_lines(&invoice_po)),
                    ("Invoice vs receipts", failing_lines(&invoice_receipts)),
                    ("PO vs receipts", failing_lines(&po_receipts)),
                ];
                sections
                    .iter()
                    .filter(|(_, lines)| !lines.is_empty())
                    .map(|(label, lines)| {
                        format!("{} discrepancies on lines: {}", label, lines.join(", "))
                    })
                    .collect::<Vec<_>>()
                    .join("; ")
            }
        };

        ThreeWayComparisonResult {
            invoice_id: invoice.id,
            po_id: po.id,
            overall_status,
            invoice_po_status: Some(invoice_po_status),
            invoice_receipts_status: Some(invoice_receipts_status),
            po_receipts_status: Some(po_receipts_status),
            message,
            invoice_po_discrepancies: discrepancy_map(&invoice_po),
            invoice_receipts_discrepancies: discrepancy_map(&invoice_receipts),
            po_receipts_discrepancies: discrepancy_map(&po_receipts),
            receipt_count: self.active_receipt_count(receipts),
            checked_at: Utc::now(),
        }
    }

    /// Reconcile many invoices one after another
    ///
    /// A failure on one invoice is reported in its own result and never stops
    /// the remaining invoices. Results keep the order of `invoice_ids`.
    pub async fn batch_three_way_matching(&self, invoice_ids: &[i64]) -> BatchResult {
        let started_at = Utc::now();
        let total = invoice_ids.len();
        tracing::info!(total, "Starting batch three-way match");

        let mut results = Vec::with_capacity(total);
        for (idx, &invoice_id) in invoice_ids.iter().enumerate() {
            let result = self.three_way_matching(invoice_id).await;
            tracing::info!(
                invoice_id,
                status = %result.overall_status,
                "Batch progress: {}/{}",
                idx + 1,
                total
            );
            results.push(result);
        }

        let batch = BatchResult::from_results(results, started_at);
        tracing::info!(batch_id = %batch.batch_id, "{}", batch.summary);
        batch
    }

    // Peer tools

    /// Reconcile an invoice against a given purchase order only
    pub async fn invoice_po_matching(
        &self,
        invoice_id: i64,
        po_id: i64,
    ) -> ToolResponse<InvoicePoMatchResult> {
        let invoice = match self.fetch_invoice(invoice_id).await {
            Ok(invoice) => invoice,
            Err(err) => return invoice_po_error(invoice_id, po_id, err),
        };

        let po = match self.fetch_purchase_order(po_id).await {
            Ok(po) => po,
            Err(err) => return invoice_po_error(invoice_id, po_id, err),
        };

        let result = self.compare_invoice_po(&invoice, &po);
        tracing::info!(invoice_id, po_id, status = %result.status, "Invoice vs PO match finished");
        ToolResponse::new(result.status, result)
    }

    /// Build the invoice vs purchase order result for fetched documents
    pub fn compare_invoice_po(&self, invoice: &Invoice, po: &PurchaseOrder) -> InvoicePoMatchResult {
        let comparisons = compare_invoice_to_po(invoice, po, &self.config);
        let total_amount_match = invoice.total_with_taxes == po.total_with_estimated_tax;

        let field_flags = |has_field: fn(&InvoicePoDiscrepancy) -> bool| -> BTreeMap<String, bool> {
            comparisons
                .iter()
                .map(|(id, c)| {
                    let ok = c.discrepancy.error.is_none() && !has_field(&c.discrepancy);
                    (id.clone(), ok)
                })
                .collect()
        };

        let quantity_match = field_flags(|d| d.quantity.is_some());
        let unit_price_match = field_flags(|d| d.unit_price.is_some());
        let line_total_match = field_flags(|d| d.line_total.is_some());
        let line_item_discrepancies = failing_discrepancies(&comparisons);

        let mut messages = Vec::new();
        if !total_amount_match {
            messages.push(format!(
                "Total amount mismatch: invoice {} vs PO {}",
                invoice.total_with_taxes, po.total_with_estimated_tax
            ));
        }
        if comparisons.is_empty() {
            messages.push(format!("Invoice {} has no lines linked to a PO line", invoice.id));
        }
        messages.extend(mismatch_messages(&line_item_discrepancies));

        let (status, message) = if messages.is_empty() {
            (MatchStatus::Approved, APPROVED_MESSAGE.to_string())
        } else {
            (MatchStatus::Blocked, messages.join("\n"))
        };

        InvoicePoMatchResult {
            invoice_id: invoice.id,
            po_id: po.id,
            status,
            message,
            total_amount_match,
            quantity_match,
            unit_price_match,
            line_total_match,
            line_item_discrepancies,
        }
    }

    /// Reconcile an invoice against the receipts of the purchase order it references
    pub async fn invoice_receipt_matching(
        &self,
        invoice_id: i64,
    ) -> ToolResponse<InvoiceReceiptMatchResult> {
        let terminal = |po_id: i64, status: MatchStatus, message: String| {
            ToolResponse::new(
                status,
                InvoiceReceiptMatchResult::terminal(invoice_id, po_id, status, message),
            )
        };

        let invoice = match self.fetch_invoice(invoice_id).await {
            Ok(invoice) => invoice,
            Err(err) => return terminal(0, MatchStatus::Error, log_error(err)),
        };

        let po_id = match invoice.resolve_po_id() {
            Ok(po_id) => po_id,
            Err(err) => return terminal(0, MatchStatus::Error, log_error(err)),
        };

        let receipts = match self.fetch_receipts(po_id).await {
            Ok(receipts) => receipts,
            Err(err) => return terminal(po_id, MatchStatus::Error, log_error(err)),
        };

        if receipts.is_empty() {
            return terminal(
                po_id,
                MatchStatus::Blocked,
                format!("No receipts found for PO {}", po_id),
            );
        }

        let result = self.compare_invoice_receipts(&invoice, po_id, &receipts);
        tracing::info!(invoice_id, po_id, status = %result.status, "Invoice vs receipts match finished");
        ToolResponse::new(result.status, result)
    }

    /// Build the invoice vs receipts result for fetched documents
    pub fn compare_invoice_receipts(
        &self,
        invoice: &Invoice,
        po_id: i64,
        receipts: &[Receipt],
    ) -> InvoiceReceiptMatchResult {
        let aggregates = self.aggregate(receipts);
        let comparisons = compare_invoice_to_receipts(invoice, &aggregates, &self.config);

        let received_total: BigDecimal = invoice
            .order_line_ids()
            .into_iter()
            .filter_map(|id| aggregates.get(id))
            .map(|data| &data.total)
            .sum();
        let invoiced_total = invoice.linked_lines_total();
        let total_amount_match =
            !exceeds_tolerance(&invoiced_total, &received_total, &self.config.tolerance);

        let quantity_match = comparisons
            .iter()
            .map(|(id, c)| {
                let ok = c.discrepancy.error.is_none() && c.discrepancy.quantity.is_none();
                (id.clone(), ok)
            })
            .collect();
        let unit_price_match = comparisons
            .iter()
            .map(|(id, c)| {
                let ok = c.discrepancy.error.is_none() && c.discrepancy.unit_price.is_none();
                (id.clone(), ok)
            })
            .collect();
        let line_item_discrepancies = failing_discrepancies(&comparisons);

        let mut messages = Vec::new();
        if !total_amount_match {
            messages.push(format!(
                "Total amount mismatch: invoice {} vs received {}",
                invoiced_total,
                received_total
            ));
        }
        if comparisons.is_empty() {
            messages.push(format!("Invoice {} has no lines linked to a PO line", invoice.id));
        }
        messages.extend(mismatch_messages(&line_item_discrepancies));

        let (status, message) = if messages.is_empty() {
            (MatchStatus::Approved, APPROVED_MESSAGE.to_string())
        } else {
            (MatchStatus::Blocked, messages.join("\n"))
        };

        InvoiceReceiptMatchResult {
            invoice_id: invoice.id,
            po_id,
            status,
            message,
            total_amount_match,
            quantity_match,
            unit_price_match,
            line_item_discrepancies,
        }
    }

    /// Reconcile every line of a purchase order against all of its receipts
    pub async fn po_all_receipts_matching(
        &self,
        purchase_order_id: i64,
    ) -> ToolResponse<PoReceiptsMatchResult> {
        let terminal = |status: MatchStatus, message: String| {
            ToolResponse::new(
                status,
                PoReceiptsMatchResult::terminal(purchase_order_id, status, message),
            )
        };

        let po = match self.fetch_purchase_order(purchase_order_id).await {
            Ok(po) => po,
            Err(err) => return terminal(MatchStatus::Error, log_error(err)),
        };

        let receipts = match self.fetch_receipts(purchase_order_id).await {
            Ok(receipts) => receipts,
            Err(err) => return terminal(MatchStatus::Error, log_error(err)),
        };

        if receipts.is_empty() {
            return terminal(
                MatchStatus::Blocked,
                format!("No receipts found for PO {}", purchase_order_id),
            );
        }

        let result = self.compare_po_receipts(&po, &receipts);
        tracing::info!(
            purchase_order_id,
            status = %result.overall_status,
            "PO vs receipts match finished"
        );
        ToolResponse::new(result.overall_status, result)
    }

    /// Build the purchase order vs receipts result for fetched documents
    pub fn compare_po_receipts(&self, po: &PurchaseOrder, receipts: &[Receipt]) -> PoReceiptsMatchResult {
        let aggregates = self.aggregate(receipts);
        let comparisons = compare_po_to_receipts(po, &aggregates, &self.config);

        let line_match = comparisons
            .iter()
            .map(|(id, c)| (id.clone(), c.matched))
            .collect();
        let line_item_discrepancies = failing_discrepancies(&comparisons);

        let mut messages = Vec::new();
        if comparisons.is_empty() {
            messages.push(format!("PO {} has no order lines", po.id));
        }
        messages.extend(mismatch_messages(&line_item_discrepancies));

        let (overall_status, message) = if messages.is_empty() {
            (MatchStatus::Approved, APPROVED_MESSAGE.to_string())
        } else {
            (MatchStatus::Blocked, messages.join("\n"))
        };

        PoReceiptsMatchResult {
            purchase_order_id: po.id,
            overall_status,
            message,
            line_match,
            line_item_discrepancies,
        }
    }
}

/// A document without an id is treated as absent
fn missing_id_as_not_found(err: ReconError, kind: DocumentKind, id: i64) -> ReconError {
    match err {
        ReconError::MissingField(ref name) if name == "id" => ReconError::not_found(kind, id),
        other => other,
    }
}

fn log_error(err: ReconError) -> String {
    tracing::warn!(error = %err, "Reconciliation stopped with error");
    err.to_string()
}

fn three_way_error(invoice_id: i64, po_id: i64, err: ReconError) -> ThreeWayComparisonResult {
    let message = log_error(err);
    ThreeWayComparisonResult::terminal(invoice_id, po_id, MatchStatus::Error, message)
}

fn invoice_po_error(invoice_id: i64, po_id: i64, err: ReconError) -> ToolResponse<InvoicePoMatchResult> {
    let message = log_error(err);
    ToolResponse::new(
        MatchStatus::Error,
        InvoicePoMatchResult::error(invoice_id, po_id, message),
    )
}
