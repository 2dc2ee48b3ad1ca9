//! Integration tests for procure-match

use bigdecimal::BigDecimal;
use procure_match::{
    MatchStatus, MemoryDocumentSource, ReconciliationConfig, Reconciler, APPROVED_MESSAGE,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn invoice_doc(id: i64, po: &str, lines: &[(i64, f64, &str, &str)]) -> Value {
    let lines: Vec<Value> = lines
        .iter()
        .enumerate()
        .map(|(idx, (order_line, qty, price, total))| {
            json!({
                "id": idx + 1,
                "order-line-id": order_line,
                "po-number": po,
                "quantity": qty,
                "price": price,
                "total": total,
                "description": "Laptop dock"
            })
        })
        .collect();
    let total: BigDecimal = lines
        .iter()
        .map(|l| dec(l["total"].as_str().unwrap()))
        .sum();

    json!({
        "id": id,
        "invoice-number": format!("INV-{}", id),
        "currency": { "code": "USD" },
        "total-with-taxes": total.to_string(),
        "status": "pending_approval",
        "invoice-lines": lines
    })
}

fn po_doc(id: i64, lines: Value) -> Value {
    let total: BigDecimal = lines
        .as_array()
        .unwrap()
        .iter()
        .map(|l| dec(l["total"].as_str().unwrap()))
        .sum();

    json!({
        "id": id,
        "po-number": id.to_string(),
        "currency": { "code": "USD" },
        "total-with-estimated-tax": total.to_string(),
        "status": "issued",
        "order-lines": lines
    })
}

fn receipt_doc(id: i64, po: i64, order_line: i64, qty: &str, price: &str, total: &str) -> Value {
    json!({
        "id": id,
        "status": "created",
        "quantity": qty,
        "price": price,
        "total": total,
        "transaction-date": "2024-03-02T10:00:00Z",
        "order-line": { "id": order_line, "order-header-id": po, "description": "Laptop dock" },
        "account": { "account-type": { "currency": { "code": "USD" } } }
    })
}

/// Invoice 713906 billing PO 4187 lines 6105 and 6106, fully received
fn approved_scenario() -> MemoryDocumentSource {
    let source = MemoryDocumentSource::new();
    source.insert_invoice(
        713906,
        invoice_doc(
            713906,
            "4187",
            &[(6105, 1.0, "1050.00", "1050.00"), (6106, 1.0, "250.00", "250.00")],
        ),
    );
    source.insert_purchase_order(
        4187,
        po_doc(
            4187,
            json!([
                { "id": 6105, "type": "OrderQuantityLine", "quantity": 1.0, "price": "1050.00", "total": "1050.00" },
                { "id": 6106, "type": "OrderQuantityLine", "quantity": 1.0, "price": "250.00", "total": "250.00" }
            ]),
        ),
    );
    source.insert_receipt(501, receipt_doc(501, 4187, 6105, "1.0", "1050.00", "1050.00"));
    source.insert_receipt(502, receipt_doc(502, 4187, 6106, "1.0", "250.00", "250.00"));
    source
}

#[tokio::test]
async fn test_complete_three_way_approval() {
    let reconciler = Reconciler::new(approved_scenario());

    let result = reconciler.three_way_matching(713906).await;
    assert_eq!(result.overall_status, MatchStatus::Approved);
    assert_eq!(result.invoice_id, 713906);
    assert_eq!(result.po_id, 4187);
    assert_eq!(result.message, APPROVED_MESSAGE);
    assert_eq!(result.receipt_count, 2);

    // Every invoice line appears in every map, with nothing recorded
    for map_keys in [
        result.invoice_po_discrepancies.keys().collect::<Vec<_>>(),
        result.invoice_receipts_discrepancies.keys().collect::<Vec<_>>(),
        result.po_receipts_discrepancies.keys().collect::<Vec<_>>(),
    ] {
        assert_eq!(map_keys, vec!["6105", "6106"]);
    }

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["overall_status"], "APPROVED");
    assert_eq!(json["invoice_po_discrepancies"]["6106"], json!({}));
}

#[tokio::test]
async fn test_invoice_po_tool_approval() {
    let reconciler = Reconciler::new(approved_scenario());

    let response = reconciler.invoice_po_matching(713906, 4187).await;
    assert!(response.success);
    assert_eq!(response.result.status, MatchStatus::Approved);
    assert!(response.result.total_amount_match);

    let expected: BTreeMap<String, bool> =
        [("6105".to_string(), true), ("6106".to_string(), true)].into();
    assert_eq!(response.result.quantity_match, expected);
    assert_eq!(response.result.unit_price_match, expected);
    assert_eq!(response.result.line_total_match, expected);
    assert!(response.result.line_item_discrepancies.is_empty());
}

#[tokio::test]
async fn test_invoice_po_quantity_mismatch() {
    let source = approved_scenario();
    source.insert_invoice(
        713906,
        invoice_doc(
            713906,
            "4187",
            &[(6105, 1.0, "1050.00", "1050.00"), (6106, 2.0, "250.00", "250.00")],
        ),
    );
    let reconciler = Reconciler::new(source);

    let response = reconciler.invoice_po_matching(713906, 4187).await;
    assert!(response.success);
    assert_eq!(response.result.status, MatchStatus::Blocked);
    assert!(!response.result.quantity_match["6106"]);
    assert!(response.result.quantity_match["6105"]);
    assert!(response.result.line_total_match["6106"]);

    let discrepancy = &response.result.line_item_discrepancies["6106"];
    let quantity = discrepancy.quantity.as_ref().unwrap();
    assert_eq!(quantity.invoice, dec("2.0"));
    assert_eq!(quantity.po, dec("1.0"));
    assert!(!response.result.line_item_discrepancies.contains_key("6105"));
    assert_eq!(response.result.message, "Quantity mismatch on line 6106");
}

#[tokio::test]
async fn test_missing_purchase_order() {
    let source = approved_scenario();
    source.insert_invoice(
        800001,
        invoice_doc(800001, "9999", &[(7001, 1.0, "10.00", "10.00")]),
    );
    let reconciler = Reconciler::new(source);

    let response = reconciler.invoice_po_matching(800001, 9999).await;
    assert!(!response.success);
    assert_eq!(response.result.status, MatchStatus::Error);
    assert!(response
        .result
        .message
        .contains("Purchase Order with ID 9999 not found"));
    assert!(response.result.quantity_match.is_empty());
    assert!(response.result.line_item_discrepancies.is_empty());

    let result = reconciler.three_way_matching(800001).await;
    assert_eq!(result.overall_status, MatchStatus::Error);
    assert_eq!(result.po_id, 9999);
    assert_eq!(result.invoice_po_status, None);
    assert!(result.invoice_po_discrepancies.is_empty());

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["result"]["status"], "error");
}

#[tokio::test]
async fn test_receipt_price_drift_blocks() {
    let source = approved_scenario();
    source.insert_receipt(503, receipt_doc(503, 4187, 6106, "0.0", "260.00", "0.00"));
    let reconciler = Reconciler::new(source);

    let response = reconciler.invoice_receipt_matching(713906).await;
    assert!(response.success);
    assert_eq!(response.result.status, MatchStatus::Blocked);
    assert!(response.result.quantity_match["6106"]);
    assert!(!response.result.unit_price_match["6106"]);

    let unit_price = response.result.line_item_discrepancies["6106"]
        .unit_price
        .as_ref()
        .unwrap();
    assert_eq!(unit_price.receipts.prices, vec![dec("250.00"), dec("260.00")]);
    assert_eq!(unit_price.receipts.average, dec("255"));
}

#[tokio::test]
async fn test_voided_receipts_are_ignored() {
    let source = approved_scenario();
    let mut voided = receipt_doc(504, 4187, 6106, "5.0", "999.00", "4995.00");
    voided["status"] = json!("voided");
    source.insert_receipt(504, voided);
    let reconciler = Reconciler::new(source);

    let result = reconciler.three_way_matching(713906).await;
    assert_eq!(result.overall_status, MatchStatus::Approved);
    assert_eq!(result.receipt_count, 2);
}

#[tokio::test]
async fn test_tolerance_boundary_on_received_quantity() {
    let source = approved_scenario();
    source.insert_receipt(502, receipt_doc(502, 4187, 6106, "0.99", "250.00", "250.00"));
    let reconciler = Reconciler::new(source.clone());

    // Off by exactly the tolerance
    let result = reconciler.three_way_matching(713906).await;
    assert_eq!(result.invoice_receipts_status, Some(MatchStatus::Approved));

    source.insert_receipt(502, receipt_doc(502, 4187, 6106, "0.98", "250.00", "250.00"));
    let result = reconciler.three_way_matching(713906).await;
    assert_eq!(result.invoice_receipts_status, Some(MatchStatus::Blocked));
    assert_eq!(result.overall_status, MatchStatus::Blocked);
}

#[tokio::test]
async fn test_amount_line_skips_unit_checks() {
    let source = MemoryDocumentSource::new();
    source.insert_invoice(
        900,
        invoice_doc(900, "4300", &[(8001, 1.0, "1200.00", "1200.00")]),
    );
    source.insert_purchase_order(
        4300,
        po_doc(
            4300,
            json!([
                { "id": 8001, "type": "OrderAmountLine", "quantity": 1.0, "price": "1200.00", "total": "1200.00" }
            ]),
        ),
    );
    source.insert_receipt(601, receipt_doc(601, 4300, 8001, "400", "1.00", "400.00"));
    source.insert_receipt(602, receipt_doc(602, 4300, 8001, "800", "1.00", "800.00"));
    let reconciler = Reconciler::new(source);

    let response = reconciler.po_all_receipts_matching(4300).await;
    assert!(response.success);
    assert_eq!(response.result.overall_status, MatchStatus::Approved);
    assert!(response.result.line_match["8001"]);
}

#[tokio::test]
async fn test_no_receipts_blocks() {
    let source = approved_scenario();
    source.insert_invoice(
        700,
        invoice_doc(700, "4200", &[(7100, 1.0, "10.00", "10.00")]),
    );
    source.insert_purchase_order(
        4200,
        po_doc(
            4200,
            json!([{ "id": 7100, "quantity": 1.0, "price": "10.00", "total": "10.00" }]),
        ),
    );
    let reconciler = Reconciler::new(source);

    let result = reconciler.three_way_matching(700).await;
    assert_eq!(result.overall_status, MatchStatus::Blocked);
    assert_eq!(result.message, "No receipts found for PO 4200");
    assert_eq!(result.receipt_count, 0);

    let response = reconciler.po_all_receipts_matching(4200).await;
    assert!(response.success);
    assert_eq!(response.result.overall_status, MatchStatus::Blocked);
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let source = approved_scenario();

    // Second invoice: valid PO without any receipts
    source.insert_invoice(
        700,
        invoice_doc(700, "4200", &[(7100, 1.0, "10.00", "10.00")]),
    );
    source.insert_purchase_order(
        4200,
        po_doc(
            4200,
            json!([{ "id": 7100, "quantity": 1.0, "price": "10.00", "total": "10.00" }]),
        ),
    );

    // Third invoice: the source fails while fetching it
    source.fail_on("invoices/701", "connection reset by peer");

    let reconciler = Reconciler::new(source);
    let batch = reconciler.batch_three_way_matching(&[713906, 700, 701]).await;

    assert_eq!(batch.total_invoices, 3);
    assert_eq!(batch.successful_matches, 1);
    assert_eq!(batch.blocked_matches, 1);
    assert_eq!(batch.error_matches, 1);

    let ids: Vec<i64> = batch.results.iter().map(|r| r.invoice_id).collect();
    assert_eq!(ids, vec![713906, 700, 701]);
    assert_eq!(batch.results[2].overall_status, MatchStatus::Error);
    assert!(batch.results[2].message.contains("connection reset by peer"));
    assert_eq!(
        batch.summary,
        "Processed 3 invoices: 1 approved, 1 blocked, 1 errors"
    );
    assert!(batch.completed_at >= batch.started_at);
}

#[tokio::test]
async fn test_empty_batch() {
    let reconciler = Reconciler::new(MemoryDocumentSource::new());
    let batch = reconciler.batch_three_way_matching(&[]).await;

    assert_eq!(batch.total_invoices, 0);
    assert_eq!(batch.successful_matches + batch.blocked_matches + batch.error_matches, 0);
    assert!(batch.results.is_empty());
}

#[tokio::test]
async fn test_description_drift_blocks_unless_disabled() {
    let source = approved_scenario();
    let mut renamed = receipt_doc(502, 4187, 6106, "1.0", "250.00", "250.00");
    renamed["order-line"]["description"] = json!("USB-C docking station");
    source.insert_receipt(502, renamed);

    let result = Reconciler::new(source.clone())
        .three_way_matching(713906)
        .await;
    assert_eq!(result.overall_status, MatchStatus::Blocked);
    assert!(result.invoice_receipts_discrepancies["6106"]
        .description
        .is_some());

    let config = ReconciliationConfig::default().with_description_checks(false);
    let relaxed = Reconciler::with_config(source, config)
        .three_way_matching(713906)
        .await;
    assert_eq!(relaxed.overall_status, MatchStatus::Approved);
}

#[tokio::test]
async fn test_po_receipts_description_mismatch() {
    let source = approved_scenario();
    source.insert_purchase_order(
        4187,
        po_doc(
            4187,
            json!([
                { "id": 6105, "type": "OrderQuantityLine", "quantity": 1.0, "price": "1050.00",
                  "total": "1050.00", "description": "Laptop" },
                { "id": 6106, "type": "OrderQuantityLine", "quantity": 1.0, "price": "250.00",
                  "total": "250.00" }
            ]),
        ),
    );
    let mut tower = receipt_doc(501, 4187, 6105, "1.0", "1050.00", "1050.00");
    tower["order-line"]["description"] = json!("Desktop tower");
    source.insert_receipt(501, tower);
    let reconciler = Reconciler::new(source);

    let response = reconciler.po_all_receipts_matching(4187).await;
    assert!(response.success);
    assert_eq!(response.result.overall_status, MatchStatus::Blocked);
    assert!(!response.result.line_match["6105"]);
    assert!(response.result.line_match["6106"]);
    assert_eq!(response.result.message, "Description mismatch on line 6105");

    let json = serde_json::to_value(&response.result.line_item_discrepancies["6105"]).unwrap();
    assert_eq!(
        json,
        json!({ "description": { "po": "Laptop", "receipts": ["Desktop tower"] } })
    );
}

#[tokio::test]
async fn test_unlinked_invoice_line_outside_receipt_totals() {
    let source = MemoryDocumentSource::new();
    source.insert_invoice(
        713910,
        json!({
            "id": 713910,
            "currency": { "code": "USD" },
            "total-with-taxes": "1100.00",
            "invoice-lines": [
                { "id": 1, "order-line-id": 6105, "po-number": "4187",
                  "quantity": 1, "price": "1050.00", "total": "1050.00" },
                { "id": 2, "description": "Freight", "quantity": 1,
                  "price": "50.00", "total": "50.00" }
            ]
        }),
    );
    source.insert_purchase_order(
        4187,
        po_doc(
            4187,
            json!([
                { "id": 6105, "quantity": 1.0, "price": "1050.00", "total": "1050.00" }
            ]),
        ),
    );
    source.insert_receipt(501, receipt_doc(501, 4187, 6105, "1.0", "1050.00", "1050.00"));
    let reconciler = Reconciler::new(source);

    let response = reconciler.invoice_receipt_matching(713910).await;
    assert!(response.success);
    assert!(response.result.total_amount_match);
    assert_eq!(response.result.status, MatchStatus::Approved);
    assert_eq!(response.result.message, APPROVED_MESSAGE);

    let result = reconciler.three_way_matching(713910).await;
    assert_eq!(result.overall_status, MatchStatus::Approved);
    assert_eq!(
        result.invoice_receipts_discrepancies.keys().collect::<Vec<_>>(),
        vec!["6105"]
    );
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let reconciler = Reconciler::new(approved_scenario());

    let first = reconciler.three_way_matching(713906).await;
    let second = reconciler.three_way_matching(713906).await;

    assert_eq!(first.overall_status, second.overall_status);
    assert_eq!(first.message, second.message);
    assert_eq!(first.invoice_po_discrepancies, second.invoice_po_discrepancies);
    assert_eq!(
        serde_json::to_value(&first.po_receipts_discrepancies).unwrap(),
        serde_json::to_value(&second.po_receipts_discrepancies).unwrap()
    );
}
