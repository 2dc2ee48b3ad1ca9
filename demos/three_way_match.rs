//! Three-way matching walkthrough against an in-memory document source

use procure_match::{
    LineDiscrepancy, MatchStatus, MemoryDocumentSource, ReconciliationConfig, Reconciler,
};
use serde_json::json;

fn seed(source: &MemoryDocumentSource) {
    source.insert_invoice(
        713906,
        json!({
            "id": 713906,
            "invoice-number": "INV-2024-0042",
            "currency": { "code": "USD" },
            "total-with-taxes": "1550.00",
            "invoice-lines": [
                { "id": 1, "order-line-id": 6105, "po-number": "4187",
                  "quantity": 1, "price": "1050.00", "total": "1050.00", "description": "Laptop" },
                { "id": 2, "order-line-id": 6106, "po-number": "4187",
                  "quantity": 2, "price": "250.00", "total": "500.00", "description": "Dock" }
            ]
        }),
    );

    source.insert_purchase_order(
        4187,
        json!({
            "id": 4187,
            "po-number": "4187",
            "currency": { "code": "USD" },
            "total-with-estimated-tax": "1550.00",
            "order-lines": [
                { "id": 6105, "type": "OrderQuantityLine", "quantity": 1,
                  "price": "1050.00", "total": "1050.00", "description": "Laptop" },
                { "id": 6106, "type": "OrderQuantityLine", "quantity": 2,
                  "price": "250.00", "total": "500.00", "description": "Dock" }
            ]
        }),
    );

    // Only one of the two docks has arrived so far
    for (id, line, price) in [(91, 6105, "1050.00"), (92, 6106, "250.00")] {
        source.insert_receipt(
            id,
            json!({
                "id": id,
                "status": "created",
                "quantity": 1,
                "price": price,
                "total": price,
                "order-line": { "id": line, "order-header-id": 4187 },
                "account": { "account-type": { "currency": { "code": "USD" } } }
            }),
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("Procure Match - Three-Way Matching Example\n");

    let source = MemoryDocumentSource::new();
    seed(&source);

    let config = ReconciliationConfig::from_env()?;
    let reconciler = Reconciler::with_config(source.clone(), config);

    // 1. Invoice against its purchase order
    let response = reconciler.invoice_po_matching(713906, 4187).await;
    println!("Invoice vs PO: {}", response.result.status);
    println!("  {}\n", response.result.message);

    // 2. Full three-way match
    let result = reconciler.three_way_matching(713906).await;
    println!("Three-way match: {}", result.overall_status);
    println!("  {}", result.message);
    for (line, discrepancy) in &result.invoice_receipts_discrepancies {
        if !discrepancy.is_empty() {
            println!("  line {}: {}", line, serde_json::to_string(discrepancy)?);
        }
    }
    println!();

    // 3. The second dock arrives
    source.insert_receipt(
        93,
        json!({
            "id": 93,
            "status": "created",
            "quantity": 1,
            "price": "250.00",
            "total": "250.00",
            "order-line": { "id": 6106, "order-header-id": 4187 },
            "account": { "account-type": { "currency": { "code": "USD" } } }
        }),
    );

    let batch = reconciler.batch_three_way_matching(&[713906, 713907]).await;
    println!("Batch {}: {}", batch.batch_id, batch.summary);
    for result in &batch.results {
        let marker = match result.overall_status {
            MatchStatus::Approved => "ok",
            MatchStatus::Blocked => "blocked",
            MatchStatus::Error => "error",
        };
        println!("  [{}] invoice {}: {}", marker, result.invoice_id, result.message);
    }

    println!("\n{}", serde_json::to_string_pretty(&batch.results[0])?);

    Ok(())
}
