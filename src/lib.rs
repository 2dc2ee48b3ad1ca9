//! # Procure Match
//!
//! Three-way reconciliation of supplier invoices against purchase orders and
//! goods receipts, line by line.
//!
//! ## Features
//!
//! - **Document normalization**: Raw procurement API documents become typed invoices, orders and receipts
//! - **Receipt aggregation**: Receipts are grouped per order line with distinct prices and currencies
//! - **Pairwise comparators**: Invoice vs PO, invoice vs receipts and PO vs receipts with exact decimals
//! - **Orchestration**: Three-way matching, single-pair tools and sequential batches
//! - **Source abstraction**: Any backend implementing [`DocumentSource`] can feed the engine
//!
//! ## Quick Start
//!
//! ```rust
//! use procure_match::{MatchStatus, MemoryDocumentSource, Reconciler};
//!
//! # async fn run() {
//! let source = MemoryDocumentSource::new();
//! let reconciler = Reconciler::new(source);
//!
//! // Unknown invoices come back as an error result, never a panic
//! let result = reconciler.three_way_matching(713906).await;
//! assert_eq!(result.overall_status, MatchStatus::Error);
//! # }
//! ```

pub mod config;
pub mod documents;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use documents::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
pub use utils::MemoryDocumentSource;
