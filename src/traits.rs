//! Traits for document access

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::*;

/// Source of raw procurement documents
///
/// The reconciliation engine only ever reads through this trait, so it can run
/// against a procurement suite's REST API, a recorded fixture set, or the
/// in-memory [`crate::utils::MemoryDocumentSource`].
///
/// Resource names are paths such as `invoices/713906`,
/// `purchase_orders/4187` or `receiving_transactions/91`.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch a single document; `Ok(None)` when the source has no such document
    async fn fetch_document(&self, resource: &str) -> ReconResult<Option<Value>>;

    /// Fetch a (possibly partial) list of documents filtered by query parameters
    async fn fetch_document_list(
        &self,
        resource: &str,
        params: &HashMap<String, String>,
    ) -> ReconResult<Vec<Value>>;
}

#[async_trait]
impl<T: DocumentSource + ?Sized> DocumentSource for Arc<T> {
    async fn fetch_document(&self, resource: &str) -> ReconResult<Option<Value>> {
        (**self).fetch_document(resource).await
    }

    async fn fetch_document_list(
        &self,
        resource: &str,
        params: &HashMap<String, String>,
    ) -> ReconResult<Vec<Value>> {
        (**self).fetch_document_list(resource, params).await
    }
}
