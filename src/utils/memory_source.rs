//! In-memory document source for testing

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::config::ResourcePaths;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{field, scalar_string};

/// In-memory document source for tests, demos and offline replays
///
/// Documents are stored under their resource path (`invoices/713906`).
/// List requests return partial records (`{"id": ...}`) for every stored
/// document under the resource whose fields match the query parameters;
/// a parameter such as `order-line[order-header-id]` addresses a nested field.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentSource {
    documents: Arc<RwLock<BTreeMap<String, Value>>>,
    failures: Arc<RwLock<HashMap<String, String>>>,
    paths: ResourcePaths,
}

impl MemoryDocumentSource {
    /// Create an empty source using the default resource paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document under an explicit resource path
    pub fn insert(&self, resource: impl Into<String>, document: Value) {
        self.documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(resource.into(), document);
    }

    pub fn insert_invoice(&self, id: i64, document: Value) {
        self.insert(self.paths.invoice(id), document);
    }

    pub fn insert_purchase_order(&self, id: i64, document: Value) {
        self.insert(self.paths.purchase_order(id), document);
    }

    pub fn insert_receipt(&self, id: i64, document: Value) {
        self.insert(self.paths.receipt(id), document);
    }

    /// Make every request for `resource` fail with a source error
    pub fn fail_on(&self, resource: impl Into<String>, message: impl Into<String>) {
        self.failures
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(resource.into(), message.into());
    }

    /// Remove all documents and injected failures
    pub fn clear(&self) {
        self.documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.failures
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn check_failure(&self, resource: &str) -> ReconResult<()> {
        let failures = self
            .failures
            .read()
            .map_err(|_| ReconError::Source("failure registry lock poisoned".to_string()))?;
        match failures.get(resource) {
            Some(message) => Err(ReconError::Source(message.clone())),
            None => Ok(()),
        }
    }
}

/// Split `outer[inner]` into a field path
fn param_path(param: &str) -> Vec<&str> {
    param
        .split(&['[', ']'][..])
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn matches_param(document: &Value, param: &str, expected: &str) -> bool {
    let mut current = document;
    for segment in param_path(param) {
        match field(current, segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    scalar_string(current).is_some_and(|actual| actual == expected)
}

#[async_trait]
impl DocumentSource for MemoryDocumentSource {
    async fn fetch_document(&self, resource: &str) -> ReconResult<Option<Value>> {
        self.check_failure(resource)?;
        let documents = self
            .documents
            .read()
            .map_err(|_| ReconError::Source("document store lock poisoned".to_string()))?;
        Ok(documents.get(resource).cloned())
    }

    async fn fetch_document_list(
        &self,
        resource: &str,
        params: &HashMap<String, String>,
    ) -> ReconResult<Vec<Value>> {
        self.check_failure(resource)?;
        let documents = self
            .documents
            .read()
            .map_err(|_| ReconError::Source("document store lock poisoned".to_string()))?;

        let prefix = format!("{}/", resource);
        let listed = documents
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, document)| document)
            .filter(|document| {
                params
                    .iter()
                    .all(|(param, expected)| matches_param(document, param, expected))
            })
            .filter_map(|document| field(document, "id").map(|id| json!({ "id": id })))
            .collect();

        Ok(listed)
    }
}
