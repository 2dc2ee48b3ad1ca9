//! Core types and error definitions shared by the reconciliation engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision produced by a comparison or a whole reconciliation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Every compared field agreed
    #[serde(rename = "APPROVED")]
    Approved,
    /// At least one discrepancy was found, or a required document set is empty
    #[serde(rename = "BLOCKED")]
    Blocked,
    /// The call could not be evaluated (missing document, bad reference, source failure)
    #[serde(rename = "error")]
    Error,
}

impl MatchStatus {
    /// Map a boolean "everything matched" flag to a status
    pub fn from_matched(matched: bool) -> Self {
        if matched {
            MatchStatus::Approved
        } else {
            MatchStatus::Blocked
        }
    }

    /// Wire representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Approved => "APPROVED",
            MatchStatus::Blocked => "BLOCKED",
            MatchStatus::Error => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, MatchStatus::Error)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of documents the engine fetches from a [`crate::DocumentSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Invoice,
    PurchaseOrder,
    Receipt,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Invoice => "Invoice",
            DocumentKind::PurchaseOrder => "Purchase Order",
            DocumentKind::Receipt => "Receipt",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while fetching, normalizing or reconciling documents
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Document source error: {0}")]
    Source(String),
    #[error("{kind} with ID {id} not found")]
    NotFound { kind: DocumentKind, id: String },
    #[error("Missing required field '{0}'")]
    MissingField(String),
    #[error("Invalid amount for '{field}': {value}")]
    InvalidAmount { field: String, value: String },
    #[error("{0}")]
    InvalidReference(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReconError {
    /// Shorthand for a not-found error on a document id
    pub fn not_found(kind: DocumentKind, id: impl ToString) -> Self {
        ReconError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;
