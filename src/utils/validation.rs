//! Field access and coercion helpers for raw documents

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::str::FromStr;

use crate::types::*;

/// Look up a field by its external (hyphenated) name, falling back to the
/// underscore spelling. `null` is treated as absent.
pub fn field<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    let found = doc
        .get(key)
        .or_else(|| doc.get(key.replace('-', "_").as_str()));
    found.filter(|value| !value.is_null())
}

/// Render a scalar as a string; objects and arrays yield `None`
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Optional string field, empty strings are treated as absent
pub fn optional_string(doc: &Value, key: &str) -> Option<String> {
    field(doc, key)
        .and_then(scalar_string)
        .filter(|s| !s.trim().is_empty())
}

/// Parse a document id from a JSON number or numeric string
pub fn parse_document_id(value: &Value) -> ReconResult<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ReconError::InvalidReference(format!("non-integer id {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ReconError::InvalidReference(format!("non-integer id '{}'", s))),
        other => Err(ReconError::InvalidReference(format!(
            "unsupported id value {}",
            other
        ))),
    }
}

/// Required integer `id` of a document
pub fn require_id(doc: &Value) -> ReconResult<i64> {
    let id = field(doc, "id").ok_or_else(|| ReconError::MissingField("id".to_string()))?;
    parse_document_id(id)
}

/// Coerce an amount field to a decimal. Missing or `null` becomes zero.
pub fn coerce_amount(doc: &Value, key: &str) -> ReconResult<BigDecimal> {
    let Some(value) = field(doc, key) else {
        return Ok(BigDecimal::from(0));
    };

    let invalid = || ReconError::InvalidAmount {
        field: key.to_string(),
        value: value.to_string(),
    };

    match value {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).map_err(|_| invalid()),
        Value::String(s) if s.trim().is_empty() => Ok(BigDecimal::from(0)),
        Value::String(s) => BigDecimal::from_str(s.trim()).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Resolve a referenced id that is either a nested object `{"id": ...}` or a bare scalar
pub fn reference_id(value: &Value) -> Option<String> {
    let raw = match value {
        Value::Object(_) => field(value, "id")?,
        other => other,
    };
    scalar_string(raw).filter(|s| !s.trim().is_empty())
}

/// Resolve a currency code given either as a bare string or as `{"code": ...}`
pub fn currency_code(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(_) => optional_string(value, "code").map(|s| s.trim().to_string()),
        _ => None,
    }
}

/// Parse an RFC 3339 timestamp; anything else is ignored
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a purchase order reference found on an invoice line
pub fn parse_po_reference(raw: &str) -> ReconResult<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReconError::InvalidReference(
            "PO reference cannot be empty".to_string(),
        ));
    }

    trimmed
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ReconError::InvalidReference(format!("'{}' is not a valid PO id", raw)))
}
