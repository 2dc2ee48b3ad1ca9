//! Reconciliation settings

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::*;

/// Resource names used when talking to a [`crate::DocumentSource`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePaths {
    pub invoices: String,
    pub purchase_orders: String,
    pub receipts: String,
    /// Query parameter that filters receipts by purchase order id
    pub receipt_po_filter: String,
}

impl Default for ResourcePaths {
    fn default() -> Self {
        Self {
            invoices: "invoices".to_string(),
            purchase_orders: "purchase_orders".to_string(),
            receipts: "receiving_transactions".to_string(),
            receipt_po_filter: "order-line[order-header-id]".to_string(),
        }
    }
}

impl ResourcePaths {
    pub fn invoice(&self, id: i64) -> String {
        format!("{}/{}", self.invoices, id)
    }

    pub fn purchase_order(&self, id: i64) -> String {
        format!("{}/{}", self.purchase_orders, id)
    }

    pub fn receipt(&self, id: i64) -> String {
        format!("{}/{}", self.receipts, id)
    }
}

/// Settings for the comparators and the fetch chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Absolute tolerance for values summed from several receipts
    pub tolerance: BigDecimal,
    /// Decimal places receipt unit prices are rounded to before deduplication
    pub price_scale: i64,
    /// Receipt status excluded from aggregation
    pub voided_status: String,
    /// Also flag description drift between documents
    pub compare_descriptions: bool,
    pub resources: ResourcePaths,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tolerance: BigDecimal::from(1) / BigDecimal::from(100),
            price_scale: 2,
            voided_status: "voided".to_string(),
            compare_descriptions: true,
            resources: ResourcePaths::default(),
        }
    }
}

impl ReconciliationConfig {
    /// Load settings from environment variables, falling back to defaults
    pub fn from_env() -> ReconResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from any `RECON_*` key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> ReconResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let tolerance = match lookup("RECON_TOLERANCE") {
            Some(raw) => BigDecimal::from_str(raw.trim())
                .map_err(|_| ReconError::Config(format!("RECON_TOLERANCE '{}' is not a decimal", raw)))?,
            None => defaults.tolerance,
        };

        let price_scale = match lookup("RECON_PRICE_SCALE") {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                ReconError::Config(format!("RECON_PRICE_SCALE '{}' is not an integer", raw))
            })?,
            None => defaults.price_scale,
        };

        let config = Self {
            tolerance,
            price_scale,
            voided_status: lookup("RECON_VOIDED_STATUS").unwrap_or(defaults.voided_status),
            compare_descriptions: lookup("RECON_COMPARE_DESCRIPTIONS")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.compare_descriptions),
            resources: defaults.resources,
        };

        config.validate()?;
        Ok(config)
    }

    /// Enable or disable description drift checks
    pub fn with_description_checks(mut self, enabled: bool) -> Self {
        self.compare_descriptions = enabled;
        self
    }

    pub fn validate(&self) -> ReconResult<()> {
        if self.tolerance < BigDecimal::from(0) {
            return Err(ReconError::Config(
                "Tolerance cannot be negative".to_string(),
            ));
        }

        if self.price_scale < 0 {
            return Err(ReconError::Config(
                "Price scale cannot be negative".to_string(),
            ));
        }

        if self.voided_status.trim().is_empty() {
            return Err(ReconError::Config(
                "Voided status cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
