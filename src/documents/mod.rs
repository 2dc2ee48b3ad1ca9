//! Typed procurement documents and their normalization from raw API payloads

pub mod invoice;
pub mod purchase_order;
pub mod receipt;

pub use invoice::*;
pub use purchase_order::*;
pub use receipt::*;
