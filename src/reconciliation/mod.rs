//! Receipt aggregation, pairwise comparison and the reconciliation orchestrator

pub mod aggregate;
pub mod compare;
pub mod engine;
pub mod report;

pub use aggregate::*;
pub use compare::*;
pub use engine::*;
pub use report::*;
