//! Semantic analysis for interface models
//!
//! This module turns the read-only interface model into stub plans:
//! - Marshalling rule lookup for every parameter (the catalog)
//! - Ordinal and naming integrity checks
//! - Decode, encode and release orderings per method

pub mod analyzer;
pub mod catalog;
pub mod plan;

pub use analyzer::SemanticAnalyzer;
pub use catalog::{Catalog, FieldRule, MarshalRule, WireKind};
pub use plan::{InterfacePlan, MethodPlan, ParamPlan};
