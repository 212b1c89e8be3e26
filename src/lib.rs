//! HDI stub generator
//!
//! Turns a resolved HDI interface model into C server stubs for the HDF
//! driver framework: a header and a source per interface, with per-method
//! marshalling, ordinal dispatch and kernel or user accessors. The `sim`
//! module executes the same plans in Rust against the `hdf_rt` buffer model.
//!
//! Code generation tool - suppress style lints
#![allow(clippy::useless_format)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::new_without_default)]

pub mod ast;
pub mod codegen;
pub mod error;
pub mod semantic;
pub mod sim;

// Re-export main types
pub use ast::{Direction, InterfaceDecl, InterfaceFile, MethodDecl, ParamDecl, Prim, TypeRef};
pub use codegen::output::{generate_file, load_model, parse_model, write_artifacts, Artifact, ArtifactPair};
pub use codegen::{GeneratorConfig, Mode};
pub use error::*;
pub use semantic::{InterfacePlan, MethodPlan, SemanticAnalyzer};
