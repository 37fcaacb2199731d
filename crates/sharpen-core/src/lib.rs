//! Namespace resolution, IR and type mapping for the sharpen TypeScript to
//! C# translator

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod lowering;
pub mod manifest;
pub mod monomorphize;
pub mod naming;
pub mod path_resolver;
pub mod shape;
pub mod source;
pub mod symbols;
pub mod types;

pub use config::TranspileConfig;
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Severity};
pub use error::CoreError;
pub use ir::{IrFile, IrProgram};
pub use manifest::SharpenManifest;
pub use source::SourceUnit;
pub use types::IrType;
