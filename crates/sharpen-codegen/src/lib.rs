//! C# generation for sharpen
//!
//! - [`csharp`] renders one IR file into C# text
//! - [`usings`] buckets and orders using directives
//! - [`pipeline`] drives a whole project from source units to output files
//! - [`writer`] publishes the output tree atomically

pub mod csharp;
pub mod error;
pub mod pipeline;
pub mod usings;
pub mod writer;

use sharpen_core::diagnostics::DiagnosticSink;
use sharpen_core::ir::IrFile;

pub use csharp::CSharpEmitter;
pub use error::{CodegenError, ErrorLocation};
pub use pipeline::{CancelToken, PipelineError, TranspileOutcome, Transpiler};
pub use writer::{EmittedFile, OutputManifest, OutputWriter};

/// Common trait for target-language generators
pub trait Codegen {
    fn generate(&mut self, file: &IrFile, sink: &mut DiagnosticSink)
        -> Result<String, CodegenError>;
}
