//! Whole-project build: resolve, certify, lower, monomorphize, emit, publish
//!
//! Per-file stages fan out with rayon over the path-sorted unit list and
//! collect in index order, so output never depends on scheduling. The two
//! cross-file barriers are certification (every name is checked before any
//! file lowers) and the monomorphization table (frozen before emission).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use sharpen_core::config::TranspileConfig;
use sharpen_core::diagnostics::{Diagnostic, DiagnosticSink};
use sharpen_core::error::CoreError;
use sharpen_core::ir::IrProgram;
use sharpen_core::lowering::{lower_file, LoweredFile};
use sharpen_core::monomorphize::Monomorphizer;
use sharpen_core::path_resolver::{relative_to_root, resolve_path, NamespaceAssignment};
use sharpen_core::shape::{classify, ClassShape};
use sharpen_core::source::{display_path, SourceUnit};
use sharpen_core::symbols::{ProjectIndex, SymbolTable};
use thiserror::Error;

use crate::csharp::CSharpEmitter;
use crate::writer::{EmittedFile, OutputManifest, OutputWriter};
use crate::CodegenError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Shared cancellation flag, checked between stages
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TranspileOutcome {
    /// Sorted by (file, line, col, code, message)
    pub diagnostics: Vec<Diagnostic>,
    /// Sorted by output path
    pub files: Vec<EmittedFile>,
    /// Present once the tree has been published
    pub manifest: Option<OutputManifest>,
}

impl TranspileOutcome {
    pub fn is_success(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<&EmittedFile> {
        self.files.iter().find(|f| f.path == path.as_ref())
    }
}

type Resolution = Result<(NamespaceAssignment, ClassShape), Vec<Diagnostic>>;

pub struct Transpiler<'a> {
    config: &'a TranspileConfig,
    cancel: CancelToken,
}

impl<'a> Transpiler<'a> {
    pub fn new(config: &'a TranspileConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn checkpoint(&self, stage: &str) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            tracing::warn!(stage, "run cancelled");
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Run every stage in memory and return the emitted files
    #[tracing::instrument(skip_all, fields(units = units.len()))]
    pub fn transpile(&self, units: &[SourceUnit]) -> Result<TranspileOutcome, PipelineError> {
        let config = self.config;
        let mut units: Vec<&SourceUnit> = units.iter().collect();
        units.sort_by(|a, b| a.path.cmp(&b.path));
        let mut sink = DiagnosticSink::new();
        self.checkpoint("resolve")?;

        let resolved: Vec<Resolution> = units
            .par_iter()
            .map(|unit| {
                let file = display_path(relative_to_root(&unit.path, config));
                match resolve_path(&unit.path, config) {
                    Ok(assignment) => {
                        let shape = classify(unit, &assignment);
                        Ok((assignment, shape))
                    }
                    Err(errors) => Err(errors.iter().map(|e| e.to_diagnostic(&file)).collect()),
                }
            })
            .collect();

        let mut proposals = Vec::with_capacity(resolved.len());
        for resolution in resolved {
            match resolution {
                Ok((assignment, shape)) => {
                    let file = display_path(&assignment.source_path);
                    if let Some(diagnostic) = shape.diagnostic(&file) {
                        sink.push(diagnostic);
                    }
                    proposals.push((assignment, shape));
                }
                Err(diagnostics) => sink.extend(diagnostics),
            }
        }
        self.checkpoint("certify")?;

        let certification = SymbolTable::build(proposals).detect_collisions(config);
        sink.extend(certification.diagnostics().iter().cloned());
        let index = ProjectIndex::build(certification.certified().filter(|f| f.shape.is_valid()));
        self.checkpoint("lower")?;

        let lowered: Vec<LoweredFile> = units
            .par_iter()
            .filter_map(|unit| {
                let file = display_path(relative_to_root(&unit.path, config));
                let certified = certification.get(&file)?;
                if !certified.shape.is_valid() {
                    return None;
                }
                Some(lower_file(unit, certified, &index, config))
            })
            .collect::<Result<Vec<_>, CoreError>>()?;
        self.checkpoint("monomorphize")?;

        let monomorphizer = Monomorphizer::new(units.iter().copied(), &certification, &index, config);
        let requests = lowered.iter().flat_map(|l| {
            l.instantiations
                .iter()
                .map(move |i| (l.file.source_path.clone(), i.clone()))
        });
        let materialized = monomorphizer.run(requests, &mut sink)?;
        let generics = materialized.table.len();

        let mut program = IrProgram::new();
        let kept = lowered
            .into_iter()
            .map(|l| l.file)
            .filter(|file| !materialized.rejected.contains(&file.source_path));
        for file in kept.chain(materialized.files) {
            program.add_file(file);
        }
        program.sort();
        self.checkpoint("emit")?;

        let emitter = CSharpEmitter::new(config);
        let emitted = program
            .files
            .par_iter()
            .map(|file| -> Result<_, CodegenError> {
                let mut file_sink = DiagnosticSink::new();
                let contents = emitter.emit_file(file, &mut file_sink)?;
                Ok((
                    EmittedFile {
                        path: file.output_path.clone(),
                        contents,
                    },
                    file_sink,
                ))
            })
            .collect::<Result<Vec<_>, CodegenError>>()?;

        let mut files = Vec::with_capacity(emitted.len());
        for (file, file_sink) in emitted {
            sink.merge(file_sink);
            files.push(file);
        }

        tracing::debug!(summary = ?sink.summary(), "diagnostics by code");
        tracing::info!(
            files = files.len(),
            generics,
            diagnostics = sink.count(),
            failed = sink.has_errors(),
            "transpile complete"
        );
        let diagnostics = sink.into_sorted();
        Ok(TranspileOutcome {
            diagnostics,
            files,
            manifest: None,
        })
    }

    /// [`Transpiler::transpile`] followed by atomic publication under
    /// `output_root`
    pub fn build(
        &self,
        units: &[SourceUnit],
        output_root: impl AsRef<Path>,
    ) -> Result<TranspileOutcome, PipelineError> {
        let mut outcome = self.transpile(units)?;
        self.checkpoint("publish")?;
        let manifest = OutputWriter::new(output_root.as_ref())
            .publish(&outcome.files, self.config.generated_at())?;
        outcome.manifest = Some(manifest);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_before_start() {
        let config = TranspileConfig::default();
        let token = CancelToken::new();
        token.cancel();
        let transpiler = Transpiler::new(&config).with_cancel_token(token.clone());
        assert!(matches!(
            transpiler.transpile(&[]),
            Err(PipelineError::Cancelled)
        ));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_empty_project_succeeds() {
        let config = TranspileConfig::default();
        let outcome = Transpiler::new(&config).transpile(&[]).unwrap();
        assert!(outcome.is_success());
        assert!(outcome.files.is_empty());
        assert_eq!(outcome.error_count(), 0);
    }
}
