//! Structured diagnostics and the batch collector every stage reports into
//!
//! Stages never abort on the first user error. Each problem becomes a
//! [`Diagnostic`] pushed into a [`DiagnosticSink`]; the sink is passive and
//! never formats for a terminal. Rendering is left to the caller.
//!
//! ## Usage
//!
//! ```ignore
//! let mut sink = DiagnosticSink::new();
//! sink.set_file_context("models/User.ts");
//! sink.error(DiagnosticCode::ReservedWord, 0, 0, "'class' is a reserved word");
//! assert!(sink.has_errors());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed code taxonomy for user-facing problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Two sibling names identical except for letter case
    CaseCollision,
    /// A path segment contains a character outside `[A-Za-z0-9_]`
    InvalidCharacter,
    /// A path segment is a reserved C# keyword
    ReservedWord,
    /// A file exports a same-named class plus other members
    MixedExportAmbiguity,
    /// A namespace starts with a reserved runtime namespace
    RuntimeNamespaceCollision,
    /// A path segment contains non-ASCII code points
    NonAsciiName,
    /// Getter/setter declarations are not translated
    UnsupportedAccessor,
    /// A function value stored in a field would capture enclosing state
    UnsupportedClosureField,
    /// Two different files claim the exact same namespace and class name
    DuplicateSymbol,
    /// Two generic instantiations canonicalize to the same name
    GenericNameClash,
    /// Generic instantiation nesting exceeded the configured depth
    GenericExpansionLimit,
    /// A statement form with no faithful C# rendering
    UnsupportedConstruct,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::CaseCollision => "CaseCollision",
            DiagnosticCode::InvalidCharacter => "InvalidCharacter",
            DiagnosticCode::ReservedWord => "ReservedWord",
            DiagnosticCode::MixedExportAmbiguity => "MixedExportAmbiguity",
            DiagnosticCode::RuntimeNamespaceCollision => "RuntimeNamespaceCollision",
            DiagnosticCode::NonAsciiName => "NonAsciiName",
            DiagnosticCode::UnsupportedAccessor => "UnsupportedAccessor",
            DiagnosticCode::UnsupportedClosureField => "UnsupportedClosureField",
            DiagnosticCode::DuplicateSymbol => "DuplicateSymbol",
            DiagnosticCode::GenericNameClash => "GenericNameClash",
            DiagnosticCode::GenericExpansionLimit => "GenericExpansionLimit",
            DiagnosticCode::UnsupportedConstruct => "UnsupportedConstruct",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic record
///
/// `line` and `col` are 1-based. A position of `0:0` means the diagnostic
/// concerns the file as a whole (path and naming problems).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            file: file.into(),
            line: 0,
            col: 0,
            message: message.into(),
        }
    }

    pub fn warning(
        code: DiagnosticCode,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, file, message)
        }
    }

    pub fn at(mut self, line: u32, col: u32) -> Self {
        self.line = line;
        self.col = col;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Key used to give every run the same diagnostic order
    fn sort_key(&self) -> (&str, u32, u32, DiagnosticCode, &str) {
        (&self.file, self.line, self.col, self.code, &self.message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}:{}:{}: {}[{}]: {}",
            self.file, self.line, self.col, severity, self.code, self.message
        )
    }
}

/// Batch collector for diagnostics
///
/// Instead of failing on the first problem, every stage pushes into a sink
/// and the run completes its pass, so a user sees every collision at once.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    entries: Vec<Diagnostic>,
    file_context: Option<String>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the file that subsequent `error`/`warning` calls are attributed to
    pub fn set_file_context(&mut self, file: impl Into<String>) {
        self.file_context = Some(file.into());
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Add an error attributed to the current file context
    pub fn error(&mut self, code: DiagnosticCode, line: u32, col: u32, message: impl Into<String>) {
        let file = self.file_context.clone().unwrap_or_default();
        self.push(Diagnostic::error(code, file, message).at(line, col));
    }

    /// Add a warning attributed to the current file context
    pub fn warning(
        &mut self,
        code: DiagnosticCode,
        line: u32,
        col: u32,
        message: impl Into<String>,
    ) {
        let file = self.file_context.clone().unwrap_or_default();
        self.push(Diagnostic::warning(code, file, message).at(line, col));
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.entries.extend(diagnostics);
    }

    pub fn merge(&mut self, other: DiagnosticSink) {
        self.entries.extend(other.entries);
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Consume the sink, returning diagnostics in a stable order with exact
    /// duplicates removed
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        self.entries.dedup();
        self.entries
    }

    /// Per-code counts for the run summary
    pub fn summary(&self) -> BTreeMap<DiagnosticCode, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.code).or_insert(0) += 1;
        }
        counts
    }
}
