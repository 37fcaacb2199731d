//! Error types for C# emission and output publishing
//!
//! User-facing problems never appear here; they are diagnostics. A
//! `CodegenError` means the IR handed to the emitter is impossible, or the
//! output tree could not be written.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("Invalid IR at {location}: {message}")]
    InvalidIr {
        location: ErrorLocation,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("Failed to serialize output manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Output path {0} is not relative to the output root")]
    UnsafeOutputPath(String),

    #[error("Two files were emitted to {0}")]
    DuplicateOutput(String),

    #[error("Refusing to replace {0}: it is not empty and was not written by sharpen")]
    ForeignOutputDir(String),
}

impl CodegenError {
    pub fn invalid_ir(location: ErrorLocation, message: impl Into<String>) -> Self {
        CodegenError::InvalidIr {
            location,
            message: message.into(),
        }
    }
}

/// Where in the IR an emission error occurred
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLocation {
    /// Namespace (e.g., "My.App.models")
    pub namespace: Option<String>,
    /// Class name (e.g., "User")
    pub class_name: Option<String>,
    /// Member name (e.g., "constructor")
    pub member: Option<String>,
}

impl ErrorLocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn in_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn in_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.namespace, &self.class_name, &self.member) {
            (Some(ns), Some(c), Some(m)) => write!(f, "{}.{}::{}", ns, c, m),
            (Some(ns), Some(c), None) => write!(f, "{}.{}", ns, c),
            (Some(ns), None, Some(m)) => write!(f, "{}::{}", ns, m),
            (Some(ns), None, None) => write!(f, "{}", ns),
            (None, Some(c), Some(m)) => write!(f, "{}::{}", c, m),
            (None, Some(c), None) => write!(f, "{}", c),
            (None, None, Some(m)) => write!(f, "::{}", m),
            (None, None, None) => write!(f, "<unknown location>"),
        }
    }
}
