//! The single immutable configuration value threaded through every stage
//!
//! Nothing in the pipeline reads process-wide state. Each stage takes a
//! `&TranspileConfig`, so the pipeline can be re-run in one process with
//! different settings and every stage stays testable on its own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::naming::is_identifier_segment;

/// Root namespace used when neither an override nor a manifest provides one
pub const DEFAULT_ROOT_NAMESPACE: &str = "App";

/// Namespace of the C# support library every generated file depends on
pub const DEFAULT_RUNTIME_NAMESPACE: &str = "Sharpen.Runtime";

/// Target-runtime namespaces a project namespace may never start with
pub const RESERVED_RUNTIME_NAMESPACES: &[&str] = &["System", "Microsoft", "Windows"];

/// Namespace prefixes that form the vendor/platform using bucket
pub const DEFAULT_VENDOR_PREFIXES: &[&str] = &["Microsoft", "Windows"];

/// Resolve the root namespace: explicit override, then manifest value, then
/// [`DEFAULT_ROOT_NAMESPACE`]
pub fn resolve_root_namespace(explicit: Option<&str>, manifest: Option<&str>) -> String {
    explicit
        .or(manifest)
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .unwrap_or(DEFAULT_ROOT_NAMESPACE)
        .to_string()
}

/// Optimization switches that never affect correctness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationFlags {
    /// Drop usings for namespaces that enclose the file's own namespace
    #[serde(default = "default_true")]
    pub omit_redundant_usings: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OptimizationFlags {
    fn default() -> Self {
        Self {
            omit_redundant_usings: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranspileConfig {
    root_namespace: String,
    source_root: PathBuf,
    runtime_namespace: String,
    reserved_namespaces: Vec<String>,
    vendor_prefixes: Vec<String>,
    external_namespaces: BTreeMap<String, String>,
    optimization: OptimizationFlags,
    max_generic_depth: usize,
    generated_at: DateTime<Utc>,
}

impl TranspileConfig {
    pub fn builder() -> TranspileConfigBuilder {
        TranspileConfigBuilder::default()
    }

    pub fn root_namespace(&self) -> &str {
        &self.root_namespace
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn runtime_namespace(&self) -> &str {
        &self.runtime_namespace
    }

    /// Reserved registry: the fixed runtime namespaces, the support library
    /// namespace and any user additions, sorted and deduplicated
    pub fn reserved_namespaces(&self) -> &[String] {
        &self.reserved_namespaces
    }

    pub fn vendor_prefixes(&self) -> &[String] {
        &self.vendor_prefixes
    }

    /// C# namespace for an external (non-project) module specifier
    pub fn external_namespace(&self, specifier: &str) -> Option<&str> {
        self.external_namespaces.get(specifier).map(String::as_str)
    }

    pub fn optimization(&self) -> &OptimizationFlags {
        &self.optimization
    }

    pub fn max_generic_depth(&self) -> usize {
        self.max_generic_depth
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// True when `namespace` lives under the configured root namespace
    pub fn is_local_namespace(&self, namespace: &str) -> bool {
        namespace == self.root_namespace
            || namespace
                .strip_prefix(self.root_namespace.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl Default for TranspileConfig {
    fn default() -> Self {
        TranspileConfigBuilder::default().assemble()
    }
}

#[derive(Debug, Clone)]
pub struct TranspileConfigBuilder {
    root_namespace: String,
    source_root: PathBuf,
    runtime_namespace: String,
    extra_reserved: Vec<String>,
    vendor_prefixes: Vec<String>,
    external_namespaces: BTreeMap<String, String>,
    optimization: OptimizationFlags,
    max_generic_depth: usize,
    generated_at: DateTime<Utc>,
}

impl Default for TranspileConfigBuilder {
    fn default() -> Self {
        Self {
            root_namespace: DEFAULT_ROOT_NAMESPACE.to_string(),
            source_root: PathBuf::new(),
            runtime_namespace: DEFAULT_RUNTIME_NAMESPACE.to_string(),
            extra_reserved: Vec::new(),
            vendor_prefixes: DEFAULT_VENDOR_PREFIXES.iter().map(|s| s.to_string()).collect(),
            external_namespaces: BTreeMap::new(),
            optimization: OptimizationFlags::default(),
            max_generic_depth: 8,
            generated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl TranspileConfigBuilder {
    pub fn root_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.root_namespace = namespace.into();
        self
    }

    pub fn source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = root.into();
        self
    }

    pub fn runtime_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.runtime_namespace = namespace.into();
        self
    }

    pub fn reserve_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.extra_reserved.push(namespace.into());
        self
    }

    pub fn vendor_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vendor_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn external_namespace(
        mut self,
        specifier: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        self.external_namespaces
            .insert(specifier.into(), namespace.into());
        self
    }

    pub fn optimization(mut self, flags: OptimizationFlags) -> Self {
        self.optimization = flags;
        self
    }

    pub fn max_generic_depth(mut self, depth: usize) -> Self {
        self.max_generic_depth = depth;
        self
    }

    pub fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = at;
        self
    }

    pub fn build(self) -> Result<TranspileConfig, CoreError> {
        for (label, namespace) in [
            ("root namespace", &self.root_namespace),
            ("runtime namespace", &self.runtime_namespace),
        ] {
            if namespace.is_empty() || !namespace.split('.').all(is_identifier_segment) {
                return Err(CoreError::InvalidConfig(format!(
                    "{} '{}' is not a dotted sequence of identifiers",
                    label, namespace
                )));
            }
        }
        if self.max_generic_depth == 0 {
            return Err(CoreError::InvalidConfig(
                "max_generic_depth must be at least 1".to_string(),
            ));
        }
        Ok(self.assemble())
    }

    fn assemble(self) -> TranspileConfig {
        let mut reserved: Vec<String> = RESERVED_RUNTIME_NAMESPACES
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(self.runtime_namespace.clone()))
            .chain(self.extra_reserved)
            .collect();
        reserved.sort();
        reserved.dedup();

        let mut vendor_prefixes = self.vendor_prefixes;
        vendor_prefixes.sort();
        vendor_prefixes.dedup();

        TranspileConfig {
            root_namespace: self.root_namespace,
            source_root: self.source_root,
            runtime_namespace: self.runtime_namespace,
            reserved_namespaces: reserved,
            vendor_prefixes,
            external_namespaces: self.external_namespaces,
            optimization: self.optimization,
            max_generic_depth: self.max_generic_depth,
            generated_at: self.generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_namespace_precedence() {
        assert_eq!(resolve_root_namespace(Some("Cli.Ns"), Some("Manifest.Ns")), "Cli.Ns");
        assert_eq!(resolve_root_namespace(None, Some("Manifest.Ns")), "Manifest.Ns");
        assert_eq!(resolve_root_namespace(None, None), DEFAULT_ROOT_NAMESPACE);
        assert_eq!(resolve_root_namespace(Some("  "), None), DEFAULT_ROOT_NAMESPACE);
    }

    #[test]
    fn test_reserved_registry_includes_runtime_namespace() {
        let config = TranspileConfig::builder()
            .reserve_namespace("Unity")
            .build()
            .unwrap();
        let reserved = config.reserved_namespaces();
        assert!(reserved.iter().any(|r| r == "System"));
        assert!(reserved.iter().any(|r| r == DEFAULT_RUNTIME_NAMESPACE));
        assert!(reserved.iter().any(|r| r == "Unity"));
    }

    #[test]
    fn test_invalid_root_namespace_rejected() {
        let result = TranspileConfig::builder().root_namespace("My..App").build();
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));

        let result = TranspileConfig::builder().root_namespace("My-App").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_is_local_namespace() {
        let config = TranspileConfig::builder().root_namespace("My.App").build().unwrap();
        assert!(config.is_local_namespace("My.App"));
        assert!(config.is_local_namespace("My.App.models"));
        assert!(!config.is_local_namespace("My.Application"));
        assert!(!config.is_local_namespace("System"));
    }
}
