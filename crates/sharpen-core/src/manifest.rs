//! `sharpen.toml` project manifest
//!
//! ```toml
//! [project]
//! root_namespace = "My.App"
//! source_root = "src"
//! output_dir = "generated"
//!
//! [external]
//! "lodash" = "Lodash.Net"
//!
//! [options]
//! omit_redundant_usings = true
//! max_generic_depth = 8
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{resolve_root_namespace, OptimizationFlags, TranspileConfig, TranspileConfigBuilder};
use crate::error::CoreError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharpenManifest {
    #[serde(default)]
    pub project: ProjectSection,
    /// Module specifier → C# namespace for packages outside the project
    #[serde(default)]
    pub external: BTreeMap<String, String>,
    #[serde(default)]
    pub options: OptionsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSection {
    pub root_namespace: Option<String>,
    pub source_root: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsSection {
    #[serde(default = "default_true")]
    pub omit_redundant_usings: bool,
    #[serde(default = "default_max_generic_depth")]
    pub max_generic_depth: usize,
    pub runtime_namespace: Option<String>,
    #[serde(default)]
    pub reserved_namespaces: Vec<String>,
    pub vendor_prefixes: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

fn default_max_generic_depth() -> usize {
    8
}

impl Default for OptionsSection {
    fn default() -> Self {
        Self {
            omit_redundant_usings: true,
            max_generic_depth: default_max_generic_depth(),
            runtime_namespace: None,
            reserved_namespaces: Vec::new(),
            vendor_prefixes: None,
        }
    }
}

impl SharpenManifest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(content)?)
    }

    /// Configuration builder seeded from the manifest. An explicit root
    /// namespace wins over the manifest's, which wins over the default.
    pub fn config_builder(&self, root_override: Option<&str>) -> TranspileConfigBuilder {
        let options = &self.options;
        let mut builder = TranspileConfig::builder()
            .root_namespace(resolve_root_namespace(
                root_override,
                self.project.root_namespace.as_deref(),
            ))
            .optimization(OptimizationFlags {
                omit_redundant_usings: options.omit_redundant_usings,
            })
            .max_generic_depth(options.max_generic_depth);

        if let Some(root) = &self.project.source_root {
            builder = builder.source_root(root.clone());
        }
        if let Some(runtime) = &options.runtime_namespace {
            builder = builder.runtime_namespace(runtime.clone());
        }
        if let Some(prefixes) = &options.vendor_prefixes {
            builder = builder.vendor_prefixes(prefixes.iter().cloned());
        }
        for namespace in &options.reserved_namespaces {
            builder = builder.reserve_namespace(namespace.clone());
        }
        for (specifier, namespace) in &self.external {
            builder = builder.external_namespace(specifier.clone(), namespace.clone());
        }
        builder
    }

    /// Non-fatal problems worth surfacing before a run
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (specifier, namespace) in &self.external {
            if namespace.trim().is_empty() {
                warnings.push(format!("external module '{}' maps to an empty namespace", specifier));
            }
            if specifier.starts_with("./") || specifier.starts_with("../") {
                warnings.push(format!(
                    "external mapping '{}' looks like a project path and will never match",
                    specifier
                ));
            }
        }
        if self.project.root_namespace.is_none() {
            warnings.push("no [project] root_namespace; falling back to the default".to_string());
        }
        warnings
    }
}

impl FromStr for SharpenManifest {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANIFEST: &str = r#"
[project]
root_namespace = "My.App"
source_root = "src"
output_dir = "generated"

[external]
"lodash" = "Lodash.Net"

[options]
omit_redundant_usings = false
max_generic_depth = 4
reserved_namespaces = ["Company.Internal"]
"#;

    #[test]
    fn test_manifest_parsing() {
        let manifest = SharpenManifest::from_str(MANIFEST).unwrap();
        assert_eq!(manifest.project.root_namespace.as_deref(), Some("My.App"));
        assert_eq!(manifest.project.output_dir, Some(PathBuf::from("generated")));
        assert_eq!(manifest.external["lodash"], "Lodash.Net");
        assert!(!manifest.options.omit_redundant_usings);
        assert!(manifest.validate().is_empty());
    }

    #[test]
    fn test_empty_manifest_uses_defaults() {
        let manifest = SharpenManifest::parse("").unwrap();
        assert_eq!(manifest, SharpenManifest::default());
        let config = manifest.config_builder(None).build().unwrap();
        assert_eq!(config.root_namespace(), "App");
        assert_eq!(config.max_generic_depth(), 8);
        assert_eq!(manifest.validate().len(), 1);
    }

    #[test]
    fn test_config_from_manifest() {
        let manifest = SharpenManifest::parse(MANIFEST).unwrap();
        let config = manifest.config_builder(None).build().unwrap();
        assert_eq!(config.root_namespace(), "My.App");
        assert_eq!(config.source_root(), Path::new("src"));
        assert_eq!(config.external_namespace("lodash"), Some("Lodash.Net"));
        assert_eq!(config.max_generic_depth(), 4);
        assert!(config
            .reserved_namespaces()
            .contains(&"Company.Internal".to_string()));
    }

    #[test]
    fn test_override_beats_manifest_root() {
        let manifest = SharpenManifest::parse(MANIFEST).unwrap();
        let config = manifest.config_builder(Some("Override")).build().unwrap();
        assert_eq!(config.root_namespace(), "Override");
    }

    #[test]
    fn test_from_file_and_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        let manifest = SharpenManifest::from_file(file.path()).unwrap();
        assert_eq!(manifest.options.max_generic_depth, 4);

        assert!(matches!(
            SharpenManifest::parse("[project\nroot"),
            Err(CoreError::ManifestParse(_))
        ));
        assert!(matches!(
            SharpenManifest::from_file("/nonexistent/sharpen.toml"),
            Err(CoreError::ManifestIo(_))
        ));
    }
}
