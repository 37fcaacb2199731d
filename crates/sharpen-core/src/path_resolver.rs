//! Path Resolver: derive a dotted namespace and a class-name candidate from a
//! file's location under the source root
//!
//! ## Mapping
//!
//! - `models/User.ts` with root `My.App` → namespace `My.App.models`, class `User`
//! - `User.ts` with root `My.App` → namespace `My.App`, class `User`
//!
//! Directory names are carried verbatim, case preserved. Validation is purely
//! local: this stage never looks at any other file.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::TranspileConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::naming::{is_csharp_keyword, is_identifier_char};

/// Where a file's generated class lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceAssignment {
    /// Path relative to the source root
    pub source_path: PathBuf,
    /// Full dotted namespace, root namespace included
    pub namespace: String,
    /// Class-name candidate: the file stem
    pub class_name: String,
    /// Directory segments below the source root, in order
    pub segments: Vec<String>,
}

impl NamespaceAssignment {
    /// Relative output path: mirrored directories, stem, `.cs`
    pub fn output_path(&self) -> PathBuf {
        let mut path: PathBuf = self.segments.iter().collect();
        path.push(format!("{}.cs", self.class_name));
        path
    }

    /// Fully-qualified class name (`My.App.models.User`)
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.class_name)
    }
}

impl fmt::Display for NamespaceAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// Errors for a single offending path segment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("segment '{segment}' contains non-ASCII characters")]
    NonAsciiName { segment: String },

    #[error("segment '{segment}' contains invalid character '{character}'")]
    InvalidCharacter { segment: String, character: char },

    #[error("segment '{segment}' cannot start with a digit")]
    LeadingDigit { segment: String },

    #[error("path contains an empty or relative segment '{segment}'")]
    EmptySegment { segment: String },

    #[error("segment '{segment}' is a reserved C# keyword")]
    ReservedWord { segment: String },
}

impl PathError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            PathError::NonAsciiName { .. } => DiagnosticCode::NonAsciiName,
            PathError::InvalidCharacter { .. }
            | PathError::LeadingDigit { .. }
            | PathError::EmptySegment { .. } => DiagnosticCode::InvalidCharacter,
            PathError::ReservedWord { .. } => DiagnosticCode::ReservedWord,
        }
    }

    pub fn to_diagnostic(&self, file: &str) -> Diagnostic {
        Diagnostic::error(self.code(), file, self.to_string())
    }
}

/// Validate one segment. Non-ASCII is reported first as the most specific
/// problem; a segment yields at most one error.
fn check_segment(segment: &str) -> Option<PathError> {
    if segment.is_empty() {
        return Some(PathError::EmptySegment {
            segment: segment.to_string(),
        });
    }
    if !segment.is_ascii() {
        return Some(PathError::NonAsciiName {
            segment: segment.to_string(),
        });
    }
    if let Some(character) = segment.chars().find(|c| !is_identifier_char(*c)) {
        return Some(PathError::InvalidCharacter {
            segment: segment.to_string(),
            character,
        });
    }
    if segment.starts_with(|c: char| c.is_ascii_digit()) {
        return Some(PathError::LeadingDigit {
            segment: segment.to_string(),
        });
    }
    if is_csharp_keyword(segment) {
        return Some(PathError::ReservedWord {
            segment: segment.to_string(),
        });
    }
    None
}

/// `path` with the configured source root stripped, if it has one
pub fn relative_to_root<'a>(path: &'a Path, config: &TranspileConfig) -> &'a Path {
    let root = config.source_root();
    if root.as_os_str().is_empty() {
        return path;
    }
    path.strip_prefix(root).unwrap_or(path)
}

/// Resolve a file path into its namespace assignment
///
/// Every offending segment is reported, not just the first.
pub fn resolve_path(
    path: &Path,
    config: &TranspileConfig,
) -> Result<NamespaceAssignment, Vec<PathError>> {
    let relative = relative_to_root(path, config);
    let mut errors = Vec::new();
    let mut parts = Vec::new();

    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            other => errors.push(PathError::EmptySegment {
                segment: other.as_os_str().to_string_lossy().into_owned(),
            }),
        }
    }

    let file_name = parts.pop().unwrap_or_default();
    let stem = Path::new(&file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    for segment in parts.iter().chain(std::iter::once(&stem)) {
        if let Some(error) = check_segment(segment) {
            errors.push(error);
        }
    }

    if !errors.is_empty() {
        tracing::debug!(path = %relative.display(), errors = errors.len(), "path rejected");
        return Err(errors);
    }

    let namespace = std::iter::once(config.root_namespace())
        .chain(parts.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(".");

    Ok(NamespaceAssignment {
        source_path: relative.to_path_buf(),
        namespace,
        class_name: stem,
        segments: parts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TranspileConfig {
        TranspileConfig::builder()
            .root_namespace("My.App")
            .source_root("src")
            .build()
            .unwrap()
    }

    #[test]
    fn test_nested_file() {
        let assignment = resolve_path(Path::new("src/models/User.ts"), &config()).unwrap();
        assert_eq!(assignment.namespace, "My.App.models");
        assert_eq!(assignment.class_name, "User");
        assert_eq!(assignment.source_path, PathBuf::from("models/User.ts"));
        assert_eq!(assignment.output_path(), PathBuf::from("models/User.cs"));
    }

    #[test]
    fn test_root_level_file_gets_root_namespace() {
        let assignment = resolve_path(Path::new("index.ts"), &config()).unwrap();
        assert_eq!(assignment.namespace, "My.App");
        assert_eq!(assignment.class_name, "index");
        assert!(assignment.segments.is_empty());
    }

    #[test]
    fn test_case_is_preserved() {
        let assignment = resolve_path(Path::new("Data/httpClients/Api.ts"), &config()).unwrap();
        assert_eq!(assignment.namespace, "My.App.Data.httpClients");
        assert_eq!(assignment.qualified_name(), "My.App.Data.httpClients.Api");
    }

    #[test]
    fn test_invalid_character() {
        let errors = resolve_path(Path::new("my-models/User.ts"), &config()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), DiagnosticCode::InvalidCharacter);
        assert_eq!(
            errors[0],
            PathError::InvalidCharacter {
                segment: "my-models".to_string(),
                character: '-'
            }
        );
    }

    #[test]
    fn test_dotted_stem_is_invalid() {
        let errors = resolve_path(Path::new("User.model.ts"), &config()).unwrap_err();
        assert_eq!(errors[0].code(), DiagnosticCode::InvalidCharacter);
    }

    #[test]
    fn test_reserved_word_directory() {
        let errors = resolve_path(Path::new("namespace/Thing.ts"), &config()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), DiagnosticCode::ReservedWord);
    }

    #[test]
    fn test_reserved_word_stem() {
        let errors = resolve_path(Path::new("models/class.ts"), &config()).unwrap_err();
        assert_eq!(errors[0].code(), DiagnosticCode::ReservedWord);
    }

    #[test]
    fn test_non_ascii_reported_before_invalid_character() {
        let errors = resolve_path(Path::new("modèles/User.ts"), &config()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), DiagnosticCode::NonAsciiName);
    }

    #[test]
    fn test_every_bad_segment_reported() {
        let errors = resolve_path(Path::new("bad-dir/void/ünï.ts"), &config()).unwrap_err();
        let codes: Vec<_> = errors.iter().map(PathError::code).collect();
        assert_eq!(
            codes,
            vec![
                DiagnosticCode::InvalidCharacter,
                DiagnosticCode::ReservedWord,
                DiagnosticCode::NonAsciiName
            ]
        );
    }

    #[test]
    fn test_leading_digit() {
        let errors = resolve_path(Path::new("2fa/Code.ts"), &config()).unwrap_err();
        assert_eq!(errors[0], PathError::LeadingDigit { segment: "2fa".to_string() });
    }

    #[test]
    fn test_parent_directory_rejected() {
        let errors = resolve_path(Path::new("../User.ts"), &config()).unwrap_err();
        assert_eq!(errors[0].code(), DiagnosticCode::InvalidCharacter);
    }

    #[test]
    fn test_error_to_diagnostic() {
        let errors = resolve_path(Path::new("event/X.ts"), &config()).unwrap_err();
        let diagnostic = errors[0].to_diagnostic("event/X.ts");
        assert_eq!(diagnostic.code, DiagnosticCode::ReservedWord);
        assert_eq!((diagnostic.line, diagnostic.col), (0, 0));
        assert!(diagnostic.message.contains("event"));
    }
}
