//! Symbol Table and Collision Detector
//!
//! Names are only certified after the whole project has been seen. Two
//! independent passes run over every proposed name:
//!
//! - **case collisions**: siblings in one parent scope that are equal when
//!   lower-cased but differ in case (`Models/` next to `models/`, or members
//!   `limit` and `Limit` of one class). Every file under either sibling loses
//!   certification.
//! - **runtime namespace collisions**: a project namespace starting with a
//!   reserved target-runtime namespace (`System`, `Microsoft`, ...).
//!
//! Their diagnostic sets are unioned. A later collision invalidates an
//! earlier file, so nothing is handed out until both passes finish.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::TranspileConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::path_resolver::NamespaceAssignment;
use crate::shape::{ClassShape, ShapeMemberKind};
use crate::source::display_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Namespace,
    Type,
    Member,
}

/// A proposed name in a parent scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Source file that introduces the name
    pub declaring_path: String,
    /// Parent scope as `/`-joined names, `""` for the root
    pub scope: String,
}

impl Symbol {
    fn depth(&self) -> usize {
        if self.scope.is_empty() {
            0
        } else {
            self.scope.split('/').count()
        }
    }
}

/// A file whose names passed whole-project collision detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedFile {
    pub assignment: NamespaceAssignment,
    pub shape: ClassShape,
}

impl CertifiedFile {
    pub fn source_path(&self) -> String {
        display_path(&self.assignment.source_path)
    }
}

/// Result of collision detection
#[derive(Debug, Clone, Default)]
pub struct Certification {
    certified: BTreeMap<String, CertifiedFile>,
    rejected: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl Certification {
    pub fn get(&self, file: &str) -> Option<&CertifiedFile> {
        self.certified.get(file)
    }

    pub fn is_certified(&self, file: &str) -> bool {
        self.certified.contains_key(file)
    }

    pub fn certified(&self) -> impl Iterator<Item = &CertifiedFile> {
        self.certified.values()
    }

    pub fn rejected(&self) -> &BTreeSet<String> {
        &self.rejected
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Every proposed name in the project, grouped by declaring file
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    files: BTreeMap<String, CertifiedFile>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from every file's assignment and shape
    pub fn build(proposals: impl IntoIterator<Item = (NamespaceAssignment, ClassShape)>) -> Self {
        let mut table = Self::new();
        for (assignment, shape) in proposals {
            table.insert(assignment, shape);
        }
        table
    }

    pub fn insert(&mut self, assignment: NamespaceAssignment, shape: ClassShape) {
        let file = display_path(&assignment.source_path);

        for (depth, segment) in assignment.segments.iter().enumerate() {
            self.symbols.push(Symbol {
                name: segment.clone(),
                kind: SymbolKind::Namespace,
                declaring_path: file.clone(),
                scope: assignment.segments[..depth].join("/"),
            });
        }

        let class_scope = assignment.segments.join("/");
        self.symbols.push(Symbol {
            name: assignment.class_name.clone(),
            kind: SymbolKind::Type,
            declaring_path: file.clone(),
            scope: class_scope.clone(),
        });

        let member_scope = if class_scope.is_empty() {
            assignment.class_name.clone()
        } else {
            format!("{}/{}", class_scope, assignment.class_name)
        };
        for member in shape.members() {
            if member.kind == ShapeMemberKind::Constructor {
                continue;
            }
            self.symbols.push(Symbol {
                name: member.name.clone(),
                kind: SymbolKind::Member,
                declaring_path: file.clone(),
                scope: member_scope.clone(),
            });
        }

        self.files.insert(file, CertifiedFile { assignment, shape });
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Run both collision passes over the whole project, then certify every
    /// file that neither pass touched
    #[tracing::instrument(skip_all, fields(files = self.files.len()))]
    pub fn detect_collisions(self, config: &TranspileConfig) -> Certification {
        let mut diagnostics = self.case_collisions();
        diagnostics.extend(self.duplicate_symbols());
        diagnostics.extend(self.runtime_collisions(config));

        let rejected: BTreeSet<String> = diagnostics.iter().map(|d| d.file.clone()).collect();
        let certified: BTreeMap<String, CertifiedFile> = self
            .files
            .into_iter()
            .filter(|(file, _)| !rejected.contains(file))
            .collect();

        tracing::info!(
            certified = certified.len(),
            rejected = rejected.len(),
            "collision detection complete"
        );
        Certification {
            certified,
            rejected,
            diagnostics,
        }
    }

    /// Sibling groups keyed by lower-cased scope, then lower-cased name
    ///
    /// Members of a class form their own group, apart from any namespace
    /// that happens to share the class's path.
    fn scopes(&self) -> BTreeMap<String, BTreeMap<String, Vec<&Symbol>>> {
        let mut scopes: BTreeMap<String, BTreeMap<String, Vec<&Symbol>>> = BTreeMap::new();
        for symbol in &self.symbols {
            let mut scope = symbol.scope.to_lowercase();
            if symbol.kind == SymbolKind::Member {
                scope.push_str("#members");
            }
            scopes
                .entry(scope)
                .or_default()
                .entry(symbol.name.to_lowercase())
                .or_default()
                .push(symbol);
        }
        scopes
    }

    /// One `CaseCollision` per offending file, naming its shallowest clash
    fn case_collisions(&self) -> Vec<Diagnostic> {
        let mut shallowest: BTreeMap<&str, (usize, String)> = BTreeMap::new();

        for siblings in self.scopes().values() {
            for group in siblings.values() {
                let spellings: BTreeSet<&str> = group.iter().map(|s| s.name.as_str()).collect();
                if spellings.len() < 2 {
                    continue;
                }
                let listed = spellings.iter().copied().collect::<Vec<_>>().join("', '");
                for symbol in group {
                    let depth = symbol.depth();
                    let message = format!(
                        "'{}' collides with a sibling differing only in case ('{}')",
                        symbol.name, listed
                    );
                    let entry = shallowest
                        .entry(symbol.declaring_path.as_str())
                        .or_insert_with(|| (depth, message.clone()));
                    if (depth, &message) < (entry.0, &entry.1) {
                        *entry = (depth, message);
                    }
                }
            }
        }

        shallowest
            .into_iter()
            .map(|(file, (_, message))| Diagnostic::error(DiagnosticCode::CaseCollision, file, message))
            .collect()
    }

    /// Exact duplicates: a type declared by two files, a namespace and a type
    /// sharing one name, or a member named like its enclosing class
    fn duplicate_symbols(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for siblings in self.scopes().values() {
            for group in siblings.values() {
                let mut by_name: BTreeMap<&str, Vec<&Symbol>> = BTreeMap::new();
                for symbol in group {
                    by_name.entry(symbol.name.as_str()).or_default().push(symbol);
                }
                for (name, symbols) in by_name {
                    if !symbols.iter().any(|s| s.kind == SymbolKind::Type) {
                        continue;
                    }
                    let paths: BTreeSet<&str> =
                        symbols.iter().map(|s| s.declaring_path.as_str()).collect();
                    if paths.len() < 2 {
                        continue;
                    }
                    let listed = paths.iter().copied().collect::<Vec<_>>().join(", ");
                    for path in &paths {
                        diagnostics.push(Diagnostic::error(
                            DiagnosticCode::DuplicateSymbol,
                            *path,
                            format!("'{}' is declared by more than one file ({})", name, listed),
                        ));
                    }
                }
            }
        }

        for symbol in self.symbols.iter().filter(|s| s.kind == SymbolKind::Member) {
            let owner = symbol.scope.rsplit('/').next().unwrap_or_default();
            if symbol.name == owner {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::DuplicateSymbol,
                    symbol.declaring_path.clone(),
                    format!("member '{}' has the same name as its enclosing class", symbol.name),
                ));
            }
        }

        diagnostics
    }

    fn runtime_collisions(&self, config: &TranspileConfig) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (file, certified) in &self.files {
            let namespace = &certified.assignment.namespace;
            if let Some(reserved) = config
                .reserved_namespaces()
                .iter()
                .find(|reserved| has_namespace_prefix(namespace, reserved))
            {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::RuntimeNamespaceCollision,
                    file.clone(),
                    format!(
                        "namespace '{}' collides with reserved runtime namespace '{}'",
                        namespace, reserved
                    ),
                ));
            }
        }
        diagnostics
    }
}

/// `namespace` equals `prefix` or continues it at a `.` boundary
pub fn has_namespace_prefix(namespace: &str, prefix: &str) -> bool {
    namespace == prefix
        || namespace
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// A project class as seen from another file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassRef {
    pub name: String,
    pub namespace: String,
    /// Enclosing static container for classes nested in a loose-export file
    pub container: Option<String>,
    pub type_params: Vec<String>,
    pub declaring_file: String,
}

impl ClassRef {
    /// Name as written in C# from outside the declaring class
    pub fn csharp_name(&self) -> String {
        match &self.container {
            Some(container) => format!("{}.{}", container, self.name),
            None => self.name.clone(),
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// What an import binding resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    Class(ClassRef),
    /// A loose export, reached as `Container.member`
    Member { container: ClassRef, member: String },
    /// A whole module imported as a namespace object (`import * as m`)
    Module(ClassRef),
}

#[derive(Debug, Clone)]
struct ModuleExports {
    container: ClassRef,
    is_static: bool,
    classes: BTreeMap<String, ClassRef>,
    members: BTreeSet<String>,
}

/// Read-only index of every certified file's exports
///
/// Built after certification so that cross-file references resolve the same
/// way regardless of which file is lowered first.
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    modules: BTreeMap<String, ModuleExports>,
}

impl ProjectIndex {
    pub fn build<'a>(files: impl IntoIterator<Item = &'a CertifiedFile>) -> Self {
        let mut modules = BTreeMap::new();
        for file in files {
            let source = file.source_path();
            let assignment = &file.assignment;
            let namespace = assignment.namespace.clone();
            let exports = match &file.shape {
                ClassShape::RegularClass {
                    name, type_params, ..
                } => {
                    let class = ClassRef {
                        name: name.clone(),
                        namespace,
                        container: None,
                        type_params: type_params.clone(),
                        declaring_file: source.clone(),
                    };
                    ModuleExports {
                        container: class.clone(),
                        is_static: false,
                        classes: BTreeMap::from([(name.clone(), class)]),
                        members: BTreeSet::new(),
                    }
                }
                ClassShape::StaticContainer { name, members } => {
                    let container = ClassRef {
                        name: name.clone(),
                        namespace: namespace.clone(),
                        container: None,
                        type_params: Vec::new(),
                        declaring_file: source.clone(),
                    };
                    let mut classes = BTreeMap::new();
                    let mut loose = BTreeSet::new();
                    for member in members {
                        match &member.kind {
                            ShapeMemberKind::NestedClass { type_params } => {
                                classes.insert(
                                    member.name.clone(),
                                    ClassRef {
                                        name: member.name.clone(),
                                        namespace: namespace.clone(),
                                        container: Some(name.clone()),
                                        type_params: type_params.clone(),
                                        declaring_file: source.clone(),
                                    },
                                );
                            }
                            _ => {
                                loose.insert(member.name.clone());
                            }
                        }
                    }
                    ModuleExports {
                        container,
                        is_static: true,
                        classes,
                        members: loose,
                    }
                }
                ClassShape::Invalid(_) => continue,
            };
            modules.insert(source, exports);
        }
        Self { modules }
    }

    fn module(&self, specifier: &str) -> Option<&ModuleExports> {
        let specifier = specifier.trim_start_matches("./");
        self.modules.get(specifier).or_else(|| {
            self.modules
                .iter()
                .find(|(path, _)| strip_extension(path) == strip_extension(specifier))
                .map(|(_, exports)| exports)
        })
    }

    /// Resolve `imported` from module `specifier`
    pub fn lookup(&self, specifier: &str, imported: &str) -> Option<ImportTarget> {
        let module = self.module(specifier)?;
        if imported == "*" {
            return Some(ImportTarget::Module(module.container.clone()));
        }
        if let Some(class) = module.classes.get(imported) {
            return Some(ImportTarget::Class(class.clone()));
        }
        if module.is_static && module.members.contains(imported) {
            return Some(ImportTarget::Member {
                container: module.container.clone(),
                member: imported.to_string(),
            });
        }
        None
    }

    /// Every exported class declared by `file`
    pub fn classes_in(&self, file: &str) -> Vec<ClassRef> {
        self.modules
            .get(file)
            .map(|m| m.classes.values().cloned().collect())
            .unwrap_or_default()
    }

    /// True when a top-level class `name` already exists in `namespace`
    pub fn has_class(&self, namespace: &str, name: &str) -> bool {
        self.modules
            .values()
            .any(|m| m.container.namespace == namespace && m.container.name == name)
    }
}

fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    }
}
