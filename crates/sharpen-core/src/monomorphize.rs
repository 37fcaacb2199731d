//! Generics Monomorphizer
//!
//! Every fully concrete use of a project generic class (`Container<number>`)
//! is replaced by a canonical, non-generic class name (`Container_number`)
//! and that class is materialized exactly once, next to the generic
//! declaration. Requests come from every lowered file; the table is built
//! after all files are lowered and is frozen before emission.
//!
//! Materialized bodies can themselves reference new instantiations, so the
//! worklist runs to a fixpoint, bounded by
//! [`TranspileConfig::max_generic_depth`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::config::TranspileConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::error::CoreError;
use crate::ir::IrFile;
use crate::lowering::lower_instantiation;
use crate::path_resolver::relative_to_root;
use crate::source::{display_path, Declaration, SourceUnit, Span};
use crate::symbols::{Certification, ClassRef, ProjectIndex};
use crate::types::IrType;

/// Canonical name of `base` applied to `args`
///
/// Arity one reads `Base_Arg`; larger arities carry the count so that
/// `Pair<A_B, C>` and `Pair<A, B_C>` cannot meet: `Base_2_A_B`.
pub fn canonical_name(base: &str, args: &[IrType]) -> String {
    let fragments: Vec<String> = args.iter().map(IrType::canonical_fragment).collect();
    match fragments.len() {
        0 => base.to_string(),
        1 => format!("{}_{}", base, fragments[0]),
        n => format!("{}_{}_{}", base, n, fragments.join("_")),
    }
}

/// One concrete use of a project generic class
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instantiation {
    pub canonical: String,
    pub generic: ClassRef,
    pub args: Vec<IrType>,
}

impl Instantiation {
    pub fn new(generic: ClassRef, args: Vec<IrType>) -> Self {
        Self {
            canonical: canonical_name(&generic.name, &args),
            generic,
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.generic.namespace
    }
}

/// Frozen memo of every materialized instantiation, keyed by
/// (namespace, canonical name)
#[derive(Debug, Clone, Default)]
pub struct MonomorphTable {
    entries: BTreeMap<(String, String), Instantiation>,
}

impl MonomorphTable {
    pub fn get(&self, namespace: &str, canonical: &str) -> Option<&Instantiation> {
        self.entries
            .get(&(namespace.to_string(), canonical.to_string()))
    }

    pub fn contains(&self, namespace: &str, canonical: &str) -> bool {
        self.get(namespace, canonical).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instantiation> {
        self.entries.values()
    }
}

/// Output of materialization: the frozen table, one support file per entry
/// and the requesting files left without a usable instantiation
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    pub table: MonomorphTable,
    pub files: Vec<IrFile>,
    /// Files referencing an instantiation that could not be materialized.
    /// Their canonical references would dangle or bind to the wrong class,
    /// so they must not be emitted.
    pub rejected: BTreeSet<String>,
}

pub struct Monomorphizer<'a> {
    units: BTreeMap<String, &'a SourceUnit>,
    certification: &'a Certification,
    index: &'a ProjectIndex,
    config: &'a TranspileConfig,
}

impl<'a> Monomorphizer<'a> {
    pub fn new(
        units: impl IntoIterator<Item = &'a SourceUnit>,
        certification: &'a Certification,
        index: &'a ProjectIndex,
        config: &'a TranspileConfig,
    ) -> Self {
        Self {
            units: units
                .into_iter()
                .map(|unit| (display_path(relative_to_root(&unit.path, config)), unit))
                .collect(),
            certification,
            index,
            config,
        }
    }

    /// Build the table from every file's requests, given as
    /// `(requesting file, instantiation)`, and materialize each entry
    #[tracing::instrument(skip_all, fields(requests = tracing::field::Empty))]
    pub fn run(
        &self,
        requests: impl IntoIterator<Item = (String, Instantiation)>,
        sink: &mut DiagnosticSink,
    ) -> Result<Materialized, CoreError> {
        let mut requesters: BTreeMap<Instantiation, BTreeSet<String>> = BTreeMap::new();
        for (file, instantiation) in requests {
            requesters.entry(instantiation).or_default().insert(file);
        }
        tracing::Span::current().record("requests", requesters.len());

        let mut queue: VecDeque<(Instantiation, usize)> =
            requesters.keys().map(|i| (i.clone(), 1)).collect();
        let mut built: BTreeMap<(String, String), (Instantiation, IrFile)> = BTreeMap::new();
        let mut nested: BTreeMap<Instantiation, BTreeSet<Instantiation>> = BTreeMap::new();
        let mut failed: BTreeMap<Instantiation, DiagnosticCode> = BTreeMap::new();
        let mut reported: BTreeSet<(String, String, DiagnosticCode)> = BTreeSet::new();

        while let Some((instantiation, depth)) = queue.pop_front() {
            let key = (
                instantiation.namespace().to_string(),
                instantiation.canonical.clone(),
            );

            if let Some((existing, _)) = built.get(&key) {
                if existing != &instantiation {
                    if reported.insert((key.0.clone(), key.1.clone(), DiagnosticCode::GenericNameClash)) {
                        sink.push(self.name_clash(&instantiation, Some(existing)));
                    }
                    failed.insert(instantiation, DiagnosticCode::GenericNameClash);
                }
                continue;
            }

            if self
                .index
                .has_class(instantiation.namespace(), &instantiation.canonical)
            {
                if reported.insert((key.0.clone(), key.1.clone(), DiagnosticCode::GenericNameClash)) {
                    sink.push(self.name_clash(&instantiation, None));
                }
                failed.insert(instantiation, DiagnosticCode::GenericNameClash);
                continue;
            }

            if depth > self.config.max_generic_depth() {
                let generic = &instantiation.generic;
                if reported.insert((
                    generic.namespace.clone(),
                    generic.name.clone(),
                    DiagnosticCode::GenericExpansionLimit,
                )) {
                    sink.push(self.expansion_limit(&instantiation));
                }
                failed.insert(instantiation, DiagnosticCode::GenericExpansionLimit);
                continue;
            }

            let lowered = self.materialize(&instantiation)?;
            tracing::debug!(
                canonical = %instantiation.canonical,
                depth,
                "materialized generic instantiation"
            );
            for child in &lowered.instantiations {
                queue.push_back((child.clone(), depth + 1));
            }
            nested.insert(instantiation.clone(), lowered.instantiations);
            built.insert(key, (instantiation, lowered.file));
        }

        // a body that needs a failed instantiation fails with it
        let mut changed = true;
        while changed {
            changed = false;
            for (parent, children) in &nested {
                if failed.contains_key(parent) {
                    continue;
                }
                if let Some(code) = children.iter().find_map(|c| failed.get(c).copied()) {
                    failed.insert(parent.clone(), code);
                    changed = true;
                }
            }
        }

        let mut materialized = Materialized::default();
        for (key, (instantiation, file)) in built {
            if failed.contains_key(&instantiation) {
                continue;
            }
            materialized.files.push(file);
            materialized.table.entries.insert(key, instantiation);
        }
        for (instantiation, files) in &requesters {
            let Some(code) = failed.get(instantiation) else {
                continue;
            };
            for file in files {
                sink.push(unusable_reference(file, instantiation, *code));
                materialized.rejected.insert(file.clone());
            }
        }

        tracing::info!(
            instantiations = materialized.table.len(),
            rejected_files = materialized.rejected.len(),
            "monomorphization complete"
        );
        Ok(materialized)
    }

    fn materialize(
        &self,
        instantiation: &Instantiation,
    ) -> Result<crate::lowering::LoweredFile, CoreError> {
        let file = &instantiation.generic.declaring_file;
        let unit = self
            .units
            .get(file)
            .ok_or_else(|| CoreError::UnknownFile(file.clone()))?;
        let certified = self.certification.get(file).ok_or_else(|| {
            CoreError::Internal(format!("{} declares a generic but is not certified", file))
        })?;
        lower_instantiation(unit, certified, self.index, self.config, instantiation)
    }

    fn declaration_span(&self, generic: &ClassRef) -> Span {
        self.units
            .get(&generic.declaring_file)
            .and_then(|unit| {
                unit.exports.iter().find_map(|decl| match decl {
                    Declaration::Class(class) if class.name == generic.name => Some(class.span),
                    _ => None,
                })
            })
            .unwrap_or_default()
    }

    fn name_clash(&self, instantiation: &Instantiation, existing: Option<&Instantiation>) -> Diagnostic {
        let generic = &instantiation.generic;
        let message = match existing {
            Some(existing) => format!(
                "instantiations {}<{}> and {}<{}> both canonicalize to '{}'",
                existing.generic.name,
                render_args(&existing.args),
                generic.name,
                render_args(&instantiation.args),
                instantiation.canonical
            ),
            None => format!(
                "{}<{}> canonicalizes to '{}', which already names a class in {}",
                generic.name,
                render_args(&instantiation.args),
                instantiation.canonical,
                generic.namespace
            ),
        };
        let span = self.declaration_span(generic);
        Diagnostic::error(DiagnosticCode::GenericNameClash, &generic.declaring_file, message)
            .at(span.line, span.col)
    }

    fn expansion_limit(&self, instantiation: &Instantiation) -> Diagnostic {
        let generic = &instantiation.generic;
        let span = self.declaration_span(generic);
        Diagnostic::error(
            DiagnosticCode::GenericExpansionLimit,
            &generic.declaring_file,
            format!(
                "expanding {} exceeded the generic depth limit of {} at '{}'",
                generic.name,
                self.config.max_generic_depth(),
                instantiation.canonical
            ),
        )
        .at(span.line, span.col)
    }
}

/// Reported against each file whose reference cannot be generated
fn unusable_reference(file: &str, instantiation: &Instantiation, code: DiagnosticCode) -> Diagnostic {
    Diagnostic::error(
        code,
        file,
        format!(
            "{}<{}> cannot be generated as '{}'; this file is not emitted",
            instantiation.generic.name,
            render_args(&instantiation.args),
            instantiation.canonical
        ),
    )
}

fn render_args(args: &[IrType]) -> String {
    args.iter()
        .map(|arg| match arg {
            IrType::Named {
                name,
                namespace: Some(namespace),
                ..
            } => format!("{}.{}", namespace, name),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
