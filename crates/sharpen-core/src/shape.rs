//! Export Shape Classifier
//!
//! A file's public surface becomes exactly one C# class: either the single
//! exported class named after the file, or a static container wrapping every
//! loose export. A file that exports its stem-named class *and* anything else
//! is rejected rather than guessed at.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::path_resolver::NamespaceAssignment;
use crate::source::{ClassMember, Declaration, Expr, SourceUnit, Span, VarKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeMemberKind {
    /// Instance or static member of a regular class
    Method,
    Property,
    Constructor,
    Accessor,
    /// Loose exports inside a static container
    StaticMethod,
    StaticField { readonly: bool },
    /// An exported class whose name differs from the stem
    NestedClass { type_params: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeMember {
    pub name: String,
    pub kind: ShapeMemberKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidShape {
    /// The stem-named class is exported together with other declarations
    MixedExport {
        class_name: String,
        others: Vec<String>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassShape {
    RegularClass {
        name: String,
        type_params: Vec<String>,
        members: Vec<ShapeMember>,
    },
    StaticContainer {
        name: String,
        members: Vec<ShapeMember>,
    },
    Invalid(InvalidShape),
}

impl ClassShape {
    pub fn name(&self) -> Option<&str> {
        match self {
            ClassShape::RegularClass { name, .. } | ClassShape::StaticContainer { name, .. } => {
                Some(name)
            }
            ClassShape::Invalid(_) => None,
        }
    }

    pub fn members(&self) -> &[ShapeMember] {
        match self {
            ClassShape::RegularClass { members, .. } | ClassShape::StaticContainer { members, .. } => {
                members
            }
            ClassShape::Invalid(_) => &[],
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, ClassShape::Invalid(_))
    }

    /// The `MixedExportAmbiguity` diagnostic for an invalid shape
    pub fn diagnostic(&self, file: &str) -> Option<Diagnostic> {
        match self {
            ClassShape::Invalid(InvalidShape::MixedExport {
                class_name,
                others,
                span,
            }) => Some(
                Diagnostic::error(
                    DiagnosticCode::MixedExportAmbiguity,
                    file,
                    format!(
                        "class '{}' is exported alongside other declarations ({}); \
                         a file must export either one class named after the file or only loose members",
                        class_name,
                        others.join(", ")
                    ),
                )
                .at(span.line, span.col),
            ),
            _ => None,
        }
    }
}

fn class_members(members: &[ClassMember]) -> Vec<ShapeMember> {
    members
        .iter()
        .map(|member| match member {
            ClassMember::Property(p) => ShapeMember {
                name: p.name.clone(),
                kind: ShapeMemberKind::Property,
                span: p.span,
            },
            ClassMember::Method(m) => ShapeMember {
                name: m.name.clone(),
                kind: ShapeMemberKind::Method,
                span: m.span,
            },
            ClassMember::Constructor(c) => ShapeMember {
                name: "constructor".to_string(),
                kind: ShapeMemberKind::Constructor,
                span: c.span,
            },
            ClassMember::Accessor(a) => ShapeMember {
                name: a.name.clone(),
                kind: ShapeMemberKind::Accessor,
                span: a.span,
            },
        })
        .collect()
}

fn container_member(decl: &Declaration) -> ShapeMember {
    let kind = match decl {
        Declaration::Function(_) => ShapeMemberKind::StaticMethod,
        Declaration::Variable(v) => match (v.kind, &v.init) {
            (VarKind::Const, Some(init)) if init.is_function() => ShapeMemberKind::StaticMethod,
            (VarKind::Const, _) => ShapeMemberKind::StaticField { readonly: true },
            (VarKind::Let | VarKind::Var, _) => ShapeMemberKind::StaticField { readonly: false },
        },
        Declaration::Class(c) => ShapeMemberKind::NestedClass {
            type_params: c.type_params.clone(),
        },
    };
    ShapeMember {
        name: decl.name().to_string(),
        kind,
        span: decl.span(),
    }
}

/// Decide the generated class shape for one file
pub fn classify(unit: &SourceUnit, assignment: &NamespaceAssignment) -> ClassShape {
    let stem = assignment.class_name.as_str();
    let matching = unit.exports.iter().find_map(|decl| match decl {
        Declaration::Class(class) if class.name == stem => Some(class),
        _ => None,
    });

    let shape = match matching {
        Some(class) if unit.exports.len() == 1 => ClassShape::RegularClass {
            name: class.name.clone(),
            type_params: class.type_params.clone(),
            members: class_members(&class.members),
        },
        Some(class) => ClassShape::Invalid(InvalidShape::MixedExport {
            class_name: class.name.clone(),
            others: unit
                .exports
                .iter()
                .map(Declaration::name)
                .filter(|name| *name != stem)
                .map(str::to_string)
                .collect(),
            span: class.span,
        }),
        None => ClassShape::StaticContainer {
            name: stem.to_string(),
            members: unit.exports.iter().map(container_member).collect(),
        },
    };

    tracing::debug!(
        file = %unit.display_path(),
        valid = shape.is_valid(),
        "classified exports"
    );
    shape
}
