//! IR Builder: lower one certified file's declarations into an [`IrFile`]
//!
//! Lowering runs only after every name in the project is certified, so an
//! identifier imported from another file resolves through the
//! [`ProjectIndex`] and never depends on which file was lowered first.
//!
//! Rejected constructs (accessors, function values stored in fields, bodies
//! with no faithful C# rendering) become [`IrMember::Unsupported`] entries
//! local to their declaration; the rest of the file still lowers.

mod expressions;
mod statements;

use std::collections::{BTreeMap, BTreeSet};

use crate::config::TranspileConfig;
use crate::diagnostics::DiagnosticCode;
use crate::error::CoreError;
use crate::ir::{
    ClassKind, IrClass, IrConstructor, IrExpression, IrFile, IrMember, IrMethod, IrParam,
    IrProperty, IrRecord, IrStatement, UnsupportedMember, Visibility,
};
use crate::monomorphize::Instantiation;
use crate::naming::{is_identifier_segment, to_pascal_case};
use crate::shape::ClassShape;
use crate::source::{
    ArrowBody, ClassDecl, ClassMember, Declaration, Expr, FunctionDecl, Param, SourceUnit, Span,
    Stmt, TypeRef, VarKind, VariableDecl,
};
use crate::symbols::{CertifiedFile, ClassRef, ImportTarget, ProjectIndex};
use crate::types::{infer_literal, IrType, TypeMapper};

/// Result of lowering one file: its IR plus every concrete generic
/// instantiation it references
#[derive(Debug, Clone)]
pub struct LoweredFile {
    pub file: IrFile,
    pub instantiations: BTreeSet<Instantiation>,
}

/// What a free identifier in the file refers to
#[derive(Debug, Clone)]
enum Binding {
    Class(ClassRef),
    Member { container: ClassRef, member: String },
    Module(ClassRef),
    External { namespace: String, name: String },
}

/// Return-type bookkeeping for the function being lowered
#[derive(Debug, Clone, Default)]
struct ReturnContext {
    /// Declared type, unwrapped from `Task<T>` for async functions
    declared: Option<IrType>,
    /// Types of returned values when nothing was declared
    observed: Vec<Option<IrType>>,
}

struct Lowerer<'a> {
    config: &'a TranspileConfig,
    file: String,
    namespace: String,
    bindings: BTreeMap<String, Binding>,
    types: TypeMapper,
    references: BTreeSet<String>,
    scopes: Vec<BTreeMap<String, Option<IrType>>>,
    fields: BTreeMap<String, IrType>,
    returns: Vec<ReturnContext>,
    /// Constructs refused while lowering the current member
    refused: Vec<String>,
}

/// Lower a certified file with a valid shape
#[tracing::instrument(skip_all, fields(file = %certified.source_path()))]
pub fn lower_file(
    unit: &SourceUnit,
    certified: &CertifiedFile,
    index: &ProjectIndex,
    config: &TranspileConfig,
) -> Result<LoweredFile, CoreError> {
    let mut lowerer = Lowerer::new(unit, certified, index, config, TypeMapper::new());
    let assignment = &certified.assignment;

    let class = match &certified.shape {
        ClassShape::RegularClass { name, .. } => {
            let decl = find_class(unit, name)?;
            lowerer.lower_class(decl, name.clone(), &decl.type_params)
        }
        ClassShape::StaticContainer { name, .. } => lowerer.lower_container(unit, name),
        ClassShape::Invalid(_) => {
            return Err(CoreError::Internal(format!(
                "{} reached lowering with an invalid export shape",
                lowerer.file
            )))
        }
    };

    tracing::debug!(members = class.members.len(), "lowered file");
    Ok(lowerer.finish(class, assignment.output_path()))
}

/// Lower the generic class behind `instantiation` with its type parameters
/// substituted, producing the support file for the canonical name
pub fn lower_instantiation(
    unit: &SourceUnit,
    certified: &CertifiedFile,
    index: &ProjectIndex,
    config: &TranspileConfig,
    instantiation: &Instantiation,
) -> Result<LoweredFile, CoreError> {
    let generic = &instantiation.generic;
    let substitutions: BTreeMap<String, IrType> = generic
        .type_params
        .iter()
        .cloned()
        .zip(instantiation.args.iter().cloned())
        .collect();
    let mapper = TypeMapper::new().with_substitutions(substitutions);
    let mut lowerer = Lowerer::new(unit, certified, index, config, mapper);

    let decl = find_class(unit, &generic.name)?;
    let class = lowerer.lower_class(decl, instantiation.canonical.clone(), &[]);

    let mut output_path: std::path::PathBuf = certified.assignment.segments.iter().collect();
    output_path.push(format!("{}.cs", instantiation.canonical));
    Ok(lowerer.finish(class, output_path))
}

fn find_class<'u>(unit: &'u SourceUnit, name: &str) -> Result<&'u ClassDecl, CoreError> {
    unit.exports
        .iter()
        .find_map(|decl| match decl {
            Declaration::Class(class) if class.name == name => Some(class),
            _ => None,
        })
        .ok_or_else(|| {
            CoreError::Internal(format!(
                "class '{}' not found in {}",
                name,
                unit.display_path()
            ))
        })
}

impl<'a> Lowerer<'a> {
    fn new(
        unit: &SourceUnit,
        certified: &CertifiedFile,
        index: &ProjectIndex,
        config: &'a TranspileConfig,
        mut types: TypeMapper,
    ) -> Self {
        let file = certified.source_path();
        let mut bindings = BTreeMap::new();

        for class in index.classes_in(&file) {
            types.register_class(class.name.clone(), class.clone());
            bindings.insert(class.name.clone(), Binding::Class(class));
        }

        for import in &unit.imports {
            let imported = import.imported_name();
            match index.lookup(&import.module, imported) {
                Some(ImportTarget::Class(class)) => {
                    types.register_class(import.local.clone(), class.clone());
                    bindings.insert(import.local.clone(), Binding::Class(class));
                }
                Some(ImportTarget::Member { container, member }) => {
                    bindings.insert(import.local.clone(), Binding::Member { container, member });
                }
                Some(ImportTarget::Module(container)) => {
                    bindings.insert(import.local.clone(), Binding::Module(container));
                }
                None => match config.external_namespace(&import.module) {
                    Some(namespace) => {
                        bindings.insert(
                            import.local.clone(),
                            Binding::External {
                                namespace: namespace.to_string(),
                                name: imported.to_string(),
                            },
                        );
                    }
                    None => tracing::debug!(
                        module = %import.module,
                        name = imported,
                        "import has no project or external mapping"
                    ),
                },
            }
        }

        Self {
            config,
            file,
            namespace: certified.assignment.namespace.clone(),
            bindings,
            types,
            references: BTreeSet::new(),
            scopes: Vec::new(),
            fields: BTreeMap::new(),
            returns: Vec::new(),
            refused: Vec::new(),
        }
    }

    fn finish(mut self, class: IrClass, output_path: std::path::PathBuf) -> LoweredFile {
        self.references.remove(&self.namespace);
        LoweredFile {
            file: IrFile {
                source_path: self.file,
                output_path,
                namespace: self.namespace,
                class,
                references: self.references,
            },
            instantiations: self.types.take_instantiations(),
        }
    }

    fn map_type(&mut self, ty: &TypeRef) -> IrType {
        let mapped = self.types.map(ty);
        self.note_type(&mapped);
        mapped
    }

    /// Record the namespaces a type needs and hand it back
    fn note_type(&mut self, ty: &IrType) {
        ty.collect_namespaces(&mut self.references);
    }

    fn runtime_type(&mut self, name: &str) -> IrType {
        IrType::named(name, Some(self.config.runtime_namespace()))
    }

    fn push_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare_local(&mut self, name: &str, ty: Option<IrType>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    /// `Some(ty)` when `name` is a local in scope, with its type if known
    fn local(&self, name: &str) -> Option<Option<&IrType>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .map(Option::as_ref)
    }

    /// An `UnsupportedConstruct` entry standing in for the member just
    /// lowered, when its body held something that was refused
    fn take_refused(&mut self, name: &str, span: Span) -> Option<IrMember> {
        if self.refused.is_empty() {
            return None;
        }
        let reasons = std::mem::take(&mut self.refused);
        Some(IrMember::Unsupported(UnsupportedMember {
            name: name.to_string(),
            code: DiagnosticCode::UnsupportedConstruct,
            message: format!("'{}' is not translated: {}", name, reasons.join("; ")),
            span,
        }))
    }

    fn lower_container(&mut self, unit: &SourceUnit, name: &str) -> IrClass {
        let mut class = IrClass::new(name, self.namespace.clone(), ClassKind::Static);
        for decl in &unit.exports {
            let member = match decl {
                Declaration::Function(function) => IrMember::Method(self.lower_function(
                    function,
                    Visibility::Public,
                    true,
                )),
                Declaration::Variable(variable) => self.lower_static_variable(variable, &mut class),
                Declaration::Class(nested) => {
                    let nested_class =
                        self.lower_class(nested, nested.name.clone(), &nested.type_params);
                    IrMember::NestedClass(Box::new(nested_class))
                }
            };
            let member = self.take_refused(decl.name(), decl.span()).unwrap_or(member);
            class.members.push(member);
        }
        class
    }

    fn lower_static_variable(&mut self, variable: &VariableDecl, class: &mut IrClass) -> IrMember {
        let readonly = variable.kind == VarKind::Const;

        if let Some(Expr::Arrow {
            params,
            return_type,
            body,
            is_async,
        }) = &variable.init
        {
            if readonly {
                let function = FunctionDecl {
                    name: variable.name.clone(),
                    span: variable.span,
                    type_params: Vec::new(),
                    params: params.clone(),
                    return_type: return_type.clone(),
                    body: arrow_statements(body),
                    is_async: *is_async,
                };
                return IrMember::Method(self.lower_function(&function, Visibility::Public, true));
            }
        }

        if let Some(init) = &variable.init {
            if init.is_function() || closure_field_in_expr(init) {
                return closure_field(&variable.name, variable.span);
            }
        }

        if readonly && variable.ty.is_none() {
            if let Some(Expr::Object(props)) = &variable.init {
                if let Some(record) = self.record_shape(&variable.name, props, variable.span) {
                    let ty = IrType::named(record.name.clone(), None);
                    let args = props
                        .iter()
                        .map(|p| self.lower_expr(&p.value, None))
                        .collect();
                    class.members.push(IrMember::Record(record));
                    return IrMember::Property(IrProperty {
                        name: variable.name.clone(),
                        ty: ty.clone(),
                        visibility: Visibility::Public,
                        is_static: true,
                        is_readonly: true,
                        init: Some(IrExpression::New { ty, args }),
                        span: variable.span,
                    });
                }
            }
        }

        let ty = self.declared_or_inferred(variable.ty.as_ref(), variable.init.as_ref());
        let init = variable
            .init
            .as_ref()
            .map(|e| self.lower_expr(e, Some(&ty)));
        IrMember::Property(IrProperty {
            name: variable.name.clone(),
            ty,
            visibility: Visibility::Public,
            is_static: true,
            is_readonly: readonly,
            init,
            span: variable.span,
        })
    }

    /// A positional record for an object literal whose shape is statically
    /// knowable: identifier keys and literal values only
    fn record_shape(
        &mut self,
        name: &str,
        props: &[crate::source::ObjectProp],
        span: Span,
    ) -> Option<IrRecord> {
        if props.is_empty() {
            return None;
        }
        let mut fields = Vec::with_capacity(props.len());
        for prop in props {
            if !is_identifier_segment(&prop.key) && !crate::naming::is_csharp_keyword(&prop.key) {
                return None;
            }
            let ty = match prop.value {
                Expr::Number(_) | Expr::String(_) | Expr::Bool(_) => infer_literal(&prop.value)?,
                _ => return None,
            };
            fields.push((prop.key.clone(), ty));
        }
        Some(IrRecord {
            name: format!("{}Shape", to_pascal_case(name)),
            fields,
            span,
        })
    }

    fn declared_or_inferred(&mut self, declared: Option<&TypeRef>, init: Option<&Expr>) -> IrType {
        match declared {
            Some(ty) => self.map_type(ty),
            None => {
                let inferred = init.and_then(|e| self.infer(e)).unwrap_or(IrType::Object);
                self.note_type(&inferred);
                inferred
            }
        }
    }

    fn lower_class(&mut self, decl: &ClassDecl, name: String, type_params: &[String]) -> IrClass {
        self.types.push_type_params(type_params);
        let mut class = IrClass::new(name, self.namespace.clone(), ClassKind::Regular);
        class.type_params = type_params.to_vec();
        class.span = decl.span;
        class.base = decl.extends.as_ref().map(|base| self.map_type(base));

        let saved_fields = std::mem::take(&mut self.fields);
        self.collect_field_types(decl);

        for member in &decl.members {
            let start = class.members.len();
            match member {
                ClassMember::Property(property) => {
                    let closure = property
                        .init
                        .as_ref()
                        .is_some_and(|e| e.is_function() || closure_field_in_expr(e));
                    if closure {
                        class.members.push(closure_field(&property.name, property.span));
                        continue;
                    }
                    let ty = self.fields.get(&property.name).cloned().unwrap_or(IrType::Object);
                    let init = property
                        .init
                        .as_ref()
                        .map(|e| self.lower_expr(e, Some(&ty)));
                    class.members.push(IrMember::Property(IrProperty {
                        name: property.name.clone(),
                        ty,
                        visibility: property.visibility.into(),
                        is_static: property.is_static,
                        is_readonly: property.is_readonly,
                        init,
                        span: property.span,
                    }));
                }
                ClassMember::Method(method) => {
                    let function = FunctionDecl {
                        name: method.name.clone(),
                        span: method.span,
                        type_params: method.type_params.clone(),
                        params: method.params.clone(),
                        return_type: method.return_type.clone(),
                        body: method.body.clone(),
                        is_async: method.is_async,
                    };
                    let lowered =
                        self.lower_function(&function, method.visibility.into(), method.is_static);
                    class.members.push(IrMember::Method(lowered));
                }
                ClassMember::Constructor(constructor) => {
                    let (properties, lowered) = self.lower_constructor(constructor);
                    class.members.extend(properties.into_iter().map(IrMember::Property));
                    class.members.push(IrMember::Constructor(lowered));
                }
                ClassMember::Accessor(accessor) => {
                    let kind = match accessor.accessor {
                        crate::source::AccessorKind::Get => "get",
                        crate::source::AccessorKind::Set => "set",
                    };
                    class.members.push(IrMember::Unsupported(UnsupportedMember {
                        name: accessor.name.clone(),
                        code: DiagnosticCode::UnsupportedAccessor,
                        message: format!(
                            "accessor '{} {}' is not translated; use a method or a plain field",
                            kind, accessor.name
                        ),
                        span: accessor.span,
                    }));
                }
            }

            let (name, span) = match member {
                ClassMember::Property(p) => (p.name.as_str(), p.span),
                ClassMember::Method(m) => (m.name.as_str(), m.span),
                ClassMember::Constructor(c) => ("constructor", c.span),
                ClassMember::Accessor(a) => (a.name.as_str(), a.span),
            };
            if let Some(refused) = self.take_refused(name, span) {
                class.members.truncate(start);
                class.members.push(refused);
            }
        }

        self.fields = saved_fields;
        self.types.pop_type_params(type_params.len());
        class
    }

    /// Field types are needed before any method body is lowered
    fn collect_field_types(&mut self, decl: &ClassDecl) {
        for member in &decl.members {
            match member {
                ClassMember::Property(property) => {
                    let mut ty =
                        self.declared_or_inferred(property.ty.as_ref(), property.init.as_ref());
                    if property.optional {
                        ty = IrType::nullable(ty);
                    }
                    self.fields.insert(property.name.clone(), ty);
                }
                ClassMember::Constructor(constructor) => {
                    for param in constructor.params.iter().filter(|p| p.property.is_some()) {
                        let ty = self.param_type(param);
                        self.fields.insert(param.name.clone(), ty);
                    }
                }
                _ => {}
            }
        }
    }

    fn param_type(&mut self, param: &Param) -> IrType {
        let ty = match &param.ty {
            Some(ty) => self.map_type(ty),
            None => param
                .default
                .as_ref()
                .and_then(infer_literal)
                .unwrap_or(IrType::Object),
        };
        if param.optional && param.default.is_none() {
            IrType::nullable(ty)
        } else {
            ty
        }
    }

    fn lower_params(&mut self, params: &[Param]) -> Vec<IrParam> {
        params
            .iter()
            .map(|param| {
                let ty = self.param_type(param);
                let default = match &param.default {
                    Some(default) => Some(self.lower_expr(default, Some(&ty))),
                    None if param.optional => Some(IrExpression::Default(None)),
                    None => None,
                };
                self.declare_local(&param.name, Some(ty.clone()));
                IrParam {
                    name: param.name.clone(),
                    ty: Some(ty),
                    default,
                }
            })
            .collect()
    }

    fn lower_constructor(
        &mut self,
        constructor: &crate::source::ConstructorDecl,
    ) -> (Vec<IrProperty>, IrConstructor) {
        self.push_scope();
        self.returns.push(ReturnContext {
            declared: Some(IrType::Void),
            observed: Vec::new(),
        });

        let params = self.lower_params(&constructor.params);
        let mut properties = Vec::new();
        let mut body = Vec::new();

        for param in constructor.params.iter() {
            if let Some(property) = &param.property {
                properties.push(IrProperty {
                    name: param.name.clone(),
                    ty: self.fields.get(&param.name).cloned().unwrap_or(IrType::Object),
                    visibility: property.visibility.into(),
                    is_static: false,
                    is_readonly: property.readonly,
                    init: None,
                    span: constructor.span,
                });
                body.push(IrStatement::Expr(IrExpression::assign(
                    IrExpression::member(IrExpression::This, param.name.clone()),
                    IrExpression::ident(param.name.clone()),
                )));
            }
        }

        let mut statements = constructor.body.as_slice();
        let mut base_args = None;
        if let Some((Stmt::Expr(Expr::Call { callee, args, .. }), rest)) = statements.split_first() {
            if matches!(callee.as_ref(), Expr::Super) {
                base_args = Some(args.iter().map(|a| self.lower_expr(a, None)).collect());
                statements = rest;
            }
        }
        body.extend(self.lower_block(statements));

        self.returns.pop();
        self.pop_scope();
        (
            properties,
            IrConstructor {
                visibility: Visibility::Public,
                params,
                base_args,
                body,
                span: constructor.span,
            },
        )
    }

    fn lower_function(
        &mut self,
        function: &FunctionDecl,
        visibility: Visibility,
        is_static: bool,
    ) -> IrMethod {
        self.types.push_type_params(&function.type_params);
        self.push_scope();

        let params = self.lower_params(&function.params);
        let declared = function.return_type.as_ref().map(|ty| self.map_type(ty));
        let inner = match (&declared, function.is_async) {
            (Some(IrType::Task(None)), true) => Some(IrType::Void),
            (Some(IrType::Task(Some(inner))), true) => Some((**inner).clone()),
            (other, _) => other.clone(),
        };
        self.returns.push(ReturnContext {
            declared: inner,
            observed: Vec::new(),
        });

        let body = self.lower_block(&function.body);

        let context = self.returns.pop().unwrap_or_default();
        self.pop_scope();
        self.types.pop_type_params(function.type_params.len());

        let result = context.declared.unwrap_or_else(|| {
            match context.observed.iter().find_map(Clone::clone) {
                Some(ty) => ty,
                None if context.observed.is_empty() => IrType::Void,
                None => IrType::Object,
            }
        });
        let return_type = match (function.is_async, result) {
            (false, ty) => ty,
            (true, IrType::Void) => IrType::Task(None),
            (true, task @ IrType::Task(_)) => task,
            (true, ty) => IrType::Task(Some(Box::new(ty))),
        };
        self.note_type(&return_type);

        IrMethod {
            name: function.name.clone(),
            visibility,
            is_static,
            is_async: function.is_async,
            type_params: function.type_params.clone(),
            params,
            return_type,
            body,
            span: function.span,
        }
    }
}

fn closure_field(name: &str, span: Span) -> IrMember {
    IrMember::Unsupported(UnsupportedMember {
        name: name.to_string(),
        code: DiagnosticCode::UnsupportedClosureField,
        message: format!(
            "'{}' stores a function value in a field, which would capture enclosing state",
            name
        ),
        span,
    })
}

fn arrow_statements(body: &ArrowBody) -> Vec<Stmt> {
    match body {
        ArrowBody::Expr(expr) => vec![Stmt::Return(Some((**expr).clone()))],
        ArrowBody::Block(statements) => statements.clone(),
    }
}

/// True when an object literal anywhere inside a field initializer holds a
/// function value
fn closure_field_in_expr(expr: &Expr) -> bool {
    match expr {
        Expr::Object(props) => props
            .iter()
            .any(|p| p.value.is_function() || closure_field_in_expr(&p.value)),
        Expr::Binary { left, right, .. } => {
            closure_field_in_expr(left) || closure_field_in_expr(right)
        }
        Expr::Unary { arg, .. } | Expr::Update { arg, .. } => closure_field_in_expr(arg),
        Expr::Assign { target, value, .. } => {
            closure_field_in_expr(target) || closure_field_in_expr(value)
        }
        Expr::Call { callee, args, .. } => {
            closure_field_in_expr(callee) || args.iter().any(closure_field_in_expr)
        }
        Expr::New { args, .. } | Expr::Array(args) => args.iter().any(closure_field_in_expr),
        Expr::Template { exprs, .. } => exprs.iter().any(closure_field_in_expr),
        Expr::Member { object, .. } => closure_field_in_expr(object),
        Expr::Index { object, index } => {
            closure_field_in_expr(object) || closure_field_in_expr(index)
        }
        Expr::TypeOf(inner) | Expr::Await(inner) => closure_field_in_expr(inner),
        Expr::InstanceOf { expr, .. } | Expr::As { expr, .. } => closure_field_in_expr(expr),
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            closure_field_in_expr(test)
                || closure_field_in_expr(consequent)
                || closure_field_in_expr(alternate)
        }
        Expr::Arrow { body, .. } => match body {
            ArrowBody::Expr(expr) => closure_field_in_expr(expr),
            ArrowBody::Block(statements) => closure_field_in_block(statements),
        },
        _ => false,
    }
}

fn closure_field_in_block(statements: &[Stmt]) -> bool {
    statements.iter().any(|stmt| match stmt {
        Stmt::VarDecl { init, .. } => init.as_ref().is_some_and(closure_field_in_expr),
        Stmt::Expr(expr) | Stmt::Throw(expr) => closure_field_in_expr(expr),
        Stmt::Return(expr) => expr.as_ref().is_some_and(closure_field_in_expr),
        Stmt::If {
            cond,
            then,
            otherwise,
        } => {
            closure_field_in_expr(cond)
                || closure_field_in_block(then)
                || otherwise.as_deref().is_some_and(closure_field_in_block)
        }
        Stmt::While { cond, body } | Stmt::DoWhile { body, cond } => {
            closure_field_in_expr(cond) || closure_field_in_block(body)
        }
        Stmt::For {
            init,
            test,
            update,
            body,
        } => {
            init.as_deref()
                .is_some_and(|s| closure_field_in_block(std::slice::from_ref(s)))
                || test.as_ref().is_some_and(closure_field_in_expr)
                || update.as_ref().is_some_and(closure_field_in_expr)
                || closure_field_in_block(body)
        }
        Stmt::ForOf { iterable: e, body, .. } | Stmt::ForIn { object: e, body, .. } => {
            closure_field_in_expr(e) || closure_field_in_block(body)
        }
        Stmt::Switch {
            discriminant,
            cases,
        } => {
            closure_field_in_expr(discriminant)
                || cases.iter().any(|c| {
                    c.test.as_ref().is_some_and(closure_field_in_expr)
                        || closure_field_in_block(&c.body)
                })
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            closure_field_in_block(block)
                || handler.as_deref().is_some_and(closure_field_in_block)
                || finalizer.as_deref().is_some_and(closure_field_in_block)
        }
        Stmt::Block(body) => closure_field_in_block(body),
        Stmt::Function(function) => closure_field_in_block(&function.body),
        Stmt::Break | Stmt::Continue => false,
    })
}

#[cfg(test)]
mod tests;
