//! C# static types and the mapping from declared TypeScript types
//!
//! The mapper never narrows numbers: every `number` is a `double`, so
//! arithmetic keeps the single-number-type semantics of the source.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::monomorphize::{canonical_name, Instantiation};
use crate::source::{Expr, TypeRef};
use crate::symbols::ClassRef;

/// Namespace holding `Task`
pub const TASKS_NAMESPACE: &str = "System.Threading.Tasks";
/// Namespace holding `Dictionary` and `HashSet`
pub const COLLECTIONS_NAMESPACE: &str = "System.Collections.Generic";
/// Namespace holding `Func`, `Action`, `Math`, `Console` and `Exception`
pub const SYSTEM_NAMESPACE: &str = "System";

/// A C# type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IrType {
    Double,
    String,
    Bool,
    Object,
    Void,
    /// `T?`
    Nullable(Box<IrType>),
    /// Runtime array, `JsArray<T>`
    Array(Box<IrType>),
    /// `Task` or `Task<T>`
    Task(Option<Box<IrType>>),
    Dictionary(Box<IrType>, Box<IrType>),
    Set(Box<IrType>),
    Func(Vec<IrType>, Box<IrType>),
    Action(Vec<IrType>),
    /// Runtime dynamic-property container
    JsObject,
    TypeParam(String),
    /// A class, optionally generic; `namespace` is what a using needs
    Named {
        name: String,
        namespace: Option<String>,
        args: Vec<IrType>,
    },
}

impl IrType {
    pub fn named(name: impl Into<String>, namespace: Option<&str>) -> Self {
        IrType::Named {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            args: Vec::new(),
        }
    }

    pub fn system(name: &str) -> Self {
        Self::named(name, Some(SYSTEM_NAMESPACE))
    }

    pub fn array(elem: IrType) -> Self {
        IrType::Array(Box::new(elem))
    }

    /// `T?`, collapsing repeated nullability and leaving `object` alone
    pub fn nullable(inner: IrType) -> Self {
        match inner {
            IrType::Nullable(_) | IrType::Object | IrType::JsObject => inner,
            other => IrType::Nullable(Box::new(other)),
        }
    }

    /// True when no type parameter occurs anywhere inside
    pub fn is_concrete(&self) -> bool {
        match self {
            IrType::TypeParam(_) => false,
            IrType::Nullable(t) | IrType::Array(t) | IrType::Set(t) => t.is_concrete(),
            IrType::Task(t) => t.as_ref().map_or(true, |t| t.is_concrete()),
            IrType::Dictionary(k, v) => k.is_concrete() && v.is_concrete(),
            IrType::Func(params, ret) => params.iter().all(Self::is_concrete) && ret.is_concrete(),
            IrType::Action(params) => params.iter().all(Self::is_concrete),
            IrType::Named { args, .. } => args.iter().all(Self::is_concrete),
            _ => true,
        }
    }

    pub fn substitute(&self, substitutions: &BTreeMap<String, IrType>) -> IrType {
        let sub = |t: &IrType| Box::new(t.substitute(substitutions));
        match self {
            IrType::TypeParam(name) => substitutions.get(name).cloned().unwrap_or_else(|| self.clone()),
            IrType::Nullable(t) => IrType::nullable(t.substitute(substitutions)),
            IrType::Array(t) => IrType::Array(sub(t)),
            IrType::Set(t) => IrType::Set(sub(t)),
            IrType::Task(t) => IrType::Task(t.as_ref().map(|t| sub(t))),
            IrType::Dictionary(k, v) => IrType::Dictionary(sub(k), sub(v)),
            IrType::Func(params, ret) => IrType::Func(
                params.iter().map(|p| p.substitute(substitutions)).collect(),
                sub(ret),
            ),
            IrType::Action(params) => {
                IrType::Action(params.iter().map(|p| p.substitute(substitutions)).collect())
            }
            IrType::Named {
                name,
                namespace,
                args,
            } => IrType::Named {
                name: name.clone(),
                namespace: namespace.clone(),
                args: args.iter().map(|a| a.substitute(substitutions)).collect(),
            },
            other => other.clone(),
        }
    }

    /// Name fragment used when this type is a generic argument
    ///
    /// Fragments use source-language names (`number`, `Array_string`) so a
    /// canonical name reads like the instantiation that produced it.
    pub fn canonical_fragment(&self) -> String {
        match self {
            IrType::Double => "number".to_string(),
            IrType::String => "string".to_string(),
            IrType::Bool => "boolean".to_string(),
            IrType::Object => "object".to_string(),
            IrType::Void => "void".to_string(),
            IrType::JsObject => "JsObject".to_string(),
            IrType::Nullable(t) => format!("Optional_{}", t.canonical_fragment()),
            IrType::Array(t) => format!("Array_{}", t.canonical_fragment()),
            IrType::Set(t) => format!("Set_{}", t.canonical_fragment()),
            IrType::Task(None) => "Promise_void".to_string(),
            IrType::Task(Some(t)) => format!("Promise_{}", t.canonical_fragment()),
            IrType::Dictionary(k, v) => {
                format!("Map_{}_{}", k.canonical_fragment(), v.canonical_fragment())
            }
            IrType::Func(..) | IrType::Action(_) => "Function".to_string(),
            IrType::TypeParam(name) => name.clone(),
            IrType::Named { name, args, .. } => {
                let base = name.replace('.', "_");
                if args.is_empty() {
                    base
                } else {
                    canonical_name(&base, args)
                }
            }
        }
    }

    /// Collect every namespace a using block needs for this type
    pub fn collect_namespaces(&self, out: &mut BTreeSet<String>) {
        match self {
            IrType::Nullable(t) | IrType::Array(t) => t.collect_namespaces(out),
            IrType::Set(t) => {
                out.insert(COLLECTIONS_NAMESPACE.to_string());
                t.collect_namespaces(out);
            }
            IrType::Dictionary(k, v) => {
                out.insert(COLLECTIONS_NAMESPACE.to_string());
                k.collect_namespaces(out);
                v.collect_namespaces(out);
            }
            IrType::Task(t) => {
                out.insert(TASKS_NAMESPACE.to_string());
                if let Some(t) = t {
                    t.collect_namespaces(out);
                }
            }
            IrType::Func(params, ret) => {
                out.insert(SYSTEM_NAMESPACE.to_string());
                params.iter().for_each(|p| p.collect_namespaces(out));
                ret.collect_namespaces(out);
            }
            IrType::Action(params) => {
                out.insert(SYSTEM_NAMESPACE.to_string());
                params.iter().for_each(|p| p.collect_namespaces(out));
            }
            IrType::Named {
                namespace, args, ..
            } => {
                if let Some(ns) = namespace {
                    out.insert(ns.clone());
                }
                args.iter().for_each(|a| a.collect_namespaces(out));
            }
            _ => {}
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, types: &[IrType]) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", ty)?;
    }
    Ok(())
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Double => write!(f, "double"),
            IrType::String => write!(f, "string"),
            IrType::Bool => write!(f, "bool"),
            IrType::Object => write!(f, "object"),
            IrType::Void => write!(f, "void"),
            IrType::JsObject => write!(f, "JsObject"),
            IrType::Nullable(t) => write!(f, "{}?", t),
            IrType::Array(t) => write!(f, "JsArray<{}>", t),
            IrType::Task(None) => write!(f, "Task"),
            IrType::Task(Some(t)) => write!(f, "Task<{}>", t),
            IrType::Dictionary(k, v) => write!(f, "Dictionary<{}, {}>", k, v),
            IrType::Set(t) => write!(f, "HashSet<{}>", t),
            IrType::Func(params, ret) => {
                write!(f, "Func<")?;
                write_list(f, params)?;
                if !params.is_empty() {
                    write!(f, ", ")?;
                }
                write!(f, "{}>", ret)
            }
            IrType::Action(params) if params.is_empty() => write!(f, "Action"),
            IrType::Action(params) => {
                write!(f, "Action<")?;
                write_list(f, params)?;
                write!(f, ">")
            }
            IrType::TypeParam(name) => write!(f, "{}", name),
            IrType::Named { name, args, .. } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    write_list(f, args)?;
                    write!(f, ">")?;
                }
                Ok(())
            }
        }
    }
}

/// Per-file type mapping context
///
/// Holds the type parameters in scope, the substitution applied while
/// materializing a generic instantiation, and the project classes visible
/// from the file. Every concrete instantiation of a project generic class is
/// recorded so the monomorphizer can emit it once.
#[derive(Debug, Clone, Default)]
pub struct TypeMapper {
    type_params: Vec<String>,
    substitutions: BTreeMap<String, IrType>,
    classes: BTreeMap<String, ClassRef>,
    instantiations: BTreeSet<Instantiation>,
}

impl TypeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_substitutions(mut self, substitutions: BTreeMap<String, IrType>) -> Self {
        self.substitutions = substitutions;
        self
    }

    /// Make a project class visible under a local name
    pub fn register_class(&mut self, local: impl Into<String>, class: ClassRef) {
        self.classes.insert(local.into(), class);
    }

    pub fn class(&self, local: &str) -> Option<&ClassRef> {
        self.classes.get(local)
    }

    pub fn push_type_params(&mut self, params: &[String]) {
        self.type_params.extend(params.iter().cloned());
    }

    pub fn pop_type_params(&mut self, count: usize) {
        let keep = self.type_params.len().saturating_sub(count);
        self.type_params.truncate(keep);
    }

    pub fn take_instantiations(&mut self) -> BTreeSet<Instantiation> {
        std::mem::take(&mut self.instantiations)
    }

    pub fn map(&mut self, ty: &TypeRef) -> IrType {
        match ty {
            TypeRef::Number | TypeRef::NumberLiteral(_) => IrType::Double,
            TypeRef::String | TypeRef::StringLiteral(_) => IrType::String,
            TypeRef::Boolean => IrType::Bool,
            TypeRef::Null | TypeRef::Undefined | TypeRef::Any | TypeRef::Unknown => IrType::Object,
            TypeRef::Void => IrType::Void,
            TypeRef::Array(elem) => IrType::array(self.map(elem)),
            TypeRef::Object(_) => IrType::JsObject,
            TypeRef::Function { params, ret } => {
                let params: Vec<IrType> = params.iter().map(|p| self.map(p)).collect();
                match self.map(ret) {
                    IrType::Void => IrType::Action(params),
                    ret => IrType::Func(params, Box::new(ret)),
                }
            }
            TypeRef::Union(members) => self.map_union(members),
            TypeRef::Named { name, args } => self.map_named(name, args),
        }
    }

    /// `T | undefined` and `T | null` become `T?`; literal unions collapse to
    /// their base type; anything heterogeneous is `object`
    fn map_union(&mut self, members: &[TypeRef]) -> IrType {
        let optional = members
            .iter()
            .any(|m| matches!(m, TypeRef::Undefined | TypeRef::Null));
        let mut mapped: Vec<IrType> = members
            .iter()
            .filter(|m| !matches!(m, TypeRef::Undefined | TypeRef::Null))
            .map(|m| self.map(m))
            .collect();
        mapped.dedup();

        let base = match mapped.as_slice() {
            [] => return IrType::Object,
            [single] => single.clone(),
            [first, rest @ ..] if rest.iter().all(|t| t == first) => first.clone(),
            _ => IrType::Object,
        };
        if optional {
            IrType::nullable(base)
        } else {
            base
        }
    }

    fn map_named(&mut self, name: &str, args: &[TypeRef]) -> IrType {
        if args.is_empty() {
            if let Some(bound) = self.substitutions.get(name) {
                return bound.clone();
            }
            if self.type_params.iter().any(|p| p == name) {
                return IrType::TypeParam(name.to_string());
            }
        }

        let mut mapped: Vec<IrType> = args.iter().map(|a| self.map(a)).collect();
        match (name, mapped.len()) {
            ("Array" | "ReadonlyArray", 1) => return IrType::Array(Box::new(mapped.remove(0))),
            ("Promise", 0) => return IrType::Task(None),
            ("Promise", 1) => {
                return match mapped.remove(0) {
                    IrType::Void => IrType::Task(None),
                    inner => IrType::Task(Some(Box::new(inner))),
                }
            }
            ("Map" | "Record", 2) => {
                let value = mapped.remove(1);
                let key = mapped.remove(0);
                return IrType::Dictionary(Box::new(key), Box::new(value));
            }
            ("Set", 1) => return IrType::Set(Box::new(mapped.remove(0))),
            ("Array", 0) => return IrType::array(IrType::Object),
            ("Map" | "Record", 0) => {
                return IrType::Dictionary(Box::new(IrType::Object), Box::new(IrType::Object))
            }
            ("Set", 0) => return IrType::Set(Box::new(IrType::Object)),
            ("Error", 0) => return IrType::system("Exception"),
            _ => {}
        }

        match self.classes.get(name).cloned() {
            Some(class) => self.class_type(&class, mapped),
            None => {
                tracing::debug!(name, "unresolved type reference mapped to object");
                IrType::Object
            }
        }
    }

    /// Reference a project class; fully concrete generic instantiations are
    /// replaced by their canonical monomorphized name
    pub fn class_type(&mut self, class: &ClassRef, args: Vec<IrType>) -> IrType {
        if class.type_params.is_empty() || args.is_empty() {
            return IrType::Named {
                name: class.csharp_name(),
                namespace: Some(class.namespace.clone()),
                args: Vec::new(),
            };
        }
        if args.iter().all(IrType::is_concrete) {
            let instantiation = Instantiation::new(class.clone(), args);
            let ty = IrType::named(instantiation.canonical.clone(), Some(&class.namespace));
            self.instantiations.insert(instantiation);
            ty
        } else {
            IrType::Named {
                name: class.csharp_name(),
                namespace: Some(class.namespace.clone()),
                args,
            }
        }
    }
}

/// Type of an initializer when no annotation is present
pub fn infer_literal(expr: &Expr) -> Option<IrType> {
    match expr {
        Expr::Number(_) => Some(IrType::Double),
        Expr::String(_) | Expr::Template { .. } => Some(IrType::String),
        Expr::Bool(_) => Some(IrType::Bool),
        Expr::Unary { arg, .. } => infer_literal(arg),
        Expr::Array(items) => {
            let mut elems = items.iter().map(infer_literal);
            let first = elems.next().flatten();
            let elem = match first {
                Some(t) if elems.all(|e| e.as_ref() == Some(&t)) => t,
                _ => IrType::Object,
            };
            Some(IrType::array(elem))
        }
        _ => None,
    }
}
