//! Resolved declaration tree handed over by the TypeScript front end
//!
//! The front end owns parsing and identifier resolution. What arrives here
//! is one [`SourceUnit`] per file: its path relative to the source root, the
//! resolved import table and the ordered list of exported declarations.
//! Everything derives `Deserialize` so units can be read from the
//! `*.ast.json` files the front end writes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 1-based position of a declaration in its source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// One input file. Immutable once handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: PathBuf,
    #[serde(default)]
    pub imports: Vec<ImportBinding>,
    pub exports: Vec<Declaration>,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, exports: Vec<Declaration>) -> Self {
        Self {
            path: path.into(),
            imports: Vec::new(),
            exports,
        }
    }

    /// Parse one `*.ast.json` document
    pub fn from_json(json: &str) -> Result<Self, crate::error::CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_import(mut self, binding: ImportBinding) -> Self {
        self.imports.push(binding);
        self
    }

    /// Path with `/` separators, used in diagnostics and generated headers
    pub fn display_path(&self) -> String {
        display_path(&self.path)
    }
}

/// Render a relative path with forward slashes on every platform
pub fn display_path(path: &std::path::Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// A resolved import: local binding name, name exported by the module, and
/// the module itself. Project modules are given as source-root relative
/// paths (`models/User.ts`); anything else is an external package specifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    pub local: String,
    #[serde(default)]
    pub imported: Option<String>,
    pub module: String,
}

impl ImportBinding {
    pub fn new(local: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            imported: None,
            module: module.into(),
        }
    }

    /// Name of the symbol in the exporting module
    pub fn imported_name(&self) -> &str {
        self.imported.as_deref().unwrap_or(&self.local)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "declaration", rename_all = "camelCase")]
pub enum Declaration {
    Class(ClassDecl),
    Function(FunctionDecl),
    Variable(VariableDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Class(c) => &c.name,
            Declaration::Function(f) => &f.name,
            Declaration::Variable(v) => &v.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Class(c) => c.span,
            Declaration::Function(f) => f.span,
            Declaration::Variable(v) => v.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub extends: Option<TypeRef>,
    #[serde(default)]
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub is_async: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VarKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    #[serde(default)]
    pub span: Span,
    pub kind: VarKind,
    #[serde(default)]
    pub ty: Option<TypeRef>,
    #[serde(default)]
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "member", rename_all = "camelCase")]
pub enum ClassMember {
    Property(PropertyDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    Accessor(AccessorDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub ty: Option<TypeRef>,
    #[serde(default)]
    pub init: Option<Expr>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_readonly: bool,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorDecl {
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessorKind {
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessorDecl {
    pub name: String,
    #[serde(default)]
    pub span: Span,
    pub accessor: AccessorKind,
    #[serde(default)]
    pub is_static: bool,
}

/// Constructor parameter property modifier (`constructor(private x: T)`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamProperty {
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub ty: Option<TypeRef>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default: Option<Expr>,
    #[serde(default)]
    pub property: Option<ParamProperty>,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
            optional: false,
            default: None,
            property: None,
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            optional: false,
            default: None,
            property: None,
        }
    }

    pub fn as_property(mut self, visibility: Visibility, readonly: bool) -> Self {
        self.property = Some(ParamProperty {
            visibility,
            readonly,
        });
        self
    }
}

/// Declared source type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum TypeRef {
    Number,
    String,
    Boolean,
    Null,
    Undefined,
    Void,
    Any,
    Unknown,
    Array(Box<TypeRef>),
    Named { name: String, args: Vec<TypeRef> },
    Union(Vec<TypeRef>),
    StringLiteral(String),
    NumberLiteral(f64),
    Function { params: Vec<TypeRef>, ret: Box<TypeRef> },
    Object(Vec<TypeMember>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args,
        }
    }

    pub fn array(elem: TypeRef) -> Self {
        TypeRef::Array(Box::new(elem))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMember {
    pub name: String,
    pub ty: TypeRef,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum Stmt {
    VarDecl {
        kind: VarKind,
        name: String,
        ty: Option<TypeRef>,
        init: Option<Expr>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Vec<Stmt>,
    },
    ForOf {
        name: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    ForIn {
        name: String,
        object: Expr,
        body: Vec<Stmt>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Try {
        block: Vec<Stmt>,
        catch_param: Option<String>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Throw(Expr),
    Break,
    Continue,
    Block(Vec<Stmt>),
    Function(FunctionDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for the `default:` clause
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    StrictEq,
    NotEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
    Nullish,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    NullishAssign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProp {
    pub key: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum Expr {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    This,
    Super,
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        arg: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        #[serde(default)]
        type_args: Vec<TypeRef>,
        args: Vec<Expr>,
    },
    New {
        class: String,
        #[serde(default)]
        type_args: Vec<TypeRef>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Array(Vec<Expr>),
    Object(Vec<ObjectProp>),
    TypeOf(Box<Expr>),
    InstanceOf {
        expr: Box<Expr>,
        class: String,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Await(Box<Expr>),
    Arrow {
        params: Vec<Param>,
        return_type: Option<TypeRef>,
        body: ArrowBody,
        #[serde(default)]
        is_async: bool,
    },
    As {
        expr: Box<Expr>,
        ty: TypeRef,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::String(value.into())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: property.into(),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            type_args: Vec::new(),
            args,
        }
    }

    pub fn new_object(class: impl Into<String>, type_args: Vec<TypeRef>, args: Vec<Expr>) -> Self {
        Expr::New {
            class: class.into(),
            type_args,
            args,
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign {
            op: AssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    /// Arrow functions, the only function-valued expression form
    pub fn is_function(&self) -> bool {
        matches!(self, Expr::Arrow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_deserializes_from_front_end_json() {
        let json = r#"{
            "path": "utils/math.ts",
            "imports": [{ "local": "User", "module": "models/User.ts" }],
            "exports": [
                {
                    "declaration": "function",
                    "name": "add",
                    "params": [{ "name": "a", "ty": { "kind": "number" } }],
                    "return_type": { "kind": "number" },
                    "body": [
                        { "kind": "return", "data": { "kind": "ident", "data": "a" } }
                    ]
                }
            ]
        }"#;
        let unit = SourceUnit::from_json(json).unwrap();
        assert_eq!(unit.display_path(), "utils/math.ts");
        assert_eq!(unit.imports[0].imported_name(), "User");
        match &unit.exports[0] {
            Declaration::Function(f) => {
                assert_eq!(f.name, "add");
                assert_eq!(f.params[0].ty, Some(TypeRef::Number));
                assert_eq!(f.body, vec![Stmt::Return(Some(Expr::ident("a")))]);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_declaration_accessors() {
        let decl = Declaration::Variable(VariableDecl {
            name: "PI".to_string(),
            span: Span::new(3, 14),
            kind: VarKind::Const,
            ty: None,
            init: Some(Expr::Number(3.14)),
        });
        assert_eq!(decl.name(), "PI");
        assert_eq!(decl.span(), Span::new(3, 14));
    }

    #[test]
    fn test_only_arrows_are_functions() {
        let arrow = Expr::Arrow {
            params: vec![],
            return_type: None,
            body: ArrowBody::Expr(Box::new(Expr::Number(1.0))),
            is_async: false,
        };
        assert!(arrow.is_function());
        assert!(!Expr::call(arrow, vec![]).is_function());
        assert!(!Expr::ident("handler").is_function());
    }
}
