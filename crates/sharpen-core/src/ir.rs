//! Intermediate representation between the declaration tree and C# text

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::diagnostics::DiagnosticCode;
use crate::source::Span;
use crate::types::IrType;

/// Every file produced by a run, sorted by output path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrProgram {
    pub files: Vec<IrFile>,
}

impl IrProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, file: IrFile) {
        self.files.push(file);
    }

    /// Sort files so emission order never depends on visit order
    pub fn sort(&mut self) {
        self.files.sort_by(|a, b| a.output_path.cmp(&b.output_path));
    }
}

/// One output unit: exactly one class in one namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrFile {
    /// Source path relative to the source root, `/`-separated
    pub source_path: String,
    /// Output path relative to the output root
    pub output_path: PathBuf,
    pub namespace: String,
    pub class: IrClass,
    /// Namespaces this file refers to, feeding the using block
    pub references: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Regular,
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrClass {
    pub name: String,
    pub namespace: String,
    pub kind: ClassKind,
    pub type_params: Vec<String>,
    pub base: Option<IrType>,
    pub members: Vec<IrMember>,
    pub span: Span,
}

impl IrClass {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            kind,
            type_params: Vec::new(),
            base: None,
            members: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.kind == ClassKind::Static
    }

    /// Members rejected during lowering
    pub fn unsupported(&self) -> impl Iterator<Item = &UnsupportedMember> {
        self.members.iter().filter_map(|m| match m {
            IrMember::Unsupported(u) => Some(u),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn keyword(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

impl From<crate::source::Visibility> for Visibility {
    fn from(v: crate::source::Visibility) -> Self {
        match v {
            crate::source::Visibility::Public => Visibility::Public,
            crate::source::Visibility::Protected => Visibility::Protected,
            crate::source::Visibility::Private => Visibility::Private,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IrMember {
    Property(IrProperty),
    Method(IrMethod),
    Constructor(IrConstructor),
    NestedClass(Box<IrClass>),
    /// Positional record synthesized for a statically knowable object literal
    Record(IrRecord),
    /// A declaration that cannot be translated; skipped by the emitter with
    /// a diagnostic
    Unsupported(UnsupportedMember),
}

impl IrMember {
    pub fn name(&self) -> &str {
        match self {
            IrMember::Property(p) => &p.name,
            IrMember::Method(m) => &m.name,
            IrMember::Constructor(_) => "constructor",
            IrMember::NestedClass(c) => &c.name,
            IrMember::Record(r) => &r.name,
            IrMember::Unsupported(u) => &u.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrProperty {
    pub name: String,
    pub ty: IrType,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_readonly: bool,
    pub init: Option<IrExpression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrParam {
    pub name: String,
    /// `None` only for lambda parameters left to C# inference
    pub ty: Option<IrType>,
    pub default: Option<IrExpression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrMethod {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_async: bool,
    pub type_params: Vec<String>,
    pub params: Vec<IrParam>,
    pub return_type: IrType,
    pub body: Vec<IrStatement>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrConstructor {
    pub visibility: Visibility,
    pub params: Vec<IrParam>,
    /// Arguments of a leading `super(...)` call, emitted as `: base(...)`
    pub base_args: Option<Vec<IrExpression>>,
    pub body: Vec<IrStatement>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrRecord {
    pub name: String,
    pub fields: Vec<(String, IrType)>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsupportedMember {
    pub name: String,
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrStatement {
    /// Local declaration; `ty: None` emits `var`
    Local {
        name: String,
        ty: Option<IrType>,
        init: Option<IrExpression>,
    },
    Expr(IrExpression),
    Return(Option<IrExpression>),
    If {
        cond: IrExpression,
        then: Vec<IrStatement>,
        otherwise: Option<Vec<IrStatement>>,
    },
    While {
        cond: IrExpression,
        body: Vec<IrStatement>,
    },
    DoWhile {
        body: Vec<IrStatement>,
        cond: IrExpression,
    },
    For {
        init: Option<Box<IrStatement>>,
        test: Option<IrExpression>,
        update: Option<IrExpression>,
        body: Vec<IrStatement>,
    },
    ForEach {
        name: String,
        iterable: IrExpression,
        body: Vec<IrStatement>,
    },
    Switch {
        discriminant: IrExpression,
        sections: Vec<IrSwitchSection>,
    },
    Try {
        block: Vec<IrStatement>,
        catch: Option<IrCatch>,
        finally: Option<Vec<IrStatement>>,
    },
    Throw(IrExpression),
    Break,
    Continue,
    /// `goto case X;` or `goto default;` (label `None`)
    GotoCase(Option<IrExpression>),
    Block(Vec<IrStatement>),
    LocalFunction(Box<IrMethod>),
}

impl IrStatement {
    /// True when control never falls off the end of this statement
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            IrStatement::Return(_)
                | IrStatement::Throw(_)
                | IrStatement::Break
                | IrStatement::Continue
                | IrStatement::GotoCase(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrSwitchSection {
    /// `None` is the `default:` label
    pub labels: Vec<Option<IrExpression>>,
    pub body: Vec<IrStatement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrCatch {
    pub name: Option<String>,
    pub body: Vec<IrStatement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrLiteral {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
    Coalesce,
}

impl IrBinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            IrBinaryOp::Add => "+",
            IrBinaryOp::Sub => "-",
            IrBinaryOp::Mul => "*",
            IrBinaryOp::Div => "/",
            IrBinaryOp::Mod => "%",
            IrBinaryOp::Eq => "==",
            IrBinaryOp::NotEq => "!=",
            IrBinaryOp::Lt => "<",
            IrBinaryOp::Gt => ">",
            IrBinaryOp::LtEq => "<=",
            IrBinaryOp::GtEq => ">=",
            IrBinaryOp::And => "&&",
            IrBinaryOp::Or => "||",
            IrBinaryOp::Coalesce => "??",
        }
    }

    /// C# binding strength, higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            IrBinaryOp::Mul | IrBinaryOp::Div | IrBinaryOp::Mod => 12,
            IrBinaryOp::Add | IrBinaryOp::Sub => 11,
            IrBinaryOp::Lt | IrBinaryOp::Gt | IrBinaryOp::LtEq | IrBinaryOp::GtEq => 9,
            IrBinaryOp::Eq | IrBinaryOp::NotEq => 8,
            IrBinaryOp::And => 4,
            IrBinaryOp::Or => 3,
            IrBinaryOp::Coalesce => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrUnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrUpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrAssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    CoalesceAssign,
}

impl IrAssignOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            IrAssignOp::Assign => "=",
            IrAssignOp::AddAssign => "+=",
            IrAssignOp::SubAssign => "-=",
            IrAssignOp::MulAssign => "*=",
            IrAssignOp::DivAssign => "/=",
            IrAssignOp::ModAssign => "%=",
            IrAssignOp::CoalesceAssign => "??=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrTemplatePart {
    Text(String),
    Expr(IrExpression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrLambdaBody {
    Expr(Box<IrExpression>),
    Block(Vec<IrStatement>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrExpression {
    Literal(IrLiteral),
    /// `default(T)` or the target-typed `default`
    Default(Option<IrType>),
    Ident(String),
    /// A type used as a receiver (`Math.Floor`, `Console.WriteLine`)
    TypeName(IrType),
    This,
    Base,
    Binary {
        op: IrBinaryOp,
        left: Box<IrExpression>,
        right: Box<IrExpression>,
    },
    Unary {
        op: IrUnaryOp,
        operand: Box<IrExpression>,
    },
    Update {
        op: IrUpdateOp,
        prefix: bool,
        operand: Box<IrExpression>,
    },
    Assign {
        op: IrAssignOp,
        target: Box<IrExpression>,
        value: Box<IrExpression>,
    },
    Call {
        callee: Box<IrExpression>,
        type_args: Vec<IrType>,
        args: Vec<IrExpression>,
    },
    New {
        ty: IrType,
        args: Vec<IrExpression>,
    },
    Member {
        object: Box<IrExpression>,
        name: String,
    },
    Index {
        object: Box<IrExpression>,
        index: Box<IrExpression>,
    },
    Template(Vec<IrTemplatePart>),
    Array {
        elem: IrType,
        items: Vec<IrExpression>,
    },
    /// Dynamic-property container initializer: `new JsObject { ["k"] = v }`
    Object(Vec<(String, IrExpression)>),
    /// `expr is T`
    TypeTest {
        expr: Box<IrExpression>,
        ty: IrType,
    },
    Conditional {
        test: Box<IrExpression>,
        then: Box<IrExpression>,
        otherwise: Box<IrExpression>,
    },
    Await(Box<IrExpression>),
    Lambda {
        params: Vec<IrParam>,
        body: IrLambdaBody,
        is_async: bool,
    },
    Cast {
        expr: Box<IrExpression>,
        ty: IrType,
    },
}

impl IrExpression {
    pub fn number(value: f64) -> Self {
        IrExpression::Literal(IrLiteral::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        IrExpression::Literal(IrLiteral::String(value.into()))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        IrExpression::Ident(name.into())
    }

    pub fn member(object: IrExpression, name: impl Into<String>) -> Self {
        IrExpression::Member {
            object: Box::new(object),
            name: name.into(),
        }
    }

    pub fn call(callee: IrExpression, args: Vec<IrExpression>) -> Self {
        IrExpression::Call {
            callee: Box::new(callee),
            type_args: Vec::new(),
            args,
        }
    }

    /// `Type.method(args)` on a static receiver
    pub fn static_call(receiver: IrType, method: &str, args: Vec<IrExpression>) -> Self {
        Self::call(Self::member(IrExpression::TypeName(receiver), method), args)
    }

    pub fn binary(op: IrBinaryOp, left: IrExpression, right: IrExpression) -> Self {
        IrExpression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn assign(target: IrExpression, value: IrExpression) -> Self {
        IrExpression::Assign {
            op: IrAssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
        }
    }
}
