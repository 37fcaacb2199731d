//! C# emitter
//!
//! Renders one [`IrFile`] into the text of one `.cs` file:
//! - a two-line header naming the source file and the generation time
//! - the using block, bucketed by [`UsingTracker`]
//! - a namespace block holding exactly one class
//!
//! Members the lowering rejected are skipped here with their diagnostic;
//! IR that could never come out of lowering is an [`CodegenError::InvalidIr`].

use std::fmt::Write;

use chrono::SecondsFormat;
use sharpen_core::config::TranspileConfig;
use sharpen_core::diagnostics::DiagnosticSink;
use sharpen_core::ir::{
    IrBinaryOp, IrCatch, IrClass, IrConstructor, IrExpression, IrFile, IrLambdaBody, IrLiteral,
    IrMember, IrMethod, IrParam, IrProperty, IrRecord, IrStatement, IrSwitchSection,
    IrTemplatePart, IrUnaryOp, IrUpdateOp,
};
use sharpen_core::naming::escape_identifier;
use sharpen_core::types::IrType;

use crate::usings::UsingTracker;
use crate::{Codegen, CodegenError, ErrorLocation};

/// Binding strength of expression forms that are not binary operators
const PREC_ASSIGN: u8 = 0;
const PREC_CONDITIONAL: u8 = 1;
const PREC_TYPE_TEST: u8 = 9;
const PREC_UNARY: u8 = 13;
const PREC_PRIMARY: u8 = 15;

const INDENT_SIZE: usize = 4;

/// C# code generator
pub struct CSharpEmitter<'a> {
    config: &'a TranspileConfig,
}

impl<'a> CSharpEmitter<'a> {
    pub fn new(config: &'a TranspileConfig) -> Self {
        Self { config }
    }

    fn indent(&self, level: usize) -> String {
        " ".repeat(level * INDENT_SIZE)
    }

    /// Render a whole file
    #[tracing::instrument(skip_all, fields(file = %file.source_path))]
    pub fn emit_file(
        &self,
        file: &IrFile,
        sink: &mut DiagnosticSink,
    ) -> Result<String, CodegenError> {
        sink.set_file_context(file.source_path.as_str());
        let mut output = String::new();

        writeln!(output, "// <auto-generated from=\"{}\" />", file.source_path)?;
        writeln!(
            output,
            "// Generated: {}",
            self.config
                .generated_at()
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        writeln!(output)?;

        let mut usings = UsingTracker::new(file.namespace.as_str(), self.config);
        usings.add_all(&file.references);
        for line in usings.lines() {
            writeln!(output, "{}", line)?;
        }
        writeln!(output)?;

        writeln!(output, "namespace {}", file.namespace)?;
        writeln!(output, "{{")?;
        self.emit_class(&mut output, file, &file.class, 1, sink)?;
        writeln!(output, "}}")?;

        tracing::debug!(bytes = output.len(), "emitted file");
        Ok(output)
    }

    fn emit_class(
        &self,
        output: &mut String,
        file: &IrFile,
        class: &IrClass,
        level: usize,
        sink: &mut DiagnosticSink,
    ) -> Result<(), CodegenError> {
        let indent = self.indent(level);
        let modifier = if class.is_static() { "static " } else { "" };
        write!(
            output,
            "{}public {}class {}{}",
            indent,
            modifier,
            escape_identifier(&class.name),
            type_params(&class.type_params)
        )?;
        if let Some(base) = &class.base {
            write!(output, " : {}", base)?;
        }
        writeln!(output)?;
        writeln!(output, "{}{{", indent)?;

        for unsupported in class.unsupported() {
            sink.error(
                unsupported.code,
                unsupported.span.line,
                unsupported.span.col,
                unsupported.message.as_str(),
            );
        }

        let mut first = true;
        for member in &class.members {
            if matches!(member, IrMember::Unsupported(_)) {
                continue;
            }
            self.check_member(file, class, member)?;

            if !first {
                writeln!(output)?;
            }
            first = false;

            match member {
                IrMember::Property(property) => self.emit_property(output, property, level + 1)?,
                IrMember::Method(method) => self.emit_method(output, method, level + 1, true)?,
                IrMember::Constructor(ctor) => {
                    self.emit_constructor(output, &class.name, ctor, level + 1)?
                }
                IrMember::NestedClass(nested) => {
                    self.emit_class(output, file, nested, level + 1, sink)?
                }
                IrMember::Record(record) => self.emit_record(output, record, level + 1)?,
                IrMember::Unsupported(_) => {}
            }
        }

        writeln!(output, "{}}}", indent)?;
        Ok(())
    }

    /// A static class can only hold static members and nested types
    fn check_member(
        &self,
        file: &IrFile,
        class: &IrClass,
        member: &IrMember,
    ) -> Result<(), CodegenError> {
        if !class.is_static() {
            return Ok(());
        }
        let problem = match member {
            IrMember::Constructor(_) => Some("static class declares a constructor"),
            IrMember::Property(p) if !p.is_static => Some("static class declares an instance property"),
            IrMember::Method(m) if !m.is_static => Some("static class declares an instance method"),
            _ => None,
        };
        match problem {
            Some(message) => Err(CodegenError::invalid_ir(
                ErrorLocation::new()
                    .in_namespace(file.namespace.as_str())
                    .in_class(class.name.as_str())
                    .in_member(member.name()),
                message,
            )),
            None => Ok(()),
        }
    }

    fn emit_property(
        &self,
        output: &mut String,
        property: &IrProperty,
        level: usize,
    ) -> Result<(), CodegenError> {
        let indent = self.indent(level);
        let name = escape_identifier(&property.name);
        let visibility = property.visibility.keyword();

        if property.is_static {
            let readonly = if property.is_readonly { "readonly " } else { "" };
            write!(
                output,
                "{}{} static {}{} {}",
                indent, visibility, readonly, property.ty, name
            )?;
            if let Some(init) = &property.init {
                write!(output, " = {}", self.expr(init, level)?)?;
            }
            writeln!(output, ";")?;
        } else {
            let accessors = if property.is_readonly {
                "{ get; }"
            } else {
                "{ get; set; }"
            };
            write!(
                output,
                "{}{} {} {} {}",
                indent, visibility, property.ty, name, accessors
            )?;
            if let Some(init) = &property.init {
                write!(output, " = {};", self.expr(init, level)?)?;
            }
            writeln!(output)?;
        }
        Ok(())
    }

    /// Methods and local functions; local functions carry no visibility
    fn emit_method(
        &self,
        output: &mut String,
        method: &IrMethod,
        level: usize,
        is_member: bool,
    ) -> Result<(), CodegenError> {
        let indent = self.indent(level);
        write!(output, "{}", indent)?;
        if is_member {
            write!(output, "{} ", method.visibility.keyword())?;
            if method.is_static {
                write!(output, "static ")?;
            }
        }
        if method.is_async {
            write!(output, "async ")?;
        }
        writeln!(
            output,
            "{} {}{}({})",
            method.return_type,
            escape_identifier(&method.name),
            type_params(&method.type_params),
            self.params(&method.params, level)?
        )?;
        self.emit_block(output, &method.body, level)
    }

    fn emit_constructor(
        &self,
        output: &mut String,
        class_name: &str,
        ctor: &IrConstructor,
        level: usize,
    ) -> Result<(), CodegenError> {
        let indent = self.indent(level);
        write!(
            output,
            "{}{} {}({})",
            indent,
            ctor.visibility.keyword(),
            escape_identifier(class_name),
            self.params(&ctor.params, level)?
        )?;
        if let Some(args) = &ctor.base_args {
            write!(output, " : base({})", self.args(args, level)?)?;
        }
        writeln!(output)?;
        self.emit_block(output, &ctor.body, level)
    }

    fn emit_record(
        &self,
        output: &mut String,
        record: &IrRecord,
        level: usize,
    ) -> Result<(), CodegenError> {
        let fields: Vec<String> = record
            .fields
            .iter()
            .map(|(name, ty)| format!("{} {}", ty, escape_identifier(name)))
            .collect();
        writeln!(
            output,
            "{}public record {}({});",
            self.indent(level),
            escape_identifier(&record.name),
            fields.join(", ")
        )?;
        Ok(())
    }

    fn params(&self, params: &[IrParam], level: usize) -> Result<String, CodegenError> {
        let mut rendered = Vec::with_capacity(params.len());
        for param in params {
            let ty = param.ty.clone().unwrap_or(IrType::Object);
            let mut text = format!("{} {}", ty, escape_identifier(&param.name));
            if let Some(default) = &param.default {
                write!(text, " = {}", self.expr(default, level)?)?;
            }
            rendered.push(text);
        }
        Ok(rendered.join(", "))
    }

    fn args(&self, args: &[IrExpression], level: usize) -> Result<String, CodegenError> {
        let rendered = args
            .iter()
            .map(|a| self.expr(a, level))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rendered.join(", "))
    }

    // ---- statements ----

    /// `{ ... }` with the opening brace on its own line at `level`
    fn emit_block(
        &self,
        output: &mut String,
        body: &[IrStatement],
        level: usize,
    ) -> Result<(), CodegenError> {
        let indent = self.indent(level);
        writeln!(output, "{}{{", indent)?;
        for stmt in body {
            self.emit_stmt(output, stmt, level + 1)?;
        }
        writeln!(output, "{}}}", indent)?;
        Ok(())
    }

    fn emit_stmt(
        &self,
        output: &mut String,
        stmt: &IrStatement,
        level: usize,
    ) -> Result<(), CodegenError> {
        let indent = self.indent(level);
        match stmt {
            IrStatement::Local { .. } | IrStatement::Expr(_) => {
                writeln!(output, "{}{};", indent, self.simple_stmt(stmt, level)?)?;
            }
            IrStatement::Return(None) => writeln!(output, "{}return;", indent)?,
            IrStatement::Return(Some(value)) => {
                writeln!(output, "{}return {};", indent, self.expr(value, level)?)?
            }
            IrStatement::If { .. } => {
                write!(output, "{}", indent)?;
                self.emit_if(output, stmt, level)?;
            }
            IrStatement::While { cond, body } => {
                writeln!(output, "{}while ({})", indent, self.expr(cond, level)?)?;
                self.emit_block(output, body, level)?;
            }
            IrStatement::DoWhile { body, cond } => {
                writeln!(output, "{}do", indent)?;
                self.emit_block(output, body, level)?;
                writeln!(output, "{}while ({});", indent, self.expr(cond, level)?)?;
            }
            IrStatement::For {
                init,
                test,
                update,
                body,
            } => {
                let init = match init {
                    Some(init) => self.simple_stmt(init, level)?,
                    None => String::new(),
                };
                let test = match test {
                    Some(test) => format!(" {}", self.expr(test, level)?),
                    None => String::new(),
                };
                let update = match update {
                    Some(update) => format!(" {}", self.expr(update, level)?),
                    None => String::new(),
                };
                writeln!(output, "{}for ({};{};{})", indent, init, test, update)?;
                self.emit_block(output, body, level)?;
            }
            IrStatement::ForEach {
                name,
                iterable,
                body,
            } => {
                writeln!(
                    output,
                    "{}foreach (var {} in {})",
                    indent,
                    escape_identifier(name),
                    self.expr(iterable, level)?
                )?;
                self.emit_block(output, body, level)?;
            }
            IrStatement::Switch {
                discriminant,
                sections,
            } => {
                writeln!(output, "{}switch ({})", indent, self.expr(discriminant, level)?)?;
                writeln!(output, "{}{{", indent)?;
                for section in sections {
                    self.emit_section(output, section, level + 1)?;
                }
                writeln!(output, "{}}}", indent)?;
            }
            IrStatement::Try {
                block,
                catch,
                finally,
            } => {
                writeln!(output, "{}try", indent)?;
                self.emit_block(output, block, level)?;
                if let Some(IrCatch { name, body }) = catch {
                    match name {
                        Some(name) => writeln!(
                            output,
                            "{}catch (Exception {})",
                            indent,
                            escape_identifier(name)
                        )?,
                        None => writeln!(output, "{}catch", indent)?,
                    }
                    self.emit_block(output, body, level)?;
                }
                if let Some(finally) = finally {
                    writeln!(output, "{}finally", indent)?;
                    self.emit_block(output, finally, level)?;
                }
            }
            IrStatement::Throw(value) => {
                writeln!(output, "{}throw {};", indent, self.expr(value, level)?)?
            }
            IrStatement::Break => writeln!(output, "{}break;", indent)?,
            IrStatement::Continue => writeln!(output, "{}continue;", indent)?,
            IrStatement::GotoCase(Some(label)) => {
                writeln!(output, "{}goto case {};", indent, self.expr(label, level)?)?
            }
            IrStatement::GotoCase(None) => writeln!(output, "{}goto default;", indent)?,
            IrStatement::Block(body) => self.emit_block(output, body, level)?,
            IrStatement::LocalFunction(function) => {
                self.emit_method(output, function, level, false)?
            }
        }
        Ok(())
    }

    /// Declarations and expression statements without their `;`, shared by
    /// `for` initializers
    fn simple_stmt(&self, stmt: &IrStatement, level: usize) -> Result<String, CodegenError> {
        match stmt {
            IrStatement::Local { name, ty, init } => {
                let name = escape_identifier(name);
                Ok(match (ty, init) {
                    (Some(ty), Some(init)) => format!("{} {} = {}", ty, name, self.expr(init, level)?),
                    (Some(ty), None) => format!("{} {}", ty, name),
                    (None, Some(init)) => format!("var {} = {}", name, self.expr(init, level)?),
                    (None, None) => format!("object {}", name),
                })
            }
            IrStatement::Expr(expr) => self.expr(expr, level),
            other => Err(CodegenError::invalid_ir(
                ErrorLocation::new(),
                format!("{:?} cannot appear in a for initializer", other),
            )),
        }
    }

    /// Writes from the `if` keyword on; the caller has written the indent
    fn emit_if(
        &self,
        output: &mut String,
        stmt: &IrStatement,
        level: usize,
    ) -> Result<(), CodegenError> {
        let IrStatement::If {
            cond,
            then,
            otherwise,
        } = stmt
        else {
            return self.emit_stmt(output, stmt, level);
        };
        let indent = self.indent(level);
        writeln!(output, "if ({})", self.expr(cond, level)?)?;
        self.emit_block(output, then, level)?;
        match otherwise.as_deref() {
            Some([nested @ IrStatement::If { .. }]) => {
                write!(output, "{}else ", indent)?;
                self.emit_if(output, nested, level)?;
            }
            Some(otherwise) => {
                writeln!(output, "{}else", indent)?;
                self.emit_block(output, otherwise, level)?;
            }
            None => {}
        }
        Ok(())
    }

    fn emit_section(
        &self,
        output: &mut String,
        section: &IrSwitchSection,
        level: usize,
    ) -> Result<(), CodegenError> {
        let indent = self.indent(level);
        for label in &section.labels {
            match label {
                Some(label) => writeln!(output, "{}case {}:", indent, self.expr(label, level)?)?,
                None => writeln!(output, "{}default:", indent)?,
            }
        }
        for stmt in &section.body {
            self.emit_stmt(output, stmt, level + 1)?;
        }
        Ok(())
    }

    // ---- expressions ----

    /// Render an expression; `level` is the indentation of the enclosing
    /// statement, used by block-bodied lambdas
    fn expr(&self, expr: &IrExpression, level: usize) -> Result<String, CodegenError> {
        Ok(match expr {
            IrExpression::Literal(literal) => literal_text(literal),
            IrExpression::Default(Some(ty)) => format!("default({})", ty),
            IrExpression::Default(None) => "default".to_string(),
            IrExpression::Ident(name) => escape_identifier(name),
            IrExpression::TypeName(ty) => ty.to_string(),
            IrExpression::This => "this".to_string(),
            IrExpression::Base => "base".to_string(),
            IrExpression::Binary { op, left, right } => {
                let prec = op.precedence();
                // `??` is right-associative, every other binary operator left
                let (left_min, right_min) = if *op == IrBinaryOp::Coalesce {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                format!(
                    "{} {} {}",
                    self.operand(left, left_min, level)?,
                    op.symbol(),
                    self.operand(right, right_min, level)?
                )
            }
            IrExpression::Unary { op, operand } => {
                let inner = self.operand(operand, PREC_UNARY, level)?;
                match op {
                    IrUnaryOp::Not => format!("!{}", inner),
                    IrUnaryOp::Neg if inner.starts_with('-') => format!("-({})", inner),
                    IrUnaryOp::Neg => format!("-{}", inner),
                }
            }
            IrExpression::Update {
                op,
                prefix,
                operand,
            } => {
                let symbol = match op {
                    IrUpdateOp::Increment => "++",
                    IrUpdateOp::Decrement => "--",
                };
                let inner = self.operand(operand, PREC_PRIMARY, level)?;
                if *prefix {
                    format!("{}{}", symbol, inner)
                } else {
                    format!("{}{}", inner, symbol)
                }
            }
            IrExpression::Assign { op, target, value } => format!(
                "{} {} {}",
                self.operand(target, PREC_CONDITIONAL, level)?,
                op.symbol(),
                self.operand(value, PREC_ASSIGN, level)?
            ),
            IrExpression::Call {
                callee,
                type_args,
                args,
            } => {
                let type_args = if type_args.is_empty() {
                    String::new()
                } else {
                    let list: Vec<String> = type_args.iter().map(ToString::to_string).collect();
                    format!("<{}>", list.join(", "))
                };
                format!(
                    "{}{}({})",
                    self.operand(callee, PREC_PRIMARY, level)?,
                    type_args,
                    self.args(args, level)?
                )
            }
            IrExpression::New { ty, args } => format!("new {}({})", ty, self.args(args, level)?),
            IrExpression::Member { object, name } => format!(
                "{}.{}",
                self.operand(object, PREC_PRIMARY, level)?,
                escape_identifier(name)
            ),
            IrExpression::Index { object, index } => format!(
                "{}[{}]",
                self.operand(object, PREC_PRIMARY, level)?,
                self.expr(index, level)?
            ),
            IrExpression::Template(parts) => self.template(parts, level)?,
            IrExpression::Array { elem, items } if items.is_empty() => {
                format!("new {}()", IrType::array(elem.clone()))
            }
            IrExpression::Array { elem, items } => format!(
                "new {} {{ {} }}",
                IrType::array(elem.clone()),
                self.args(items, level)?
            ),
            IrExpression::Object(props) if props.is_empty() => "new JsObject()".to_string(),
            IrExpression::Object(props) => {
                let mut entries = Vec::with_capacity(props.len());
                for (key, value) in props {
                    entries.push(format!(
                        "[{}] = {}",
                        string_literal(key),
                        self.expr(value, level)?
                    ));
                }
                format!("new JsObject {{ {} }}", entries.join(", "))
            }
            IrExpression::TypeTest { expr, ty } => {
                format!("{} is {}", self.operand(expr, PREC_TYPE_TEST, level)?, ty)
            }
            IrExpression::Conditional {
                test,
                then,
                otherwise,
            } => format!(
                "{} ? {} : {}",
                self.operand(test, PREC_CONDITIONAL + 1, level)?,
                self.operand(then, PREC_CONDITIONAL, level)?,
                self.operand(otherwise, PREC_CONDITIONAL, level)?
            ),
            IrExpression::Await(inner) => {
                format!("await {}", self.operand(inner, PREC_UNARY, level)?)
            }
            IrExpression::Lambda {
                params,
                body,
                is_async,
            } => self.lambda(params, body, *is_async, level)?,
            IrExpression::Cast { expr, ty } => {
                format!("({}){}", ty, self.operand(expr, PREC_UNARY, level)?)
            }
        })
    }

    /// Render `expr`, parenthesized when it binds looser than `min`
    fn operand(&self, expr: &IrExpression, min: u8, level: usize) -> Result<String, CodegenError> {
        let text = self.expr(expr, level)?;
        if precedence(expr) < min {
            Ok(format!("({})", text))
        } else {
            Ok(text)
        }
    }

    fn template(&self, parts: &[IrTemplatePart], level: usize) -> Result<String, CodegenError> {
        let mut text = String::from("$\"");
        for part in parts {
            match part {
                IrTemplatePart::Text(raw) => {
                    for c in escape_string(raw).chars() {
                        match c {
                            '{' => text.push_str("{{"),
                            '}' => text.push_str("}}"),
                            c => text.push(c),
                        }
                    }
                }
                // a bare `:` inside a hole starts a format specifier
                IrTemplatePart::Expr(expr) => {
                    write!(text, "{{{}}}", self.operand(expr, PREC_CONDITIONAL + 1, level)?)?
                }
            }
        }
        text.push('"');
        Ok(text)
    }

    fn lambda(
        &self,
        params: &[IrParam],
        body: &IrLambdaBody,
        is_async: bool,
        level: usize,
    ) -> Result<String, CodegenError> {
        let mut text = String::new();
        if is_async {
            text.push_str("async ");
        }
        if params.iter().all(|p| p.ty.is_some()) {
            let list: Vec<String> = params
                .iter()
                .map(|p| {
                    let ty = p.ty.as_ref().map(ToString::to_string).unwrap_or_default();
                    format!("{} {}", ty, escape_identifier(&p.name))
                })
                .collect();
            write!(text, "({})", list.join(", "))?;
        } else if let [single] = params {
            text.push_str(&escape_identifier(&single.name));
        } else {
            let list: Vec<String> = params.iter().map(|p| escape_identifier(&p.name)).collect();
            write!(text, "({})", list.join(", "))?;
        }
        text.push_str(" => ");

        match body {
            IrLambdaBody::Expr(expr) => text.push_str(&self.operand(expr, PREC_ASSIGN, level)?),
            IrLambdaBody::Block(stmts) => {
                text.push_str("{\n");
                for stmt in stmts {
                    self.emit_stmt(&mut text, stmt, level + 1)?;
                }
                write!(text, "{}}}", self.indent(level))?;
            }
        }
        Ok(text)
    }
}

impl Codegen for CSharpEmitter<'_> {
    fn generate(
        &mut self,
        file: &IrFile,
        sink: &mut DiagnosticSink,
    ) -> Result<String, CodegenError> {
        self.emit_file(file, sink)
    }
}

fn precedence(expr: &IrExpression) -> u8 {
    match expr {
        IrExpression::Assign { .. } | IrExpression::Lambda { .. } => PREC_ASSIGN,
        IrExpression::Conditional { .. } => PREC_CONDITIONAL,
        IrExpression::Binary { op, .. } => op.precedence(),
        IrExpression::TypeTest { .. } => PREC_TYPE_TEST,
        IrExpression::Unary { .. }
        | IrExpression::Cast { .. }
        | IrExpression::Await(_)
        | IrExpression::Update { prefix: true, .. } => PREC_UNARY,
        IrExpression::Literal(IrLiteral::Number(n)) if n.is_sign_negative() && !n.is_nan() => {
            PREC_UNARY
        }
        _ => PREC_PRIMARY,
    }
}

fn type_params(params: &[String]) -> String {
    if params.is_empty() {
        String::new()
    } else {
        format!("<{}>", params.join(", "))
    }
}

fn literal_text(literal: &IrLiteral) -> String {
    match literal {
        IrLiteral::Number(n) => number_literal(*n),
        IrLiteral::String(s) => string_literal(s),
        IrLiteral::Bool(b) => b.to_string(),
        IrLiteral::Null => "null".to_string(),
    }
}

/// A `double` literal; integral values keep a `.0` so C# never reads them as `int`
pub fn number_literal(value: f64) -> String {
    if value.is_nan() {
        return "double.NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 {
            "double.PositiveInfinity".to_string()
        } else {
            "double.NegativeInfinity".to_string()
        };
    }
    let text = value.to_string();
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{}.0", text)
    }
}

pub fn string_literal(value: &str) -> String {
    format!("\"{}\"", escape_string(value))
}

fn escape_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            c if c.is_control() => {
                let _ = write!(escaped, "\\u{:04x}", c as u32);
            }
            c => escaped.push(c),
        }
    }
    escaped
}
