//! Expression lowering and the light inference used to pick static types

use crate::ir::{
    IrAssignOp, IrBinaryOp, IrExpression, IrLambdaBody, IrLiteral, IrTemplatePart, IrUnaryOp,
    IrUpdateOp,
};
use crate::naming::to_pascal_case;
use crate::source::{ArrowBody, AssignOp, BinaryOp, Expr, ObjectProp, TypeRef, UnaryOp, UpdateOp};
use crate::types::{infer_literal, IrType};

use super::{Binding, Lowerer, ReturnContext};

/// String methods whose C# counterpart is not a plain PascalCase rename
const STRING_METHODS: &[(&str, &str)] = &[
    ("includes", "Contains"),
    ("toLowerCase", "ToLower"),
    ("toUpperCase", "ToUpper"),
    ("trimEnd", "TrimEnd"),
    ("trimStart", "TrimStart"),
];

impl Lowerer<'_> {
    /// Lower an expression; `expected` is the declared type of the slot the
    /// value flows into, when known
    pub(super) fn lower_expr(&mut self, expr: &Expr, expected: Option<&IrType>) -> IrExpression {
        match expr {
            Expr::Number(n) => IrExpression::number(*n),
            Expr::String(s) => IrExpression::string(s.clone()),
            Expr::Bool(b) => IrExpression::Literal(IrLiteral::Bool(*b)),
            Expr::Null => IrExpression::Literal(IrLiteral::Null),
            Expr::Undefined => IrExpression::Default(expected.filter(|t| **t != IrType::Object).cloned()),
            Expr::Ident(name) => self.lower_ident(name),
            Expr::This => IrExpression::This,
            Expr::Super => IrExpression::Base,
            Expr::Binary { op, left, right } => self.lower_binary(*op, left, right),
            Expr::Unary { op, arg } => self.lower_unary(*op, arg),
            Expr::Update { op, prefix, arg } => IrExpression::Update {
                op: match op {
                    UpdateOp::Increment => IrUpdateOp::Increment,
                    UpdateOp::Decrement => IrUpdateOp::Decrement,
                },
                prefix: *prefix,
                operand: Box::new(self.lower_expr(arg, None)),
            },
            Expr::Assign { op, target, value } => {
                let target_type = self.infer(target);
                IrExpression::Assign {
                    op: lower_assign_op(*op),
                    target: Box::new(self.lower_expr(target, None)),
                    value: Box::new(self.lower_expr(value, target_type.as_ref())),
                }
            }
            Expr::Call {
                callee,
                type_args,
                args,
            } => self.lower_call(callee, type_args, args),
            Expr::New {
                class,
                type_args,
                args,
            } => self.lower_new(class, type_args, args, expected),
            Expr::Member { object, property } => self.lower_member(object, property),
            Expr::Index { object, index } => IrExpression::Index {
                object: Box::new(self.lower_expr(object, None)),
                index: Box::new(self.lower_expr(index, None)),
            },
            Expr::Template { quasis, exprs } => self.lower_template(quasis, exprs),
            Expr::Array(items) => self.lower_array(items, expected),
            Expr::Object(props) => self.lower_object(props),
            Expr::TypeOf(arg) => {
                let runtime = self.runtime_type("JsRuntime");
                let arg = self.lower_expr(arg, None);
                IrExpression::static_call(runtime, "TypeOf", vec![arg])
            }
            Expr::InstanceOf { expr, class } => {
                let ty = self.class_type_by_name(class);
                IrExpression::TypeTest {
                    expr: Box::new(self.lower_expr(expr, None)),
                    ty,
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => IrExpression::Conditional {
                test: Box::new(self.lower_condition(test)),
                then: Box::new(self.lower_expr(consequent, expected)),
                otherwise: Box::new(self.lower_expr(alternate, expected)),
            },
            Expr::Await(inner) => IrExpression::Await(Box::new(self.lower_expr(inner, None))),
            Expr::Arrow {
                params,
                return_type,
                body,
                is_async,
            } => self.lower_arrow(params, return_type.as_ref(), body, *is_async),
            Expr::As { expr, ty } => {
                let ty = self.map_type(ty);
                IrExpression::Cast {
                    expr: Box::new(self.lower_expr(expr, None)),
                    ty,
                }
            }
        }
    }

    /// Lower an expression used as a condition. Anything not already boolean
    /// goes through JavaScript truthiness.
    pub(super) fn lower_condition(&mut self, expr: &Expr) -> IrExpression {
        match expr {
            Expr::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => IrExpression::binary(
                if *op == BinaryOp::And {
                    IrBinaryOp::And
                } else {
                    IrBinaryOp::Or
                },
                self.lower_condition(left),
                self.lower_condition(right),
            ),
            Expr::Unary {
                op: UnaryOp::Not,
                arg,
            } => IrExpression::Unary {
                op: IrUnaryOp::Not,
                operand: Box::new(self.lower_condition(arg)),
            },
            _ if self.infer(expr) == Some(IrType::Bool) => self.lower_expr(expr, None),
            _ => {
                let runtime = self.runtime_type("JsRuntime");
                let value = self.lower_expr(expr, None);
                IrExpression::static_call(runtime, "Truthy", vec![value])
            }
        }
    }

    fn lower_ident(&mut self, name: &str) -> IrExpression {
        if self.local(name).is_some() {
            return IrExpression::ident(name);
        }
        match self.bindings.get(name).cloned() {
            Some(Binding::Class(class)) => {
                let ty = self.types.class_type(&class, Vec::new());
                self.note_type(&ty);
                IrExpression::TypeName(ty)
            }
            Some(Binding::Member { container, member }) => {
                let ty = self.types.class_type(&container, Vec::new());
                self.note_type(&ty);
                IrExpression::member(IrExpression::TypeName(ty), member)
            }
            Some(Binding::Module(container)) => {
                let ty = self.types.class_type(&container, Vec::new());
                self.note_type(&ty);
                IrExpression::TypeName(ty)
            }
            Some(Binding::External { namespace, name }) => {
                self.references.insert(namespace);
                IrExpression::Ident(name)
            }
            None => match name {
                "NaN" => IrExpression::member(IrExpression::TypeName(IrType::Double), "NaN"),
                "Infinity" => IrExpression::member(
                    IrExpression::TypeName(IrType::Double),
                    "PositiveInfinity",
                ),
                "undefined" => IrExpression::Default(None),
                _ => IrExpression::ident(name),
            },
        }
    }

    /// True when `name` refers to the global of that name rather than a
    /// local or an import
    fn is_global(&self, expr: &Expr, global: &str) -> bool {
        matches!(expr, Expr::Ident(name) if name == global)
            && self.local(global).is_none()
            && !self.bindings.contains_key(global)
    }

    fn system_receiver(&mut self, name: &str) -> IrExpression {
        let ty = IrType::system(name);
        self.note_type(&ty);
        IrExpression::TypeName(ty)
    }

    fn lower_member(&mut self, object: &Expr, property: &str) -> IrExpression {
        if self.is_global(object, "Math") {
            let receiver = self.system_receiver("Math");
            return IrExpression::member(receiver, to_pascal_case(property));
        }
        if self.is_global(object, "console") {
            let receiver = self.system_receiver("Console");
            return IrExpression::member(receiver, to_pascal_case(property));
        }

        let receiver_type = self.infer(object);
        let lowered = self.lower_expr(object, None);
        let name = match (receiver_type, property) {
            (_, "length") => "Length".to_string(),
            (Some(IrType::String), _) => STRING_METHODS
                .iter()
                .find(|(js, _)| *js == property)
                .map(|(_, cs)| cs.to_string())
                .unwrap_or_else(|| to_pascal_case(property)),
            (Some(IrType::Array(_)), _) => to_pascal_case(property),
            _ => property.to_string(),
        };
        IrExpression::member(lowered, name)
    }

    fn lower_call(&mut self, callee: &Expr, type_args: &[TypeRef], args: &[Expr]) -> IrExpression {
        if let Expr::Member { object, property } = callee {
            if self.is_global(object, "console") {
                return self.lower_console(property, args);
            }
            if self.is_global(object, "Math") && property == "random" {
                let runtime = self.runtime_type("JsRuntime");
                return IrExpression::static_call(runtime, "Random", Vec::new());
            }
        }

        let callee = self.lower_expr(callee, None);
        let type_args = type_args.iter().map(|t| self.map_type(t)).collect();
        let args = args.iter().map(|a| self.lower_expr(a, None)).collect();
        IrExpression::Call {
            callee: Box::new(callee),
            type_args,
            args,
        }
    }

    /// `console.log(a, b)` → `Console.WriteLine(string.Join(" ", a, b))`
    fn lower_console(&mut self, method: &str, args: &[Expr]) -> IrExpression {
        let console = self.system_receiver("Console");
        let writer = match method {
            "error" | "warn" => IrExpression::member(console, "Error"),
            _ => console,
        };
        let mut lowered: Vec<IrExpression> = args.iter().map(|a| self.lower_expr(a, None)).collect();
        let args = if lowered.len() > 1 {
            lowered.insert(0, IrExpression::string(" "));
            vec![IrExpression::static_call(IrType::String, "Join", lowered)]
        } else {
            lowered
        };
        IrExpression::call(IrExpression::member(writer, "WriteLine"), args)
    }

    fn lower_new(
        &mut self,
        class: &str,
        type_args: &[TypeRef],
        args: &[Expr],
        expected: Option<&IrType>,
    ) -> IrExpression {
        let generic_without_args = type_args.is_empty()
            && self
                .types
                .class(class)
                .is_some_and(|c| c.is_generic());
        let ty = match expected {
            Some(expected @ IrType::Named { .. }) if generic_without_args => expected.clone(),
            _ => match class {
                "Error" | "TypeError" | "RangeError" => IrType::system("Exception"),
                "Map" | "Set" | "Array" | "Promise" => self.map_type(&TypeRef::Named {
                    name: class.to_string(),
                    args: type_args.to_vec(),
                }),
                _ if self.types.class(class).is_some() => self.map_type(&TypeRef::Named {
                    name: class.to_string(),
                    args: type_args.to_vec(),
                }),
                _ => IrType::named(class, None),
            },
        };
        let ty = match (ty, expected) {
            (IrType::Dictionary(..) | IrType::Set(_) | IrType::Array(_), Some(expected))
                if type_args.is_empty() =>
            {
                expected.clone()
            }
            (ty, _) => ty,
        };
        self.note_type(&ty);
        let args = args.iter().map(|a| self.lower_expr(a, None)).collect();
        IrExpression::New { ty, args }
    }

    fn class_type_by_name(&mut self, class: &str) -> IrType {
        let ty = if class == "Error" || self.types.class(class).is_some() {
            self.types.map(&TypeRef::named(class))
        } else {
            IrType::named(class, None)
        };
        self.note_type(&ty);
        ty
    }

    fn lower_template(&mut self, quasis: &[String], exprs: &[Expr]) -> IrExpression {
        let mut parts = Vec::with_capacity(quasis.len() + exprs.len());
        for (i, quasi) in quasis.iter().enumerate() {
            if !quasi.is_empty() {
                parts.push(IrTemplatePart::Text(quasi.clone()));
            }
            if let Some(expr) = exprs.get(i) {
                parts.push(IrTemplatePart::Expr(self.lower_expr(expr, None)));
            }
        }
        IrExpression::Template(parts)
    }

    fn lower_array(&mut self, items: &[Expr], expected: Option<&IrType>) -> IrExpression {
        let elem = match expected {
            Some(IrType::Array(elem)) => (**elem).clone(),
            _ => match self.infer(&Expr::Array(items.to_vec())) {
                Some(IrType::Array(elem)) => *elem,
                _ => IrType::Object,
            },
        };
        self.note_type(&elem);
        let items = items.iter().map(|i| self.lower_expr(i, Some(&elem))).collect();
        IrExpression::Array { elem, items }
    }

    fn lower_object(&mut self, props: &[ObjectProp]) -> IrExpression {
        IrExpression::Object(
            props
                .iter()
                .map(|p| (p.key.clone(), self.lower_expr(&p.value, None)))
                .collect(),
        )
    }

    fn lower_arrow(
        &mut self,
        params: &[crate::source::Param],
        return_type: Option<&TypeRef>,
        body: &ArrowBody,
        is_async: bool,
    ) -> IrExpression {
        self.push_scope();
        let typed = params.iter().all(|p| p.ty.is_some());
        let mut lowered = self.lower_params(params);
        if !typed {
            for param in &mut lowered {
                param.ty = None;
                param.default = None;
            }
        }
        let declared = return_type.map(|t| self.map_type(t));
        self.returns.push(ReturnContext {
            declared,
            observed: Vec::new(),
        });
        let body = match body {
            ArrowBody::Expr(expr) => IrLambdaBody::Expr(Box::new(self.lower_expr(expr, None))),
            ArrowBody::Block(statements) => IrLambdaBody::Block(self.lower_block(statements)),
        };
        self.returns.pop();
        self.pop_scope();
        IrExpression::Lambda {
            params: lowered,
            body,
            is_async,
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> IrExpression {
        if let Some(test) = self.lower_type_test(op, left, right) {
            return test;
        }

        let ir_op = match op {
            BinaryOp::Add => IrBinaryOp::Add,
            BinaryOp::Sub => IrBinaryOp::Sub,
            BinaryOp::Mul => IrBinaryOp::Mul,
            BinaryOp::Div => IrBinaryOp::Div,
            BinaryOp::Mod => IrBinaryOp::Mod,
            // strict and loose equality collapse to one operator
            BinaryOp::Eq | BinaryOp::StrictEq => IrBinaryOp::Eq,
            BinaryOp::NotEq | BinaryOp::StrictNotEq => IrBinaryOp::NotEq,
            BinaryOp::Lt => IrBinaryOp::Lt,
            BinaryOp::Gt => IrBinaryOp::Gt,
            BinaryOp::LtEq => IrBinaryOp::LtEq,
            BinaryOp::GtEq => IrBinaryOp::GtEq,
            BinaryOp::Nullish => IrBinaryOp::Coalesce,
            BinaryOp::And | BinaryOp::Or => {
                let both_bool = self.infer(left) == Some(IrType::Bool)
                    && self.infer(right) == Some(IrType::Bool);
                match (op, both_bool) {
                    (BinaryOp::And, true) => IrBinaryOp::And,
                    (_, true) => IrBinaryOp::Or,
                    (BinaryOp::And, false) => return self.helper_call("JsRuntime", "And", left, right),
                    (_, false) => return self.helper_call("JsRuntime", "Or", left, right),
                }
            }
            BinaryOp::Exp => {
                let math = self.system_receiver("Math");
                let args = vec![self.lower_expr(left, None), self.lower_expr(right, None)];
                return IrExpression::call(IrExpression::member(math, "Pow"), args);
            }
            // C# has no bitwise operators on double
            BinaryOp::BitAnd => return self.helper_call("JsOps", "BitAnd", left, right),
            BinaryOp::BitOr => return self.helper_call("JsOps", "BitOr", left, right),
            BinaryOp::BitXor => return self.helper_call("JsOps", "BitXor", left, right),
            BinaryOp::Shl => return self.helper_call("JsOps", "Shl", left, right),
            BinaryOp::Shr => return self.helper_call("JsOps", "Shr", left, right),
            BinaryOp::UShr => return self.helper_call("JsOps", "UShr", left, right),
        };

        let absent = |e: &Expr| matches!(e, Expr::Null | Expr::Undefined);
        let compares_absent =
            matches!(ir_op, IrBinaryOp::Eq | IrBinaryOp::NotEq) && (absent(left) || absent(right));
        let lower_side = |this: &mut Self, e: &Expr| {
            if compares_absent && absent(e) {
                IrExpression::Literal(IrLiteral::Null)
            } else {
                this.lower_expr(e, None)
            }
        };
        let left = lower_side(self, left);
        let right = lower_side(self, right);
        IrExpression::binary(ir_op, left, right)
    }

    /// `Helper.Method(left, right)` on a runtime support class
    fn helper_call(&mut self, class: &str, method: &str, left: &Expr, right: &Expr) -> IrExpression {
        let receiver = self.runtime_type(class);
        let args = vec![self.lower_expr(left, None), self.lower_expr(right, None)];
        IrExpression::static_call(receiver, method, args)
    }

    /// `typeof x === "string"` → `x is string`
    fn lower_type_test(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Option<IrExpression> {
        let negate = match op {
            BinaryOp::Eq | BinaryOp::StrictEq => false,
            BinaryOp::NotEq | BinaryOp::StrictNotEq => true,
            _ => return None,
        };
        let (operand, tag) = match (left, right) {
            (Expr::TypeOf(operand), Expr::String(tag)) | (Expr::String(tag), Expr::TypeOf(operand)) => {
                (operand, tag.as_str())
            }
            _ => return None,
        };

        let test = match tag {
            "undefined" => IrExpression::binary(
                IrBinaryOp::Eq,
                self.lower_expr(operand, None),
                IrExpression::Literal(IrLiteral::Null),
            ),
            _ => {
                let ty = match tag {
                    "string" => IrType::String,
                    "number" => IrType::Double,
                    "boolean" => IrType::Bool,
                    "function" => IrType::system("Delegate"),
                    "object" => self.runtime_type("JsObject"),
                    _ => return None,
                };
                self.note_type(&ty);
                IrExpression::TypeTest {
                    expr: Box::new(self.lower_expr(operand, None)),
                    ty,
                }
            }
        };
        Some(if negate {
            IrExpression::Unary {
                op: IrUnaryOp::Not,
                operand: Box::new(test),
            }
        } else {
            test
        })
    }

    fn lower_unary(&mut self, op: UnaryOp, arg: &Expr) -> IrExpression {
        match op {
            UnaryOp::Not => IrExpression::Unary {
                op: IrUnaryOp::Not,
                operand: Box::new(self.lower_condition(arg)),
            },
            UnaryOp::Neg => IrExpression::Unary {
                op: IrUnaryOp::Neg,
                operand: Box::new(self.lower_expr(arg, None)),
            },
            UnaryOp::Plus if self.infer(arg) == Some(IrType::Double) => self.lower_expr(arg, None),
            UnaryOp::Plus => {
                let runtime = self.runtime_type("JsRuntime");
                let arg = self.lower_expr(arg, None);
                IrExpression::static_call(runtime, "ToNumber", vec![arg])
            }
            UnaryOp::BitNot => {
                let ops = self.runtime_type("JsOps");
                let arg = self.lower_expr(arg, None);
                IrExpression::static_call(ops, "BitNot", vec![arg])
            }
        }
    }

    /// Best-effort static type of a source expression
    pub(super) fn infer(&mut self, expr: &Expr) -> Option<IrType> {
        match expr {
            Expr::Number(_) | Expr::Update { .. } => Some(IrType::Double),
            Expr::String(_) | Expr::Template { .. } | Expr::TypeOf(_) => Some(IrType::String),
            Expr::Bool(_) | Expr::InstanceOf { .. } => Some(IrType::Bool),
            Expr::Ident(name) => match self.local(name) {
                Some(ty) => ty.cloned(),
                None if name == "NaN" || name == "Infinity" => Some(IrType::Double),
                None => None,
            },
            Expr::Member { object, property } => match (object.as_ref(), property.as_str()) {
                (Expr::This, field) => self.fields.get(field).cloned(),
                (_, "length") => Some(IrType::Double),
                (object, _) if self.is_global(object, "Math") => Some(IrType::Double),
                _ => None,
            },
            Expr::Binary { op, left, right } => match op {
                BinaryOp::Eq
                | BinaryOp::StrictEq
                | BinaryOp::NotEq
                | BinaryOp::StrictNotEq
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::LtEq
                | BinaryOp::GtEq => Some(IrType::Bool),
                BinaryOp::And | BinaryOp::Or => {
                    let l = self.infer(left);
                    if l == Some(IrType::Bool) && self.infer(right) == l {
                        l
                    } else {
                        None
                    }
                }
                BinaryOp::Add => {
                    let (l, r) = (self.infer(left), self.infer(right));
                    if l == Some(IrType::String) || r == Some(IrType::String) {
                        Some(IrType::String)
                    } else if l == Some(IrType::Double) && r == Some(IrType::Double) {
                        Some(IrType::Double)
                    } else {
                        None
                    }
                }
                BinaryOp::Nullish => self.infer(left),
                _ => Some(IrType::Double),
            },
            Expr::Unary { op, .. } => match op {
                UnaryOp::Not => Some(IrType::Bool),
                UnaryOp::Neg | UnaryOp::Plus | UnaryOp::BitNot => Some(IrType::Double),
            },
            Expr::Array(items) => {
                let mut elem: Option<IrType> = None;
                for item in items {
                    let ty = self.infer(item).unwrap_or(IrType::Object);
                    elem = match elem {
                        None => Some(ty),
                        Some(prev) if prev == ty => Some(prev),
                        Some(_) => Some(IrType::Object),
                    };
                }
                Some(IrType::array(elem.unwrap_or(IrType::Object)))
            }
            Expr::Object(_) => Some(self.runtime_type("JsObject")),
            Expr::New {
                class, type_args, ..
            } => match class.as_str() {
                "Error" | "TypeError" | "RangeError" => Some(IrType::system("Exception")),
                _ if self.types.class(class).is_some() || matches!(class.as_str(), "Map" | "Set") => {
                    Some(self.types.map(&TypeRef::Named {
                        name: class.clone(),
                        args: type_args.clone(),
                    }))
                }
                _ => None,
            },
            Expr::Conditional { consequent, .. } => self.infer(consequent),
            Expr::Await(inner) => match self.infer(inner) {
                Some(IrType::Task(Some(inner))) => Some(*inner),
                _ => None,
            },
            Expr::As { ty, .. } => Some(self.types.map(ty)),
            _ => infer_literal(expr),
        }
    }
}

fn lower_assign_op(op: AssignOp) -> IrAssignOp {
    match op {
        AssignOp::Assign => IrAssignOp::Assign,
        AssignOp::AddAssign => IrAssignOp::AddAssign,
        AssignOp::SubAssign => IrAssignOp::SubAssign,
        AssignOp::MulAssign => IrAssignOp::MulAssign,
        AssignOp::DivAssign => IrAssignOp::DivAssign,
        AssignOp::ModAssign => IrAssignOp::ModAssign,
        AssignOp::NullishAssign => IrAssignOp::CoalesceAssign,
    }
}
