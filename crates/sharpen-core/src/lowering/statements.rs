//! Statement lowering

use crate::ir::{IrCatch, IrExpression, IrStatement, IrSwitchSection, Visibility};
use crate::source::{Expr, Stmt, SwitchCase};
use crate::types::IrType;

use super::Lowerer;

impl Lowerer<'_> {
    pub(super) fn lower_block(&mut self, statements: &[Stmt]) -> Vec<IrStatement> {
        self.push_scope();
        let lowered = statements.iter().map(|s| self.lower_stmt(s)).collect();
        self.pop_scope();
        lowered
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> IrStatement {
        match stmt {
            Stmt::VarDecl { name, ty, init, .. } => {
                let declared = ty.as_ref().map(|t| self.map_type(t));
                let inferred = match (&declared, init) {
                    (Some(_), _) => None,
                    (None, Some(init)) => self.infer(init),
                    (None, None) => None,
                };
                let init_expr = init
                    .as_ref()
                    .map(|e| self.lower_expr(e, declared.as_ref().or(inferred.as_ref())));

                // `var` needs an initializer with a type C# can see
                let untyped_init = matches!(init, None | Some(Expr::Null | Expr::Undefined));
                let local_type = match (declared, untyped_init) {
                    (Some(ty), _) => Some(ty),
                    (None, true) => Some(IrType::Object),
                    (None, false) => None,
                };
                self.declare_local(name, local_type.clone().or(inferred));
                IrStatement::Local {
                    name: name.clone(),
                    ty: local_type,
                    init: init_expr,
                }
            }
            Stmt::Expr(expr) => IrStatement::Expr(self.lower_expr(expr, None)),
            Stmt::Return(value) => self.lower_return(value.as_ref()),
            Stmt::If {
                cond,
                then,
                otherwise,
            } => IrStatement::If {
                cond: self.lower_condition(cond),
                then: self.lower_block(then),
                otherwise: otherwise.as_ref().map(|o| self.lower_block(o)),
            },
            Stmt::While { cond, body } => IrStatement::While {
                cond: self.lower_condition(cond),
                body: self.lower_block(body),
            },
            Stmt::DoWhile { body, cond } => IrStatement::DoWhile {
                body: self.lower_block(body),
                cond: self.lower_condition(cond),
            },
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                self.push_scope();
                let init = init.as_ref().map(|s| Box::new(self.lower_stmt(s)));
                let test = test.as_ref().map(|t| self.lower_condition(t));
                let update = update.as_ref().map(|u| self.lower_expr(u, None));
                let body = self.lower_block(body);
                self.pop_scope();
                IrStatement::For {
                    init,
                    test,
                    update,
                    body,
                }
            }
            Stmt::ForOf {
                name,
                iterable,
                body,
            } => {
                let elem = match self.infer(iterable) {
                    Some(IrType::Array(elem)) => Some(*elem),
                    _ => None,
                };
                let iterable = self.lower_expr(iterable, None);
                self.push_scope();
                self.declare_local(name, elem);
                let body = self.lower_block(body);
                self.pop_scope();
                IrStatement::ForEach {
                    name: name.clone(),
                    iterable,
                    body,
                }
            }
            Stmt::ForIn { name, object, body } => {
                let runtime = self.runtime_type("JsRuntime");
                let object = self.lower_expr(object, None);
                self.push_scope();
                self.declare_local(name, Some(IrType::String));
                let body = self.lower_block(body);
                self.pop_scope();
                IrStatement::ForEach {
                    name: name.clone(),
                    iterable: IrExpression::static_call(runtime, "Keys", vec![object]),
                    body,
                }
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => IrStatement::Switch {
                discriminant: self.lower_expr(discriminant, None),
                sections: self.lower_switch(cases),
            },
            Stmt::Try {
                block,
                catch_param,
                handler,
                finalizer,
            } => {
                let block = self.lower_block(block);
                let catch = match (catch_param, handler) {
                    (name, Some(handler)) => {
                        self.push_scope();
                        if let Some(name) = name {
                            let exception = IrType::system("Exception");
                            self.note_type(&exception);
                            self.declare_local(name, Some(exception));
                        }
                        let body = self.lower_block(handler);
                        self.pop_scope();
                        Some(IrCatch {
                            name: name.clone(),
                            body,
                        })
                    }
                    (_, None) => None,
                };
                IrStatement::Try {
                    block,
                    catch,
                    finally: finalizer.as_ref().map(|f| self.lower_block(f)),
                }
            }
            Stmt::Throw(value) => self.lower_throw(value),
            Stmt::Break => IrStatement::Break,
            Stmt::Continue => IrStatement::Continue,
            Stmt::Block(body) => IrStatement::Block(self.lower_block(body)),
            Stmt::Function(function) => {
                let method = self.lower_function(function, Visibility::Private, false);
                self.declare_local(&function.name, None);
                IrStatement::LocalFunction(Box::new(method))
            }
        }
    }

    fn lower_return(&mut self, value: Option<&Expr>) -> IrStatement {
        let declared = self.returns.last().and_then(|r| r.declared.clone());
        let value = match (value, &declared) {
            (None, _) | (Some(Expr::Undefined), Some(IrType::Void)) => None,
            (Some(expr), _) => {
                if declared.is_none() {
                    let observed = self.infer(expr);
                    if let Some(context) = self.returns.last_mut() {
                        context.observed.push(observed);
                    }
                }
                Some(self.lower_expr(expr, declared.as_ref()))
            }
        };
        IrStatement::Return(value)
    }

    /// Throwing a primitive wraps it in the runtime error type
    fn lower_throw(&mut self, value: &Expr) -> IrStatement {
        let wrap = matches!(
            self.infer(value),
            Some(IrType::String | IrType::Double | IrType::Bool)
        );
        let lowered = self.lower_expr(value, None);
        if wrap {
            let error = self.runtime_type("JsError");
            IrStatement::Throw(IrExpression::New {
                ty: error,
                args: vec![lowered],
            })
        } else {
            IrStatement::Throw(lowered)
        }
    }

    /// Group empty fall-through cases into shared labels and make every
    /// section end in a jump, using `goto case` where the source falls
    /// through into the next case. `goto case` needs a constant, so falling
    /// into a case labelled by any other expression refuses the member.
    fn lower_switch(&mut self, cases: &[SwitchCase]) -> Vec<IrSwitchSection> {
        let mut sections: Vec<IrSwitchSection> = Vec::new();
        let mut labels = Vec::new();

        for case in cases {
            labels.push(case.test.as_ref().map(|t| self.lower_expr(t, None)));
            if !case.body.is_empty() {
                sections.push(IrSwitchSection {
                    labels: std::mem::take(&mut labels),
                    body: self.lower_block(&case.body),
                });
            }
        }
        if !labels.is_empty() {
            sections.push(IrSwitchSection {
                labels,
                body: vec![IrStatement::Break],
            });
        }

        let next_labels: Vec<Option<Option<IrExpression>>> = sections
            .iter()
            .skip(1)
            .map(|s| s.labels.first().cloned())
            .chain(std::iter::once(None))
            .collect();
        for (section, next) in sections.iter_mut().zip(next_labels) {
            if section.body.last().is_some_and(IrStatement::is_jump) {
                continue;
            }
            match next {
                Some(Some(label)) if !matches!(label, IrExpression::Literal(_)) => {
                    self.refused.push(
                        "switch falls through into a case whose label is not a constant"
                            .to_string(),
                    );
                    section.body.push(IrStatement::Break);
                }
                Some(label) => section.body.push(IrStatement::GotoCase(label)),
                None => section.body.push(IrStatement::Break),
            }
        }
        sections
    }
}
