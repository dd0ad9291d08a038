//! Code generation: compiling a function body against a parameter value.
//!
//! Structured as an abstract evaluator: every AST node yields a code
//! fragment plus a compile-time exemplar value, and the exemplar drives
//! all shape-dependent decisions (structural addressing, primitive
//! resolution, application dispatch). Compilation is a pure function of
//! (body, parameter value, environment): identical inputs always yield
//! identical trees, which is the property the equivalence gate of the
//! polymorphic call path depends on.

use std::rc::Rc;

use crate::ast::{ExprKind, Expression, Span};
use crate::code::{Code, PrimOp, Slot, Step};
use crate::env::Env;
use crate::error::{CompilerError, Result};
use crate::registry::{DefId, Registry};
use crate::scope::ScopeStack;
use crate::shape::{self, format_shape, nests_under};
use crate::specialize;
use crate::value::{shape_of, FnOrigin, Value};
use crate::{bail_unresolved_at, err_unresolved_at};

/// Bound on nested candidate compiles before a call site fails with
/// `SpecializationDepthExceeded` instead of recursing forever.
pub const MAX_SPECIALIZE_DEPTH: usize = 64;

/// The result of compiling one expression: a code fragment and the
/// compile-time exemplar value it would produce under the parameter
/// value the pass was given.
#[derive(Debug, Clone, PartialEq)]
pub struct Staged {
    pub code: Code,
    pub exemplar: Value,
}

/// The inputs of one compilation pass: the parameter binding and the
/// captured environment. Immutable for the duration of the pass.
struct Frame<'f> {
    param: &'f Value,
    env: &'f Rc<Env>,
}

/// Compiles function bodies against a registry of definitions.
pub struct CodeGenerator<'a> {
    registry: &'a Registry,
    /// Definitions whose own body is somewhere on the compile stack.
    /// Calls to these produce recursion markers instead of recursing.
    active: Vec<DefId>,
    /// Nested candidate-compile depth for the polymorphic call path.
    depth: usize,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self::with_active(registry, Vec::new())
    }

    /// Used by the registry for a definition's canonical pass, with the
    /// definition itself already marked active.
    pub(crate) fn with_active(registry: &'a Registry, active: Vec<DefId>) -> Self {
        CodeGenerator {
            registry,
            active,
            depth: 0,
        }
    }

    pub(crate) fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub(crate) fn is_active(&self, def: DefId) -> bool {
        self.active.contains(&def)
    }

    /// Compile a function body under a concrete parameter value.
    ///
    /// Pure: mutates neither the environment nor any previously
    /// produced code.
    pub fn compile(&mut self, body: &Expression, param: &Value, env: &Rc<Env>) -> Result<Staged> {
        let frame = Frame { param, env };
        let mut locals = ScopeStack::new();
        self.compile_expr(body, &frame, &mut locals)
    }

    /// Regenerate a definition's body for a polymorphic call site.
    /// Marks the definition active and enforces the depth bound.
    pub(crate) fn specialize_nested(
        &mut self,
        def: DefId,
        body: &Expression,
        param: &Value,
        env: &Rc<Env>,
        span: Span,
    ) -> Result<Staged> {
        if self.depth >= MAX_SPECIALIZE_DEPTH {
            return Err(CompilerError::SpecializationDepthExceeded(self.depth, Some(span)));
        }
        self.depth += 1;
        self.active.push(def);
        let result = self.compile(body, param, env);
        self.active.pop();
        self.depth -= 1;
        result
    }

    fn compile_expr(
        &mut self,
        expr: &Expression,
        frame: &Frame,
        locals: &mut ScopeStack<Staged>,
    ) -> Result<Staged> {
        let span = expr.h.span;
        match &expr.kind {
            ExprKind::Param => Ok(Staged {
                code: Code::Fetch {
                    root: Slot::Param,
                    path: vec![],
                },
                exemplar: frame.param.clone(),
            }),

            ExprKind::Literal(value) => Ok(Staged {
                code: Code::Inject(value.clone()),
                exemplar: value.clone(),
            }),

            ExprKind::Name(name) => {
                if let Some(staged) = locals.lookup(name) {
                    return Ok(staged.clone());
                }
                match frame.env.lookup(name) {
                    Some((slot, value)) => Ok(Staged {
                        code: Code::Fetch {
                            root: Slot::Capture(slot),
                            path: vec![],
                        },
                        exemplar: value.clone(),
                    }),
                    None => Err(err_unresolved_at!(span, "Unknown name '{}'", name)),
                }
            }

            ExprKind::PairOf(head, tail) => {
                let head = self.compile_expr(head, frame, locals)?;
                let tail = self.compile_expr(tail, frame, locals)?;
                Ok(Staged {
                    code: Code::Cons(Box::new(head.code), Box::new(tail.code)),
                    exemplar: Value::Pair(Box::new(head.exemplar), Box::new(tail.exemplar)),
                })
            }

            ExprKind::Head(inner) => self.compile_step(inner, Step::Head, span, frame, locals),
            ExprKind::Tail(inner) => self.compile_step(inner, Step::Tail, span, frame, locals),

            ExprKind::BinaryOp(op, lhs, rhs) => {
                let lhs = self.compile_expr(lhs, frame, locals)?;
                let rhs = self.compile_expr(rhs, frame, locals)?;
                let (prim, exemplar) = resolve_prim(&op.op, &lhs.exemplar, &rhs.exemplar, span)?;
                Ok(Staged {
                    code: Code::Prim {
                        op: prim,
                        lhs: Box::new(lhs.code),
                        rhs: Box::new(rhs.code),
                    },
                    exemplar,
                })
            }

            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.compile_expr(cond, frame, locals)?;
                if !matches!(cond.exemplar, Value::Truth(_)) {
                    bail_unresolved_at!(
                        span,
                        "Condition is shaped {}, not truth",
                        format_shape(&shape_of(&cond.exemplar))
                    );
                }
                let then_branch = self.compile_expr(then_branch, frame, locals)?;
                let else_branch = self.compile_expr(else_branch, frame, locals)?;
                // The then-branch exemplar stands for the whole
                // conditional; both branches are always compiled.
                Ok(Staged {
                    code: Code::Branch {
                        cond: Box::new(cond.code),
                        then_code: Box::new(then_branch.code),
                        else_code: Box::new(else_branch.code),
                    },
                    exemplar: then_branch.exemplar,
                })
            }

            ExprKind::Apply { func, arg } => {
                let func = self.compile_expr(func, frame, locals)?;
                let arg = self.compile_expr(arg, frame, locals)?;
                self.compile_apply(func, arg, span)
            }

            ExprKind::LetIn { name, value, body } => {
                let bound = self.compile_expr(value, frame, locals)?;
                locals.push_scope();
                locals.insert(name.clone(), bound);
                let result = self.compile_expr(body, frame, locals);
                locals.pop_scope();
                result
            }
        }
    }

    /// Structural addressing: take one step into a pair-shaped value.
    fn compile_step(
        &mut self,
        inner: &Expression,
        step: Step,
        span: Span,
        frame: &Frame,
        locals: &mut ScopeStack<Staged>,
    ) -> Result<Staged> {
        let base = self.compile_expr(inner, frame, locals)?;

        let exemplar = match (&base.exemplar, step) {
            (Value::Pair(head, _), Step::Head) => (**head).clone(),
            (Value::Pair(_, tail), Step::Tail) => (**tail).clone(),
            (other, _) => bail_unresolved_at!(
                span,
                "Cannot address the {} of a value shaped {}: the position does not exist",
                step,
                format_shape(&shape_of(other))
            ),
        };

        let code = match base.code {
            // Addressing an address extends its path.
            Code::Fetch { root, mut path } => {
                path.push(step);
                Code::Fetch { root, path }
            }
            // Addressing a construction or a literal selects the
            // component directly.
            Code::Cons(head, tail) => match step {
                Step::Head => *head,
                Step::Tail => *tail,
            },
            Code::Inject(Value::Pair(head, tail)) => match step {
                Step::Head => Code::Inject(*head),
                Step::Tail => Code::Inject(*tail),
            },
            // Anything computed keeps an explicit projection.
            other => Code::Project {
                base: Box::new(other),
                step,
            },
        };

        Ok(Staged { code, exemplar })
    }

    /// Application. Statically addressed defined functions go through
    /// the call-site resolver; everything else applicable is invoked
    /// positionally through its bound value.
    fn compile_apply(&mut self, func: Staged, arg: Staged, span: Span) -> Result<Staged> {
        if let Some(def) = static_callee(&func) {
            return specialize::resolve_call(self, def, arg, span);
        }

        match &func.exemplar {
            Value::Function(f) => {
                let (param_shape, result_shape) = shape::as_arrow(&f.shape).unwrap_or_else(|| {
                    panic!("BUG: function value with non-arrow shape {:?}", f.shape)
                });
                let actual = shape_of(&arg.exemplar);
                if !nests_under(&actual, param_shape) {
                    bail_unresolved_at!(
                        span,
                        "Cannot apply this function to a value shaped {}: it does not nest under {}",
                        format_shape(&actual),
                        format_shape(param_shape)
                    );
                }
                Ok(Staged {
                    code: Code::Invoke {
                        func: Box::new(func.code),
                        arg: Box::new(arg.code),
                    },
                    exemplar: shape::canonical_placeholder(result_shape),
                })
            }
            other => Err(err_unresolved_at!(
                span,
                "Cannot invoke a value shaped {}: the shape has no applicable form",
                format_shape(&shape_of(other))
            )),
        }
    }
}

/// A callee is statically addressed when it is a defined function
/// reached through the read-only captured environment or a literal,
/// rather than flowing in through the parameter or a computation.
fn static_callee(func: &Staged) -> Option<DefId> {
    let statically_addressed = matches!(
        func.code,
        Code::Fetch {
            root: Slot::Capture(_),
            ..
        } | Code::Inject(_)
    );
    match &func.exemplar {
        Value::Function(f) if statically_addressed => match f.origin {
            FnOrigin::Def(def) => Some(def),
            FnOrigin::Placeholder => None,
        },
        _ => None,
    }
}

/// Resolve a surface operator against its operand exemplars into a
/// shape-specialized primitive plus the folded result exemplar.
fn resolve_prim(op: &str, lhs: &Value, rhs: &Value, span: Span) -> Result<(PrimOp, Value)> {
    match op {
        "+" => match (lhs, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok((PrimOp::NumAdd, Value::Int(l.wrapping_add(*r)))),
            (Value::Text(l), Value::Text(r)) => {
                Ok((PrimOp::TextJoin, Value::Text(format!("{}{}", l, r))))
            }
            _ => Err(unsupported_operands(op, lhs, rhs, span)),
        },
        "-" | "*" | "/" => match (lhs, rhs) {
            (Value::Int(l), Value::Int(r)) => {
                let (prim, folded) = match op {
                    "-" => (PrimOp::NumSub, l.wrapping_sub(*r)),
                    "*" => (PrimOp::NumMul, l.wrapping_mul(*r)),
                    // A zero divisor can arrive via the num placeholder;
                    // the exemplar only carries the result shape.
                    _ => (PrimOp::NumDiv, l.checked_div(*r).unwrap_or(0)),
                };
                Ok((prim, Value::Int(folded)))
            }
            _ => Err(unsupported_operands(op, lhs, rhs, span)),
        },
        "<" | "<=" | ">" | ">=" => match (lhs, rhs) {
            (Value::Int(l), Value::Int(r)) => {
                let (prim, folded) = match op {
                    "<" => (PrimOp::NumLt, l < r),
                    "<=" => (PrimOp::NumLe, l <= r),
                    ">" => (PrimOp::NumGt, l > r),
                    _ => (PrimOp::NumGe, l >= r),
                };
                Ok((prim, Value::Truth(folded)))
            }
            _ => Err(unsupported_operands(op, lhs, rhs, span)),
        },
        "==" | "!=" => {
            if shape_of(lhs) != shape_of(rhs) {
                return Err(unsupported_operands(op, lhs, rhs, span));
            }
            let equal = lhs == rhs;
            match op {
                "==" => Ok((PrimOp::Eq, Value::Truth(equal))),
                _ => Ok((PrimOp::Ne, Value::Truth(!equal))),
            }
        }
        _ => Err(err_unresolved_at!(span, "Unknown primitive operator '{}'", op)),
    }
}

fn unsupported_operands(op: &str, lhs: &Value, rhs: &Value, span: Span) -> CompilerError {
    err_unresolved_at!(
        span,
        "Operator '{}' is not supported for values shaped {} and {}",
        op,
        format_shape(&shape_of(lhs)),
        format_shape(&shape_of(rhs))
    )
}
