//! Wrong Constant Detector
//!
//! Checks that values flowing into `@IntDef`, `@LongDef` and `@StringDef`
//! typed parameters, fields, locals and returns are one of the declared
//! constants.
//!
//! ## Rules
//!
//! - Literals must equal a literal listed in the typedef; flag typedefs also
//!   accept `0` and `-1`
//! - Constant references must name a listed constant, or an alias whose
//!   initializer references one
//! - Locals are traced to their last assignment
//! - Values carrying their own typedef must not allow anything extra
//! - `|`, `^`, `&` and `~` require `flag = true`
//! - `open = true` typedefs accept anything
//!
//! When an `@IntRange` is declared next to the typedef, values inside that
//! range are accepted and the range is folded into the message.

use super::Detector;
use crate::analysis::annotations::ValueConstraints;
use crate::analysis::constraints::{IntRangeConstraint, TypedefConstraint};
use crate::analysis::walker::{CallSite, UnitContext, ValueSite, ValueTarget};
use crate::analysis::{Env, Finding, Issue, SymbolicValue};
use crate::ast::{BinaryOp, Expr, ExprKind, Literal, Span, UnaryOp};
use crate::graph::{DeclRef, FieldId, Scope};

const MAX_TRACE_DEPTH: usize = 8;

pub struct TypedefDetector;

impl TypedefDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TypedefDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared while checking one value against one typedef
struct Check<'x, 'c, 'a> {
    cx: &'x UnitContext<'c, 'a>,
    typedef: &'x TypedefConstraint,
    range: Option<&'x IntRangeConstraint>,
}

impl<'a> Check<'_, '_, 'a> {
    fn run(&self, expr: &Expr, span: Span, env: &Env<'a>, depth: usize, out: &mut Vec<Finding>) {
        if depth > MAX_TRACE_DEPTH {
            return;
        }
        match &expr.kind {
            ExprKind::Paren(inner) => self.run(inner, inner.span, env, depth, out),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => match self.cx.evaluator().evaluate(cond, env) {
                SymbolicValue::Bool(true) => self.run(then_expr, then_expr.span, env, depth, out),
                SymbolicValue::Bool(false) => self.run(else_expr, else_expr.span, env, depth, out),
                _ => {
                    self.run(then_expr, then_expr.span, env, depth, out);
                    self.run(else_expr, else_expr.span, env, depth, out);
                }
            },
            ExprKind::Binary { op, lhs, rhs } if op.is_bitwise() => {
                if !self.typedef.flag {
                    if *op == BinaryOp::BitAnd && (mentions_mask(lhs) || mentions_mask(rhs)) {
                        return;
                    }
                    self.report(span, "Flag not allowed here".to_string(), out);
                    return;
                }
                if *op != BinaryOp::BitAnd {
                    self.run(lhs, lhs.span, env, depth, out);
                    self.run(rhs, rhs.span, env, depth, out);
                }
            }
            ExprKind::Unary {
                op: UnaryOp::BitNot,
                operand,
            } => {
                if !self.typedef.flag {
                    self.report(span, "Flag not allowed here".to_string(), out);
                    return;
                }
                self.run(operand, operand.span, env, depth, out);
            }
            _ if expr.is_literal() => self.check_literal(expr, span, env, out),
            ExprKind::Name(name) if env.is_local(name) => {
                let Some(fact) = env.get(name) else {
                    return;
                };
                if fact.annotations.is_empty() && fact.param.is_none() {
                    if let Some(source) = fact.source {
                        self.run(source, span, env, depth + 1, out);
                        return;
                    }
                }
                self.check_declared(expr, span, env, out);
            }
            ExprKind::Name(_) | ExprKind::Select { .. } => {
                match self.cx.resolve_field_ref(expr, env) {
                    Some(field) => self.check_field(expr, field, span, env, out),
                    None => self.check_declared(expr, span, env, out),
                }
            }
            _ => self.check_declared(expr, span, env, out),
        }
    }

    fn check_literal(&self, expr: &Expr, span: Span, env: &Env<'a>, out: &mut Vec<Finding>) {
        let value = self.cx.evaluator().evaluate(expr, env);
        if value.is_unknown() {
            return;
        }
        if self.typedef.flag && matches!(value.as_i64(), Some(0) | Some(-1)) {
            return;
        }
        if self.typedef.literal_allows(&value) {
            return;
        }
        let mut message = self.typedef.describe_allowed();
        if let Some(range) = self.range {
            match range.check(&value) {
                None => return,
                Some(violation) => {
                    message.push_str(" or ");
                    message.push_str(&lowercase_first(&violation));
                }
            }
        }
        self.report(span, message, out);
    }

    fn check_field(&self, expr: &Expr, field: FieldId, span: Span, env: &Env<'a>, out: &mut Vec<Finding>) {
        if self.is_allowed_field(field, 0) {
            return;
        }
        let cx = self.cx;
        if cx.table.value_constraints(DeclRef::Field(field)).typedef.is_some() {
            self.check_declared(expr, span, env, out);
            return;
        }
        let decl = cx.index.field(field);
        if !decl.is_constant() {
            return;
        }
        if let Some(range) = self.range {
            let value = cx.evaluator().field_value(field);
            if !value.is_unknown() && range.check(&value).is_none() {
                return;
            }
        }
        self.report(span, self.typedef.describe_allowed(), out);
    }

    /// Listed directly, or an alias of a listed constant
    fn is_allowed_field(&self, field: FieldId, depth: usize) -> bool {
        if self.typedef.allows_field(field) {
            return true;
        }
        if depth > MAX_TRACE_DEPTH {
            return false;
        }
        let cx = self.cx;
        let decl = cx.index.field(field);
        let Some(init) = &decl.initializer else {
            return false;
        };
        if !matches!(init.skip_parens().kind, ExprKind::Name(_) | ExprKind::Select { .. }) {
            return false;
        }
        let scope = Scope::new(cx.index.class(field.class).unit, Some(field.class));
        match cx.evaluator().resolve_field(init, &Env::new(scope)) {
            Some(target) => self.is_allowed_field(target, depth + 1),
            None => false,
        }
    }

    /// Compare against the typedef the value was declared with
    fn check_declared(&self, expr: &Expr, span: Span, env: &Env<'a>, out: &mut Vec<Finding>) {
        let cx = self.cx;
        let Some(source) = cx.declared_source(expr, env) else {
            return;
        };
        let declared = source.constraints(cx.table);
        let Some(other) = declared.typedef else {
            return;
        };
        if other.open {
            return;
        }
        let missing = self.typedef.missing_from(other);
        if missing.is_empty() {
            return;
        }
        let message = format!(
            "{}, but could be {}",
            self.typedef.describe_allowed(),
            missing.join(", ")
        );
        self.report(span, message, out);
    }

    fn report(&self, span: Span, message: String, out: &mut Vec<Finding>) {
        out.push(Finding::new(
            Issue::WrongConstant,
            self.cx.location(span),
            message,
        ));
    }
}

fn mentions_mask(expr: &Expr) -> bool {
    expr.selector_name()
        .is_some_and(|name| name.to_ascii_lowercase().contains("mask"))
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_zero_literal(expr: &Expr) -> bool {
    matches!(
        expr.skip_parens().kind,
        ExprKind::Literal(Literal::Int(0)) | ExprKind::Literal(Literal::Long(0))
    )
}

fn check_constraints<'a>(
    cx: &UnitContext<'_, 'a>,
    constraints: &ValueConstraints<'_>,
    expr: &Expr,
    env: &Env<'a>,
    out: &mut Vec<Finding>,
) {
    let Some(typedef) = constraints.typedef else {
        return;
    };
    if typedef.open {
        return;
    }
    let check = Check {
        cx,
        typedef,
        range: constraints.int_range,
    };
    check.run(expr, expr.span, env, 0, out);
}

impl Detector for TypedefDetector {
    fn issues(&self) -> &'static [Issue] {
        &[Issue::WrongConstant]
    }

    fn check_call<'a>(&self, cx: &UnitContext<'_, 'a>, site: &CallSite<'_, 'a>, out: &mut Vec<Finding>) {
        let Some(method) = site.callee.method() else {
            return;
        };
        for arg in &site.args {
            let constraints = cx.table.value_constraints(DeclRef::Param(method, arg.param));
            check_constraints(cx, &constraints, arg.expr, site.env, out);
        }
    }

    fn check_value<'a>(&self, cx: &UnitContext<'_, 'a>, site: &ValueSite<'_, 'a>, out: &mut Vec<Finding>) {
        // `@Mode int mode = 0;` before the real assignment
        if site.is_initializer
            && matches!(site.target, ValueTarget::Local(_))
            && is_zero_literal(site.expr)
        {
            return;
        }
        check_constraints(cx, &site.constraints, site.expr, site.env, out);
    }
}
