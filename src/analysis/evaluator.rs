//! Best-effort constant evaluation
//!
//! ## Evaluation Rules
//!
//! - Literals evaluate to themselves; integer literals wrap like the JVM
//! - `static final` fields, interface constants and Kotlin `const val` /
//!   object `val` properties evaluate their initializer, across files,
//!   guarded by a per-chain visited set so cycles end in `Unknown`
//! - Locals and parameters read the facts kept by the walker in [`Env`]
//! - Arithmetic, shifts and bitwise operators follow Java promotion rules;
//!   integer division by zero gives `Unknown`
//! - An undecidable `?:` joins both branches into a range
//!
//! Anything else evaluates to `Unknown`; evaluation never fails.

use super::value::{SymbolicValue, ValueRange};
use crate::ast::{
    Annotation, BinaryOp, Expr, ExprKind, Literal, TypeKind, TypeRef, UnaryOp,
};
use crate::graph::{DeclarationIndex, FieldId, MethodId, Scope};
use std::collections::HashMap;

const MAX_DEPTH: usize = 64;
const MAX_ARRAY_LEN: i64 = 10_000;

/// What the walker knows about one local variable or parameter
#[derive(Debug, Clone)]
pub struct LocalFact<'a> {
    pub value: SymbolicValue,
    /// Expression of the most recent assignment still in effect
    pub source: Option<&'a Expr>,
    pub ty: Option<&'a TypeRef>,
    pub annotations: &'a [Annotation],
    /// Parameter index for method parameters
    pub param: Option<usize>,
}

impl<'a> LocalFact<'a> {
    pub fn new(value: SymbolicValue, source: Option<&'a Expr>) -> Self {
        Self {
            value,
            source,
            ty: None,
            annotations: &[],
            param: None,
        }
    }
}

/// Evaluation environment: name-resolution scope plus local facts
#[derive(Debug, Clone)]
pub struct Env<'a> {
    pub scope: Scope,
    pub method: Option<MethodId>,
    locals: HashMap<String, LocalFact<'a>>,
}

impl<'a> Env<'a> {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            method: None,
            locals: HashMap::new(),
        }
    }

    pub fn declare(&mut self, name: &str, fact: LocalFact<'a>) {
        self.locals.insert(name.to_string(), fact);
    }

    pub fn get(&self, name: &str) -> Option<&LocalFact<'a>> {
        self.locals.get(name)
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    /// Record an assignment to a known local; returns false for non-locals
    pub fn assign(&mut self, name: &str, value: SymbolicValue, source: Option<&'a Expr>) -> bool {
        match self.locals.get_mut(name) {
            Some(fact) => {
                fact.value = value;
                fact.source = source;
                true
            }
            None => false,
        }
    }

    pub fn invalidate(&mut self, name: &str) {
        self.assign(name, SymbolicValue::Unknown, None);
    }

    /// Narrow a local to a guard-derived value; the assignment source only
    /// survives when the value is unchanged
    pub fn refine(&mut self, name: &str, value: SymbolicValue) {
        if let Some(fact) = self.locals.get_mut(name) {
            if fact.value != value {
                fact.value = value;
                fact.source = None;
            }
        }
    }

    /// Merge two branch states back into `self`; disagreeing locals become
    /// unknown, locals declared inside the branches are dropped
    pub fn merge_from(&mut self, a: &Env<'a>, b: &Env<'a>) {
        for (name, fact) in self.locals.iter_mut() {
            let (Some(x), Some(y)) = (a.locals.get(name), b.locals.get(name)) else {
                continue;
            };
            let same_source = match (x.source, y.source) {
                (Some(p), Some(q)) => std::ptr::eq(p, q),
                (None, None) => true,
                _ => false,
            };
            if x.value == y.value && same_source {
                fact.value = x.value.clone();
                fact.source = x.source;
            } else {
                fact.value = SymbolicValue::Unknown;
                fact.source = None;
            }
        }
    }

    /// Put back the facts of `original` for every local not in `assigned`,
    /// dropping refinements made by branch guards
    pub fn restore_unassigned(&mut self, original: &Env<'a>, assigned: &[String]) {
        for (name, fact) in self.locals.iter_mut() {
            if assigned.iter().any(|a| a == name) {
                continue;
            }
            if let Some(before) = original.locals.get(name) {
                fact.value = before.value.clone();
                fact.source = before.source;
            }
        }
    }

    /// Copy facts of locals that exist in `self` from `inner`
    pub fn absorb(&mut self, inner: &Env<'a>) {
        for (name, fact) in self.locals.iter_mut() {
            if let Some(updated) = inner.locals.get(name) {
                fact.value = updated.value.clone();
                fact.source = updated.source;
            }
        }
    }
}

#[derive(Default)]
struct Visiting {
    fields: Vec<FieldId>,
    depth: usize,
}

/// Evaluates expressions against the frozen declaration index
#[derive(Clone, Copy)]
pub struct ConstantEvaluator<'i, 'a> {
    index: &'i DeclarationIndex<'a>,
}

impl<'i, 'a> ConstantEvaluator<'i, 'a> {
    pub fn new(index: &'i DeclarationIndex<'a>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &'i DeclarationIndex<'a> {
        self.index
    }

    pub fn evaluate(&self, expr: &Expr, env: &Env) -> SymbolicValue {
        self.eval(expr, env, &mut Visiting::default())
    }

    /// Value of a constant field, `Unknown` for mutable or instance fields
    pub fn field_value(&self, field: FieldId) -> SymbolicValue {
        self.eval_field(field, &mut Visiting::default())
    }

    /// The field an expression reads, when it names one rather than a local
    pub fn resolve_field(&self, expr: &Expr, env: &Env) -> Option<FieldId> {
        match &expr.skip_parens().kind {
            ExprKind::Name(name) => {
                if env.is_local(name) {
                    return None;
                }
                self.index.resolve_field_name(name, env.scope)
            }
            ExprKind::Select { receiver, name } => match &receiver.skip_parens().kind {
                ExprKind::This | ExprKind::Super => {
                    let class = env.scope.class?;
                    self.index
                        .class_chain(class)
                        .into_iter()
                        .find_map(|c| self.index.find_field(c, name))
                }
                _ => {
                    let path = receiver.dotted_path()?;
                    let first = path.split('.').next().unwrap_or(&path);
                    if env.is_local(first) {
                        return None;
                    }
                    let path = path.trim_end_matches(".Companion");
                    self.index.resolve_static_field(path, name, env.scope)
                }
            },
            _ => None,
        }
    }

    fn eval(&self, expr: &Expr, env: &Env, visiting: &mut Visiting) -> SymbolicValue {
        if visiting.depth > MAX_DEPTH {
            return SymbolicValue::Unknown;
        }
        visiting.depth += 1;
        let value = self.eval_inner(expr, env, visiting);
        visiting.depth -= 1;
        value
    }

    fn eval_inner(&self, expr: &Expr, env: &Env, visiting: &mut Visiting) -> SymbolicValue {
        match &expr.kind {
            ExprKind::Literal(literal) => literal_value(literal),
            ExprKind::Paren(inner) => self.eval(inner, env, visiting),
            ExprKind::Name(name) => {
                if let Some(fact) = env.get(name) {
                    return fact.value.clone();
                }
                match self.index.resolve_field_name(name, env.scope) {
                    Some(field) => self.eval_field(field, visiting),
                    None => SymbolicValue::Unknown,
                }
            }
            ExprKind::Select { receiver, name } => {
                if let Some(field) = self.resolve_field(expr, env) {
                    return self.eval_field(field, visiting);
                }
                if let Some(path) = expr.dotted_path() {
                    if let Some(value) = well_known_constant(&path) {
                        return value;
                    }
                }
                match name.as_str() {
                    "length" | "size" | "count" => {
                        match self.eval(receiver, env, visiting).size() {
                            Some(len) => SymbolicValue::Int(len as i32),
                            None => SymbolicValue::Unknown,
                        }
                    }
                    _ => SymbolicValue::Unknown,
                }
            }
            ExprKind::Call {
                receiver,
                name,
                args,
                ..
            } => self.eval_call(receiver.as_deref(), name, args, env, visiting),
            ExprKind::ArrayInit(items) => SymbolicValue::Array(
                items.iter().map(|i| self.eval(i, env, visiting)).collect(),
            ),
            ExprKind::NewArray { dims, init, .. } => {
                if let Some(items) = init {
                    return SymbolicValue::Array(
                        items.iter().map(|i| self.eval(i, env, visiting)).collect(),
                    );
                }
                match dims.first().map(|d| self.eval(d, env, visiting)) {
                    Some(len) => match len.as_i64() {
                        Some(n) if (0..=MAX_ARRAY_LEN).contains(&n) => {
                            SymbolicValue::Array(vec![SymbolicValue::Unknown; n as usize])
                        }
                        _ => SymbolicValue::Unknown,
                    },
                    None => SymbolicValue::Unknown,
                }
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, env, visiting);
                apply_unary(*op, &value)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.eval(lhs, env, visiting);
                if matches!(op, BinaryOp::And | BinaryOp::Or) {
                    match (op, &left) {
                        (BinaryOp::And, SymbolicValue::Bool(false)) => {
                            return SymbolicValue::Bool(false)
                        }
                        (BinaryOp::Or, SymbolicValue::Bool(true)) => {
                            return SymbolicValue::Bool(true)
                        }
                        _ => {}
                    }
                }
                let right = self.eval(rhs, env, visiting);
                apply_binary(*op, &left, &right)
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => match self.eval(cond, env, visiting) {
                SymbolicValue::Bool(true) => self.eval(then_expr, env, visiting),
                SymbolicValue::Bool(false) => self.eval(else_expr, env, visiting),
                _ => {
                    let a = self.eval(then_expr, env, visiting);
                    let b = self.eval(else_expr, env, visiting);
                    a.join(&b)
                }
            },
            ExprKind::Cast { ty, expr } => {
                let value = self.eval(expr, env, visiting);
                coerce(value, ty.kind(), true)
            }
            ExprKind::Assign { value, op: None, .. } => self.eval(value, env, visiting),
            ExprKind::Assign {
                target,
                op: Some(op),
                value,
            } => {
                let left = self.eval(target, env, visiting);
                let right = self.eval(value, env, visiting);
                apply_binary(*op, &left, &right)
            }
            _ => SymbolicValue::Unknown,
        }
    }

    fn eval_call(
        &self,
        receiver: Option<&Expr>,
        name: &str,
        args: &[Expr],
        env: &Env,
        visiting: &mut Visiting,
    ) -> SymbolicValue {
        let receiver_path = receiver.and_then(|r| r.dotted_path());
        let collection_factory = matches!(
            name,
            "intArrayOf"
                | "longArrayOf"
                | "floatArrayOf"
                | "doubleArrayOf"
                | "shortArrayOf"
                | "byteArrayOf"
                | "charArrayOf"
                | "booleanArrayOf"
                | "arrayOf"
                | "listOf"
                | "mutableListOf"
                | "arrayListOf"
                | "setOf"
                | "mutableSetOf"
        ) && receiver.is_none();
        let java_factory = matches!(
            (receiver_path.as_deref(), name),
            (Some("Arrays"), "asList") | (Some("List"), "of") | (Some("Set"), "of")
        );
        if collection_factory || java_factory {
            return SymbolicValue::Array(args.iter().map(|a| self.eval(a, env, visiting)).collect());
        }

        let Some(receiver) = receiver else {
            return SymbolicValue::Unknown;
        };
        if !args.is_empty() {
            return SymbolicValue::Unknown;
        }
        let value = self.eval(receiver, env, visiting);
        match name {
            "length" | "size" | "count" => match value.size() {
                Some(len) => SymbolicValue::Int(len as i32),
                None => SymbolicValue::Unknown,
            },
            "toInt" | "toShort" | "toByte" => coerce(value, TypeKind::Int, true),
            "toLong" => coerce(value, TypeKind::Long, true),
            "toFloat" => coerce(value, TypeKind::Float, true),
            "toDouble" => coerce(value, TypeKind::Double, true),
            "inv" => apply_unary(UnaryOp::BitNot, &value),
            _ => SymbolicValue::Unknown,
        }
    }

    fn eval_field(&self, field_id: FieldId, visiting: &mut Visiting) -> SymbolicValue {
        let field = self.index.field(field_id);
        if !field.is_constant() || field.is_enum_constant {
            return SymbolicValue::Unknown;
        }
        let Some(init) = &field.initializer else {
            return SymbolicValue::Unknown;
        };
        if visiting.fields.contains(&field_id) {
            return SymbolicValue::Unknown;
        }
        visiting.fields.push(field_id);
        let class = self.index.class(field_id.class);
        let env = Env::new(Scope::new(class.unit, Some(field_id.class)));
        let value = self.eval(init, &env, visiting);
        visiting.fields.pop();

        match &field.ty {
            Some(ty) => coerce(value, ty.kind(), false),
            None => value,
        }
    }

    /// Facts implied by `cond` evaluating to `truth`, for locals only
    pub fn guard_facts(&self, cond: &Expr, env: &Env, truth: bool) -> Vec<(String, SymbolicValue)> {
        let mut out: Vec<(String, SymbolicValue)> = Vec::new();
        self.collect_guards(cond, env, truth, &mut out);
        out
    }

    fn collect_guards(
        &self,
        cond: &Expr,
        env: &Env,
        truth: bool,
        out: &mut Vec<(String, SymbolicValue)>,
    ) {
        match &cond.skip_parens().kind {
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.collect_guards(operand, env, !truth, out),
            ExprKind::Binary { op, lhs, rhs } => match (op, truth) {
                (BinaryOp::And, true) | (BinaryOp::Or, false) => {
                    self.collect_guards(lhs, env, truth, out);
                    let mut narrowed = env.clone();
                    for (name, value) in out.iter() {
                        narrowed.refine(name, value.clone());
                    }
                    let mut rest = Vec::new();
                    self.collect_guards(rhs, &narrowed, truth, &mut rest);
                    for (name, value) in rest {
                        out.retain(|(n, _)| *n != name);
                        out.push((name, value));
                    }
                }
                (op, _) if op.is_comparison() => {
                    if let Some(fact) = self.comparison_guard(*op, lhs, rhs, env, truth) {
                        out.retain(|(n, _)| *n != fact.0);
                        out.push(fact);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn comparison_guard(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        env: &Env,
        truth: bool,
    ) -> Option<(String, SymbolicValue)> {
        let local_name = |e: &Expr| match &e.skip_parens().kind {
            ExprKind::Name(name) if env.is_local(name) => Some(name.clone()),
            _ => None,
        };
        let (name, bound_expr, op) = match (local_name(lhs), local_name(rhs)) {
            (Some(name), _) => (name, rhs, op),
            (None, Some(name)) => (name, lhs, flip(op)),
            _ => return None,
        };
        let op = if truth { op } else { negate(op) };

        let bound = self.evaluate(bound_expr, env);
        let c = bound.as_f64()?;
        if c.abs() >= i64::MAX as f64 {
            return None;
        }
        let fact = env.get(&name)?;
        let integral = bound.is_integral()
            && (fact.value.is_integral()
                || fact.value.is_unknown()
                || fact
                    .ty
                    .is_some_and(|t| matches!(t.kind(), TypeKind::Int | TypeKind::Long)));

        let guard = match op {
            BinaryOp::Gt if integral => ValueRange::at_least(c + 1.0, true),
            BinaryOp::Gt => ValueRange::at_least(c, false).exclusive_min(),
            BinaryOp::Ge => ValueRange::at_least(c, integral),
            BinaryOp::Lt if integral => ValueRange::at_most(c - 1.0, true),
            BinaryOp::Lt => ValueRange::at_most(c, false).exclusive_max(),
            BinaryOp::Le => ValueRange::at_most(c, integral),
            BinaryOp::Eq => ValueRange::exact(c, integral),
            BinaryOp::Ne => {
                let SymbolicValue::Range(mut current) = fact.value.clone() else {
                    return None;
                };
                if current.min == c && current.min_inclusive {
                    if integral {
                        current.min += 1.0;
                        current.exact_min = current.exact_min.and_then(|v| v.checked_add(1));
                    } else {
                        current.min_inclusive = false;
                    }
                } else if current.max == c && current.max_inclusive {
                    if integral {
                        current.max -= 1.0;
                        current.exact_max = current.exact_max.and_then(|v| v.checked_sub(1));
                    } else {
                        current.max_inclusive = false;
                    }
                } else {
                    return None;
                }
                return Some((name, SymbolicValue::Range(current.inferred())));
            }
            _ => return None,
        }
        .inferred();

        let refined = match &fact.value {
            exact if exact.is_exact_number() => {
                let v = exact.as_f64()?;
                if guard.contains_value(v) {
                    exact.clone()
                } else {
                    SymbolicValue::Range(guard)
                }
            }
            SymbolicValue::Range(current) => match current.intersect(&guard) {
                Some(range) => SymbolicValue::Range(range.inferred()),
                None => SymbolicValue::Range(guard),
            },
            _ => {
                if guard.is_exact() && integral {
                    if let Some(ty) = fact.ty {
                        return Some((name, coerce(bound, ty.kind(), false)));
                    }
                }
                SymbolicValue::Range(guard)
            }
        };
        Some((name, refined))
    }
}

fn flip(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Le => BinaryOp::Ge,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::Ge => BinaryOp::Le,
        other => other,
    }
}

fn negate(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Ge,
        BinaryOp::Le => BinaryOp::Gt,
        BinaryOp::Gt => BinaryOp::Le,
        BinaryOp::Ge => BinaryOp::Lt,
        BinaryOp::Eq => BinaryOp::Ne,
        BinaryOp::Ne => BinaryOp::Eq,
        other => other,
    }
}

pub fn literal_value(literal: &Literal) -> SymbolicValue {
    match literal {
        Literal::Int(v) => SymbolicValue::Int(*v as i32),
        Literal::Long(v) => SymbolicValue::Long(*v),
        Literal::Float(v) => SymbolicValue::Float(*v),
        Literal::Double(v) => SymbolicValue::Double(*v),
        Literal::Char(c) => SymbolicValue::Char(*c),
        Literal::Str(s) => SymbolicValue::Str(s.clone()),
        Literal::Bool(b) => SymbolicValue::Bool(*b),
        Literal::Null => SymbolicValue::Null,
    }
}

fn well_known_constant(path: &str) -> Option<SymbolicValue> {
    let path = path
        .trim_start_matches("java.lang.")
        .trim_start_matches("kotlin.");
    Some(match path {
        "Integer.MAX_VALUE" | "Int.MAX_VALUE" => SymbolicValue::Int(i32::MAX),
        "Integer.MIN_VALUE" | "Int.MIN_VALUE" => SymbolicValue::Int(i32::MIN),
        "Long.MAX_VALUE" => SymbolicValue::Long(i64::MAX),
        "Long.MIN_VALUE" => SymbolicValue::Long(i64::MIN),
        "Short.MAX_VALUE" => SymbolicValue::Int(i32::from(i16::MAX)),
        "Short.MIN_VALUE" => SymbolicValue::Int(i32::from(i16::MIN)),
        "Byte.MAX_VALUE" => SymbolicValue::Int(i32::from(i8::MAX)),
        "Byte.MIN_VALUE" => SymbolicValue::Int(i32::from(i8::MIN)),
        _ => return None,
    })
}

/// Convert to the declared type; `truncate` allows narrowing casts
pub fn coerce(value: SymbolicValue, kind: TypeKind, truncate: bool) -> SymbolicValue {
    use SymbolicValue as V;
    match (kind, &value) {
        (TypeKind::Long, V::Int(v)) => V::Long(i64::from(*v)),
        (TypeKind::Long, V::Char(c)) => V::Long(i64::from(u32::from(*c))),
        (TypeKind::Int, V::Char(c)) => V::Int(u32::from(*c) as i32),
        (TypeKind::Float, V::Int(_) | V::Long(_) | V::Char(_) | V::Double(_)) => {
            if matches!(value, V::Double(_)) && !truncate {
                return value;
            }
            value.as_f64().map_or(V::Unknown, |v| V::Float(v as f32))
        }
        (TypeKind::Double, V::Int(_) | V::Long(_) | V::Char(_) | V::Float(_)) => {
            value.as_f64().map_or(V::Unknown, V::Double)
        }
        (TypeKind::Int, V::Long(v)) if truncate => V::Int(*v as i32),
        (TypeKind::Int, V::Float(_) | V::Double(_)) if truncate => {
            value.as_f64().map_or(V::Unknown, |v| V::Int(v as i32))
        }
        (TypeKind::Long, V::Float(_) | V::Double(_)) if truncate => {
            value.as_f64().map_or(V::Unknown, |v| V::Long(v as i64))
        }
        _ => value,
    }
}

pub fn apply_unary(op: UnaryOp, value: &SymbolicValue) -> SymbolicValue {
    use SymbolicValue as V;
    match (op, value) {
        (UnaryOp::Neg, V::Int(v)) => V::Int(v.wrapping_neg()),
        (UnaryOp::Neg, V::Long(v)) => V::Long(v.wrapping_neg()),
        (UnaryOp::Neg, V::Float(v)) => V::Float(-v),
        (UnaryOp::Neg, V::Double(v)) => V::Double(-v),
        (UnaryOp::Neg, V::Char(c)) => V::Int(-(u32::from(*c) as i32)),
        (UnaryOp::Neg, V::Range(range)) => V::Range(range.negate()),
        (UnaryOp::Neg, V::Multiple(k)) => V::Multiple(*k),
        (UnaryOp::Plus, V::Char(c)) => V::Int(u32::from(*c) as i32),
        (UnaryOp::Plus, other) if other.is_exact_number() => other.clone(),
        (UnaryOp::Not, V::Bool(b)) => V::Bool(!b),
        (UnaryOp::BitNot, V::Int(v)) => V::Int(!v),
        (UnaryOp::BitNot, V::Long(v)) => V::Long(!v),
        _ => V::Unknown,
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Int,
    Long,
    Float,
    Double,
}

fn rank(value: &SymbolicValue) -> Option<Rank> {
    match value {
        SymbolicValue::Int(_) | SymbolicValue::Char(_) => Some(Rank::Int),
        SymbolicValue::Long(_) => Some(Rank::Long),
        SymbolicValue::Float(_) => Some(Rank::Float),
        SymbolicValue::Double(_) => Some(Rank::Double),
        _ => None,
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a as i64
}

pub fn apply_binary(op: BinaryOp, left: &SymbolicValue, right: &SymbolicValue) -> SymbolicValue {
    use SymbolicValue as V;

    if op == BinaryOp::Add {
        if matches!(left, V::Str(_)) || matches!(right, V::Str(_)) {
            return match (left.concat_text(), right.concat_text()) {
                (Some(a), Some(b)) => V::Str(a + &b),
                _ => V::Unknown,
            };
        }
    }

    match (op, left, right) {
        (BinaryOp::And, V::Bool(a), V::Bool(b)) => return V::Bool(*a && *b),
        (BinaryOp::Or, V::Bool(a), V::Bool(b)) => return V::Bool(*a || *b),
        (BinaryOp::BitAnd, V::Bool(a), V::Bool(b)) => return V::Bool(*a & *b),
        (BinaryOp::BitOr, V::Bool(a), V::Bool(b)) => return V::Bool(*a | *b),
        (BinaryOp::BitXor, V::Bool(a), V::Bool(b)) => return V::Bool(*a ^ *b),
        (BinaryOp::Eq, V::Bool(a), V::Bool(b)) => return V::Bool(a == b),
        (BinaryOp::Ne, V::Bool(a), V::Bool(b)) => return V::Bool(a != b),
        (BinaryOp::Eq, V::Str(a), V::Str(b)) => return V::Bool(a == b),
        (BinaryOp::Ne, V::Str(a), V::Str(b)) => return V::Bool(a != b),
        _ => {}
    }

    let (Some(lr), Some(rr)) = (rank(left), rank(right)) else {
        return apply_symbolic(op, left, right);
    };

    if op.is_comparison() {
        let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
            return V::Unknown;
        };
        if lr <= Rank::Long && rr <= Rank::Long {
            let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) else {
                return V::Unknown;
            };
            return V::Bool(match op {
                BinaryOp::Eq => a == b,
                BinaryOp::Ne => a != b,
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                _ => a >= b,
            });
        }
        return V::Bool(match op {
            BinaryOp::Eq => a == b,
            BinaryOp::Ne => a != b,
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        });
    }

    if matches!(op, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr) {
        let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) else {
            return V::Unknown;
        };
        return match lr {
            Rank::Int => {
                let a = a as i32;
                let s = (b & 31) as u32;
                V::Int(match op {
                    BinaryOp::Shl => a.wrapping_shl(s),
                    BinaryOp::Shr => a.wrapping_shr(s),
                    _ => ((a as u32) >> s) as i32,
                })
            }
            Rank::Long => {
                let s = (b & 63) as u32;
                V::Long(match op {
                    BinaryOp::Shl => a.wrapping_shl(s),
                    BinaryOp::Shr => a.wrapping_shr(s),
                    _ => ((a as u64) >> s) as i64,
                })
            }
            _ => V::Unknown,
        };
    }

    match lr.max(rr) {
        Rank::Int => {
            let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) else {
                return V::Unknown;
            };
            let (a, b) = (a as i32, b as i32);
            match op {
                BinaryOp::Add => V::Int(a.wrapping_add(b)),
                BinaryOp::Sub => V::Int(a.wrapping_sub(b)),
                BinaryOp::Mul => V::Int(a.wrapping_mul(b)),
                BinaryOp::Div if b != 0 => V::Int(a.wrapping_div(b)),
                BinaryOp::Rem if b != 0 => V::Int(a.wrapping_rem(b)),
                BinaryOp::BitAnd => V::Int(a & b),
                BinaryOp::BitOr => V::Int(a | b),
                BinaryOp::BitXor => V::Int(a ^ b),
                _ => V::Unknown,
            }
        }
        Rank::Long => {
            let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) else {
                return V::Unknown;
            };
            match op {
                BinaryOp::Add => V::Long(a.wrapping_add(b)),
                BinaryOp::Sub => V::Long(a.wrapping_sub(b)),
                BinaryOp::Mul => V::Long(a.wrapping_mul(b)),
                BinaryOp::Div if b != 0 => V::Long(a.wrapping_div(b)),
                BinaryOp::Rem if b != 0 => V::Long(a.wrapping_rem(b)),
                BinaryOp::BitAnd => V::Long(a & b),
                BinaryOp::BitOr => V::Long(a | b),
                BinaryOp::BitXor => V::Long(a ^ b),
                _ => V::Unknown,
            }
        }
        Rank::Float => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return V::Unknown;
            };
            let (a, b) = (a as f32, b as f32);
            match op {
                BinaryOp::Add => V::Float(a + b),
                BinaryOp::Sub => V::Float(a - b),
                BinaryOp::Mul => V::Float(a * b),
                BinaryOp::Div => V::Float(a / b),
                BinaryOp::Rem => V::Float(a % b),
                _ => V::Unknown,
            }
        }
        Rank::Double => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return V::Unknown;
            };
            match op {
                BinaryOp::Add => V::Double(a + b),
                BinaryOp::Sub => V::Double(a - b),
                BinaryOp::Mul => V::Double(a * b),
                BinaryOp::Div => V::Double(a / b),
                BinaryOp::Rem => V::Double(a % b),
                _ => V::Unknown,
            }
        }
    }
}

/// Operations where at least one side is not exactly known
fn apply_symbolic(op: BinaryOp, left: &SymbolicValue, right: &SymbolicValue) -> SymbolicValue {
    use SymbolicValue as V;
    let exact_int = |v: &V| match v {
        V::Int(_) | V::Long(_) => v.as_i64(),
        _ => None,
    };
    match op {
        BinaryOp::Mul => match (left, right) {
            (V::Multiple(a), V::Multiple(b)) => V::Multiple(a.saturating_mul(*b)),
            (V::Multiple(m), other) | (other, V::Multiple(m)) => match exact_int(other) {
                Some(0) => V::Int(0),
                Some(k) => V::Multiple(m.saturating_mul(k)),
                None => V::Multiple(*m),
            },
            (other, unknown) | (unknown, other)
                if exact_int(other).is_some()
                    && (unknown.is_unknown()
                        || matches!(unknown, V::Range(r) if r.integral)) =>
            {
                match exact_int(other) {
                    Some(0) => V::Int(0),
                    Some(k) => V::Multiple(k),
                    None => V::Unknown,
                }
            }
            _ => V::Unknown,
        },
        BinaryOp::Rem => match (left, exact_int(right)) {
            (V::Multiple(k), Some(d)) if k.checked_rem(d) == Some(0) => {
                if matches!(right, V::Long(_)) {
                    V::Long(0)
                } else {
                    V::Int(0)
                }
            }
            _ => V::Unknown,
        },
        BinaryOp::Add | BinaryOp::Sub => match (left, right) {
            (V::Multiple(a), V::Multiple(b)) => V::Multiple(gcd(*a, *b)),
            (V::Multiple(m), other) | (other, V::Multiple(m)) => match exact_int(other) {
                Some(c) if c.checked_rem(*m) == Some(0) => V::Multiple(*m),
                _ => V::Unknown,
            },
            (V::Range(range), other) if other.is_exact_number() => {
                let Some(c) = other.as_f64() else {
                    return V::Unknown;
                };
                let exact = other.as_i64();
                if op == BinaryOp::Sub {
                    V::Range(range.shifted(-c, exact.and_then(i64::checked_neg)))
                } else {
                    V::Range(range.shifted(c, exact))
                }
            }
            (other, V::Range(range)) if other.is_exact_number() && op == BinaryOp::Add => {
                let Some(c) = other.as_f64() else {
                    return V::Unknown;
                };
                V::Range(range.shifted(c, other.as_i64()))
            }
            _ => V::Unknown,
        },
        _ => V::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassDecl, ClassKind, FieldDecl, Language, SourceUnit, Span};

    fn span() -> Span {
        Span::default()
    }

    fn constant(name: &str, init: Expr) -> FieldDecl {
        let mut field = FieldDecl::new(name, span());
        field.is_static = true;
        field.is_final = true;
        field.initializer = Some(init);
        field
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span(),
        )
    }

    fn units_with(fields: Vec<FieldDecl>) -> Vec<SourceUnit> {
        let mut class = ClassDecl::new("Consts", ClassKind::Class, Span::new(0, 10, 1, 1));
        class.fields = fields;
        let mut unit = SourceUnit::new("Consts.java", Language::Java, "");
        unit.package = "p".into();
        unit.classes.push(class);
        vec![unit]
    }

    fn class_env(index: &DeclarationIndex) -> Env<'static> {
        let class = index.class_by_qualified_name("p.Consts");
        Env::new(Scope::new(0, class))
    }

    #[test]
    fn test_multiple_remainder_never_overflows() {
        let min = SymbolicValue::Multiple(i64::MIN);
        assert!(apply_binary(BinaryOp::Rem, &min, &SymbolicValue::Long(-1)).is_unknown());
        assert!(apply_binary(BinaryOp::Rem, &min, &SymbolicValue::Long(0)).is_unknown());
        assert_eq!(
            apply_binary(BinaryOp::Rem, &SymbolicValue::Multiple(4), &SymbolicValue::Long(2)),
            SymbolicValue::Long(0)
        );
        assert!(apply_binary(
            BinaryOp::Add,
            &SymbolicValue::Multiple(-1),
            &SymbolicValue::Long(i64::MIN)
        )
        .is_unknown());
    }

    #[test]
    fn test_integer_arithmetic_and_shifts() {
        assert_eq!(
            apply_binary(BinaryOp::Shl, &SymbolicValue::Int(1), &SymbolicValue::Int(3)),
            SymbolicValue::Int(8)
        );
        assert_eq!(
            apply_binary(BinaryOp::Shl, &SymbolicValue::Long(1), &SymbolicValue::Int(44)),
            SymbolicValue::Long(1 << 44)
        );
        assert_eq!(
            apply_binary(BinaryOp::UShr, &SymbolicValue::Int(-1), &SymbolicValue::Int(28)),
            SymbolicValue::Int(15)
        );
        assert_eq!(
            apply_binary(BinaryOp::Add, &SymbolicValue::Int(i32::MAX), &SymbolicValue::Int(1)),
            SymbolicValue::Int(i32::MIN)
        );
        assert_eq!(
            apply_binary(BinaryOp::Add, &SymbolicValue::Int(1), &SymbolicValue::Long(2)),
            SymbolicValue::Long(3)
        );
    }

    #[test]
    fn test_division_by_zero_is_unknown() {
        assert!(
            apply_binary(BinaryOp::Div, &SymbolicValue::Int(1), &SymbolicValue::Int(0)).is_unknown()
        );
        assert!(
            apply_binary(BinaryOp::Rem, &SymbolicValue::Long(1), &SymbolicValue::Long(0))
                .is_unknown()
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            apply_binary(
                BinaryOp::Add,
                &SymbolicValue::Str("ab".into()),
                &SymbolicValue::Int(3)
            ),
            SymbolicValue::Str("ab3".into())
        );
    }

    #[test]
    fn test_multiple_rules() {
        let product = apply_binary(BinaryOp::Mul, &SymbolicValue::Unknown, &SymbolicValue::Int(4));
        assert_eq!(product, SymbolicValue::Multiple(4));
        assert_eq!(
            apply_binary(BinaryOp::Rem, &product, &SymbolicValue::Int(2)),
            SymbolicValue::Int(0)
        );
        assert!(apply_binary(BinaryOp::Rem, &product, &SymbolicValue::Int(3)).is_unknown());
    }

    #[test]
    fn test_cross_field_constants_and_cycles() {
        let units = units_with(vec![
            constant("A", Expr::int(3, span())),
            constant(
                "B",
                binary(BinaryOp::Mul, Expr::name("A", span()), Expr::int(2, span())),
            ),
            constant("C", Expr::name("D", span())),
            constant("D", Expr::name("C", span())),
        ]);
        let index = DeclarationIndex::build(&units);
        let evaluator = ConstantEvaluator::new(&index);
        let env = class_env(&index);

        assert_eq!(
            evaluator.evaluate(&Expr::name("B", span()), &env),
            SymbolicValue::Int(6)
        );
        assert!(evaluator
            .evaluate(&Expr::name("C", span()), &env)
            .is_unknown());
    }

    #[test]
    fn test_non_final_fields_are_unknown() {
        let mut mutable = constant("M", Expr::int(1, span()));
        mutable.is_final = false;
        let units = units_with(vec![mutable]);
        let index = DeclarationIndex::build(&units);
        let evaluator = ConstantEvaluator::new(&index);
        assert!(evaluator
            .evaluate(&Expr::name("M", span()), &class_env(&index))
            .is_unknown());
    }

    #[test]
    fn test_declared_long_type_widens_initializer() {
        let mut field = constant("FLAG", Expr::int(8, span()));
        field.ty = Some(TypeRef::new("long"));
        let units = units_with(vec![field]);
        let index = DeclarationIndex::build(&units);
        let evaluator = ConstantEvaluator::new(&index);
        assert_eq!(
            evaluator.evaluate(&Expr::name("FLAG", span()), &class_env(&index)),
            SymbolicValue::Long(8)
        );
    }

    #[test]
    fn test_conditional_widens_to_range() {
        let units = units_with(Vec::new());
        let index = DeclarationIndex::build(&units);
        let evaluator = ConstantEvaluator::new(&index);
        let mut env = class_env(&index);
        env.declare("flag", LocalFact::new(SymbolicValue::Unknown, None));

        let expr = Expr::new(
            ExprKind::Conditional {
                cond: Box::new(Expr::name("flag", span())),
                then_expr: Box::new(Expr::int(1, span())),
                else_expr: Box::new(Expr::int(5, span())),
            },
            span(),
        );
        match evaluator.evaluate(&expr, &env) {
            SymbolicValue::Range(range) => assert_eq!((range.min, range.max), (1.0, 5.0)),
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[test]
    fn test_array_length() {
        let units = units_with(Vec::new());
        let index = DeclarationIndex::build(&units);
        let evaluator = ConstantEvaluator::new(&index);
        let array = Expr::new(
            ExprKind::ArrayInit(vec![Expr::int(1, span()), Expr::int(2, span())]),
            span(),
        );
        let length = Expr::new(
            ExprKind::Select {
                receiver: Box::new(array),
                name: "length".into(),
            },
            span(),
        );
        assert_eq!(
            evaluator.evaluate(&length, &class_env(&index)),
            SymbolicValue::Int(2)
        );
    }

    #[test]
    fn test_guard_facts_narrow_locals() {
        let units = units_with(Vec::new());
        let index = DeclarationIndex::build(&units);
        let evaluator = ConstantEvaluator::new(&index);
        let mut env = class_env(&index);
        env.declare("v", LocalFact::new(SymbolicValue::Unknown, None));

        let cond = binary(BinaryOp::Ge, Expr::name("v", span()), Expr::int(0, span()));
        let facts = evaluator.guard_facts(&cond, &env, true);
        assert_eq!(facts.len(), 1);
        match &facts[0].1 {
            SymbolicValue::Range(range) => {
                assert_eq!(range.min, 0.0);
                assert!(range.max.is_infinite());
                assert!(range.inferred);
            }
            other => panic!("expected range, got {:?}", other),
        }

        let negated = evaluator.guard_facts(&cond, &env, false);
        match &negated[0].1 {
            SymbolicValue::Range(range) => assert_eq!(range.max, -1.0),
            other => panic!("expected range, got {:?}", other),
        }

        let field_cond = binary(BinaryOp::Ge, Expr::name("field", span()), Expr::int(0, span()));
        assert!(evaluator.guard_facts(&field_cond, &env, true).is_empty());
    }

    #[test]
    fn test_exact_fact_satisfying_guard_is_kept() {
        let units = units_with(Vec::new());
        let index = DeclarationIndex::build(&units);
        let evaluator = ConstantEvaluator::new(&index);
        let mut env = class_env(&index);
        env.declare("v", LocalFact::new(SymbolicValue::Int(5), None));

        let cond = binary(BinaryOp::Gt, Expr::name("v", span()), Expr::int(0, span()));
        let facts = evaluator.guard_facts(&cond, &env, true);
        assert_eq!(facts[0].1, SymbolicValue::Int(5));
    }
}
