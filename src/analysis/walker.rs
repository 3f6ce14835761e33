//! Unit walker
//!
//! Walks one [`SourceUnit`] in source order and hands every interesting site
//! to the detectors:
//!
//! - [`CallSite`]: method and constructor calls with their arguments bound to
//!   parameter indices, method references, and field references
//! - [`ValueSite`]: values flowing into an annotated field, local or method
//!   return
//! - [`SwitchSite`]: `switch` statements and Kotlin `when`
//!
//! While walking, the walker keeps per-local facts in an [`Env`]: the value
//! of the last assignment, narrowed by `if` guards inside the guarded branch,
//! merged to unknown where two paths disagree and invalidated for anything
//! assigned inside a loop. It also tracks the ambient thread context and
//! whether the code is test-only.
//!
//! Findings suppressed through `@SuppressLint`, `@SuppressWarnings`,
//! `@Suppress` or a `//noinspection` comment are dropped before returning.

use super::annotations::{threads_in, AnnotationTable, ResolvedAnnotation, ValueConstraints};
use super::constraints::ThreadContext;
use super::detectors::Detector;
use super::evaluator::{apply_binary, coerce, ConstantEvaluator, Env, LocalFact};
use super::value::SymbolicValue;
use super::{Finding, Location};
use crate::ast::{
    suppressed_ids, Annotation, BinaryOp, ClassDecl, ClassKind, Expr, ExprKind, Language,
    SourceUnit, Span, Stmt, SwitchExpr, UnaryOp,
};
use crate::config::Config;
use crate::graph::{ClassId, DeclRef, DeclarationIndex, FieldId, MethodId, Scope};

const MAX_TYPE_DEPTH: usize = 8;
const MAX_METHOD_REF_ARITY: usize = 4;

/// The declaration a site refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    Method(MethodId),
    /// `method` is `None` for implicit default constructors
    Constructor {
        class: ClassId,
        method: Option<MethodId>,
    },
    Field(FieldId),
}

impl Callee {
    pub fn method(&self) -> Option<MethodId> {
        match self {
            Callee::Method(m) => Some(*m),
            Callee::Constructor { method, .. } => *method,
            Callee::Field(_) => None,
        }
    }

    pub fn decl(&self) -> DeclRef {
        match self {
            Callee::Method(m) => DeclRef::Method(*m),
            Callee::Constructor {
                method: Some(m), ..
            } => DeclRef::Method(*m),
            Callee::Constructor { class, .. } => DeclRef::Class(*class),
            Callee::Field(f) => DeclRef::Field(*f),
        }
    }

    /// Class declaring the callee
    pub fn owner(&self) -> ClassId {
        match self {
            Callee::Method(m) => m.class,
            Callee::Constructor { class, .. } => *class,
            Callee::Field(f) => f.class,
        }
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self, Callee::Constructor { .. })
    }
}

/// An argument bound to a parameter
#[derive(Debug, Clone, Copy)]
pub struct BoundArg<'a> {
    pub param: usize,
    pub expr: &'a Expr,
    /// Bound to a varargs parameter
    pub vararg: bool,
}

#[derive(Debug)]
pub struct CallSite<'s, 'a> {
    pub callee: Callee,
    pub expr: &'a Expr,
    /// Span underlined for call-level findings
    pub name_span: Span,
    pub receiver: Option<&'a Expr>,
    pub args: Vec<BoundArg<'a>>,
    pub env: &'s Env<'a>,
    /// Thread contexts the calling code runs on; empty when unknown
    pub caller_threads: Vec<ThreadContext>,
    /// Innermost enclosing class
    pub class: Option<ClassId>,
    pub in_test_context: bool,
}

impl CallSite<'_, '_> {
    /// Arguments bound to the varargs parameter
    pub fn vararg_count(&self) -> usize {
        self.args.iter().filter(|a| a.vararg).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueTarget {
    Field(FieldId),
    Local(String),
    Return(MethodId),
}

/// A value flowing into an annotated field, local or method return
#[derive(Debug)]
pub struct ValueSite<'s, 'a> {
    pub target: ValueTarget,
    pub constraints: ValueConstraints<'s>,
    pub expr: &'a Expr,
    pub env: &'s Env<'a>,
    /// Initializer of a declaration rather than a later assignment
    pub is_initializer: bool,
}

#[derive(Debug)]
pub struct SwitchSite<'s, 'a> {
    pub switch: &'a SwitchExpr,
    pub expr: &'a Expr,
    pub env: &'s Env<'a>,
}

/// Where the annotations describing an expression's value live
#[derive(Debug)]
pub enum DeclaredSource<'a> {
    Decl(DeclRef),
    Local(Vec<ResolvedAnnotation<'a>>),
}

impl<'a> DeclaredSource<'a> {
    pub fn constraints<'t>(&'t self, table: &'t AnnotationTable<'_, 'a>) -> ValueConstraints<'t> {
        match self {
            DeclaredSource::Decl(decl) => table.value_constraints(*decl),
            DeclaredSource::Local(list) => ValueConstraints::from_annotations(list),
        }
    }
}

/// Shared, read-only state for analyzing one unit
pub struct UnitContext<'c, 'a> {
    pub index: &'c DeclarationIndex<'a>,
    pub table: &'c AnnotationTable<'c, 'a>,
    pub config: &'c Config,
    pub unit_index: usize,
    pub unit: &'a SourceUnit,
}

impl<'c, 'a> UnitContext<'c, 'a> {
    pub fn new(
        index: &'c DeclarationIndex<'a>,
        table: &'c AnnotationTable<'c, 'a>,
        config: &'c Config,
        unit_index: usize,
    ) -> Self {
        Self {
            index,
            table,
            config,
            unit_index,
            unit: index.unit(unit_index),
        }
    }

    pub fn evaluator(&self) -> ConstantEvaluator<'c, 'a> {
        ConstantEvaluator::new(self.index)
    }

    pub fn location(&self, span: Span) -> Location {
        Location::new(self.unit.path.clone(), span)
    }

    pub fn is_kotlin(&self) -> bool {
        self.unit.language == Language::Kotlin
    }

    pub fn decode_all(&self, annotations: &'a [Annotation], scope: Scope) -> Vec<ResolvedAnnotation<'a>> {
        annotations
            .iter()
            .filter_map(|a| self.table.decode(a, scope))
            .collect()
    }

    /// Field an expression refers to, including instance property access
    pub fn resolve_field_ref(&self, expr: &Expr, env: &Env) -> Option<FieldId> {
        self.resolve_field_depth(expr, env, 0)
    }

    fn resolve_field_depth(&self, expr: &Expr, env: &Env, depth: usize) -> Option<FieldId> {
        if let Some(field) = self.evaluator().resolve_field(expr, env) {
            return Some(field);
        }
        match &expr.skip_parens().kind {
            ExprKind::Select { receiver, name } => {
                if matches!(receiver.skip_parens().kind, ExprKind::This | ExprKind::Super) {
                    return None;
                }
                let class = self.type_of_depth(receiver, env, depth + 1)?;
                self.index.find_field(class, name)
            }
            _ => None,
        }
    }

    /// Declaration invoked or referenced by a call, `new`, or method reference
    pub fn resolve_call(&self, expr: &Expr, env: &Env) -> Option<Callee> {
        self.resolve_call_depth(expr, env, 0)
    }

    fn resolve_call_depth(&self, expr: &Expr, env: &Env, depth: usize) -> Option<Callee> {
        if depth > MAX_TYPE_DEPTH {
            return None;
        }
        let scope = env.scope;
        match &expr.skip_parens().kind {
            ExprKind::Call {
                receiver: None,
                name,
                args,
                ..
            } => {
                let argc = args.len();
                match name.as_str() {
                    "this" => return Some(self.constructor(scope.class?, argc)),
                    "super" => {
                        let sup = self
                            .index
                            .hierarchy()
                            .supertypes(scope.class?)
                            .into_iter()
                            .find(|c| self.index.class(*c).decl.kind == ClassKind::Class)?;
                        return Some(self.constructor(sup, argc));
                    }
                    _ => {}
                }
                if let Some(method) = self.index.resolve_function(name, argc, scope) {
                    return Some(Callee::Method(method));
                }
                let class = self.index.resolve_type(name, scope)?;
                Some(self.constructor(class, argc))
            }
            ExprKind::Call {
                receiver: Some(receiver),
                name,
                args,
                ..
            } => {
                let argc = args.len();
                self.receiver_classes(receiver, env, depth)
                    .into_iter()
                    .find_map(|class| self.index.find_method(class, name, argc))
                    .map(Callee::Method)
            }
            ExprKind::New { ty, args, .. } => {
                let class = self.index.resolve_type(&ty.name, scope)?;
                Some(self.constructor(class, args.len()))
            }
            ExprKind::MethodRef { receiver, name } => {
                let classes = self.receiver_classes(receiver, env, depth);
                if name == "new" {
                    let class = *classes.first()?;
                    return Some(Callee::Constructor {
                        class,
                        method: (0..=MAX_METHOD_REF_ARITY)
                            .find_map(|n| self.index.find_constructor(class, n)),
                    });
                }
                classes
                    .into_iter()
                    .find_map(|class| {
                        (0..=MAX_METHOD_REF_ARITY)
                            .find_map(|n| self.index.find_method(class, name, n))
                    })
                    .map(Callee::Method)
            }
            _ => None,
        }
    }

    fn constructor(&self, class: ClassId, argc: usize) -> Callee {
        Callee::Constructor {
            class,
            method: self.index.find_constructor(class, argc),
        }
    }

    /// Classes to search for a member selected on `receiver`
    fn receiver_classes(&self, receiver: &Expr, env: &Env, depth: usize) -> Vec<ClassId> {
        let scope = env.scope;
        match &receiver.skip_parens().kind {
            ExprKind::This => scope
                .class
                .map(|c| self.index.class_chain(c))
                .unwrap_or_default(),
            ExprKind::Super => scope
                .class
                .map(|c| self.index.hierarchy().supertypes(c))
                .unwrap_or_default(),
            _ => {
                if let Some(path) = receiver.dotted_path() {
                    let first = path.split('.').next().unwrap_or(path.as_str());
                    if !env.is_local(first) && self.index.resolve_field_name(first, scope).is_none() {
                        let path = path.trim_end_matches(".Companion");
                        if let Some(class) = self.index.resolve_type(path, scope) {
                            return vec![class];
                        }
                    }
                }
                self.type_of_depth(receiver, env, depth + 1)
                    .into_iter()
                    .collect()
            }
        }
    }

    /// Static class of an expression, when it can be determined
    pub fn type_of(&self, expr: &Expr, env: &Env) -> Option<ClassId> {
        self.type_of_depth(expr, env, 0)
    }

    fn type_of_depth(&self, expr: &Expr, env: &Env, depth: usize) -> Option<ClassId> {
        if depth > MAX_TYPE_DEPTH {
            return None;
        }
        let scope = env.scope;
        match &expr.skip_parens().kind {
            ExprKind::Name(name) => {
                if let Some(fact) = env.get(name) {
                    if let Some(ty) = fact.ty {
                        return self.index.resolve_type(&ty.name, scope);
                    }
                    return fact
                        .source
                        .and_then(|source| self.type_of_depth(source, env, depth + 1));
                }
                let field = self.index.resolve_field_name(name, scope)?;
                self.field_type(field, depth)
            }
            ExprKind::Select { .. } => {
                let field = self.resolve_field_depth(expr, env, depth + 1)?;
                self.field_type(field, depth)
            }
            ExprKind::This => scope.class,
            ExprKind::New { ty, .. } | ExprKind::Cast { ty, .. } => {
                self.index.resolve_type(&ty.name, scope)
            }
            ExprKind::Call { .. } => match self.resolve_call_depth(expr, env, depth + 1)? {
                Callee::Method(method) => {
                    let ty = self.index.method(method).return_type.as_ref()?;
                    let unit = self.index.class(method.class).unit;
                    self.index
                        .resolve_type(&ty.name, Scope::new(unit, Some(method.class)))
                }
                Callee::Constructor { class, .. } => Some(class),
                Callee::Field(_) => None,
            },
            _ => None,
        }
    }

    fn field_type(&self, field: FieldId, depth: usize) -> Option<ClassId> {
        let decl = self.index.field(field);
        let scope = Scope::new(self.index.class(field.class).unit, Some(field.class));
        match &decl.ty {
            Some(ty) => self.index.resolve_type(&ty.name, scope),
            None => {
                let init = decl.initializer.as_ref()?;
                self.type_of_depth(init, &Env::new(scope), depth + 1)
            }
        }
    }

    /// Annotations describing the value an expression produces
    pub fn declared_source(&self, expr: &Expr, env: &Env<'a>) -> Option<DeclaredSource<'a>> {
        match &expr.skip_parens().kind {
            ExprKind::Name(name) if env.is_local(name) => {
                let fact = env.get(name)?;
                if let (Some(param), Some(method)) = (fact.param, env.method) {
                    return Some(DeclaredSource::Decl(DeclRef::Param(method, param)));
                }
                Some(DeclaredSource::Local(
                    self.decode_all(fact.annotations, env.scope),
                ))
            }
            ExprKind::Name(_) | ExprKind::Select { .. } => self
                .resolve_field_ref(expr, env)
                .map(|f| DeclaredSource::Decl(DeclRef::Field(f))),
            ExprKind::Call { .. } => match self.resolve_call(expr, env)? {
                Callee::Method(method) => Some(DeclaredSource::Decl(DeclRef::Method(method))),
                _ => None,
            },
            _ => None,
        }
    }

    /// `Owner.name` label of a callee; constructors use the class name
    pub fn callee_label(&self, callee: Callee) -> String {
        match callee {
            Callee::Method(method) => self.index.method_label(method),
            Callee::Constructor {
                method: Some(method),
                ..
            } => self.index.method_label(method),
            Callee::Constructor { class, .. } => self.index.class(class).simple_name().to_string(),
            Callee::Field(field) => self.index.field_label(field),
        }
    }
}

/// Walk one unit with every detector and return its unsuppressed findings
pub fn walk_unit(cx: &UnitContext<'_, '_>, detectors: &[Box<dyn Detector>]) -> Vec<Finding> {
    let mut walker = Walker {
        cx,
        detectors,
        findings: Vec::new(),
        suppressions: Vec::new(),
        class: None,
        return_target: None,
        threads: Vec::new(),
        test_depth: 0,
    };
    for detector in detectors {
        detector.check_unit(cx, &mut walker.findings);
    }
    for class in cx.index.top_level_classes(cx.unit_index) {
        walker.walk_class(*class, Vec::new());
    }
    walker.finish()
}

struct Walker<'w, 'c, 'a> {
    cx: &'w UnitContext<'c, 'a>,
    detectors: &'w [Box<dyn Detector>],
    findings: Vec<Finding>,
    suppressions: Vec<(Span, Vec<String>)>,
    class: Option<ClassId>,
    /// Method whose `return` statements are being walked
    return_target: Option<MethodId>,
    threads: Vec<ThreadContext>,
    test_depth: usize,
}

impl<'w, 'c, 'a> Walker<'w, 'c, 'a> {
    fn finish(self) -> Vec<Finding> {
        let Walker {
            cx,
            findings,
            suppressions,
            ..
        } = self;
        findings
            .into_iter()
            .filter(|finding| !is_suppressed(cx.unit, &suppressions, finding))
            .collect()
    }

    fn note_suppressions(&mut self, span: Span, annotations: &[Annotation]) {
        let ids = suppressed_ids(annotations);
        if !ids.is_empty() {
            self.suppressions.push((span, ids));
        }
    }

    fn in_test_context(&self) -> bool {
        self.cx.unit.is_test || self.test_depth > 0
    }

    fn scope(&self) -> Scope {
        Scope::new(self.cx.unit_index, self.class)
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn walk_class(&mut self, id: ClassId, inherited: Vec<ThreadContext>) {
        let cx = self.cx;
        let decl = cx.index.class(id).decl;
        self.note_suppressions(decl.span, &decl.annotations);

        let marks_test = cx.table.marks_test_context(DeclRef::Class(id));
        if marks_test {
            self.test_depth += 1;
        }
        let own = threads_in(cx.table.own(DeclRef::Class(id)));
        let ambient = if own.is_empty() { inherited } else { own };
        let saved_class = self.class.replace(id);
        let saved_threads = std::mem::replace(&mut self.threads, ambient.clone());
        let saved_return = self.return_target.take();

        for (index, field) in decl.fields.iter().enumerate() {
            self.note_suppressions(field.span, &field.annotations);
            let Some(init) = &field.initializer else {
                continue;
            };
            let field_id = FieldId { class: id, index };
            let marks = cx.table.marks_test_context(DeclRef::Field(field_id));
            if marks {
                self.test_depth += 1;
            }
            let mut env = Env::new(self.scope());
            self.walk_expr(init, &mut env);
            let constraints = cx.table.value_constraints(DeclRef::Field(field_id));
            if !constraints.is_empty() {
                self.emit_value(ValueSite {
                    target: ValueTarget::Field(field_id),
                    constraints,
                    expr: init,
                    env: &env,
                    is_initializer: true,
                });
            }
            if marks {
                self.test_depth -= 1;
            }
        }

        for block in &decl.initializers {
            let mut env = Env::new(self.scope());
            self.walk_block(block, &mut env);
        }

        for index in 0..decl.methods.len() {
            self.walk_method(MethodId { class: id, index }, &ambient);
        }

        for nested in &decl.classes {
            if let Some(nested_id) = cx.index.class_for_decl(cx.unit_index, nested) {
                self.walk_class(nested_id, ambient.clone());
            }
        }

        self.class = saved_class;
        self.threads = saved_threads;
        self.return_target = saved_return;
        if marks_test {
            self.test_depth -= 1;
        }
    }

    fn walk_method(&mut self, id: MethodId, class_threads: &[ThreadContext]) {
        let cx = self.cx;
        let method = cx.index.method(id);
        self.note_suppressions(method.span, &method.annotations);
        for param in &method.params {
            self.note_suppressions(param.span, &param.annotations);
        }
        let Some(body) = &method.body else {
            return;
        };

        let marks_test = cx.table.marks_test_context(DeclRef::Method(id));
        if marks_test {
            self.test_depth += 1;
        }
        let declared = cx.table.declared_threads(id);
        let threads = if declared.is_empty() {
            class_threads.to_vec()
        } else {
            declared
        };
        let saved_threads = std::mem::replace(&mut self.threads, threads);
        let saved_return = self.return_target.replace(id);

        let mut env = Env::new(self.scope());
        env.method = Some(id);
        for (index, param) in method.params.iter().enumerate() {
            env.declare(
                &param.name,
                LocalFact {
                    value: SymbolicValue::Unknown,
                    source: None,
                    ty: param.ty.as_ref(),
                    annotations: &param.annotations,
                    param: Some(index),
                },
            );
        }
        self.walk_block(body, &mut env);

        self.threads = saved_threads;
        self.return_target = saved_return;
        if marks_test {
            self.test_depth -= 1;
        }
    }

    fn walk_anonymous(&mut self, body: &'a ClassDecl, threads: Vec<ThreadContext>) {
        let cx = self.cx;
        if let Some(id) = cx.index.class_for_decl(cx.unit_index, body) {
            self.walk_class(id, threads);
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Returns true when the block always leaves through `return`
    fn walk_block(&mut self, stmts: &'a [Stmt], env: &mut Env<'a>) -> bool {
        let mut exits = false;
        for stmt in stmts {
            if self.walk_stmt(stmt, env) {
                exits = true;
            }
        }
        exits
    }

    fn walk_stmt(&mut self, stmt: &'a Stmt, env: &mut Env<'a>) -> bool {
        let cx = self.cx;
        match stmt {
            Stmt::Local {
                name,
                ty,
                annotations,
                init,
                span,
                ..
            } => {
                self.note_suppressions(*span, annotations);
                let value = match init {
                    Some(init) => {
                        self.walk_expr(init, env);
                        cx.evaluator().evaluate(init, env)
                    }
                    None => SymbolicValue::Unknown,
                };
                let value = match ty {
                    Some(ty) => coerce(value, ty.kind(), false),
                    None => value,
                };
                env.declare(
                    name,
                    LocalFact {
                        value,
                        source: init.as_ref(),
                        ty: ty.as_ref(),
                        annotations,
                        param: None,
                    },
                );
                if let Some(init) = init {
                    self.check_local_value(name, annotations, init, env, true);
                }
                false
            }
            Stmt::Expr(expr) => {
                self.walk_expr(expr, env);
                false
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.walk_expr(cond, env);
                let evaluator = cx.evaluator();
                let original = env.clone();

                let mut then_env = env.clone();
                for (name, value) in evaluator.guard_facts(cond, env, true) {
                    then_env.refine(&name, value);
                }
                let then_exits = self.walk_block(then_branch, &mut then_env);

                let mut else_env = env.clone();
                for (name, value) in evaluator.guard_facts(cond, env, false) {
                    else_env.refine(&name, value);
                }
                let else_exits = match else_branch {
                    Some(branch) => self.walk_block(branch, &mut else_env),
                    None => false,
                };

                match (then_exits, else_exits) {
                    (true, true) => {}
                    (true, false) => env.absorb(&else_env),
                    (false, true) => env.absorb(&then_env),
                    (false, false) => {
                        let mut assigned = Vec::new();
                        for stmt in then_branch.iter().chain(else_branch.iter().flatten()) {
                            stmt.collect_assigned(&mut assigned);
                        }
                        env.merge_from(&then_env, &else_env);
                        env.restore_unassigned(&original, &assigned);
                    }
                }
                then_exits && else_exits
            }
            Stmt::Loop {
                header, cond, body, ..
            } => {
                let mut assigned = Vec::new();
                stmt.collect_assigned(&mut assigned);

                let mut loop_env = env.clone();
                for stmt in header {
                    self.walk_stmt(stmt, &mut loop_env);
                }
                for name in &assigned {
                    loop_env.invalidate(name);
                }
                if let Some(cond) = cond {
                    self.walk_expr(cond, &mut loop_env);
                }
                self.walk_block(body, &mut loop_env);

                env.absorb(&loop_env);
                for name in &assigned {
                    env.invalidate(name);
                }
                false
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.walk_expr(value, env);
                    if let Some(method) = self.return_target {
                        let constraints = cx.table.value_constraints(DeclRef::Method(method));
                        if !constraints.is_empty() {
                            self.emit_value(ValueSite {
                                target: ValueTarget::Return(method),
                                constraints,
                                expr: value,
                                env,
                                is_initializer: false,
                            });
                        }
                    }
                }
                true
            }
            Stmt::Block(stmts) => {
                let mut inner = env.clone();
                let exits = self.walk_block(stmts, &mut inner);
                env.absorb(&inner);
                exits
            }
            Stmt::Class(decl) => {
                self.walk_anonymous(decl, self.threads.clone());
                false
            }
            Stmt::Other(exprs) => {
                for expr in exprs {
                    self.walk_expr(expr, env);
                }
                false
            }
        }
    }

    fn check_local_value(
        &mut self,
        name: &str,
        annotations: &'a [Annotation],
        value: &'a Expr,
        env: &Env<'a>,
        is_initializer: bool,
    ) {
        if annotations.is_empty() {
            return;
        }
        let resolved = self.cx.decode_all(annotations, env.scope);
        let constraints = ValueConstraints::from_annotations(&resolved);
        if constraints.is_empty() {
            return;
        }
        self.emit_value(ValueSite {
            target: ValueTarget::Local(name.to_string()),
            constraints,
            expr: value,
            env,
            is_initializer,
        });
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn walk_expr(&mut self, expr: &'a Expr, env: &mut Env<'a>) {
        let cx = self.cx;
        match &expr.kind {
            ExprKind::Assign { target, op, value } => {
                self.walk_expr(value, env);
                self.walk_expr(target, env);
                let new_value = cx.evaluator().evaluate(expr, env);
                match &target.skip_parens().kind {
                    ExprKind::Name(name) if env.is_local(name) => {
                        let source = if op.is_none() {
                            Some(value.as_ref())
                        } else {
                            None
                        };
                        env.assign(name, new_value, source);
                        if op.is_none() {
                            let annotations = env.get(name).map(|f| f.annotations).unwrap_or(&[]);
                            self.check_local_value(name, annotations, value, env, false);
                        }
                    }
                    _ => {
                        if op.is_some() {
                            return;
                        }
                        if let Some(field) = cx.resolve_field_ref(target, env) {
                            let constraints = cx.table.value_constraints(DeclRef::Field(field));
                            if !constraints.is_empty() {
                                self.emit_value(ValueSite {
                                    target: ValueTarget::Field(field),
                                    constraints,
                                    expr: value,
                                    env,
                                    is_initializer: false,
                                });
                            }
                        }
                    }
                }
            }
            ExprKind::Unary {
                op: op @ (UnaryOp::Increment | UnaryOp::Decrement),
                operand,
            } => {
                self.walk_expr(operand, env);
                if let ExprKind::Name(name) = &operand.skip_parens().kind {
                    if let Some(fact) = env.get(name) {
                        let step = if *op == UnaryOp::Increment {
                            BinaryOp::Add
                        } else {
                            BinaryOp::Sub
                        };
                        let next = apply_binary(step, &fact.value, &SymbolicValue::Int(1));
                        env.assign(name, next, None);
                    }
                }
            }
            ExprKind::Call {
                receiver,
                args,
                name_span,
                ..
            } => {
                if let Some(receiver) = receiver {
                    self.walk_expr(receiver, env);
                }
                let callee = cx.resolve_call(expr, env);
                self.walk_args(callee, args, env);
                if let Some(callee) = callee {
                    let threads = self.threads.clone();
                    self.emit_call(callee, expr, *name_span, receiver.as_deref(), args, env, threads);
                }
            }
            ExprKind::New { .. } => self.walk_new(expr, env, self.threads.clone()),
            ExprKind::Lambda { params, body } => {
                self.walk_lambda(params, body, env, self.threads.clone())
            }
            ExprKind::MethodRef { .. } => self.walk_method_ref(expr, env, self.threads.clone()),
            ExprKind::Name(_) => self.field_reference(expr, None, env),
            ExprKind::Select { receiver, .. } => {
                self.walk_expr(receiver, env);
                self.field_reference(expr, Some(receiver), env);
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.walk_expr(cond, env);
                let evaluator = cx.evaluator();
                let mut then_env = env.clone();
                for (name, value) in evaluator.guard_facts(cond, env, true) {
                    then_env.refine(&name, value);
                }
                self.walk_expr(then_expr, &mut then_env);
                let mut else_env = env.clone();
                for (name, value) in evaluator.guard_facts(cond, env, false) {
                    else_env.refine(&name, value);
                }
                self.walk_expr(else_expr, &mut else_env);
            }
            ExprKind::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                lhs,
                rhs,
            } => {
                self.walk_expr(lhs, env);
                let mut rhs_env = env.clone();
                for (name, value) in cx.evaluator().guard_facts(lhs, env, *op == BinaryOp::And) {
                    rhs_env.refine(&name, value);
                }
                self.walk_expr(rhs, &mut rhs_env);
            }
            ExprKind::Switch(switch) => {
                if let Some(subject) = &switch.subject {
                    self.walk_expr(subject, env);
                }
                let site = SwitchSite { switch, expr, env };
                for detector in self.detectors {
                    detector.check_switch(cx, &site, &mut self.findings);
                }

                let mut assigned = Vec::new();
                for case in &switch.cases {
                    for stmt in &case.body {
                        stmt.collect_assigned(&mut assigned);
                    }
                }
                for case in &switch.cases {
                    let mut case_env = env.clone();
                    self.walk_block(&case.body, &mut case_env);
                }
                for name in &assigned {
                    env.invalidate(name);
                }
            }
            _ => {
                for child in expr.children() {
                    self.walk_expr(child, env);
                }
            }
        }
    }

    fn walk_args(&mut self, callee: Option<Callee>, args: &'a [Expr], env: &mut Env<'a>) {
        let cx = self.cx;
        let method = callee.and_then(|c| c.method());
        for (i, arg) in args.iter().enumerate() {
            let param_threads = method
                .and_then(|m| param_index(cx.index, m, i).map(|p| (m, p)))
                .map(|(m, p)| threads_in(cx.table.own(DeclRef::Param(m, p))))
                .unwrap_or_default();
            match &arg.skip_parens().kind {
                ExprKind::Lambda { params, body } => {
                    self.walk_lambda(params, body, env, param_threads)
                }
                ExprKind::MethodRef { .. } => {
                    self.walk_method_ref(arg.skip_parens(), env, param_threads)
                }
                ExprKind::New { body: Some(_), .. } => {
                    self.walk_new(arg.skip_parens(), env, param_threads)
                }
                _ => self.walk_expr(arg, env),
            }
        }
    }

    fn walk_new(&mut self, expr: &'a Expr, env: &mut Env<'a>, body_threads: Vec<ThreadContext>) {
        let ExprKind::New { args, body, .. } = &expr.kind else {
            return;
        };
        let callee = self.cx.resolve_call(expr, env);
        self.walk_args(callee, args, env);
        if let Some(callee) = callee {
            let threads = self.threads.clone();
            self.emit_call(callee, expr, expr.span, None, args, env, threads);
        }
        if let Some(body) = body {
            self.walk_anonymous(body, body_threads);
        }
    }

    fn walk_lambda(
        &mut self,
        params: &'a [String],
        body: &'a [Stmt],
        env: &mut Env<'a>,
        threads: Vec<ThreadContext>,
    ) {
        let mut inner = env.clone();
        for param in params {
            inner.declare(param, LocalFact::new(SymbolicValue::Unknown, None));
        }
        let saved_threads = std::mem::replace(&mut self.threads, threads);
        let saved_return = self.return_target.take();
        self.walk_block(body, &mut inner);
        self.threads = saved_threads;
        self.return_target = saved_return;

        let mut assigned = Vec::new();
        for stmt in body {
            stmt.collect_assigned(&mut assigned);
        }
        for name in &assigned {
            env.invalidate(name);
        }
    }

    fn walk_method_ref(&mut self, expr: &'a Expr, env: &mut Env<'a>, threads: Vec<ThreadContext>) {
        let ExprKind::MethodRef { receiver, .. } = &expr.kind else {
            return;
        };
        self.walk_expr(receiver, env);
        if let Some(callee) = self.cx.resolve_call(expr, env) {
            self.emit_call(callee, expr, expr.span, Some(receiver), &[], env, threads);
        }
    }

    fn field_reference(&mut self, expr: &'a Expr, receiver: Option<&'a Expr>, env: &Env<'a>) {
        if let Some(field) = self.cx.resolve_field_ref(expr, env) {
            let threads = self.threads.clone();
            self.emit_call(Callee::Field(field), expr, expr.span, receiver, &[], env, threads);
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn emit_call(
        &mut self,
        callee: Callee,
        expr: &'a Expr,
        name_span: Span,
        receiver: Option<&'a Expr>,
        args: &'a [Expr],
        env: &Env<'a>,
        caller_threads: Vec<ThreadContext>,
    ) {
        let cx = self.cx;
        let args = match callee.method() {
            Some(method) => args
                .iter()
                .enumerate()
                .filter_map(|(i, expr)| {
                    let param = param_index(cx.index, method, i)?;
                    let vararg = cx.index.method(method).params[param].is_varargs;
                    Some(BoundArg {
                        param,
                        expr,
                        vararg,
                    })
                })
                .collect(),
            None => Vec::new(),
        };
        let site = CallSite {
            callee,
            expr,
            name_span,
            receiver,
            args,
            env,
            caller_threads,
            class: self.class,
            in_test_context: self.in_test_context(),
        };
        for detector in self.detectors {
            detector.check_call(cx, &site, &mut self.findings);
        }
    }

    fn emit_value(&mut self, site: ValueSite<'_, 'a>) {
        for detector in self.detectors {
            detector.check_value(self.cx, &site, &mut self.findings);
        }
    }
}

/// Parameter an argument at `position` binds to; varargs absorb the rest
fn param_index(index: &DeclarationIndex, method: MethodId, position: usize) -> Option<usize> {
    let decl = index.method(method);
    let count = decl.params.len();
    if decl.is_varargs() && position + 1 >= count {
        Some(count - 1)
    } else if position < count {
        Some(position)
    } else {
        None
    }
}

fn is_suppressed(unit: &SourceUnit, suppressions: &[(Span, Vec<String>)], finding: &Finding) -> bool {
    let id = finding.issue.id();
    let names_issue = |candidate: &str| {
        let candidate = candidate.trim();
        candidate == "all"
            || candidate.eq_ignore_ascii_case(id)
            || candidate
                .strip_prefix("AndroidLint")
                .is_some_and(|rest| rest.eq_ignore_ascii_case(id))
    };
    let span = finding.location.span;
    if suppressions
        .iter()
        .any(|(range, ids)| range.start <= span.start && span.end <= range.end && ids.iter().any(|i| names_issue(i)))
    {
        return true;
    }
    if span.line > 1 {
        if let Some(previous) = unit.line_text(span.line - 1) {
            if let Some(rest) = previous.trim().strip_prefix("//noinspection") {
                return rest
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .any(|token| !token.is_empty() && names_issue(token));
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Issue, Severity};
    use crate::graph::DeclarationIndex;
    use crate::parser::parse_source;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Records what the walker hands to detectors
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        report: bool,
    }

    impl Detector for Recorder {
        fn issues(&self) -> &'static [Issue] {
            &[Issue::Range]
        }

        fn check_call<'a>(&self, cx: &UnitContext<'_, 'a>, site: &CallSite<'_, 'a>, out: &mut Vec<Finding>) {
            let Callee::Method(method) = site.callee else {
                return;
            };
            let value = site
                .args
                .first()
                .map(|arg| cx.evaluator().evaluate(arg.expr, site.env).display())
                .unwrap_or_default();
            let threads: Vec<&str> = site.caller_threads.iter().map(|t| t.label()).collect();
            self.calls.lock().unwrap().push(format!(
                "{}({}) [{}]",
                cx.index.method(method).name,
                value,
                threads.join(",")
            ));
            if self.report {
                out.push(
                    Finding::new(Issue::Range, cx.location(site.name_span), "call")
                        .with_severity(Severity::Error),
                );
            }
        }
    }

    fn walk(source: &str, report: bool) -> (Vec<String>, Vec<Finding>) {
        let unit = parse_source(Path::new("src/main/java/p/A.java"), Language::Java, source)
            .expect("parse");
        let units = vec![unit];
        let index = DeclarationIndex::build(&units);
        let table = AnnotationTable::build(&index);
        let config = Config::default();
        let cx = UnitContext::new(&index, &table, &config, 0);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let detectors: Vec<Box<dyn Detector>> = vec![Box::new(Recorder {
            calls: Arc::clone(&calls),
            report,
        })];
        let findings = walk_unit(&cx, &detectors);
        let calls = calls.lock().unwrap().clone();
        (calls, findings)
    }

    #[test]
    fn test_flow_facts_follow_assignments_and_merges() {
        let source = r#"
package p;
public class A {
    static void take(int v) {}
    void m(boolean c) {
        int a = 5;
        take(a);
        if (c) { a = 7; }
        take(a);
        int b = 3;
        for (int i = 0; i < 10; i++) { b = i; }
        take(b);
        int d = 1;
        if (c) { take(d); }
        take(d);
    }
}
"#;
        let (calls, _) = walk(source, false);
        assert_eq!(
            calls,
            vec![
                "take(5) []",
                "take(unknown) []",
                "take(unknown) []",
                "take(1) []",
                "take(1) []"
            ]
        );
    }

    #[test]
    fn test_guards_narrow_inside_branch_only() {
        let source = r#"
package p;
public class A {
    static void take(int v) {}
    void m(int x) {
        if (x == 4) {
            take(x);
        }
        take(x);
    }
}
"#;
        let (calls, _) = walk(source, false);
        assert_eq!(calls, vec!["take(4) []", "take(unknown) []"]);
    }

    #[test]
    fn test_lambda_takes_thread_of_parameter() {
        let source = r#"
package p;
import androidx.annotation.UiThread;
import androidx.annotation.WorkerThread;
public class A {
    static void runOnWorker(@WorkerThread Runnable r) {}
    static void runAnywhere(Runnable r) {}
    static void work() {}
    @UiThread
    void m() {
        runOnWorker(() -> work());
        runAnywhere(() -> work());
        work();
    }
}
"#;
        let (calls, _) = walk(source, false);
        assert!(calls.contains(&"work() [worker]".to_string()), "{:?}", calls);
        assert!(calls.contains(&"work() []".to_string()), "{:?}", calls);
        assert!(calls.contains(&"work() [UI]".to_string()), "{:?}", calls);
    }

    #[test]
    fn test_suppression_annotations_and_comments() {
        let source = r#"
package p;
import android.annotation.SuppressLint;
public class A {
    static void take(int v) {}
    @SuppressLint("Range")
    void quiet() {
        take(1);
    }
    void commented() {
        //noinspection Range
        take(2);
    }
    void loud() {
        take(3);
    }
}
"#;
        let (calls, findings) = walk(source, true);
        assert_eq!(calls.len(), 3);
        assert_eq!(findings.len(), 1, "only the unsuppressed call should remain");
        assert_eq!(findings[0].location.span.line, 15);
    }
}
