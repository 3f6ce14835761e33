//! Annotation resolution
//!
//! Annotation names are normalised once into an [`AnnotationKey`]: the
//! `androidx.annotation`, `android.support.annotation` and
//! `android.annotation` spellings of the same annotation map to the same key,
//! and user-declared typedef annotations (`@IntDef(...) @interface Mode`)
//! map to [`AnnotationKey::Typedef`].
//!
//! [`AnnotationTable`] decodes every annotation on every indexed declaration
//! into an [`AnnotationConstraint`] before any checker runs, and answers the
//! "effective annotation" questions the checkers ask:
//!
//! - value constraints of a method return: own first, then overridden methods
//! - value constraints of a parameter: own, then the same parameter of the
//!   overridden methods
//! - thread contexts of a callee: method, overridden methods, then the
//!   declaring class and its outer classes
//! - restrictions: member, then declaring class and outer classes; never
//!   inherited through overrides

use super::constraints::{
    AnnotationConstraint, FloatRangeConstraint, IntRangeConstraint, RestrictScope, Restriction,
    SizeConstraint, ThreadContext, TypedefConstraint, TypedefKind, TypedefValue, Visibility,
};
use super::evaluator::{ConstantEvaluator, Env};
use super::value::SymbolicValue;
use crate::ast::{Annotation, ClassKind, Expr, ExprKind, Literal};
use crate::graph::{ClassId, DeclRef, DeclarationIndex, FieldId, MethodId, Scope};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const ANNOTATION_PACKAGES: &[&str] = &[
    "androidx.annotation.",
    "android.support.annotation.",
    "android.annotation.",
];

/// Canonical identity of a recognised annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKey {
    IntRange,
    FloatRange,
    Size,
    IntDef,
    LongDef,
    StringDef,
    UiThread,
    MainThread,
    WorkerThread,
    BinderThread,
    AnyThread,
    RestrictTo,
    VisibleForTesting,
    Hide,
    /// Usage of a user annotation class that carries a typedef
    Typedef(ClassId),
}

impl AnnotationKey {
    pub fn from_simple_name(name: &str) -> Option<Self> {
        Some(match name {
            "IntRange" => AnnotationKey::IntRange,
            "FloatRange" => AnnotationKey::FloatRange,
            "Size" => AnnotationKey::Size,
            "IntDef" => AnnotationKey::IntDef,
            "LongDef" => AnnotationKey::LongDef,
            "StringDef" => AnnotationKey::StringDef,
            "UiThread" => AnnotationKey::UiThread,
            "MainThread" => AnnotationKey::MainThread,
            "WorkerThread" => AnnotationKey::WorkerThread,
            "BinderThread" => AnnotationKey::BinderThread,
            "AnyThread" => AnnotationKey::AnyThread,
            "RestrictTo" => AnnotationKey::RestrictTo,
            "VisibleForTesting" => AnnotationKey::VisibleForTesting,
            "Hide" => AnnotationKey::Hide,
            _ => return None,
        })
    }

    /// Map a fully qualified annotation name, any supported package spelling
    pub fn from_qualified_name(name: &str) -> Option<Self> {
        match name {
            "com.google.common.annotations.VisibleForTesting"
            | "org.jetbrains.annotations.VisibleForTesting" => {
                return Some(AnnotationKey::VisibleForTesting)
            }
            "com.google.android.gms.common.internal.Hide" => return Some(AnnotationKey::Hide),
            _ => {}
        }
        ANNOTATION_PACKAGES
            .iter()
            .filter_map(|prefix| name.strip_prefix(prefix))
            .find(|rest| !rest.contains('.'))
            .and_then(Self::from_simple_name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnnotationKey::IntRange => "IntRange",
            AnnotationKey::FloatRange => "FloatRange",
            AnnotationKey::Size => "Size",
            AnnotationKey::IntDef => "IntDef",
            AnnotationKey::LongDef => "LongDef",
            AnnotationKey::StringDef => "StringDef",
            AnnotationKey::UiThread => "UiThread",
            AnnotationKey::MainThread => "MainThread",
            AnnotationKey::WorkerThread => "WorkerThread",
            AnnotationKey::BinderThread => "BinderThread",
            AnnotationKey::AnyThread => "AnyThread",
            AnnotationKey::RestrictTo => "RestrictTo",
            AnnotationKey::VisibleForTesting => "VisibleForTesting",
            AnnotationKey::Hide => "Hide",
            AnnotationKey::Typedef(_) => "typedef",
        }
    }

    pub fn thread_context(&self) -> Option<ThreadContext> {
        Some(match self {
            AnnotationKey::UiThread => ThreadContext::Ui,
            AnnotationKey::MainThread => ThreadContext::Main,
            AnnotationKey::WorkerThread => ThreadContext::Worker,
            AnnotationKey::BinderThread => ThreadContext::Binder,
            AnnotationKey::AnyThread => ThreadContext::Any,
            _ => return None,
        })
    }

    fn typedef_kind(&self) -> Option<TypedefKind> {
        match self {
            AnnotationKey::IntDef => Some(TypedefKind::Int),
            AnnotationKey::LongDef => Some(TypedefKind::Long),
            AnnotationKey::StringDef => Some(TypedefKind::String),
            _ => None,
        }
    }
}

/// A recognised annotation with its decoded constraint
#[derive(Debug, Clone)]
pub struct ResolvedAnnotation<'a> {
    pub key: AnnotationKey,
    pub annotation: &'a Annotation,
    /// Unit the annotation is written in
    pub unit: usize,
    pub constraint: AnnotationConstraint,
}

/// First value constraint of each category in effect for a declaration
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueConstraints<'t> {
    pub int_range: Option<&'t IntRangeConstraint>,
    pub float_range: Option<&'t FloatRangeConstraint>,
    pub size: Option<&'t SizeConstraint>,
    pub typedef: Option<&'t TypedefConstraint>,
}

impl<'t> ValueConstraints<'t> {
    pub fn from_annotations<'a: 't>(annotations: &'t [ResolvedAnnotation<'a>]) -> Self {
        let mut out = Self::default();
        out.fill_from(annotations);
        out
    }

    /// Fill categories still missing from `annotations`
    pub fn fill_from<'a: 't>(&mut self, annotations: &'t [ResolvedAnnotation<'a>]) {
        for resolved in annotations {
            match &resolved.constraint {
                AnnotationConstraint::IntRange(c) if self.int_range.is_none() => {
                    self.int_range = Some(c)
                }
                AnnotationConstraint::FloatRange(c) if self.float_range.is_none() => {
                    self.float_range = Some(c)
                }
                AnnotationConstraint::Size(c) if self.size.is_none() => self.size = Some(c),
                AnnotationConstraint::Typedef(c) if self.typedef.is_none() => {
                    self.typedef = Some(c)
                }
                _ => {}
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.int_range.is_none()
            && self.float_range.is_none()
            && self.size.is_none()
            && self.typedef.is_none()
    }
}

pub fn threads_in(annotations: &[ResolvedAnnotation<'_>]) -> Vec<ThreadContext> {
    let mut out = Vec::new();
    for resolved in annotations {
        if let AnnotationConstraint::Threads(threads) = &resolved.constraint {
            for thread in threads {
                if !out.contains(thread) {
                    out.push(*thread);
                }
            }
        }
    }
    out
}

fn restriction_in(annotations: &[ResolvedAnnotation<'_>]) -> Option<Restriction> {
    let mut merged: Option<Restriction> = None;
    for resolved in annotations {
        if let AnnotationConstraint::Restriction(restriction) = &resolved.constraint {
            let target = merged.get_or_insert_with(Restriction::default);
            for scope in &restriction.scopes {
                if !target.has(*scope) {
                    target.scopes.push(*scope);
                }
            }
        }
    }
    merged
}

/// Decoded annotations of every indexed declaration
pub struct AnnotationTable<'i, 'a> {
    index: &'i DeclarationIndex<'a>,
    by_decl: HashMap<DeclRef, Vec<ResolvedAnnotation<'a>>>,
    typedef_classes: HashMap<ClassId, TypedefConstraint>,
    flag_fields: HashSet<FieldId>,
}

impl<'i, 'a> AnnotationTable<'i, 'a> {
    pub fn build(index: &'i DeclarationIndex<'a>) -> Self {
        let mut table = Self {
            index,
            by_decl: HashMap::new(),
            typedef_classes: HashMap::new(),
            flag_fields: HashSet::new(),
        };

        // Typedef annotation classes first, so `@Mode` usages resolve below
        for class_id in index.class_ids() {
            let info = index.class(class_id);
            if info.decl.kind != ClassKind::AnnotationType {
                continue;
            }
            let scope = Scope::new(info.unit, Some(class_id));
            for annotation in &info.decl.annotations {
                let Some(kind) = table
                    .resolve_key(&annotation.name, scope)
                    .and_then(|k| k.typedef_kind())
                else {
                    continue;
                };
                let mut typedef = table.decode_typedef(annotation, kind, scope);
                typedef.declaration = Some(class_id);
                table.typedef_classes.insert(class_id, typedef);
                break;
            }
        }

        for class_id in index.class_ids() {
            let info = index.class(class_id);
            let scope = Scope::new(info.unit, Some(class_id));
            table.insert(DeclRef::Class(class_id), &info.decl.annotations, scope);
            for (i, field) in info.decl.fields.iter().enumerate() {
                let id = FieldId {
                    class: class_id,
                    index: i,
                };
                table.insert(DeclRef::Field(id), &field.annotations, scope);
            }
            for (i, method) in info.decl.methods.iter().enumerate() {
                let id = MethodId {
                    class: class_id,
                    index: i,
                };
                table.insert(DeclRef::Method(id), &method.annotations, scope);
                for (p, param) in method.params.iter().enumerate() {
                    table.insert(DeclRef::Param(id, p), &param.annotations, scope);
                }
            }
        }

        let flag_fields: Vec<FieldId> = table
            .typedef_classes
            .values()
            .chain(table.by_decl.values().flatten().filter_map(|r| {
                match (&r.key, &r.constraint) {
                    (AnnotationKey::IntDef | AnnotationKey::LongDef, AnnotationConstraint::Typedef(t)) => Some(t),
                    _ => None,
                }
            }))
            .filter(|typedef| typedef.flag)
            .flat_map(|typedef| typedef.values.iter().filter_map(|v| v.field))
            .collect();
        table.flag_fields.extend(flag_fields);

        debug!(
            "Decoded annotations on {} declarations ({} typedefs)",
            table.by_decl.len(),
            table.typedef_classes.len()
        );
        table
    }

    fn insert(&mut self, decl: DeclRef, annotations: &'a [Annotation], scope: Scope) {
        let resolved: Vec<ResolvedAnnotation<'a>> = annotations
            .iter()
            .filter_map(|a| self.decode(a, scope))
            .collect();
        if !resolved.is_empty() {
            self.by_decl.insert(decl, resolved);
        }
    }

    pub fn index(&self) -> &'i DeclarationIndex<'a> {
        self.index
    }

    /// Resolve and decode one annotation written in `scope`
    pub fn decode(&self, annotation: &'a Annotation, scope: Scope) -> Option<ResolvedAnnotation<'a>> {
        let key = self.resolve_key(&annotation.name, scope)?;
        let constraint = match key {
            AnnotationKey::IntRange => {
                let mut range = IntRangeConstraint::default();
                if let Some(from) = self.attribute_value(annotation, "from", scope).as_i64() {
                    range.from = from;
                }
                if let Some(to) = self.attribute_value(annotation, "to", scope).as_i64() {
                    range.to = to;
                }
                AnnotationConstraint::IntRange(range)
            }
            AnnotationKey::FloatRange => {
                let mut range = FloatRangeConstraint::default();
                if let Some(from) = self.attribute_value(annotation, "from", scope).as_f64() {
                    range.from = from;
                }
                if let Some(to) = self.attribute_value(annotation, "to", scope).as_f64() {
                    range.to = to;
                }
                if let SymbolicValue::Bool(b) =
                    self.attribute_value(annotation, "fromInclusive", scope)
                {
                    range.from_inclusive = b;
                }
                if let SymbolicValue::Bool(b) = self.attribute_value(annotation, "toInclusive", scope)
                {
                    range.to_inclusive = b;
                }
                AnnotationConstraint::FloatRange(range)
            }
            AnnotationKey::Size => AnnotationConstraint::Size(SizeConstraint {
                exact: self.attribute_value(annotation, "value", scope).as_i64(),
                min: self.attribute_value(annotation, "min", scope).as_i64(),
                max: self.attribute_value(annotation, "max", scope).as_i64(),
                multiple: self.attribute_value(annotation, "multiple", scope).as_i64(),
            }),
            AnnotationKey::IntDef | AnnotationKey::LongDef | AnnotationKey::StringDef => {
                let kind = key.typedef_kind()?;
                AnnotationConstraint::Typedef(self.decode_typedef(annotation, kind, scope))
            }
            AnnotationKey::Typedef(class) => {
                AnnotationConstraint::Typedef(self.typedef_classes.get(&class)?.clone())
            }
            AnnotationKey::RestrictTo => {
                let scopes = annotation
                    .values("value")
                    .into_iter()
                    .filter_map(|v| v.selector_name())
                    .filter_map(RestrictScope::from_name)
                    .collect();
                AnnotationConstraint::Restriction(Restriction { scopes })
            }
            AnnotationKey::Hide => AnnotationConstraint::Restriction(Restriction {
                scopes: vec![RestrictScope::Hidden],
            }),
            AnnotationKey::VisibleForTesting => {
                let otherwise = match annotation.attribute("otherwise") {
                    Some(expr) => expr
                        .selector_name()
                        .and_then(Visibility::from_name)
                        .or_else(|| {
                            self.evaluate(expr, scope)
                                .as_i64()
                                .and_then(Visibility::from_code)
                        })
                        .unwrap_or(Visibility::Private),
                    None => Visibility::Private,
                };
                AnnotationConstraint::VisibleForTesting(otherwise)
            }
            thread => AnnotationConstraint::Threads(vec![thread.thread_context()?]),
        };
        Some(ResolvedAnnotation {
            key,
            annotation,
            unit: scope.unit,
            constraint,
        })
    }

    fn resolve_key(&self, name: &str, scope: Scope) -> Option<AnnotationKey> {
        let qualified = name.contains('.');
        if qualified {
            if let Some(key) = AnnotationKey::from_qualified_name(name) {
                return Some(key);
            }
        }

        let unit = self.index.unit(scope.unit);
        let import = if qualified {
            None
        } else {
            unit.imports
                .iter()
                .find(|i| !i.wildcard && i.visible_name() == Some(name))
        };
        if let Some(import) = import {
            if let Some(key) = AnnotationKey::from_qualified_name(&import.path) {
                return Some(key);
            }
        }

        if let Some(class) = self.index.resolve_type(name, scope) {
            if self.typedef_classes.contains_key(&class) {
                return Some(AnnotationKey::Typedef(class));
            }
            return AnnotationKey::from_qualified_name(&self.index.class(class).qualified_name);
        }

        if qualified || import.is_some() {
            None
        } else {
            AnnotationKey::from_simple_name(name)
        }
    }

    fn evaluate(&self, expr: &Expr, scope: Scope) -> SymbolicValue {
        ConstantEvaluator::new(self.index).evaluate(expr, &Env::new(scope))
    }

    fn attribute_value(&self, annotation: &Annotation, name: &str, scope: Scope) -> SymbolicValue {
        match annotation.attribute(name) {
            Some(expr) => self.evaluate(expr, scope),
            None => SymbolicValue::Unknown,
        }
    }

    fn decode_typedef(
        &self,
        annotation: &Annotation,
        kind: TypedefKind,
        scope: Scope,
    ) -> TypedefConstraint {
        let evaluator = ConstantEvaluator::new(self.index);
        let env = Env::new(scope);
        let unit = self.index.unit(scope.unit);
        let values = annotation
            .values("value")
            .into_iter()
            .map(|expr| {
                let field = evaluator.resolve_field(expr, &env);
                let written = unit.text(expr.span).trim().to_string();
                let value = match kind {
                    TypedefKind::Long => match evaluator.evaluate(expr, &env) {
                        SymbolicValue::Int(v) => SymbolicValue::Long(i64::from(v)),
                        other => other,
                    },
                    _ => evaluator.evaluate(expr, &env),
                };
                let label = match field {
                    Some(id) => self.index.field_label(id),
                    None if written.is_empty() => literal_label(expr, &value),
                    None => written.clone(),
                };
                TypedefValue {
                    label,
                    written: if written.is_empty() {
                        literal_label(expr, &value)
                    } else {
                        written
                    },
                    field,
                    value,
                    span: expr.span,
                }
            })
            .collect();
        TypedefConstraint {
            values,
            flag: self.attribute_value(annotation, "flag", scope) == SymbolicValue::Bool(true),
            open: self.attribute_value(annotation, "open", scope) == SymbolicValue::Bool(true),
            kind,
            declaration: None,
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Annotations written on the declaration itself
    pub fn own(&self, decl: DeclRef) -> &[ResolvedAnnotation<'a>] {
        self.by_decl.get(&decl).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn entries(&self) -> impl Iterator<Item = (DeclRef, &ResolvedAnnotation<'a>)> {
        self.by_decl
            .iter()
            .flat_map(|(decl, list)| list.iter().map(move |r| (*decl, r)))
    }

    pub fn typedef_of_class(&self, class: ClassId) -> Option<&TypedefConstraint> {
        self.typedef_classes.get(&class)
    }

    /// Field referenced by a `flag = true` typedef
    pub fn is_flag_field(&self, field: FieldId) -> bool {
        self.flag_fields.contains(&field)
    }

    /// Value constraints in effect for a field, method return or parameter
    pub fn value_constraints(&self, decl: DeclRef) -> ValueConstraints<'_> {
        let mut out = ValueConstraints::from_annotations(self.own(decl));
        match decl {
            DeclRef::Method(method) => {
                for overridden in self.index.overridden_methods(method) {
                    out.fill_from(self.own(DeclRef::Method(overridden)));
                }
            }
            DeclRef::Param(method, param) => {
                for overridden in self.index.overridden_methods(method) {
                    out.fill_from(self.own(DeclRef::Param(overridden, param)));
                }
            }
            DeclRef::Class(_) | DeclRef::Field(_) => {}
        }
        out
    }

    /// Contexts declared on the method or, failing that, the methods it overrides
    pub fn declared_threads(&self, method: MethodId) -> Vec<ThreadContext> {
        let own = threads_in(self.own(DeclRef::Method(method)));
        if !own.is_empty() {
            return own;
        }
        for overridden in self.index.overridden_methods(method) {
            let threads = threads_in(self.own(DeclRef::Method(overridden)));
            if !threads.is_empty() {
                return threads;
            }
        }
        Vec::new()
    }

    /// Contexts of the class or its nearest annotated outer class
    pub fn class_threads(&self, class: ClassId) -> Vec<ThreadContext> {
        for candidate in self.index.class_chain(class) {
            let threads = threads_in(self.own(DeclRef::Class(candidate)));
            if !threads.is_empty() {
                return threads;
            }
        }
        Vec::new()
    }

    /// Contexts a call to `method` requires
    pub fn callee_threads(&self, method: MethodId) -> Vec<ThreadContext> {
        let declared = self.declared_threads(method);
        if !declared.is_empty() {
            return declared;
        }
        self.class_threads(method.class)
    }

    /// Restriction of a declaration, falling back to its enclosing classes
    pub fn restriction(&self, decl: DeclRef) -> Option<Restriction> {
        if let Some(own) = restriction_in(self.own(decl)) {
            return Some(own);
        }
        let class = match decl {
            DeclRef::Class(class) => self.index.class(class).outer?,
            DeclRef::Field(field) => field.class,
            DeclRef::Method(method) | DeclRef::Param(method, _) => method.class,
        };
        self.index
            .class_chain(class)
            .into_iter()
            .find_map(|c| restriction_in(self.own(DeclRef::Class(c))))
    }

    pub fn visibility(&self, decl: DeclRef) -> Option<Visibility> {
        self.own(decl).iter().find_map(|r| match r.constraint {
            AnnotationConstraint::VisibleForTesting(visibility) => Some(visibility),
            _ => None,
        })
    }

    /// `@VisibleForTesting` or `@RestrictTo(TESTS)` on the declaration
    pub fn marks_test_context(&self, decl: DeclRef) -> bool {
        self.own(decl).iter().any(|r| match &r.constraint {
            AnnotationConstraint::VisibleForTesting(_) => true,
            AnnotationConstraint::Restriction(restriction) => {
                restriction.has(RestrictScope::Tests)
            }
            _ => false,
        })
    }
}

fn literal_label(expr: &Expr, value: &SymbolicValue) -> String {
    match &expr.kind {
        ExprKind::Literal(Literal::Str(s)) => format!("\"{}\"", s),
        _ => value.display(),
    }
}
