//! Frozen cross-file declaration index
//!
//! Built once from every parsed [`SourceUnit`] before any checker runs, then
//! shared read-only across analysis threads. Provides class, field and
//! method lookup by name with the usual Java/Kotlin scoping rules, and the
//! class hierarchy.

mod hierarchy;

pub use hierarchy::TypeHierarchy;

use crate::ast::{ClassDecl, Expr, ExprKind, FieldDecl, MethodDecl, SourceUnit, Stmt};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    pub class: ClassId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
    pub class: ClassId,
    pub index: usize,
}

/// Any annotatable declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclRef {
    Class(ClassId),
    Field(FieldId),
    Method(MethodId),
    Param(MethodId, usize),
}

#[derive(Debug)]
pub struct ClassInfo<'a> {
    pub decl: &'a ClassDecl,
    pub unit: usize,
    /// `pkg.Outer.Inner`; anonymous classes get `pkg.Outer$1`
    pub qualified_name: String,
    pub outer: Option<ClassId>,
}

impl ClassInfo<'_> {
    pub fn simple_name(&self) -> &str {
        &self.decl.name
    }

    pub fn is_anonymous(&self) -> bool {
        self.decl.name.is_empty()
    }
}

/// Name resolution context: a unit and optionally the innermost class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub unit: usize,
    pub class: Option<ClassId>,
}

impl Scope {
    pub fn new(unit: usize, class: Option<ClassId>) -> Self {
        Self { unit, class }
    }
}

pub struct DeclarationIndex<'a> {
    units: &'a [SourceUnit],
    classes: Vec<ClassInfo<'a>>,
    by_qualified: HashMap<String, ClassId>,
    by_position: HashMap<(usize, usize), ClassId>,
    nested: HashMap<ClassId, Vec<ClassId>>,
    top_level: Vec<Vec<ClassId>>,
    facades_by_package: HashMap<String, Vec<ClassId>>,
    hierarchy: TypeHierarchy,
}

impl<'a> DeclarationIndex<'a> {
    pub fn build(units: &'a [SourceUnit]) -> Self {
        let mut index = Self {
            units,
            classes: Vec::new(),
            by_qualified: HashMap::new(),
            by_position: HashMap::new(),
            nested: HashMap::new(),
            top_level: vec![Vec::new(); units.len()],
            facades_by_package: HashMap::new(),
            hierarchy: TypeHierarchy::default(),
        };

        for (u, unit) in units.iter().enumerate() {
            for class in &unit.classes {
                let id = index.register(u, class, None);
                index.top_level[u].push(id);
                if class.is_file_facade {
                    index
                        .facades_by_package
                        .entry(unit.package.clone())
                        .or_default()
                        .push(id);
                }
            }
        }

        let mut hierarchy = TypeHierarchy::new(index.classes.len());
        for (i, info) in index.classes.iter().enumerate() {
            let scope = Scope::new(info.unit, info.outer);
            for ty in &info.decl.supertypes {
                if let Some(sup) = index.resolve_type(&ty.name, scope) {
                    hierarchy.add_supertype(ClassId(i), sup);
                }
            }
        }
        index.hierarchy = hierarchy;

        debug!(
            "Indexed {} classes from {} units",
            index.classes.len(),
            units.len()
        );
        index
    }

    fn register(&mut self, unit: usize, decl: &'a ClassDecl, outer: Option<ClassId>) -> ClassId {
        let id = ClassId(self.classes.len());
        let qualified_name = match outer {
            Some(outer_id) => {
                let outer_name = &self.classes[outer_id.0].qualified_name;
                if decl.name.is_empty() {
                    let count = self.nested.get(&outer_id).map_or(0, |n| n.len()) + 1;
                    format!("{}${}", outer_name, count)
                } else {
                    format!("{}.{}", outer_name, decl.name)
                }
            }
            None => self.units[unit].qualify(&decl.name),
        };

        if !decl.name.is_empty() {
            self.by_qualified.entry(qualified_name.clone()).or_insert(id);
        }
        self.by_position.insert((unit, decl.span.start), id);
        self.classes.push(ClassInfo {
            decl,
            unit,
            qualified_name,
            outer,
        });
        if let Some(outer_id) = outer {
            self.nested.entry(outer_id).or_default().push(id);
        }

        for nested in &decl.classes {
            self.register(unit, nested, Some(id));
        }
        let mut locals = Vec::new();
        for field in &decl.fields {
            if let Some(init) = &field.initializer {
                collect_expr_classes(init, &mut locals);
            }
        }
        for method in &decl.methods {
            if let Some(body) = &method.body {
                collect_stmt_classes(body, &mut locals);
            }
        }
        for block in &decl.initializers {
            collect_stmt_classes(block, &mut locals);
        }
        for local in locals {
            self.register(unit, local, Some(id));
        }
        id
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn units(&self) -> &'a [SourceUnit] {
        self.units
    }

    pub fn unit(&self, index: usize) -> &'a SourceUnit {
        &self.units[index]
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn class(&self, id: ClassId) -> &ClassInfo<'a> {
        &self.classes[id.0]
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(ClassId)
    }

    pub fn field(&self, id: FieldId) -> &'a FieldDecl {
        &self.classes[id.class.0].decl.fields[id.index]
    }

    pub fn method(&self, id: MethodId) -> &'a MethodDecl {
        &self.classes[id.class.0].decl.methods[id.index]
    }

    pub fn unit_of(&self, class: ClassId) -> &'a SourceUnit {
        &self.units[self.classes[class.0].unit]
    }

    pub fn top_level_classes(&self, unit: usize) -> &[ClassId] {
        &self.top_level[unit]
    }

    pub fn nested_classes(&self, class: ClassId) -> &[ClassId] {
        self.nested.get(&class).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The class registered for a declaration node
    pub fn class_for_decl(&self, unit: usize, decl: &ClassDecl) -> Option<ClassId> {
        self.by_position.get(&(unit, decl.span.start)).copied()
    }

    pub fn class_by_qualified_name(&self, name: &str) -> Option<ClassId> {
        self.by_qualified.get(name).copied()
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    pub fn inherits_from(&self, sub: ClassId, sup: ClassId) -> bool {
        self.hierarchy.inherits_from(sub, sup)
    }

    /// The class followed by its enclosing classes, innermost first
    pub fn class_chain(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = vec![class];
        let mut current = self.classes[class.0].outer;
        while let Some(outer) = current {
            chain.push(outer);
            current = self.classes[outer.0].outer;
        }
        chain
    }

    /// `Outer.FIELD` label used in messages; facade fields are bare
    pub fn field_label(&self, id: FieldId) -> String {
        let class = &self.classes[id.class.0];
        let field = self.field(id);
        if class.decl.is_file_facade || class.is_anonymous() {
            field.name.clone()
        } else {
            format!("{}.{}", class.simple_name(), field.name)
        }
    }

    /// `Outer.method` label; constructors are labelled by their class
    pub fn method_label(&self, id: MethodId) -> String {
        let class = &self.classes[id.class.0];
        let method = self.method(id);
        if method.is_constructor {
            return class.simple_name().to_string();
        }
        if class.decl.is_file_facade || class.is_anonymous() {
            method.name.clone()
        } else {
            format!("{}.{}", class.simple_name(), method.name)
        }
    }

    // ------------------------------------------------------------------
    // Type resolution
    // ------------------------------------------------------------------

    /// Resolve a simple or qualified class name as seen from `scope`
    pub fn resolve_type(&self, name: &str, scope: Scope) -> Option<ClassId> {
        if let Some(id) = self.by_qualified.get(name) {
            return Some(*id);
        }
        if let Some((first, rest)) = name.split_once('.') {
            let mut current = self.resolve_type(first, scope)?;
            for segment in rest.split('.') {
                current = self.nested_by_name(current, segment)?;
            }
            return Some(current);
        }

        if let Some(class) = scope.class {
            for candidate in self.class_chain(class) {
                if self.classes[candidate.0].decl.name == name {
                    return Some(candidate);
                }
                if let Some(found) = self.nested_by_name(candidate, name) {
                    return Some(found);
                }
                for sup in self.hierarchy.all_supertypes(candidate) {
                    if let Some(found) = self.nested_by_name(sup, name) {
                        return Some(found);
                    }
                }
            }
        }

        let unit = &self.units[scope.unit];
        if let Some(id) = self.top_level[scope.unit]
            .iter()
            .find(|id| self.classes[id.0].decl.name == name)
        {
            return Some(*id);
        }
        for import in unit.imports.iter().filter(|i| !i.wildcard) {
            if import.visible_name() == Some(name) {
                if let Some(id) = self.by_qualified.get(&import.path) {
                    return Some(*id);
                }
            }
        }
        if let Some(id) = self.by_qualified.get(&unit.qualify(name)) {
            return Some(*id);
        }
        for import in unit.imports.iter().filter(|i| i.wildcard) {
            if let Some(id) = self.by_qualified.get(&format!("{}.{}", import.path, name)) {
                return Some(*id);
            }
        }
        None
    }

    fn nested_by_name(&self, class: ClassId, name: &str) -> Option<ClassId> {
        self.nested_classes(class)
            .iter()
            .find(|id| self.classes[id.0].decl.name == name)
            .copied()
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    /// Field declared in `class` or one of its supertypes
    pub fn find_field(&self, class: ClassId, name: &str) -> Option<FieldId> {
        std::iter::once(class)
            .chain(self.hierarchy.all_supertypes(class))
            .find_map(|c| {
                self.classes[c.0]
                    .decl
                    .fields
                    .iter()
                    .position(|f| f.name == name)
                    .map(|index| FieldId { class: c, index })
            })
    }

    /// Resolve an unqualified field name from `scope`
    pub fn resolve_field_name(&self, name: &str, scope: Scope) -> Option<FieldId> {
        if let Some(class) = scope.class {
            for candidate in self.class_chain(class) {
                if let Some(field) = self.find_field(candidate, name) {
                    return Some(field);
                }
            }
        }
        self.resolve_imported_member(name, scope, |class| self.find_field(class, name))
    }

    /// Resolve `Type.NAME` style selects where the receiver names a class
    pub fn resolve_static_field(&self, type_path: &str, name: &str, scope: Scope) -> Option<FieldId> {
        let class = self.resolve_type(type_path, scope)?;
        self.find_field(class, name)
    }

    /// Members made visible by static imports, Kotlin imports and facades
    fn resolve_imported_member<T>(
        &self,
        name: &str,
        scope: Scope,
        lookup: impl Fn(ClassId) -> Option<T>,
    ) -> Option<T> {
        let unit = &self.units[scope.unit];
        for import in &unit.imports {
            if import.wildcard {
                if let Some(class) = self.by_qualified.get(&import.path) {
                    if let Some(found) = lookup(*class) {
                        return Some(found);
                    }
                }
                if let Some(facades) = self.facades_by_package.get(&import.path) {
                    if let Some(found) = facades.iter().find_map(|f| lookup(*f)) {
                        return Some(found);
                    }
                }
                continue;
            }
            if import.visible_name() != Some(name) {
                continue;
            }
            if let Some((owner, _)) = import.path.rsplit_once('.') {
                if let Some(class) = self.by_qualified.get(owner) {
                    if let Some(found) = lookup(*class) {
                        return Some(found);
                    }
                }
                if let Some(facades) = self.facades_by_package.get(owner) {
                    if let Some(found) = facades.iter().find_map(|f| lookup(*f)) {
                        return Some(found);
                    }
                }
            }
        }
        self.facades_by_package
            .get(&unit.package)
            .and_then(|facades| facades.iter().find_map(|f| lookup(*f)))
    }

    // ------------------------------------------------------------------
    // Methods
    // ------------------------------------------------------------------

    /// Method `name` callable with `arg_count` arguments on `class`
    pub fn find_method(&self, class: ClassId, name: &str, arg_count: usize) -> Option<MethodId> {
        std::iter::once(class)
            .chain(self.hierarchy.all_supertypes(class))
            .find_map(|c| self.declared_method(c, name, arg_count))
    }

    fn declared_method(&self, class: ClassId, name: &str, arg_count: usize) -> Option<MethodId> {
        let methods = &self.classes[class.0].decl.methods;
        let candidates = methods
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_constructor && m.name == name);
        let mut fallback = None;
        for (index, method) in candidates {
            if method.params.len() == arg_count && !method.is_varargs() {
                return Some(MethodId { class, index });
            }
            if fallback.is_none() && method.accepts_arity(arg_count) {
                fallback = Some(MethodId { class, index });
            }
        }
        fallback
    }

    pub fn find_constructor(&self, class: ClassId, arg_count: usize) -> Option<MethodId> {
        let methods = &self.classes[class.0].decl.methods;
        methods
            .iter()
            .position(|m| m.is_constructor && m.accepts_arity(arg_count))
            .map(|index| MethodId { class, index })
    }

    /// Resolve an unqualified call from `scope`
    pub fn resolve_function(&self, name: &str, arg_count: usize, scope: Scope) -> Option<MethodId> {
        if let Some(class) = scope.class {
            for candidate in self.class_chain(class) {
                if let Some(method) = self.find_method(candidate, name, arg_count) {
                    return Some(method);
                }
            }
        }
        self.resolve_imported_member(name, scope, |class| {
            self.declared_method(class, name, arg_count)
        })
    }

    /// Methods overridden by `method`, nearest supertype first
    pub fn overridden_methods(&self, method: MethodId) -> Vec<MethodId> {
        let decl = self.method(method);
        if decl.is_constructor || decl.is_static() || decl.has_modifier("private") {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for sup in self.hierarchy.all_supertypes(method.class) {
            for (index, candidate) in self.classes[sup.0].decl.methods.iter().enumerate() {
                if candidate.is_constructor
                    || candidate.name != decl.name
                    || candidate.params.len() != decl.params.len()
                {
                    continue;
                }
                let id = MethodId { class: sup, index };
                if seen.insert(id) {
                    out.push(id);
                }
            }
        }
        out
    }
}

fn collect_stmt_classes<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a ClassDecl>) {
    for stmt in stmts {
        match stmt {
            Stmt::Local { init, .. } => {
                if let Some(init) = init {
                    collect_expr_classes(init, out);
                }
            }
            Stmt::Expr(expr) => collect_expr_classes(expr, out),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                collect_expr_classes(cond, out);
                collect_stmt_classes(then_branch, out);
                if let Some(else_branch) = else_branch {
                    collect_stmt_classes(else_branch, out);
                }
            }
            Stmt::Loop {
                header, cond, body, ..
            } => {
                collect_stmt_classes(header, out);
                if let Some(cond) = cond {
                    collect_expr_classes(cond, out);
                }
                collect_stmt_classes(body, out);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    collect_expr_classes(value, out);
                }
            }
            Stmt::Block(inner) => collect_stmt_classes(inner, out),
            Stmt::Class(class) => out.push(class),
            Stmt::Other(exprs) => {
                for expr in exprs {
                    collect_expr_classes(expr, out);
                }
            }
        }
    }
}

fn collect_expr_classes<'a>(expr: &'a Expr, out: &mut Vec<&'a ClassDecl>) {
    match &expr.kind {
        ExprKind::New {
            body: Some(body), ..
        } => out.push(body),
        ExprKind::Lambda { body, .. } => collect_stmt_classes(body, out),
        ExprKind::Switch(switch) => {
            for case in &switch.cases {
                collect_stmt_classes(&case.body, out);
            }
        }
        _ => {}
    }
    for child in expr.children() {
        collect_expr_classes(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassKind, Language, Param, Span, TypeRef};

    fn class(name: &str, line: usize) -> ClassDecl {
        ClassDecl::new(
            name,
            ClassKind::Class,
            Span::new(line * 100, line * 100 + 10, line, 1),
        )
    }

    fn unit(path: &str, package: &str, classes: Vec<ClassDecl>) -> SourceUnit {
        let mut unit = SourceUnit::new(path, Language::Java, "");
        unit.package = package.to_string();
        unit.classes = classes;
        unit
    }

    fn method(name: &str, params: usize) -> MethodDecl {
        let mut method = MethodDecl::new(name, Span::default());
        for i in 0..params {
            method
                .params
                .push(Param::new(format!("p{}", i), None, Span::default()));
        }
        method
    }

    #[test]
    fn test_qualified_and_nested_lookup() {
        let mut outer = class("Outer", 1);
        outer.classes.push(class("Inner", 2));
        let units = vec![unit("A.java", "test.pkg", vec![outer])];
        let index = DeclarationIndex::build(&units);

        let outer_id = index.class_by_qualified_name("test.pkg.Outer").unwrap();
        let inner_id = index.class_by_qualified_name("test.pkg.Outer.Inner").unwrap();
        assert_eq!(index.class(inner_id).outer, Some(outer_id));
        assert_eq!(
            index.resolve_type("Inner", Scope::new(0, Some(outer_id))),
            Some(inner_id)
        );
        assert_eq!(
            index.resolve_type("Outer.Inner", Scope::new(0, None)),
            Some(inner_id)
        );
    }

    #[test]
    fn test_cross_file_resolution_via_imports() {
        let mut base = class("Base", 1);
        base.methods.push(method("foo", 1));
        let mut sub = class("Sub", 1);
        sub.supertypes.push(TypeRef::new("Base"));

        let mut other = unit("Sub.java", "other", vec![sub]);
        other.imports.push(crate::ast::Import {
            path: "lib.Base".into(),
            is_static: false,
            wildcard: false,
            alias: None,
        });
        let units = vec![unit("Base.java", "lib", vec![base]), other];
        let index = DeclarationIndex::build(&units);

        let base_id = index.class_by_qualified_name("lib.Base").unwrap();
        let sub_id = index.class_by_qualified_name("other.Sub").unwrap();
        assert!(index.inherits_from(sub_id, base_id));
        assert!(!index.inherits_from(base_id, sub_id));

        let found = index.find_method(sub_id, "foo", 1).unwrap();
        assert_eq!(found.class, base_id);
        assert!(index.find_method(sub_id, "foo", 2).is_none());
    }

    #[test]
    fn test_overridden_methods() {
        let mut base = class("Base", 1);
        base.methods.push(method("run", 0));
        let mut sub = class("Sub", 2);
        sub.supertypes.push(TypeRef::new("Base"));
        sub.methods.push(method("run", 0));
        let units = vec![unit("A.java", "p", vec![base, sub])];
        let index = DeclarationIndex::build(&units);

        let sub_id = index.class_by_qualified_name("p.Sub").unwrap();
        let overridden = index.overridden_methods(MethodId {
            class: sub_id,
            index: 0,
        });
        assert_eq!(overridden.len(), 1);
        assert_eq!(index.method_label(overridden[0]), "Base.run");
    }

    #[test]
    fn test_anonymous_classes_are_indexed() {
        let mut outer = class("Outer", 1);
        let anonymous = ClassDecl::new("", ClassKind::Class, Span::new(500, 600, 5, 1));
        let mut run = method("run", 0);
        run.body = Some(vec![Stmt::Expr(Expr::new(
            ExprKind::New {
                ty: TypeRef::new("Runnable"),
                args: Vec::new(),
                body: Some(Box::new(anonymous.clone())),
            },
            Span::default(),
        ))]);
        outer.methods.push(run);
        let units = vec![unit("A.java", "p", vec![outer])];
        let index = DeclarationIndex::build(&units);

        let id = index.class_for_decl(0, &anonymous).unwrap();
        assert_eq!(index.class(id).qualified_name, "p.Outer$1");
        assert!(index.class(id).is_anonymous());
    }
}
