//! Kotlin front-end: lowers tree-sitter-kotlin syntax trees into [`crate::ast`]
//!
//! Kotlin constructs are mapped onto the Java-shaped model:
//!
//! - top-level functions and properties live in a synthetic `<File>Kt` class
//! - `object` and `companion object` members become static members
//! - `when` becomes a switch, infix `shl`/`or`/... become binary operators
//! - `const val` and object-level `val` become `static final` fields

use super::common::{
    all_children, clean_type_name, named_children, node_text, parse_float_literal,
    parse_int_literal, span_of, unquote, Parser,
};
use crate::ast::{
    Annotation, AnnotationArg, BinaryOp, ClassDecl, ClassKind, Expr, ExprKind, FieldDecl, Import,
    Language, Literal, MethodDecl, Param, SourceUnit, Span, Stmt, SwitchCase, SwitchExpr, TypeRef,
    UnaryOp,
};
use crate::error::{LintError, Result};
use std::path::Path;
use tree_sitter::Node;

pub struct KotlinParser;

impl KotlinParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KotlinParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for KotlinParser {
    fn parse(&self, path: &Path, source: &str) -> Result<SourceUnit> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_kotlin::language())
            .map_err(|e| LintError::parse(path, e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| LintError::parse(path, "tree-sitter returned no tree"))?;

        let mut unit = SourceUnit::new(path, Language::Kotlin, source);
        let lowering = Lowering { src: source };
        let root = tree.root_node();

        let mut facade = ClassDecl::new(facade_name(path), ClassKind::Object, span_of(&root));
        facade.is_file_facade = true;

        for child in named_children(&root) {
            match child.kind() {
                "package_header" => {
                    if let Some(id) = named_children(&child)
                        .into_iter()
                        .find(|n| n.kind() == "identifier")
                    {
                        unit.package = lowering.text(&id).replace(char::is_whitespace, "");
                    }
                }
                "import_list" => {
                    for header in named_children(&child) {
                        if header.kind() == "import_header" {
                            unit.imports.push(lowering.import(&header));
                        }
                    }
                }
                "import_header" => unit.imports.push(lowering.import(&child)),
                "class_declaration" | "object_declaration" => {
                    unit.classes.extend(lowering.class(&child));
                }
                _ => lowering.member(&child, &mut facade, true),
            }
        }

        if !facade.fields.is_empty() || !facade.methods.is_empty() {
            unit.classes.push(facade);
        }

        Ok(unit)
    }
}

fn facade_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("File");
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => format!("{}{}Kt", first.to_uppercase(), chars.as_str()),
        None => "FileKt".to_string(),
    }
}

struct Lowering<'s> {
    src: &'s str,
}

impl<'s> Lowering<'s> {
    fn text(&self, node: &Node) -> &'s str {
        node_text(node, self.src)
    }

    fn import(&self, node: &Node) -> Import {
        let mut import = Import {
            path: String::new(),
            is_static: false,
            wildcard: false,
            alias: None,
        };
        for child in all_children(node) {
            match child.kind() {
                "identifier" => {
                    import.path = self.text(&child).replace(char::is_whitespace, "");
                }
                "wildcard_import" => import.wildcard = true,
                "import_alias" => {
                    import.alias = named_children(&child)
                        .last()
                        .map(|n| self.text(n).to_string());
                }
                _ => {}
            }
        }
        if self.text(node).trim_end().ends_with(".*") {
            import.wildcard = true;
        }
        import
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Add a declaration to `owner`; `static_scope` marks object-like owners
    fn member(&self, node: &Node, owner: &mut ClassDecl, static_scope: bool) {
        match node.kind() {
            "class_declaration" | "object_declaration" => {
                if let Some(class) = self.class(node) {
                    owner.classes.push(class);
                }
            }
            "companion_object" => {
                let mut companion = ClassDecl::new("Companion", ClassKind::Object, span_of(node));
                if let Some(body) = first_named(node, &["class_body"]) {
                    self.class_body(&body, &mut companion, true);
                }
                owner.fields.append(&mut companion.fields);
                owner.methods.append(&mut companion.methods);
                owner.classes.append(&mut companion.classes);
                owner.initializers.append(&mut companion.initializers);
            }
            "function_declaration" => {
                if let Some(mut method) = self.function(node) {
                    if static_scope {
                        method.modifiers.push("static".into());
                    }
                    owner.methods.push(method);
                }
            }
            "property_declaration" => {
                if let Some(mut field) = self.property(node) {
                    if static_scope {
                        field.is_static = true;
                    }
                    owner.fields.push(field);
                }
            }
            "anonymous_initializer" => {
                if let Some(block) = first_named(node, &["block"]) {
                    owner.initializers.push(self.block(&block));
                }
            }
            "secondary_constructor" => {
                let mut ctor = MethodDecl::new(owner.name.clone(), span_of(node));
                ctor.is_constructor = true;
                if let Some(modifiers) = first_named(node, &["modifiers"]) {
                    let (m, a) = self.modifiers(&modifiers);
                    ctor.modifiers = m;
                    ctor.annotations = a;
                }
                if let Some(params) = first_named(node, &["function_value_parameters"]) {
                    ctor.params = self.params(&params);
                }
                if let Some(block) = first_named(node, &["block"]) {
                    ctor.body = Some(self.block(&block));
                }
                owner.methods.push(ctor);
            }
            _ => {}
        }
    }

    fn class(&self, node: &Node) -> Option<ClassDecl> {
        let name_node = first_named(node, &["type_identifier", "simple_identifier"])?;
        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();
        if let Some(m) = first_named(node, &["modifiers"]) {
            (modifiers, annotations) = self.modifiers(&m);
        }

        let keyword_interface = all_children(node).iter().any(|c| c.kind() == "interface");
        let kind = if node.kind() == "object_declaration" {
            ClassKind::Object
        } else if keyword_interface {
            ClassKind::Interface
        } else if modifiers.iter().any(|m| m == "enum") {
            ClassKind::Enum
        } else if modifiers.iter().any(|m| m == "annotation") {
            ClassKind::AnnotationType
        } else {
            ClassKind::Class
        };

        let mut class = ClassDecl::new(self.text(&name_node), kind, span_of(node));
        class.name_span = span_of(&name_node);
        class.annotations = annotations;
        if !modifiers.iter().any(|m| m == "inner") {
            modifiers.push("static".into());
        }
        class.modifiers = modifiers;

        for child in named_children(node) {
            match child.kind() {
                "delegation_specifier" | "delegation_specifiers" => {
                    self.supertypes(&child, &mut class.supertypes)
                }
                "primary_constructor" => self.primary_constructor(&child, &mut class),
                "class_body" => {
                    let is_object = class.kind == ClassKind::Object;
                    self.class_body(&child, &mut class, is_object);
                }
                "enum_class_body" => self.enum_body(&child, &mut class),
                _ => {}
            }
        }
        Some(class)
    }

    fn supertypes(&self, node: &Node, out: &mut Vec<TypeRef>) {
        match node.kind() {
            "user_type" | "nullable_type" => out.push(self.type_ref(node)),
            "constructor_invocation" => {
                if let Some(ty) = first_named(node, &["user_type"]) {
                    out.push(self.type_ref(&ty));
                }
            }
            _ => {
                for child in named_children(node) {
                    self.supertypes(&child, out);
                }
            }
        }
    }

    fn primary_constructor(&self, node: &Node, class: &mut ClassDecl) {
        let mut ctor = MethodDecl::new(class.name.clone(), span_of(node));
        ctor.is_constructor = true;
        if let Some(modifiers) = first_named(node, &["modifiers"]) {
            let (m, a) = self.modifiers(&modifiers);
            ctor.modifiers = m;
            ctor.annotations = a;
        }
        let params = first_named(node, &["class_parameters"]).unwrap_or(*node);
        for param in named_children(&params) {
            if param.kind() != "class_parameter" {
                continue;
            }
            let Some(name) = first_named(&param, &["simple_identifier"]) else {
                continue;
            };
            let ty = self.first_type(&param);
            let mut p = Param::new(self.text(&name), ty.clone(), span_of(&param));
            let mut modifiers = Vec::new();
            if let Some(m) = first_named(&param, &["modifiers"]) {
                let (mods, annotations) = self.modifiers(&m);
                p.annotations = annotations;
                p.is_varargs = mods.iter().any(|m| m == "vararg");
                modifiers = mods;
            }
            let binding = all_children(&param)
                .iter()
                .map(|c| self.text(c))
                .find(|t| *t == "val" || *t == "var");
            if let Some(binding) = binding {
                let mut field = FieldDecl::new(self.text(&name), span_of(&param));
                field.name_span = span_of(&name);
                field.ty = ty;
                field.annotations = p.annotations.clone();
                field.modifiers = modifiers;
                field.is_final = binding == "val";
                class.fields.push(field);
            }
            ctor.params.push(p);
        }
        class.methods.push(ctor);
    }

    fn class_body(&self, body: &Node, class: &mut ClassDecl, static_scope: bool) {
        for member in named_children(body) {
            if member.kind() == "class_member_declarations" {
                self.class_body(&member, class, static_scope);
            } else {
                self.member(&member, class, static_scope);
            }
        }
    }

    fn enum_body(&self, body: &Node, class: &mut ClassDecl) {
        for member in named_children(body) {
            match member.kind() {
                "enum_entry" => {
                    let Some(name) = first_named(&member, &["simple_identifier"]) else {
                        continue;
                    };
                    let mut field = FieldDecl::new(self.text(&name), span_of(&member));
                    field.name_span = span_of(&name);
                    field.ty = Some(TypeRef::new(class.name.clone()));
                    field.is_static = true;
                    field.is_final = true;
                    field.is_enum_constant = true;
                    if let Some(m) = first_named(&member, &["modifiers"]) {
                        field.annotations = self.modifiers(&m).1;
                    }
                    class.fields.push(field);
                }
                "class_member_declarations" => self.class_body(&member, class, false),
                _ => self.member(&member, class, false),
            }
        }
    }

    fn modifiers(&self, node: &Node) -> (Vec<String>, Vec<Annotation>) {
        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "annotation" => annotations.extend(self.annotation(&child)),
                "line_comment" | "multiline_comment" => {}
                _ => modifiers.push(self.text(&child).trim().to_string()),
            }
        }
        (modifiers, annotations)
    }

    fn annotation(&self, node: &Node) -> Vec<Annotation> {
        let mut out = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "user_type" => {
                    out.push(Annotation::new(self.type_ref(&child).name, span_of(node)));
                }
                "constructor_invocation" => {
                    let name = first_named(&child, &["user_type"])
                        .map(|t| self.type_ref(&t).name)
                        .unwrap_or_default();
                    let mut annotation = Annotation::new(name, span_of(node));
                    if let Some(args) = first_named(&child, &["value_arguments"]) {
                        for arg in named_children(&args) {
                            if arg.kind() != "value_argument" {
                                continue;
                            }
                            let (name, value) = self.value_argument(&arg);
                            annotation.args.push(AnnotationArg {
                                name: name.unwrap_or_else(|| "value".to_string()),
                                value,
                            });
                        }
                    }
                    out.push(annotation);
                }
                "annotation" => out.extend(self.annotation(&child)),
                _ => {}
            }
        }
        out
    }

    /// `name = value` or positional argument
    fn value_argument(&self, node: &Node) -> (Option<String>, Expr) {
        let children = named_children(node);
        let has_name = all_children(node).iter().any(|c| c.kind() == "=");
        let mut name = None;
        let mut rest = children.iter().filter(|c| c.kind() != "annotation");
        if has_name {
            name = rest.next().map(|n| self.text(n).to_string());
        }
        let value = rest
            .next()
            .map(|v| self.expr(v))
            .unwrap_or_else(|| Expr::unknown(span_of(node)));
        (name, value)
    }

    fn function(&self, node: &Node) -> Option<MethodDecl> {
        let name = first_named(node, &["simple_identifier"])?;
        let mut method = MethodDecl::new(self.text(&name), span_of(node));
        method.name_span = span_of(&name);

        let mut seen_params = false;
        for child in named_children(node) {
            match child.kind() {
                "modifiers" => {
                    let (m, a) = self.modifiers(&child);
                    method.modifiers = m;
                    method.annotations = a;
                }
                "function_value_parameters" => {
                    method.params = self.params(&child);
                    seen_params = true;
                }
                "user_type" | "nullable_type" | "function_type" if seen_params => {
                    method.return_type = Some(self.type_ref(&child));
                }
                "function_body" => method.body = Some(self.function_body(&child)),
                _ => {}
            }
        }
        Some(method)
    }

    fn function_body(&self, node: &Node) -> Vec<Stmt> {
        match first_named(node, &["block"]) {
            Some(block) => self.block(&block),
            None => named_children(node)
                .first()
                .map(|e| {
                    vec![Stmt::Return {
                        value: Some(self.expr(e)),
                        span: span_of(e),
                    }]
                })
                .unwrap_or_default(),
        }
    }

    fn params(&self, node: &Node) -> Vec<Param> {
        let mut params = Vec::new();
        let mut pending_annotations = Vec::new();
        let mut pending_vararg = false;
        for child in named_children(node) {
            match child.kind() {
                "parameter_modifiers" => {
                    for m in named_children(&child) {
                        match m.kind() {
                            "annotation" => pending_annotations.extend(self.annotation(&m)),
                            _ => {
                                if self.text(&m).trim() == "vararg" {
                                    pending_vararg = true;
                                }
                            }
                        }
                    }
                }
                "parameter" => {
                    let name = first_named(&child, &["simple_identifier"])
                        .map(|n| self.text(&n).to_string())
                        .unwrap_or_default();
                    let mut param = Param::new(name, self.first_type(&child), span_of(&child));
                    param.annotations = std::mem::take(&mut pending_annotations);
                    param.is_varargs = std::mem::take(&mut pending_vararg);
                    params.push(param);
                }
                _ => {}
            }
        }
        params
    }

    fn property(&self, node: &Node) -> Option<FieldDecl> {
        let declaration = first_named(node, &["variable_declaration"])?;
        let name = first_named(&declaration, &["simple_identifier"])?;
        let mut field = FieldDecl::new(self.text(&name), span_of(node));
        field.name_span = span_of(&name);
        field.ty = self.first_type(&declaration);

        if let Some(m) = first_named(node, &["modifiers"]) {
            let (modifiers, annotations) = self.modifiers(&m);
            field.modifiers = modifiers;
            field.annotations = annotations;
        }
        let is_val = all_children(node)
            .iter()
            .any(|c| self.text(c) == "val" && c.kind() != "variable_declaration");
        field.is_final = is_val;
        if field.modifiers.iter().any(|m| m == "const") {
            field.is_static = true;
            field.is_final = true;
        }
        field.initializer = self.value_after_equals(node);
        Some(field)
    }

    /// Expression following an `=` token among the node's children
    fn value_after_equals(&self, node: &Node) -> Option<Expr> {
        let children = all_children(node);
        let eq = children.iter().position(|c| c.kind() == "=")?;
        children[eq + 1..]
            .iter()
            .find(|c| c.is_named() || c.kind() == "null")
            .map(|c| self.expr(c))
    }

    fn first_type(&self, node: &Node) -> Option<TypeRef> {
        named_children(node)
            .into_iter()
            .find(|c| {
                matches!(
                    c.kind(),
                    "user_type" | "nullable_type" | "function_type" | "type" | "parenthesized_type"
                )
            })
            .map(|t| self.type_ref(&t))
    }

    fn type_ref(&self, node: &Node) -> TypeRef {
        let text = self.text(node);
        let mut ty = TypeRef::new(clean_type_name(text));
        ty.nullable = text.trim_end().ends_with('?');
        ty
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn block(&self, node: &Node) -> Vec<Stmt> {
        let mut out = Vec::new();
        for child in named_children(node) {
            self.stmt_into(&child, &mut out);
        }
        out
    }

    fn control_body(&self, node: &Node) -> Vec<Stmt> {
        let mut out = Vec::new();
        match node.kind() {
            "control_structure_body" => {
                for child in named_children(node) {
                    self.stmt_into(&child, &mut out);
                }
            }
            _ => self.stmt_into(node, &mut out),
        }
        out
    }

    fn stmt_into(&self, node: &Node, out: &mut Vec<Stmt>) {
        let span = span_of(node);
        match node.kind() {
            "line_comment" | "multiline_comment" => {}
            "statements" | "control_structure_body" => {
                for child in named_children(node) {
                    self.stmt_into(&child, out);
                }
            }
            "block" => out.push(Stmt::Block(self.block(node))),
            "property_declaration" => {
                if let Some(field) = self.property(node) {
                    out.push(Stmt::Local {
                        name: field.name,
                        ty: field.ty,
                        annotations: field.annotations,
                        init: field.initializer,
                        is_final: field.is_final,
                        span,
                    });
                }
            }
            "if_expression" => {
                let (cond, then_node, else_node) = self.if_parts(node);
                out.push(Stmt::If {
                    cond: cond.unwrap_or_else(|| Expr::unknown(span)),
                    then_branch: then_node.map(|n| self.control_body(&n)).unwrap_or_default(),
                    else_branch: else_node.map(|n| self.control_body(&n)),
                    span,
                });
            }
            "for_statement" => {
                let mut header = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "variable_declaration" => {
                            if let Some(name) = first_named(&child, &["simple_identifier"]) {
                                header.push(Stmt::Local {
                                    name: self.text(&name).to_string(),
                                    ty: self.first_type(&child),
                                    annotations: Vec::new(),
                                    init: None,
                                    is_final: true,
                                    span: span_of(&child),
                                });
                            }
                        }
                        "control_structure_body" | "block" => {}
                        _ => header.push(Stmt::Expr(self.expr(&child))),
                    }
                }
                let body = first_named(node, &["control_structure_body", "block"])
                    .map(|b| self.control_body(&b))
                    .unwrap_or_default();
                out.push(Stmt::Loop {
                    header,
                    cond: None,
                    body,
                    span,
                });
            }
            "while_statement" | "do_while_statement" => {
                let cond = named_children(node)
                    .into_iter()
                    .find(|c| !matches!(c.kind(), "control_structure_body" | "block"))
                    .map(|c| self.expr(&c));
                let body = first_named(node, &["control_structure_body", "block"])
                    .map(|b| self.control_body(&b))
                    .unwrap_or_default();
                out.push(Stmt::Loop {
                    header: Vec::new(),
                    cond,
                    body,
                    span,
                });
            }
            "jump_expression" => {
                let text = self.text(node);
                let value = named_children(node)
                    .into_iter()
                    .find(|c| c.kind() != "label")
                    .map(|v| self.expr(&v));
                if text.starts_with("return") {
                    out.push(Stmt::Return { value, span });
                } else if let Some(value) = value {
                    out.push(Stmt::Other(vec![value]));
                }
            }
            "try_expression" => {
                let mut parts = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "block" => parts.push(Stmt::Block(self.block(&child))),
                        "catch_block" | "finally_block" => {
                            if let Some(block) = first_named(&child, &["block"]) {
                                parts.push(Stmt::Block(self.block(&block)));
                            }
                        }
                        _ => {}
                    }
                }
                out.push(Stmt::Block(parts));
            }
            "class_declaration" | "object_declaration" => {
                if let Some(class) = self.class(node) {
                    out.push(Stmt::Class(Box::new(class)));
                }
            }
            "function_declaration" => {
                // Local functions: walk the body for call sites
                if let Some(method) = self.function(node) {
                    if let Some(body) = method.body {
                        out.push(Stmt::Block(body));
                    }
                }
            }
            _ => out.push(Stmt::Expr(self.expr(node))),
        }
    }

    fn if_parts<'t>(&self, node: &Node<'t>) -> (Option<Expr>, Option<Node<'t>>, Option<Node<'t>>) {
        let children = all_children(node);
        let mut cond = None;
        let mut then_node = None;
        let mut else_node = None;
        let mut seen_else = false;
        let mut seen_rparen = false;
        for child in children {
            match child.kind() {
                "if" | "(" => {}
                ")" => seen_rparen = true,
                "else" => seen_else = true,
                ";" => {}
                _ if !child.is_named() => {}
                _ if !seen_rparen => cond = Some(self.expr(&child)),
                _ if seen_else => else_node = Some(child),
                _ => then_node = Some(child),
            }
        }
        (cond, then_node, else_node)
    }

    /// Value produced by a branch body (its last expression)
    fn branch_value(&self, node: &Node) -> Expr {
        let stmts = self.control_body(node);
        let span = span_of(node);
        match stmts.into_iter().last() {
            Some(Stmt::Expr(expr)) => expr,
            Some(Stmt::Block(inner)) => match inner.into_iter().last() {
                Some(Stmt::Expr(expr)) => expr,
                _ => Expr::unknown(span),
            },
            _ => Expr::unknown(span),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn exprs(&self, node: &Node) -> Vec<Expr> {
        named_children(node)
            .iter()
            .filter(|c| !matches!(c.kind(), "line_comment" | "multiline_comment"))
            .map(|c| self.expr(c))
            .collect()
    }

    fn expr(&self, node: &Node) -> Expr {
        let span = span_of(node);
        let text = self.text(node);
        let kind = match node.kind() {
            "integer_literal" | "hex_literal" | "bin_literal" | "long_literal"
            | "unsigned_literal" => match parse_int_literal(text) {
                Some(literal) => ExprKind::Literal(literal),
                None => ExprKind::Unknown(Vec::new()),
            },
            "real_literal" => match parse_float_literal(text) {
                Some(literal) => ExprKind::Literal(literal),
                None => ExprKind::Unknown(Vec::new()),
            },
            "boolean_literal" => ExprKind::Literal(Literal::Bool(text == "true")),
            "null" => ExprKind::Literal(Literal::Null),
            "character_literal" => match unquote(text).chars().next() {
                Some(ch) => ExprKind::Literal(Literal::Char(ch)),
                None => ExprKind::Unknown(Vec::new()),
            },
            "string_literal" | "line_string_literal" | "multi_line_string_literal" => {
                let interpolated = named_children(node).iter().any(|c| {
                    matches!(c.kind(), "interpolated_identifier" | "interpolated_expression")
                });
                if interpolated {
                    ExprKind::Unknown(self.exprs(node))
                } else {
                    ExprKind::Literal(Literal::Str(unquote(text)))
                }
            }
            "simple_identifier" | "type_identifier" => ExprKind::Name(text.to_string()),
            "this_expression" => ExprKind::This,
            "super_expression" => ExprKind::Super,
            "parenthesized_expression" => match named_children(node).first() {
                Some(inner) => ExprKind::Paren(Box::new(self.expr(inner))),
                None => ExprKind::Unknown(Vec::new()),
            },
            "user_type" => {
                return self.dotted(&clean_type_name(text), span);
            }
            "navigation_expression" => {
                let children = named_children(node);
                let receiver = children
                    .first()
                    .map(|r| self.expr(r))
                    .unwrap_or_else(|| Expr::unknown(span));
                let name = children
                    .iter()
                    .find(|c| c.kind() == "navigation_suffix")
                    .and_then(|s| first_named(s, &["simple_identifier"]))
                    .map(|n| self.text(&n).to_string());
                match name {
                    Some(name) => ExprKind::Select {
                        receiver: Box::new(receiver),
                        name,
                    },
                    None => ExprKind::Unknown(vec![receiver]),
                }
            }
            "call_expression" => return self.call(node),
            "prefix_expression" => {
                let children = all_children(node);
                let operand = children
                    .iter()
                    .rev()
                    .find(|c| c.is_named() && c.kind() != "annotation" && c.kind() != "label")
                    .map(|c| self.expr(c))
                    .unwrap_or_else(|| Expr::unknown(span));
                let op_text = children
                    .first()
                    .map(|c| self.text(c).trim())
                    .unwrap_or("");
                let op = match op_text {
                    "-" => Some(UnaryOp::Neg),
                    "+" => Some(UnaryOp::Plus),
                    "!" => Some(UnaryOp::Not),
                    "++" => Some(UnaryOp::Increment),
                    "--" => Some(UnaryOp::Decrement),
                    _ => None,
                };
                match op {
                    Some(op) => ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    None => return operand,
                }
            }
            "postfix_expression" => {
                let children = all_children(node);
                let operand = children
                    .first()
                    .map(|c| self.expr(c))
                    .unwrap_or_else(|| Expr::unknown(span));
                match children.get(1).map(|c| self.text(c)) {
                    Some("++") => ExprKind::Unary {
                        op: UnaryOp::Increment,
                        operand: Box::new(operand),
                    },
                    Some("--") => ExprKind::Unary {
                        op: UnaryOp::Decrement,
                        operand: Box::new(operand),
                    },
                    _ => return operand,
                }
            }
            "multiplicative_expression"
            | "additive_expression"
            | "comparison_expression"
            | "equality_expression"
            | "conjunction_expression"
            | "disjunction_expression" => {
                let children = all_children(node);
                let operands: Vec<&Node> = children.iter().filter(|c| c.is_named()).collect();
                let op = children
                    .iter()
                    .find(|c| !c.is_named())
                    .and_then(|c| BinaryOp::from_java(self.text(c).trim()));
                match (operands.first(), op, operands.get(1)) {
                    (Some(lhs), Some(op), Some(rhs)) => ExprKind::Binary {
                        op,
                        lhs: Box::new(self.expr(lhs)),
                        rhs: Box::new(self.expr(rhs)),
                    },
                    _ => ExprKind::Unknown(self.exprs(node)),
                }
            }
            "infix_expression" => {
                let children = named_children(node);
                if children.len() == 3 {
                    match BinaryOp::from_kotlin_infix(self.text(&children[1])) {
                        Some(op) => ExprKind::Binary {
                            op,
                            lhs: Box::new(self.expr(&children[0])),
                            rhs: Box::new(self.expr(&children[2])),
                        },
                        None => ExprKind::Unknown(vec![
                            self.expr(&children[0]),
                            self.expr(&children[2]),
                        ]),
                    }
                } else {
                    ExprKind::Unknown(self.exprs(node))
                }
            }
            "as_expression" => {
                let children = named_children(node);
                match (children.first(), children.get(1)) {
                    (Some(value), Some(ty)) => ExprKind::Cast {
                        ty: self.type_ref(ty),
                        expr: Box::new(self.expr(value)),
                    },
                    _ => ExprKind::Unknown(self.exprs(node)),
                }
            }
            "if_expression" => {
                let (cond, then_node, else_node) = self.if_parts(node);
                match (cond, then_node, else_node) {
                    (Some(cond), Some(then_node), Some(else_node)) => ExprKind::Conditional {
                        cond: Box::new(cond),
                        then_expr: Box::new(self.branch_value(&then_node)),
                        else_expr: Box::new(self.branch_value(&else_node)),
                    },
                    (cond, then_node, _) => {
                        let mut parts: Vec<Expr> = cond.into_iter().collect();
                        if let Some(then_node) = then_node {
                            parts.push(self.branch_value(&then_node));
                        }
                        ExprKind::Unknown(parts)
                    }
                }
            }
            "when_expression" => return self.when(node),
            "lambda_literal" | "annotated_lambda" | "anonymous_function" => {
                return self.lambda(node);
            }
            "object_literal" => {
                let mut anonymous = ClassDecl::new("", ClassKind::Class, span);
                let mut ty = TypeRef::new("Any");
                for child in named_children(node) {
                    match child.kind() {
                        "delegation_specifier" | "delegation_specifiers" => {
                            self.supertypes(&child, &mut anonymous.supertypes);
                        }
                        "class_body" => self.class_body(&child, &mut anonymous, false),
                        _ => {}
                    }
                }
                if let Some(first) = anonymous.supertypes.first() {
                    ty = first.clone();
                }
                ExprKind::New {
                    ty,
                    args: Vec::new(),
                    body: Some(Box::new(anonymous)),
                }
            }
            "callable_reference" => {
                let children = named_children(node);
                let name = children
                    .iter()
                    .rev()
                    .find(|c| c.kind() == "simple_identifier")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                let receiver = children
                    .iter()
                    .find(|c| c.kind() != "simple_identifier" || children.len() > 1)
                    .filter(|c| self.text(c) != name)
                    .map(|r| self.expr(r))
                    .unwrap_or_else(|| Expr::new(ExprKind::This, span));
                ExprKind::MethodRef {
                    receiver: Box::new(receiver),
                    name,
                }
            }
            "collection_literal" => ExprKind::ArrayInit(self.exprs(node)),
            "assignment" => {
                let children = all_children(node);
                let target = children
                    .iter()
                    .find(|c| c.is_named())
                    .map(|t| self.assignable(t))
                    .unwrap_or_else(|| Expr::unknown(span));
                let op = children
                    .iter()
                    .find(|c| !c.is_named())
                    .map(|c| self.text(c).trim())
                    .and_then(|t| t.strip_suffix('='))
                    .filter(|t| !t.is_empty())
                    .and_then(BinaryOp::from_java);
                let value = children
                    .iter()
                    .rev()
                    .find(|c| c.is_named())
                    .map(|v| self.expr(v))
                    .unwrap_or_else(|| Expr::unknown(span));
                ExprKind::Assign {
                    target: Box::new(target),
                    op,
                    value: Box::new(value),
                }
            }
            "directly_assignable_expression" => return self.assignable(node),
            _ => ExprKind::Unknown(self.exprs(node)),
        };
        Expr::new(kind, span)
    }

    fn dotted(&self, path: &str, span: Span) -> Expr {
        let mut parts = path.split('.');
        let first = parts.next().unwrap_or_default();
        let mut expr = Expr::name(first, span);
        for part in parts {
            expr = Expr::new(
                ExprKind::Select {
                    receiver: Box::new(expr),
                    name: part.to_string(),
                },
                span,
            );
        }
        expr
    }

    fn assignable(&self, node: &Node) -> Expr {
        if node.kind() != "directly_assignable_expression" {
            return self.expr(node);
        }
        let span = span_of(node);
        let children = named_children(node);
        match children.as_slice() {
            [single] => self.expr(single),
            [receiver, suffix, ..] if suffix.kind() == "navigation_suffix" => {
                match first_named(suffix, &["simple_identifier"]) {
                    Some(name) => Expr::new(
                        ExprKind::Select {
                            receiver: Box::new(self.expr(receiver)),
                            name: self.text(&name).to_string(),
                        },
                        span,
                    ),
                    None => Expr::unknown(span),
                }
            }
            _ => Expr::new(ExprKind::Unknown(self.exprs(node)), span),
        }
    }

    fn call(&self, node: &Node) -> Expr {
        let span = span_of(node);
        let children = named_children(node);
        let Some(callee) = children.first() else {
            return Expr::unknown(span);
        };

        let mut args = Vec::new();
        if let Some(suffix) = children.iter().find(|c| c.kind() == "call_suffix") {
            for part in named_children(suffix) {
                match part.kind() {
                    "value_arguments" => {
                        for arg in named_children(&part) {
                            if arg.kind() == "value_argument" {
                                args.push(self.value_argument(&arg).1);
                            }
                        }
                    }
                    "annotated_lambda" | "lambda_literal" => args.push(self.lambda(&part)),
                    _ => {}
                }
            }
        }

        let (receiver, name, name_span) = match callee.kind() {
            "simple_identifier" => (None, self.text(callee).to_string(), span_of(callee)),
            "navigation_expression" => {
                let parts = named_children(callee);
                let suffix_name = parts
                    .iter()
                    .find(|c| c.kind() == "navigation_suffix")
                    .and_then(|s| first_named(s, &["simple_identifier"]));
                match (parts.first(), suffix_name) {
                    (Some(receiver), Some(name)) => (
                        Some(Box::new(self.expr(receiver))),
                        self.text(&name).to_string(),
                        span_of(&name),
                    ),
                    _ => {
                        let mut parts = vec![self.expr(callee)];
                        parts.extend(args);
                        return Expr::new(ExprKind::Unknown(parts), span);
                    }
                }
            }
            _ => {
                let mut parts = vec![self.expr(callee)];
                parts.extend(args);
                return Expr::new(ExprKind::Unknown(parts), span);
            }
        };

        // `x.inv()` is Kotlin's bitwise complement
        if name == "inv" && args.is_empty() {
            if let Some(receiver) = receiver {
                return Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::BitNot,
                        operand: receiver,
                    },
                    span,
                );
            }
        }

        Expr::new(
            ExprKind::Call {
                receiver,
                name,
                args,
                name_span,
            },
            span,
        )
    }

    fn lambda(&self, node: &Node) -> Expr {
        let span = span_of(node);
        let literal = if node.kind() == "annotated_lambda" {
            first_named(node, &["lambda_literal"])
        } else {
            Some(*node)
        };
        let Some(literal) = literal else {
            return Expr::unknown(span);
        };

        let mut params = Vec::new();
        let mut body = Vec::new();
        for child in named_children(&literal) {
            match child.kind() {
                "lambda_parameters" | "function_value_parameters" => {
                    for p in named_children(&child) {
                        let name = match p.kind() {
                            "simple_identifier" => Some(self.text(&p).to_string()),
                            _ => first_named(&p, &["simple_identifier"])
                                .map(|n| self.text(&n).to_string()),
                        };
                        params.extend(name);
                    }
                }
                "statements" => {
                    for stmt in named_children(&child) {
                        self.stmt_into(&stmt, &mut body);
                    }
                }
                "function_body" => body = self.function_body(&child),
                "block" => body = self.block(&child),
                "modifiers" | "user_type" | "nullable_type" => {}
                _ => self.stmt_into(&child, &mut body),
            }
        }
        if literal.kind() == "lambda_literal" && params.is_empty() {
            params.push("it".to_string());
        }
        Expr::new(ExprKind::Lambda { params, body }, span)
    }

    fn when(&self, node: &Node) -> Expr {
        let span = span_of(node);
        let keyword_span = all_children(node)
            .into_iter()
            .find(|c| c.kind() == "when")
            .map(|c| span_of(&c))
            .unwrap_or(span);

        let mut subject = None;
        let mut cases = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "when_subject" => {
                    subject = named_children(&child)
                        .into_iter()
                        .rev()
                        .find(|c| !matches!(c.kind(), "annotation" | "variable_declaration"))
                        .map(|c| self.expr(&c));
                }
                "when_entry" => {
                    let mut case = SwitchCase {
                        labels: Vec::new(),
                        is_default: all_children(&child).iter().any(|c| c.kind() == "else"),
                        body: Vec::new(),
                        span: span_of(&child),
                    };
                    for part in named_children(&child) {
                        match part.kind() {
                            "when_condition" => {
                                if let Some(expr) = named_children(&part).first() {
                                    if !matches!(expr.kind(), "range_test" | "type_test") {
                                        case.labels.push(self.expr(expr));
                                    }
                                }
                            }
                            "control_structure_body" => case.body = self.control_body(&part),
                            _ => {}
                        }
                    }
                    cases.push(case);
                }
                _ => {}
            }
        }

        Expr::new(
            ExprKind::Switch(Box::new(SwitchExpr {
                subject,
                cases,
                keyword_span,
                is_when: true,
            })),
            span,
        )
    }
}

fn first_named<'t>(node: &Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    super::common::first_child_of_kind(node, kinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(source: &str) -> SourceUnit {
        KotlinParser::new()
            .parse(&PathBuf::from("src/main/kotlin/test/pkg/test.kt"), source)
            .expect("Failed to parse")
    }

    #[test]
    fn test_facade_name() {
        assert_eq!(facade_name(Path::new("src/utils.kt")), "UtilsKt");
        assert_eq!(facade_name(Path::new("Flags.kt")), "FlagsKt");
    }

    #[test]
    fn test_package_and_class() {
        let unit = parse(
            r#"
            package test.pkg

            import androidx.annotation.IntRange

            class Foo {
                fun setAlpha(@IntRange(from = 0, to = 255) alpha: Int) {}
            }
            "#,
        );
        assert_eq!(unit.package, "test.pkg");
        assert_eq!(unit.imports.len(), 1);
        let class = unit
            .classes
            .iter()
            .find(|c| c.name == "Foo")
            .expect("class Foo");
        let method = class
            .methods
            .iter()
            .find(|m| m.name == "setAlpha")
            .expect("method setAlpha");
        assert_eq!(method.params.len(), 1);
        assert_eq!(method.params[0].annotations.len(), 1);
        assert_eq!(method.params[0].annotations[0].name, "IntRange");
    }

    #[test]
    fn test_top_level_members_use_facade() {
        let unit = parse(
            r#"
            package test.pkg

            const val LIMIT = 1 shl 4

            fun compute(value: Int) {}
            "#,
        );
        let facade = unit
            .classes
            .iter()
            .find(|c| c.is_file_facade)
            .expect("facade class");
        assert_eq!(facade.name, "TestKt");
        assert!(facade.fields[0].is_constant());
        assert!(facade.methods[0].is_static());
    }

    #[test]
    fn test_companion_members_are_static() {
        let unit = parse(
            r#"
            class Holder {
                companion object {
                    const val A = 1
                    const val B = 2
                }
            }
            "#,
        );
        let holder = unit
            .classes
            .iter()
            .find(|c| c.name == "Holder")
            .expect("Holder");
        assert_eq!(holder.fields.len(), 2);
        assert!(holder.fields.iter().all(|f| f.is_constant()));
    }
}
