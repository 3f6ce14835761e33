//! Java front-end: lowers tree-sitter-java syntax trees into [`crate::ast`]

use super::common::{
    all_children, clean_type_name, named_children, node_text, parse_float_literal,
    parse_int_literal, span_of, unquote, Parser,
};
use crate::ast::{
    Annotation, AnnotationArg, BinaryOp, ClassDecl, ClassKind, Expr, ExprKind, FieldDecl, Import,
    Language, Literal, MethodDecl, Param, SourceUnit, Stmt, SwitchCase, SwitchExpr, TypeRef,
    UnaryOp,
};
use crate::error::{LintError, Result};
use std::path::Path;
use tree_sitter::Node;

pub struct JavaParser;

impl JavaParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JavaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for JavaParser {
    fn parse(&self, path: &Path, source: &str) -> Result<SourceUnit> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_java::language())
            .map_err(|e| LintError::parse(path, e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| LintError::parse(path, "tree-sitter returned no tree"))?;

        let mut unit = SourceUnit::new(path, Language::Java, source);
        let lowering = Lowering { src: source };
        let root = tree.root_node();

        for child in named_children(&root) {
            match child.kind() {
                "package_declaration" => {
                    if let Some(name) = named_children(&child)
                        .into_iter()
                        .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
                    {
                        unit.package = node_text(&name, source).to_string();
                    }
                }
                "import_declaration" => unit.imports.push(lowering.import(&child)),
                kind if is_type_declaration(kind) => {
                    if let Some(class) = lowering.class(&child) {
                        unit.classes.push(class);
                    }
                }
                _ => {}
            }
        }

        Ok(unit)
    }
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "annotation_type_declaration"
            | "record_declaration"
    )
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
                "static" => import.is_static = true,
                "asterisk" => import.wildcard = true,
                "scoped_identifier" | "identifier" => {
                    import.path = self.text(&child).to_string();
                }
                _ => {}
            }
        }
        import
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn class(&self, node: &Node) -> Option<ClassDecl> {
        let name_node = node.child_by_field_name("name")?;
        let kind = match node.kind() {
            "interface_declaration" => ClassKind::Interface,
            "enum_declaration" => ClassKind::Enum,
            "annotation_type_declaration" => ClassKind::AnnotationType,
            _ => ClassKind::Class,
        };

        let mut class = ClassDecl::new(self.text(&name_node), kind, span_of(node));
        class.name_span = span_of(&name_node);

        for child in named_children(node) {
            match child.kind() {
                "modifiers" => {
                    let (modifiers, annotations) = self.modifiers(&child);
                    class.modifiers = modifiers;
                    class.annotations = annotations;
                }
                "superclass" | "super_interfaces" | "extends_interfaces" => {
                    self.collect_types(&child, &mut class.supertypes);
                }
                _ => {}
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.class_body(&body, &mut class);
        }
        Some(class)
    }

    fn collect_types(&self, node: &Node, out: &mut Vec<TypeRef>) {
        for child in named_children(node) {
            match child.kind() {
                "type_list" => self.collect_types(&child, out),
                _ => out.push(self.type_ref(&child)),
            }
        }
    }

    fn class_body(&self, body: &Node, class: &mut ClassDecl) {
        let is_interface = matches!(
            class.kind,
            ClassKind::Interface | ClassKind::AnnotationType
        );
        for member in named_children(body) {
            match member.kind() {
                "field_declaration" | "constant_declaration" => {
                    let mut fields = self.fields(&member);
                    if is_interface {
                        for field in &mut fields {
                            field.is_static = true;
                            field.is_final = true;
                        }
                    }
                    class.fields.extend(fields);
                }
                "method_declaration" | "annotation_type_element_declaration" => {
                    if let Some(mut method) = self.method(&member) {
                        if is_interface && !method.has_modifier("private") {
                            method.modifiers.push("public".into());
                        }
                        class.methods.push(method);
                    }
                }
                "constructor_declaration" | "compact_constructor_declaration" => {
                    if let Some(method) = self.method(&member) {
                        class.methods.push(method);
                    }
                }
                "enum_constant" => {
                    if let Some(field) = self.enum_constant(&member, &class.name) {
                        class.fields.push(field);
                    }
                }
                "enum_body_declarations" => self.class_body(&member, class),
                "static_initializer" => {
                    if let Some(block) = named_children(&member)
                        .into_iter()
                        .find(|c| c.kind() == "block")
                    {
                        class.initializers.push(self.block(&block));
                    }
                }
                "block" => class.initializers.push(self.block(&member)),
                kind if is_type_declaration(kind) => {
                    if let Some(nested) = self.class(&member) {
                        class.classes.push(nested);
                    }
                }
                _ => {}
            }
        }
    }

    fn modifiers(&self, node: &Node) -> (Vec<String>, Vec<Annotation>) {
        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();
        for child in all_children(node) {
            match child.kind() {
                "annotation" | "marker_annotation" => {
                    if let Some(annotation) = self.annotation(&child) {
                        annotations.push(annotation);
                    }
                }
                "line_comment" | "block_comment" => {}
                _ => modifiers.push(self.text(&child).to_string()),
            }
        }
        (modifiers, annotations)
    }

    fn annotation(&self, node: &Node) -> Option<Annotation> {
        let name = node.child_by_field_name("name")?;
        let mut annotation = Annotation::new(self.text(&name), span_of(node));
        if let Some(args) = node.child_by_field_name("arguments") {
            for arg in named_children(&args) {
                if arg.kind() == "element_value_pair" {
                    let key = arg
                        .child_by_field_name("key")
                        .map(|k| self.text(&k).to_string())
                        .unwrap_or_else(|| "value".to_string());
                    if let Some(value) = arg.child_by_field_name("value") {
                        annotation.args.push(AnnotationArg {
                            name: key,
                            value: self.element_value(&value),
                        });
                    }
                } else if !matches!(arg.kind(), "line_comment" | "block_comment") {
                    annotation.args.push(AnnotationArg {
                        name: "value".to_string(),
                        value: self.element_value(&arg),
                    });
                }
            }
        }
        Some(annotation)
    }

    fn element_value(&self, node: &Node) -> Expr {
        match node.kind() {
            "element_value_array_initializer" => Expr::new(
                ExprKind::ArrayInit(
                    named_children(node)
                        .iter()
                        .filter(|c| !matches!(c.kind(), "line_comment" | "block_comment"))
                        .map(|c| self.element_value(c))
                        .collect(),
                ),
                span_of(node),
            ),
            _ => self.expr(node),
        }
    }

    fn fields(&self, node: &Node) -> Vec<FieldDecl> {
        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();
        let mut declarators = Vec::new();
        let ty = node.child_by_field_name("type").map(|t| self.type_ref(&t));

        for child in named_children(node) {
            match child.kind() {
                "modifiers" => {
                    let (m, a) = self.modifiers(&child);
                    modifiers = m;
                    annotations = a;
                }
                "variable_declarator" => declarators.push(child),
                _ => {}
            }
        }

        declarators
            .iter()
            .filter_map(|declarator| {
                let name = declarator.child_by_field_name("name")?;
                let mut field = FieldDecl::new(self.text(&name), span_of(node));
                field.name_span = span_of(&name);
                field.modifiers = modifiers.clone();
                field.annotations = annotations.clone();
                field.is_static = modifiers.iter().any(|m| m == "static");
                field.is_final = modifiers.iter().any(|m| m == "final");
                field.ty = ty.clone().map(|mut t| {
                    if declarator.child_by_field_name("dimensions").is_some() {
                        t.array_dims += 1;
                    }
                    t
                });
                field.initializer = declarator
                    .child_by_field_name("value")
                    .map(|v| self.initializer(&v));
                Some(field)
            })
            .collect()
    }

    fn enum_constant(&self, node: &Node, enum_name: &str) -> Option<FieldDecl> {
        let name = node.child_by_field_name("name")?;
        let mut field = FieldDecl::new(self.text(&name), span_of(node));
        field.name_span = span_of(&name);
        field.ty = Some(TypeRef::new(enum_name));
        field.is_static = true;
        field.is_final = true;
        field.is_enum_constant = true;
        for child in named_children(node) {
            if child.kind() == "modifiers" {
                field.annotations = self.modifiers(&child).1;
            }
        }
        Some(field)
    }

    fn method(&self, node: &Node) -> Option<MethodDecl> {
        let name = node.child_by_field_name("name")?;
        let mut method = MethodDecl::new(self.text(&name), span_of(node));
        method.name_span = span_of(&name);
        method.is_constructor = matches!(
            node.kind(),
            "constructor_declaration" | "compact_constructor_declaration"
        );

        for child in named_children(node) {
            if child.kind() == "modifiers" {
                let (m, a) = self.modifiers(&child);
                method.modifiers = m;
                method.annotations = a;
            }
        }
        if let Some(ty) = node.child_by_field_name("type") {
            let mut return_type = self.type_ref(&ty);
            if node.child_by_field_name("dimensions").is_some() {
                return_type.array_dims += 1;
            }
            method.return_type = Some(return_type);
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            for param in named_children(&params) {
                if let Some(param) = self.param(&param) {
                    method.params.push(param);
                }
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            method.body = Some(self.block(&body));
        }
        Some(method)
    }

    fn param(&self, node: &Node) -> Option<Param> {
        match node.kind() {
            "formal_parameter" => {
                let name = node.child_by_field_name("name")?;
                let mut ty = node.child_by_field_name("type").map(|t| self.type_ref(&t));
                if node.child_by_field_name("dimensions").is_some() {
                    if let Some(t) = ty.as_mut() {
                        t.array_dims += 1;
                    }
                }
                let mut param = Param::new(self.text(&name), ty, span_of(node));
                for child in named_children(node) {
                    if child.kind() == "modifiers" {
                        param.annotations = self.modifiers(&child).1;
                    }
                }
                Some(param)
            }
            "spread_parameter" => {
                let mut annotations = Vec::new();
                let mut ty = None;
                let mut name = None;
                for child in named_children(node) {
                    match child.kind() {
                        "modifiers" => annotations = self.modifiers(&child).1,
                        "variable_declarator" => {
                            name = child
                                .child_by_field_name("name")
                                .map(|n| self.text(&n).to_string());
                        }
                        "identifier" if ty.is_some() => {
                            name = Some(self.text(&child).to_string());
                        }
                        _ if ty.is_none() => ty = Some(self.type_ref(&child)),
                        _ => {}
                    }
                }
                let ty = ty.map(|mut t| {
                    t.array_dims += 1;
                    t
                });
                let mut param = Param::new(name.unwrap_or_default(), ty, span_of(node));
                param.annotations = annotations;
                param.is_varargs = true;
                Some(param)
            }
            _ => None,
        }
    }

    fn type_ref(&self, node: &Node) -> TypeRef {
        match node.kind() {
            "array_type" => {
                let element = node
                    .child_by_field_name("element")
                    .map(|e| self.type_ref(&e))
                    .unwrap_or_else(|| TypeRef::new("Object"));
                let dims = node
                    .child_by_field_name("dimensions")
                    .map(|d| self.text(&d).matches('[').count())
                    .unwrap_or(1);
                TypeRef::array_of(element.name, element.array_dims + dims)
            }
            "generic_type" => named_children(node)
                .first()
                .map(|base| self.type_ref(base))
                .unwrap_or_else(|| TypeRef::new(clean_type_name(self.text(node)))),
            _ => TypeRef::new(clean_type_name(self.text(node))),
        }
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

    fn body(&self, node: &Node) -> Vec<Stmt> {
        if node.kind() == "block" {
            self.block(node)
        } else {
            let mut out = Vec::new();
            self.stmt_into(node, &mut out);
            out
        }
    }

    fn stmt_into(&self, node: &Node, out: &mut Vec<Stmt>) {
        let span = span_of(node);
        match node.kind() {
            "line_comment" | "block_comment" | ";" => {}
            "block" => out.push(Stmt::Block(self.block(node))),
            "local_variable_declaration" => {
                let mut annotations = Vec::new();
                let mut is_final = false;
                for child in named_children(node) {
                    if child.kind() == "modifiers" {
                        let (m, a) = self.modifiers(&child);
                        is_final = m.iter().any(|m| m == "final");
                        annotations = a;
                    }
                }
                let ty = node.child_by_field_name("type").map(|t| self.type_ref(&t));
                let ty = ty.filter(|t| t.name != "var");
                for declarator in named_children(node)
                    .into_iter()
                    .filter(|c| c.kind() == "variable_declarator")
                {
                    let Some(name) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    out.push(Stmt::Local {
                        name: self.text(&name).to_string(),
                        ty: ty.clone(),
                        annotations: annotations.clone(),
                        init: declarator
                            .child_by_field_name("value")
                            .map(|v| self.initializer(&v)),
                        is_final,
                        span: span_of(&declarator),
                    });
                }
            }
            "expression_statement" => {
                if let Some(expr) = named_children(node).first() {
                    out.push(Stmt::Expr(self.expr(expr)));
                }
            }
            "if_statement" => {
                let cond = node
                    .child_by_field_name("condition")
                    .map(|c| self.expr(&c))
                    .unwrap_or_else(|| Expr::unknown(span));
                let then_branch = node
                    .child_by_field_name("consequence")
                    .map(|c| self.body(&c))
                    .unwrap_or_default();
                let else_branch = node
                    .child_by_field_name("alternative")
                    .map(|c| self.body(&c));
                out.push(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    span,
                });
            }
            "while_statement" | "do_statement" => {
                out.push(Stmt::Loop {
                    header: Vec::new(),
                    cond: node.child_by_field_name("condition").map(|c| self.expr(&c)),
                    body: node
                        .child_by_field_name("body")
                        .map(|b| self.body(&b))
                        .unwrap_or_default(),
                    span,
                });
            }
            "for_statement" => {
                let mut header = Vec::new();
                let mut cursor = node.walk();
                for init in node.children_by_field_name("init", &mut cursor) {
                    if init.kind() == "local_variable_declaration" {
                        self.stmt_into(&init, &mut header);
                    } else {
                        header.push(Stmt::Expr(self.expr(&init)));
                    }
                }
                let mut body = node
                    .child_by_field_name("body")
                    .map(|b| self.body(&b))
                    .unwrap_or_default();
                let mut cursor = node.walk();
                for update in node.children_by_field_name("update", &mut cursor) {
                    body.push(Stmt::Expr(self.expr(&update)));
                }
                out.push(Stmt::Loop {
                    header,
                    cond: node.child_by_field_name("condition").map(|c| self.expr(&c)),
                    body,
                    span,
                });
            }
            "enhanced_for_statement" => {
                let mut header = Vec::new();
                if let Some(name) = node.child_by_field_name("name") {
                    header.push(Stmt::Local {
                        name: self.text(&name).to_string(),
                        ty: node.child_by_field_name("type").map(|t| self.type_ref(&t)),
                        annotations: Vec::new(),
                        init: None,
                        is_final: false,
                        span: span_of(&name),
                    });
                }
                let iterable = node
                    .child_by_field_name("value")
                    .map(|v| self.expr(&v));
                if let Some(iterable) = iterable {
                    header.push(Stmt::Expr(iterable));
                }
                out.push(Stmt::Loop {
                    header,
                    cond: None,
                    body: node
                        .child_by_field_name("body")
                        .map(|b| self.body(&b))
                        .unwrap_or_default(),
                    span,
                });
            }
            "return_statement" => {
                out.push(Stmt::Return {
                    value: named_children(node).first().map(|v| self.expr(v)),
                    span,
                });
            }
            "switch_expression" | "switch_statement" => {
                out.push(Stmt::Expr(self.switch(node)));
            }
            "try_statement" | "try_with_resources_statement" => {
                let mut parts = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "resource_specification" => {
                            for resource in named_children(&child) {
                                if let (Some(name), Some(value)) = (
                                    resource.child_by_field_name("name"),
                                    resource.child_by_field_name("value"),
                                ) {
                                    parts.push(Stmt::Local {
                                        name: self.text(&name).to_string(),
                                        ty: resource
                                            .child_by_field_name("type")
                                            .map(|t| self.type_ref(&t)),
                                        annotations: Vec::new(),
                                        init: Some(self.expr(&value)),
                                        is_final: true,
                                        span: span_of(&resource),
                                    });
                                }
                            }
                        }
                        "block" => parts.push(Stmt::Block(self.block(&child))),
                        "catch_clause" | "finally_clause" => {
                            if let Some(block) = child
                                .child_by_field_name("body")
                                .or_else(|| {
                                    named_children(&child)
                                        .into_iter()
                                        .find(|c| c.kind() == "block")
                                })
                            {
                                parts.push(Stmt::Block(self.block(&block)));
                            }
                        }
                        _ => {}
                    }
                }
                out.push(Stmt::Block(parts));
            }
            "synchronized_statement" | "labeled_statement" => {
                let mut exprs = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "block" => out.push(Stmt::Block(self.block(&child))),
                        "parenthesized_expression" => exprs.push(self.expr(&child)),
                        "identifier" => {}
                        _ => self.stmt_into(&child, out),
                    }
                }
                if !exprs.is_empty() {
                    out.push(Stmt::Other(exprs));
                }
            }
            "explicit_constructor_invocation" => {
                let name = node
                    .child_by_field_name("constructor")
                    .map(|c| self.text(&c).to_string())
                    .unwrap_or_else(|| "super".to_string());
                let args = node
                    .child_by_field_name("arguments")
                    .map(|a| self.arguments(&a))
                    .unwrap_or_default();
                out.push(Stmt::Expr(Expr::new(
                    ExprKind::Call {
                        receiver: None,
                        name,
                        args,
                        name_span: span,
                    },
                    span,
                )));
            }
            "yield_statement" => {
                out.push(Stmt::Return {
                    value: named_children(node).first().map(|v| self.expr(v)),
                    span,
                });
            }
            kind if is_type_declaration(kind) => {
                if let Some(class) = self.class(node) {
                    out.push(Stmt::Class(Box::new(class)));
                }
            }
            "throw_statement" | "assert_statement" => {
                out.push(Stmt::Other(
                    named_children(node).iter().map(|c| self.expr(c)).collect(),
                ));
            }
            _ => {
                // break, continue, empty statements and anything newer
                let exprs: Vec<Expr> = named_children(node)
                    .iter()
                    .filter(|c| !matches!(c.kind(), "identifier" | "line_comment" | "block_comment"))
                    .map(|c| self.expr(c))
                    .collect();
                if !exprs.is_empty() {
                    out.push(Stmt::Other(exprs));
                }
            }
        }
    }

    fn switch(&self, node: &Node) -> Expr {
        let span = span_of(node);
        let subject = node.child_by_field_name("condition").map(|c| self.expr(&c));
        let keyword_span = all_children(node)
            .into_iter()
            .find(|c| c.kind() == "switch")
            .map(|c| span_of(&c))
            .unwrap_or(span);

        let mut cases = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for group in named_children(&body) {
                match group.kind() {
                    "switch_block_statement_group" => {
                        let mut case = SwitchCase {
                            labels: Vec::new(),
                            is_default: false,
                            body: Vec::new(),
                            span: span_of(&group),
                        };
                        for child in named_children(&group) {
                            if child.kind() == "switch_label" {
                                self.switch_label(&child, &mut case);
                            } else {
                                self.stmt_into(&child, &mut case.body);
                            }
                        }
                        cases.push(case);
                    }
                    "switch_rule" => {
                        let mut case = SwitchCase {
                            labels: Vec::new(),
                            is_default: false,
                            body: Vec::new(),
                            span: span_of(&group),
                        };
                        for child in named_children(&group) {
                            match child.kind() {
                                "switch_label" => self.switch_label(&child, &mut case),
                                "block" => case.body = self.block(&child),
                                "expression_statement" | "throw_statement" => {
                                    self.stmt_into(&child, &mut case.body)
                                }
                                _ => case.body.push(Stmt::Expr(self.expr(&child))),
                            }
                        }
                        cases.push(case);
                    }
                    _ => {}
                }
            }
        }

        Expr::new(
            ExprKind::Switch(Box::new(SwitchExpr {
                subject,
                cases,
                keyword_span,
                is_when: false,
            })),
            span,
        )
    }

    fn switch_label(&self, node: &Node, case: &mut SwitchCase) {
        let labels = named_children(node);
        if labels.is_empty() || self.text(node).trim_start().starts_with("default") {
            case.is_default = true;
        }
        for label in labels {
            if label.kind() == "pattern" || label.kind() == "guard" {
                continue;
            }
            case.labels.push(self.expr(&label));
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn initializer(&self, node: &Node) -> Expr {
        self.expr(node)
    }

    fn arguments(&self, node: &Node) -> Vec<Expr> {
        named_children(node)
            .iter()
            .filter(|c| !matches!(c.kind(), "line_comment" | "block_comment"))
            .map(|c| self.expr(c))
            .collect()
    }

    fn expr(&self, node: &Node) -> Expr {
        let span = span_of(node);
        let kind = match node.kind() {
            "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal" => match parse_int_literal(self.text(node)) {
                Some(literal) => ExprKind::Literal(literal),
                None => ExprKind::Unknown(Vec::new()),
            },
            "decimal_floating_point_literal" | "hex_floating_point_literal" => {
                match parse_float_literal(self.text(node)) {
                    Some(literal) => ExprKind::Literal(literal),
                    None => ExprKind::Unknown(Vec::new()),
                }
            }
            "true" => ExprKind::Literal(Literal::Bool(true)),
            "false" => ExprKind::Literal(Literal::Bool(false)),
            "null_literal" => ExprKind::Literal(Literal::Null),
            "character_literal" => {
                let text = unquote(self.text(node));
                match text.chars().next() {
                    Some(ch) => ExprKind::Literal(Literal::Char(ch)),
                    None => ExprKind::Unknown(Vec::new()),
                }
            }
            "string_literal" | "text_block" => {
                ExprKind::Literal(Literal::Str(unquote(self.text(node))))
            }
            "identifier" | "type_identifier" => ExprKind::Name(self.text(node).to_string()),
            "scoped_identifier" | "scoped_type_identifier" => {
                return self.qualified_name(node);
            }
            "this" => ExprKind::This,
            "super" => ExprKind::Super,
            "parenthesized_expression" => match named_children(node).first() {
                Some(inner) => ExprKind::Paren(Box::new(self.expr(inner))),
                None => ExprKind::Unknown(Vec::new()),
            },
            "field_access" => {
                let receiver = node
                    .child_by_field_name("object")
                    .map(|o| self.expr(&o))
                    .unwrap_or_else(|| Expr::unknown(span));
                let name = node
                    .child_by_field_name("field")
                    .map(|f| self.text(&f).to_string())
                    .unwrap_or_default();
                ExprKind::Select {
                    receiver: Box::new(receiver),
                    name,
                }
            }
            "method_invocation" => {
                let name_node = node.child_by_field_name("name");
                let name = name_node
                    .map(|n| self.text(&n).to_string())
                    .unwrap_or_default();
                ExprKind::Call {
                    receiver: node
                        .child_by_field_name("object")
                        .map(|o| Box::new(self.expr(&o))),
                    name,
                    args: node
                        .child_by_field_name("arguments")
                        .map(|a| self.arguments(&a))
                        .unwrap_or_default(),
                    name_span: name_node.map(|n| span_of(&n)).unwrap_or(span),
                }
            }
            "object_creation_expression" => {
                let ty = node
                    .child_by_field_name("type")
                    .map(|t| self.type_ref(&t))
                    .unwrap_or_else(|| TypeRef::new("Object"));
                let args = node
                    .child_by_field_name("arguments")
                    .map(|a| self.arguments(&a))
                    .unwrap_or_default();
                let body = named_children(node)
                    .into_iter()
                    .find(|c| c.kind() == "class_body")
                    .map(|b| {
                        let mut anonymous = ClassDecl::new("", ClassKind::Class, span_of(&b));
                        anonymous.supertypes.push(ty.clone());
                        self.class_body(&b, &mut anonymous);
                        Box::new(anonymous)
                    });
                ExprKind::New { ty, args, body }
            }
            "array_creation_expression" => {
                let element = node
                    .child_by_field_name("type")
                    .map(|t| self.type_ref(&t))
                    .unwrap_or_else(|| TypeRef::new("Object"));
                let mut dims = Vec::new();
                let mut dim_count = 0;
                for child in named_children(node) {
                    match child.kind() {
                        "dimensions_expr" => {
                            dim_count += 1;
                            if let Some(inner) = named_children(&child).first() {
                                dims.push(self.expr(inner));
                            }
                        }
                        "dimensions" => dim_count += self.text(&child).matches('[').count(),
                        _ => {}
                    }
                }
                let init = node
                    .child_by_field_name("value")
                    .map(|v| self.arguments(&v));
                ExprKind::NewArray {
                    ty: TypeRef::array_of(element.name, dim_count.max(1)),
                    dims,
                    init,
                }
            }
            "array_initializer" => ExprKind::ArrayInit(self.arguments(node)),
            "unary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(&o))
                    .unwrap_or("");
                let operand = node
                    .child_by_field_name("operand")
                    .map(|o| self.expr(&o))
                    .unwrap_or_else(|| Expr::unknown(span));
                let op = match op {
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Plus,
                    "!" => UnaryOp::Not,
                    "~" => UnaryOp::BitNot,
                    _ => return Expr::new(ExprKind::Unknown(vec![operand]), span),
                };
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                }
            }
            "update_expression" => {
                let text = self.text(node);
                let op = if text.contains("++") {
                    UnaryOp::Increment
                } else {
                    UnaryOp::Decrement
                };
                match named_children(node).first() {
                    Some(operand) => ExprKind::Unary {
                        op,
                        operand: Box::new(self.expr(operand)),
                    },
                    None => ExprKind::Unknown(Vec::new()),
                }
            }
            "binary_expression" => {
                let lhs = node.child_by_field_name("left").map(|l| self.expr(&l));
                let rhs = node.child_by_field_name("right").map(|r| self.expr(&r));
                let op = node
                    .child_by_field_name("operator")
                    .and_then(|o| BinaryOp::from_java(o.kind()));
                match (lhs, op, rhs) {
                    (Some(lhs), Some(op), Some(rhs)) => ExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    (lhs, _, rhs) => ExprKind::Unknown(lhs.into_iter().chain(rhs).collect()),
                }
            }
            "ternary_expression" => {
                let part = |field: &str| {
                    node.child_by_field_name(field)
                        .map(|c| self.expr(&c))
                        .unwrap_or_else(|| Expr::unknown(span))
                };
                ExprKind::Conditional {
                    cond: Box::new(part("condition")),
                    then_expr: Box::new(part("consequence")),
                    else_expr: Box::new(part("alternative")),
                }
            }
            "assignment_expression" => {
                let target = node
                    .child_by_field_name("left")
                    .map(|l| self.expr(&l))
                    .unwrap_or_else(|| Expr::unknown(span));
                let value = node
                    .child_by_field_name("right")
                    .map(|r| self.expr(&r))
                    .unwrap_or_else(|| Expr::unknown(span));
                let op_text = node
                    .child_by_field_name("operator")
                    .map(|o| o.kind())
                    .unwrap_or("=");
                let op = op_text
                    .strip_suffix('=')
                    .filter(|s| !s.is_empty())
                    .and_then(BinaryOp::from_java);
                ExprKind::Assign {
                    target: Box::new(target),
                    op,
                    value: Box::new(value),
                }
            }
            "cast_expression" => {
                let ty = node
                    .child_by_field_name("type")
                    .map(|t| self.type_ref(&t))
                    .unwrap_or_else(|| TypeRef::new("Object"));
                match node.child_by_field_name("value") {
                    Some(value) => ExprKind::Cast {
                        ty,
                        expr: Box::new(self.expr(&value)),
                    },
                    None => ExprKind::Unknown(Vec::new()),
                }
            }
            "lambda_expression" => {
                let params = node
                    .child_by_field_name("parameters")
                    .map(|p| self.lambda_params(&p))
                    .unwrap_or_default();
                let body = match node.child_by_field_name("body") {
                    Some(body) if body.kind() == "block" => self.block(&body),
                    Some(body) => vec![Stmt::Return {
                        value: Some(self.expr(&body)),
                        span: span_of(&body),
                    }],
                    None => Vec::new(),
                };
                ExprKind::Lambda { params, body }
            }
            "method_reference" => {
                let children = named_children(node);
                let receiver = children
                    .first()
                    .map(|r| self.expr(r))
                    .unwrap_or_else(|| Expr::unknown(span));
                let name = if self.text(node).ends_with("::new") {
                    "new".to_string()
                } else {
                    children
                        .last()
                        .filter(|n| n.kind() == "identifier" && children.len() > 1)
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default()
                };
                ExprKind::MethodRef {
                    receiver: Box::new(receiver),
                    name,
                }
            }
            "switch_expression" => return self.switch(node),
            "class_literal" | "instanceof_expression" | "array_access" => {
                ExprKind::Unknown(self.arguments(node))
            }
            "integral_type" | "floating_point_type" | "boolean_type" | "void_type" => {
                ExprKind::Name(self.text(node).to_string())
            }
            _ => ExprKind::Unknown(self.arguments(node)),
        };
        Expr::new(kind, span)
    }

    fn qualified_name(&self, node: &Node) -> Expr {
        let span = span_of(node);
        let scope = node.child_by_field_name("scope");
        let name = node.child_by_field_name("name");
        match (scope, name) {
            (Some(scope), Some(name)) => Expr::new(
                ExprKind::Select {
                    receiver: Box::new(self.expr(&scope)),
                    name: self.text(&name).to_string(),
                },
                span,
            ),
            _ => Expr::name(self.text(node), span),
        }
    }

    fn lambda_params(&self, node: &Node) -> Vec<String> {
        match node.kind() {
            "identifier" => vec![self.text(node).to_string()],
            _ => named_children(node)
                .iter()
                .filter_map(|p| match p.kind() {
                    "identifier" => Some(self.text(p).to_string()),
                    _ => p
                        .child_by_field_name("name")
                        .map(|n| self.text(&n).to_string()),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(source: &str) -> SourceUnit {
        JavaParser::new()
            .parse(&PathBuf::from("src/test/pkg/Test.java"), source)
            .expect("Failed to parse")
    }

    #[test]
    fn test_package_and_imports() {
        let unit = parse(
            "package test.pkg;\nimport androidx.annotation.IntRange;\nimport static java.lang.Math.*;\nclass A {}\n",
        );
        assert_eq!(unit.package, "test.pkg");
        assert_eq!(unit.imports.len(), 2);
        assert_eq!(unit.imports[0].path, "androidx.annotation.IntRange");
        assert!(unit.imports[1].is_static);
        assert!(unit.imports[1].wildcard);
    }

    #[test]
    fn test_class_members() {
        let unit = parse(
            r#"
            package test.pkg;
            public class Foo extends Bar implements Baz {
                public static final int A = 1 << 2;
                private int count;
                public Foo(int x) { count = x; }
                public void setAlpha(@IntRange(from = 0, to = 255) int alpha) {}
                static class Inner {}
            }
            "#,
        );
        let class = &unit.classes[0];
        assert_eq!(class.name, "Foo");
        assert_eq!(class.supertypes.len(), 2);
        assert_eq!(class.fields.len(), 2);
        assert!(class.fields[0].is_constant());
        assert!(!class.fields[1].is_constant());
        assert_eq!(class.methods.len(), 2);
        assert!(class.methods[0].is_constructor);

        let set_alpha = &class.methods[1];
        assert_eq!(set_alpha.params.len(), 1);
        let annotation = &set_alpha.params[0].annotations[0];
        assert_eq!(annotation.name, "IntRange");
        assert_eq!(annotation.args.len(), 2);
        assert_eq!(class.classes[0].name, "Inner");
    }

    #[test]
    fn test_intdef_annotation_values() {
        let unit = parse(
            r#"
            @IntDef(flag = true, value = {A, B, C})
            @Retention(RetentionPolicy.SOURCE)
            public @interface Mode {}
            "#,
        );
        let class = &unit.classes[0];
        assert_eq!(class.kind, ClassKind::AnnotationType);
        let intdef = &class.annotations[0];
        assert_eq!(intdef.values("value").len(), 3);
        assert!(intdef.attribute("flag").is_some());
    }

    #[test]
    fn test_switch_lowering() {
        let unit = parse(
            r#"
            class S {
                void m(int x) {
                    switch (x) {
                        case A: break;
                        case B:
                        case C: foo(); break;
                        default: break;
                    }
                }
            }
            "#,
        );
        let body = unit.classes[0].methods[0].body.as_ref().unwrap();
        let Stmt::Expr(expr) = &body[0] else {
            panic!("expected switch statement");
        };
        let ExprKind::Switch(switch) = &expr.kind else {
            panic!("expected switch expression");
        };
        let labels: usize = switch.cases.iter().map(|c| c.labels.len()).sum();
        assert_eq!(labels, 3);
        assert!(switch.cases.iter().any(|c| c.is_default));
    }

    #[test]
    fn test_varargs_and_lambdas() {
        let unit = parse(
            r#"
            class V {
                void many(@Size(min = 1) int... values) {}
                void run() { post(() -> compute()); }
            }
            "#,
        );
        let class = &unit.classes[0];
        assert!(class.methods[0].params[0].is_varargs);
        let body = class.methods[1].body.as_ref().unwrap();
        let Stmt::Expr(Expr {
            kind: ExprKind::Call { args, .. },
            ..
        }) = &body[0]
        else {
            panic!("expected call");
        };
        assert!(matches!(args[0].kind, ExprKind::Lambda { .. }));
    }
}
