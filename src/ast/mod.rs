//! Owned syntax model shared by the Java and Kotlin front-ends
//!
//! Both tree-sitter grammars are lowered into the same small set of
//! declarations, statements and expressions. Everything the checkers need
//! (annotations, initializers, bodies, spans) is kept; everything else is
//! folded into [`ExprKind::Unknown`] / [`Stmt::Other`] so that walking never
//! fails on unfamiliar syntax.

mod expr;

pub use expr::{BinaryOp, Expr, ExprKind, Literal, Stmt, SwitchCase, SwitchExpr, UnaryOp};

use std::path::{Path, PathBuf};

/// Source language of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Java,
    Kotlin,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Kotlin => "kotlin",
        }
    }
}

/// Byte range plus 1-based line/column coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
            end_line: line,
            end_column: column + end.saturating_sub(start),
        }
    }

    /// Span covering both `self` and `other`
    pub fn to(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line.min(other.line),
            column: if self.start <= other.start {
                self.column
            } else {
                other.column
            },
            end_line: self.end_line.max(other.end_line),
            end_column: if self.end >= other.end {
                self.end_column
            } else {
                other.end_column
            },
        }
    }
}

/// One import directive
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// Imported path without the trailing `.*`
    pub path: String,
    pub is_static: bool,
    pub wildcard: bool,
    /// Kotlin `import a.b.C as D`
    pub alias: Option<String>,
}

impl Import {
    /// Name the import introduces into the file scope
    pub fn visible_name(&self) -> Option<&str> {
        if self.wildcard {
            return None;
        }
        if let Some(alias) = &self.alias {
            return Some(alias);
        }
        Some(self.path.rsplit('.').next().unwrap_or(&self.path))
    }
}

/// A parsed source file
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub language: Language,
    pub source: String,
    pub package: String,
    pub imports: Vec<Import>,
    pub classes: Vec<ClassDecl>,
    /// Whether the file belongs to a test source set
    pub is_test: bool,
    /// Maven coordinate (`group:artifact`) of the module the file belongs to
    pub coordinate: Option<String>,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, language: Language, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language,
            source: source.into(),
            package: String::new(),
            imports: Vec::new(),
            classes: Vec::new(),
            is_test: false,
            coordinate: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Text of the given (1-based) line without its terminator
    pub fn line_text(&self, line: usize) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.source.lines().nth(line - 1)
    }

    /// Source text covered by `span`
    pub fn text(&self, span: Span) -> &str {
        self.source.get(span.start..span.end).unwrap_or("")
    }

    /// Qualify a simple name with this unit's package
    pub fn qualify(&self, name: &str) -> String {
        if self.package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.package, name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    AnnotationType,
    /// Kotlin `object` declarations and the synthetic file-level class
    Object,
}

/// Class, interface, enum, annotation type or Kotlin object
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub kind: ClassKind,
    pub modifiers: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub supertypes: Vec<TypeRef>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub classes: Vec<ClassDecl>,
    /// Static and instance initializer blocks, Kotlin `init { }` blocks
    pub initializers: Vec<Vec<Stmt>>,
    pub span: Span,
    pub name_span: Span,
    /// Synthetic holder for Kotlin top-level functions and properties
    pub is_file_facade: bool,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>, kind: ClassKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            modifiers: Vec::new(),
            annotations: Vec::new(),
            supertypes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            classes: Vec::new(),
            initializers: Vec::new(),
            span,
            name_span: span,
            is_file_facade: false,
        }
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    /// Nested classes that do not capture an outer instance
    pub fn is_static(&self) -> bool {
        self.has_modifier("static")
            || matches!(
                self.kind,
                ClassKind::Interface | ClassKind::Enum | ClassKind::AnnotationType | ClassKind::Object
            )
    }
}

/// Field, Kotlin property or enum constant
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub modifiers: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub initializer: Option<Expr>,
    pub is_static: bool,
    pub is_final: bool,
    pub is_enum_constant: bool,
    pub span: Span,
    pub name_span: Span,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            ty: None,
            modifiers: Vec::new(),
            annotations: Vec::new(),
            initializer: None,
            is_static: false,
            is_final: false,
            is_enum_constant: false,
            span,
            name_span: span,
        }
    }

    /// `static final` in Java, `const val` or object-level `val` in Kotlin
    pub fn is_constant(&self) -> bool {
        self.is_static && self.is_final
    }

    pub fn is_deprecated(&self) -> bool {
        self.annotations
            .iter()
            .any(|a| a.simple_name() == "Deprecated")
    }
}

/// Method, constructor or Kotlin function
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub modifiers: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeRef>,
    pub body: Option<Vec<Stmt>>,
    pub is_constructor: bool,
    pub span: Span,
    pub name_span: Span,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            modifiers: Vec::new(),
            annotations: Vec::new(),
            params: Vec::new(),
            return_type: None,
            body: None,
            is_constructor: false,
            span,
            name_span: span,
        }
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    pub fn is_static(&self) -> bool {
        self.has_modifier("static")
    }

    pub fn is_varargs(&self) -> bool {
        self.params.last().is_some_and(|p| p.is_varargs)
    }

    /// Whether `count` arguments can bind to this parameter list
    pub fn accepts_arity(&self, count: usize) -> bool {
        if self.is_varargs() {
            count + 1 >= self.params.len()
        } else {
            count == self.params.len()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub annotations: Vec<Annotation>,
    pub is_varargs: bool,
    pub span: Span,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Option<TypeRef>, span: Span) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Vec::new(),
            is_varargs: false,
            span,
        }
    }
}

/// Written type, generics stripped
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub name: String,
    pub array_dims: usize,
    pub nullable: bool,
}

/// Coarse classification used by range and typedef checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Char,
    String,
    /// Arrays and collections whose size is meaningful
    Sized,
    Other,
}

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            array_dims: 0,
            nullable: false,
        }
    }

    pub fn array_of(name: impl Into<String>, dims: usize) -> Self {
        Self {
            name: name.into(),
            array_dims: dims,
            nullable: false,
        }
    }

    /// Last segment of a possibly qualified name
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn kind(&self) -> TypeKind {
        if self.array_dims > 0 {
            return TypeKind::Sized;
        }
        match self.simple_name() {
            "int" | "Int" | "short" | "Short" | "byte" | "Byte" | "Integer" => TypeKind::Int,
            "long" | "Long" => TypeKind::Long,
            "float" | "Float" => TypeKind::Float,
            "double" | "Double" => TypeKind::Double,
            "boolean" | "Boolean" => TypeKind::Boolean,
            "char" | "Char" | "Character" => TypeKind::Char,
            "String" | "CharSequence" => TypeKind::String,
            "IntArray" | "LongArray" | "FloatArray" | "DoubleArray" | "ByteArray"
            | "ShortArray" | "CharArray" | "BooleanArray" | "Array" | "List" | "MutableList"
            | "Collection" | "Set" | "MutableSet" | "Map" | "ArrayList" | "HashMap"
            | "Vararg" => TypeKind::Sized,
            _ => TypeKind::Other,
        }
    }

    pub fn is_string(&self) -> bool {
        self.kind() == TypeKind::String
    }
}

/// One annotation as written, before alias normalization
#[derive(Debug, Clone)]
pub struct Annotation {
    /// Name as written (`IntRange` or `androidx.annotation.IntRange`)
    pub name: String,
    pub args: Vec<AnnotationArg>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AnnotationArg {
    /// Attribute name; positional arguments are `value`
    pub name: String,
    pub value: Expr,
}

impl Annotation {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            span,
        }
    }

    pub fn with_arg(mut self, name: &str, value: Expr) -> Self {
        self.args.push(AnnotationArg {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// All values given for an attribute, flattening array initializers
    pub fn values(&self, attribute: &str) -> Vec<&Expr> {
        let mut out = Vec::new();
        for arg in self.args.iter().filter(|a| a.name == attribute) {
            match &arg.value.kind {
                ExprKind::ArrayInit(items) => out.extend(items.iter()),
                _ => out.push(&arg.value),
            }
        }
        out
    }

    pub fn attribute(&self, attribute: &str) -> Option<&Expr> {
        self.args
            .iter()
            .find(|a| a.name == attribute)
            .map(|a| &a.value)
    }
}

/// Strings named by `@SuppressLint`, `@SuppressWarnings` or `@Suppress`
pub fn suppressed_ids(annotations: &[Annotation]) -> Vec<String> {
    let mut ids = Vec::new();
    for annotation in annotations {
        if !matches!(
            annotation.simple_name(),
            "SuppressLint" | "SuppressWarnings" | "Suppress"
        ) {
            continue;
        }
        for value in annotation.values("value") {
            if let ExprKind::Literal(Literal::Str(id)) = &value.kind {
                ids.push(id.clone());
            }
        }
    }
    ids
}
