use super::{ClassDecl, Span, TypeRef};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal; out-of-range values wrap the way the JVM does
    Int(i64),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Str(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// Java operator token
    pub fn from_java(token: &str) -> Option<Self> {
        Some(match token {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            ">>>" => BinaryOp::UShr,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "==" | "===" => BinaryOp::Eq,
            "!=" | "!==" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            _ => return None,
        })
    }

    /// Kotlin infix function spelling of bitwise operators
    pub fn from_kotlin_infix(name: &str) -> Option<Self> {
        Some(match name {
            "shl" => BinaryOp::Shl,
            "shr" => BinaryOp::Shr,
            "ushr" => BinaryOp::UShr,
            "and" => BinaryOp::BitAnd,
            "or" => BinaryOp::BitOr,
            "xor" => BinaryOp::BitXor,
            _ => return None,
        })
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(self, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Name(String),
    /// `receiver.name` field access or qualified name
    Select {
        receiver: Box<Expr>,
        name: String,
    },
    Call {
        receiver: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
        name_span: Span,
    },
    /// `new T(args) { body }`, Kotlin `object : T { }`
    New {
        ty: TypeRef,
        args: Vec<Expr>,
        body: Option<Box<ClassDecl>>,
    },
    /// `new T[n]` / `new T[] { ... }`
    NewArray {
        ty: TypeRef,
        dims: Vec<Expr>,
        init: Option<Vec<Expr>>,
    },
    /// `{ a, b }` initializer or Kotlin `[a, b]` collection literal
    ArrayInit(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Paren(Box<Expr>),
    Lambda {
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    MethodRef {
        receiver: Box<Expr>,
        name: String,
    },
    Assign {
        target: Box<Expr>,
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    Cast {
        ty: TypeRef,
        expr: Box<Expr>,
    },
    This,
    Super,
    Switch(Box<SwitchExpr>),
    /// Unmodelled syntax; children are kept so nested calls are still visited
    Unknown(Vec<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn name(name: &str, span: Span) -> Self {
        Self::new(ExprKind::Name(name.to_string()), span)
    }

    pub fn int(value: i64, span: Span) -> Self {
        Self::new(ExprKind::Literal(Literal::Int(value)), span)
    }

    pub fn string(value: &str, span: Span) -> Self {
        Self::new(ExprKind::Literal(Literal::Str(value.to_string())), span)
    }

    pub fn unknown(span: Span) -> Self {
        Self::new(ExprKind::Unknown(Vec::new()), span)
    }

    /// Strip redundant parentheses
    pub fn skip_parens(&self) -> &Expr {
        let mut current = self;
        while let ExprKind::Paren(inner) = &current.kind {
            current = inner;
        }
        current
    }

    /// The identifier this expression ends in (`a.b.C` → `C`, `foo()` → `foo`)
    pub fn selector_name(&self) -> Option<&str> {
        match &self.skip_parens().kind {
            ExprKind::Name(name) => Some(name),
            ExprKind::Select { name, .. } => Some(name),
            ExprKind::Call { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Dotted path for names and selects (`Foo.BAR`)
    pub fn dotted_path(&self) -> Option<String> {
        match &self.skip_parens().kind {
            ExprKind::Name(name) => Some(name.clone()),
            ExprKind::Select { receiver, name } => {
                receiver.dotted_path().map(|r| format!("{}.{}", r, name))
            }
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        match &self.skip_parens().kind {
            ExprKind::Literal(_) => true,
            ExprKind::Unary {
                op: UnaryOp::Neg | UnaryOp::Plus,
                operand,
            } => operand.is_literal(),
            _ => false,
        }
    }

    /// Direct sub-expressions in source order
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Name(_) | ExprKind::This | ExprKind::Super => {
                Vec::new()
            }
            ExprKind::Select { receiver, .. } => vec![receiver],
            ExprKind::Call { receiver, args, .. } => {
                let mut out: Vec<&Expr> = receiver.iter().map(|r| r.as_ref()).collect();
                out.extend(args.iter());
                out
            }
            ExprKind::New { args, .. } => args.iter().collect(),
            ExprKind::NewArray { dims, init, .. } => {
                let mut out: Vec<&Expr> = dims.iter().collect();
                if let Some(items) = init {
                    out.extend(items.iter());
                }
                out
            }
            ExprKind::ArrayInit(items) | ExprKind::Unknown(items) => items.iter().collect(),
            ExprKind::Unary { operand, .. } => vec![operand],
            ExprKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => vec![cond, then_expr, else_expr],
            ExprKind::Paren(inner) => vec![inner],
            ExprKind::Lambda { .. } => Vec::new(),
            ExprKind::MethodRef { receiver, .. } => vec![receiver],
            ExprKind::Assign { target, value, .. } => vec![target, value],
            ExprKind::Cast { expr, .. } => vec![expr],
            ExprKind::Switch(switch) => switch.subject.iter().collect(),
        }
    }
}

/// Java `switch` (statement or expression) and Kotlin `when`
#[derive(Debug, Clone)]
pub struct SwitchExpr {
    /// `None` for a subject-less Kotlin `when { ... }`
    pub subject: Option<Expr>,
    pub cases: Vec<SwitchCase>,
    /// Span of the `switch`/`when` keyword
    pub keyword_span: Span,
    pub is_when: bool,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub labels: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Local {
        name: String,
        ty: Option<TypeRef>,
        annotations: Vec<super::Annotation>,
        init: Option<Expr>,
        is_final: bool,
        span: Span,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        span: Span,
    },
    /// Any loop; `header` holds initializers and loop variables
    Loop {
        header: Vec<Stmt>,
        cond: Option<Expr>,
        body: Vec<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Block(Vec<Stmt>),
    /// Local class declarations
    Class(Box<ClassDecl>),
    /// Statements whose structure does not matter (throw, try resources, ...)
    Other(Vec<Expr>),
}

impl Stmt {
    /// Local variable names assigned anywhere inside this statement
    pub fn collect_assigned(&self, out: &mut Vec<String>) {
        fn visit_expr(expr: &Expr, out: &mut Vec<String>) {
            match &expr.kind {
                ExprKind::Assign { target, .. } => {
                    if let ExprKind::Name(name) = &target.skip_parens().kind {
                        out.push(name.clone());
                    }
                }
                ExprKind::Unary {
                    op: UnaryOp::Increment | UnaryOp::Decrement,
                    operand,
                } => {
                    if let ExprKind::Name(name) = &operand.skip_parens().kind {
                        out.push(name.clone());
                    }
                }
                ExprKind::Switch(switch) => {
                    for stmt in switch.cases.iter().flat_map(|c| c.body.iter()) {
                        stmt.collect_assigned(out);
                    }
                }
                _ => {}
            }
            for child in expr.children() {
                visit_expr(child, out);
            }
        }

        match self {
            Stmt::Local { init, .. } => {
                if let Some(init) = init {
                    visit_expr(init, out);
                }
            }
            Stmt::Expr(expr) => visit_expr(expr, out),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                visit_expr(cond, out);
                for stmt in then_branch {
                    stmt.collect_assigned(out);
                }
                for stmt in else_branch.iter().flatten() {
                    stmt.collect_assigned(out);
                }
            }
            Stmt::Loop {
                header, cond, body, ..
            } => {
                for stmt in header.iter().chain(body.iter()) {
                    stmt.collect_assigned(out);
                }
                if let Some(cond) = cond {
                    visit_expr(cond, out);
                }
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    visit_expr(value, out);
                }
            }
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    stmt.collect_assigned(out);
                }
            }
            Stmt::Class(_) => {}
            Stmt::Other(exprs) => {
                for expr in exprs {
                    visit_expr(expr, out);
                }
            }
        }
    }
}
