//! AST node types for the VU language.

/// Source span for error reporting, as byte offsets into the parsed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A complete VU: an ordered block of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `a = value`. Cascaded `a = b = value` keeps every target so the
    /// validator can reject it.
    Assign { targets: Vec<Expr>, value: Expr },
    /// `if test: body else: orelse`. An `elif` is an `If` that is the only
    /// statement of `orelse`.
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    /// `for target in iter: body`
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Expr(Expr),
    Pass,
    /// A full-line `# comment`, text without the `#`.
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    /// `a and b and c`, flattened the way it was written.
    BoolOp { op: BoolOp, values: Vec<Expr> },
    /// `left op1 c1 op2 c2 ...`. Only single comparisons pass validation.
    Compare {
        left: Box<Expr>,
        ops: Vec<(CmpOp, Expr)>,
    },
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp { op: UnaryOp, operand: Box<Expr> },
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// `value.attr`
    Attribute { value: Box<Expr>, attr: String },
    /// `value[index]`
    Subscript { value: Box<Expr>, index: Box<Expr> },
    /// `body if test else orelse`
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Invert,
    Pos,
    Neg,
}

impl BoolOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
        }
    }

    pub fn is_additive(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub)
    }

    pub fn is_multiplicative(self) -> bool {
        matches!(self, BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Mod)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinOp::BitOr | BinOp::BitXor | BinOp::BitAnd)
    }
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Invert => "~",
            UnaryOp::Pos => "+",
            UnaryOp::Neg => "-",
        }
    }
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, StmtKind::Comment(_))
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn name(id: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Name(id.into()), span)
    }

    pub fn boolean(value: bool, span: Span) -> Self {
        Self::new(ExprKind::Bool(value), span)
    }

    /// `not operand`, spanning the operand. `not (not x)` folds to `x`.
    pub fn not(operand: Expr) -> Self {
        let span = operand.span;
        match operand.kind {
            ExprKind::UnaryOp {
                op: UnaryOp::Not,
                operand: inner,
            } => *inner,
            kind => Self::new(
                ExprKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(Self::new(kind, span)),
                },
                span,
            ),
        }
    }

    /// A call to a plain function name, e.g. `is_ext_enabled(VK_KHR_foo)`.
    pub fn call(func: &str, args: Vec<Expr>, span: Span) -> Self {
        Self::new(
            ExprKind::Call {
                func: Box::new(Expr::name(func, span)),
                args,
            },
            span,
        )
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            ExprKind::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// The arguments if this is `name(...)` with a plain function name.
    pub fn call_args(&self, name: &str) -> Option<&[Expr]> {
        match &self.kind {
            ExprKind::Call { func, args } if func.as_name() == Some(name) => Some(args),
            _ => None,
        }
    }

    /// Replace every span in this subtree. Used when a node is synthesized
    /// from text that does not appear in the VU (e.g. a macro value).
    pub fn respan(&mut self, span: Span) {
        self.span = span;
        match &mut self.kind {
            ExprKind::Name(_) | ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Float(_) => {}
            ExprKind::BoolOp { values, .. } => values.iter_mut().for_each(|v| v.respan(span)),
            ExprKind::Compare { left, ops } => {
                left.respan(span);
                ops.iter_mut().for_each(|(_, e)| e.respan(span));
            }
            ExprKind::BinOp { left, right, .. } => {
                left.respan(span);
                right.respan(span);
            }
            ExprKind::UnaryOp { operand, .. } => operand.respan(span),
            ExprKind::Call { func, args } => {
                func.respan(span);
                args.iter_mut().for_each(|a| a.respan(span));
            }
            ExprKind::Attribute { value, .. } => value.respan(span),
            ExprKind::Subscript { value, index } => {
                value.respan(span);
                index.respan(span);
            }
            ExprKind::IfExp { test, body, orelse } => {
                test.respan(span);
                body.respan(span);
                orelse.respan(span);
            }
        }
    }
}
