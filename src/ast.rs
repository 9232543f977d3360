use std::fmt::Display;
use std::rc::Rc;

use ordered_float::OrderedFloat;

use crate::scanner::Pos;

#[derive(Debug, PartialEq, Eq)]
pub struct Program(pub Vec<Stmt>);

/// A function definition. Function values hold an `Rc` to this node rather
/// than copying the body, so a definition is shared between the tree that
/// produced it and every environment binding that refers to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunDecl {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stmt {
    // Its possible defining this pos across all statements is wasteful of space
    pub pos: Pos,
    pub inner: StmtInner,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StmtInner {
    // a = b = expr keeps every target so chained assignment works
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    Expr(Expr),
    If {
        test: Expr,
        then: Vec<Stmt>,
        or_else: Option<Vec<Stmt>>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    For {
        target: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    FunctionDef(Rc<FunDecl>),
    Return(Option<Expr>),
}

impl StmtInner {
    pub fn kind_name(&self) -> &'static str {
        match self {
            StmtInner::Assign { .. } => "assignment",
            StmtInner::AugAssign { .. } => "augmented assignment",
            StmtInner::Expr(_) => "expression",
            StmtInner::If { .. } => "if",
            StmtInner::While { .. } => "while",
            StmtInner::For { .. } => "for",
            StmtInner::FunctionDef(_) => "def",
            StmtInner::Return(_) => "return",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub pos: Pos,
    pub inner: ExprInner,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprInner {
    Literal(Literal),
    Name(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    // a and b and c arrives as one node carrying every operand; the
    // evaluator folds the list itself
    Bool {
        op: BoolOp,
        values: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        comparators: Vec<(CmpOp, Expr)>,
    },
    Attribute {
        object: Box<Expr>,
        attr: String,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Subscript {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    // Only ever produced inside subscript brackets
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
}

impl ExprInner {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExprInner::Literal(_) => "literal",
            ExprInner::Name(_) => "name",
            ExprInner::Unary { .. } => "unary expression",
            ExprInner::Binary { .. } => "binary expression",
            ExprInner::Bool { .. } => "boolean expression",
            ExprInner::Compare { .. } => "comparison",
            ExprInner::Attribute { .. } => "attribute",
            ExprInner::Call { .. } => "call",
            ExprInner::List(_) => "list display",
            ExprInner::Tuple(_) => "tuple display",
            ExprInner::Dict(_) => "dict display",
            ExprInner::Subscript { .. } => "subscript",
            ExprInner::Slice { .. } => "slice",
        }
    }
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
}

impl Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinOp::Add => f.write_str("+"),
            BinOp::Sub => f.write_str("-"),
            BinOp::Mul => f.write_str("*"),
            BinOp::Div => f.write_str("/"),
            BinOp::FloorDiv => f.write_str("//"),
            BinOp::Mod => f.write_str("%"),
            BinOp::Pow => f.write_str("**"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CmpOp::Eq => f.write_str("=="),
            CmpOp::NotEq => f.write_str("!="),
            CmpOp::Lt => f.write_str("<"),
            CmpOp::LtE => f.write_str("<="),
            CmpOp::Gt => f.write_str(">"),
            CmpOp::GtE => f.write_str(">="),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Neg => f.write_str("-"),
            UnaryOp::Pos => f.write_str("+"),
            UnaryOp::Not => f.write_str("not"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl Display for BoolOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoolOp::And => f.write_str("and"),
            BoolOp::Or => f.write_str("or"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Bool(bool),
    None,
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(OrderedFloat(dbl)) => write!(f, "{}", dbl),
            Literal::Str(s) => write!(f, "'{}'", s),
            Literal::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            Literal::None => f.write_str("None"),
        }
    }
}
