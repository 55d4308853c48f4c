//! Trigger script abstract syntax tree
//!
//! Trees are built once by the parser and only read afterwards; every
//! activation of a trigger walks the same `Arc<Script>`.

/// Position of a node in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Complete parsed script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    /// Top level statements, in source order
    pub statements: Vec<Statement>,
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

/// Statement types
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// Assignment: x = expr; global.x = expr; global[key] = expr;
    Assignment {
        target: AssignTarget,
        value: Expression,
    },
    /// If statement, `else if` chains nest in `else_branch`
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    },
    /// while cond { ... }
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    /// for i = start : end { ... }, end exclusive
    For {
        variable: String,
        start: Expression,
        end: Expression,
        body: Vec<Statement>,
    },
    /// { ... }
    Block(Vec<Statement>),
    /// #NAME(args...)
    Command {
        name: String,
        args: Vec<Expression>,
    },
    Break,
    Continue,
    Return,
    /// Expression statement (for side effects)
    Expression(Expression),
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    /// Activation-local variable
    Local(String),
    /// Global variable with a fixed key
    Global(String),
    /// Global variable with a computed key
    GlobalIndex(Expression),
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

/// Expression types
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// Literal values
    Literal(Literal),
    /// Variable reference, local first then global
    Variable(String),
    /// global.x
    Global(String),
    /// global[expr]
    GlobalIndex(Box<Expression>),
    /// Binary operation: a + b, a == b, etc.
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    /// Unary operation: !a, -a
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
    },
    /// Ternary: cond ? a : b
    Ternary {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
    },
    /// %name% or %name:arg:arg%
    Placeholder {
        name: String,
        args: Vec<Expression>,
    },
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical not: !x
    Not,
    /// Numeric negation: -x
    Neg,
    /// Bitwise not: ~x
    BitNot,
}

/// Borrowed view of any node, handed to the interrupter before it runs
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Statement(&'a Statement),
    Expression(&'a Expression),
}

impl Node<'_> {
    pub fn span(&self) -> Span {
        match self {
            Node::Statement(stmt) => stmt.span,
            Node::Expression(expr) => expr.span,
        }
    }
}
