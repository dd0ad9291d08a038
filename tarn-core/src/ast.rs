//! Function-body AST consumed by the code generator.
//!
//! The surrounding language's parser produces these nodes; the
//! specialization core never constructs them itself outside of tests.

use crate::IdSource;
use crate::value::Value;

/// Source location span tracking (line, column) start and end positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Span {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a dummy/generated span (all zeros) for test code
    #[cfg(test)]
    pub fn dummy() -> Self {
        Span {
            start_line: 0,
            start_col: 0,
            end_line: 0,
            end_col: 0,
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}:{}..{}", self.start_line, self.start_col, self.end_col)
        } else {
            write!(
                f,
                "{}:{}..{}:{}",
                self.start_line, self.start_col, self.end_line, self.end_col
            )
        }
    }
}

/// Unique identifier for AST nodes (expressions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        NodeId(value)
    }
}

/// Counter handing out unique NodeIds across a whole parse.
pub type NodeCounter = IdSource<NodeId>;

/// Header shared by every AST node: its identity and source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub id: NodeId,
    pub span: Span,
}

/// Binary operator as written in source: +, -, *, /, ==, <, etc.
/// Resolved to a shape-specialized primitive during code generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryOp {
    pub op: String,
}

/// An expression in a function body.
#[derive(Debug, Clone)]
pub struct Expression {
    pub h: NodeHeader,
    pub kind: ExprKind,
}

impl Expression {
    pub fn new(id: NodeId, span: Span, kind: ExprKind) -> Self {
        Expression {
            h: NodeHeader { id, span },
            kind,
        }
    }
}

/// The kind of expression.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// The function's parameter.
    Param,

    /// A name bound in the captured environment or by an enclosing let.
    Name(String),

    /// Literal value injection.
    Literal(Value),

    /// Pair construction from two sub-expressions.
    PairOf(Box<Expression>, Box<Expression>),

    /// The first component of a pair-shaped value.
    Head(Box<Expression>),

    /// The second component of a pair-shaped value.
    Tail(Box<Expression>),

    /// Application: func(arg). The call-site trigger when func resolves
    /// to a defined function.
    Apply {
        func: Box<Expression>,
        arg: Box<Expression>,
    },

    /// Binary primitive: arithmetic, comparison, text joining.
    BinaryOp(BinaryOp, Box<Expression>, Box<Expression>),

    /// Conditional: if cond then t else e
    If {
        cond: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },

    /// Local binding: let name = value in body
    LetIn {
        name: String,
        value: Box<Expression>,
        body: Box<Expression>,
    },
}

// =============================================================================
// Test builders
// =============================================================================
