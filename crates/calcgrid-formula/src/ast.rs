//! Expression syntax tree

use crate::refs::RefForm;

/// Expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Bool(bool),
    /// `null`
    Null,
    /// List literal `[a, b]`
    List(Vec<Expr>),
    /// Object literal `{key: value}`
    Object(Vec<(String, Expr)>),

    // === Names and references ===
    /// Bare identifier
    Name(String),
    /// Reference call such as `id(1, 2)`
    Reference(ReferenceExpr),

    // === Operators ===
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `condition ? then : otherwise`
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    // === Access ===
    /// `target[index]`
    Index { target: Box<Expr>, index: Box<Expr> },
    /// `target.name`
    Member { target: Box<Expr>, name: String },

    // === Function call ===
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Height of the tree: 1 for a leaf
    ///
    /// Evaluation recurses this deep.
    pub fn depth(&self) -> usize {
        let children = match self {
            Expr::Number(_) | Expr::String(_) | Expr::Bool(_) | Expr::Null | Expr::Name(_) => 0,
            Expr::List(items) | Expr::Call { args: items, .. } => max_depth(items.iter()),
            Expr::Object(fields) => max_depth(fields.iter().map(|(_, value)| value)),
            Expr::Reference(reference) => max_depth(
                [&reference.row, &reference.col]
                    .into_iter()
                    .chain(reference.sheet.as_ref())
                    .map(|expr| expr.as_ref()),
            ),
            Expr::UnaryOp { operand, .. } => operand.depth(),
            Expr::BinaryOp { left, right, .. } => left.depth().max(right.depth()),
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => condition.depth().max(then.depth()).max(otherwise.depth()),
            Expr::Index { target, index } => target.depth().max(index.depth()),
            Expr::Member { target, .. } => target.depth(),
        };
        children + 1
    }
}

fn max_depth<'a>(exprs: impl Iterator<Item = &'a Expr>) -> usize {
    exprs.map(Expr::depth).max().unwrap_or(0)
}

/// Reference call with unevaluated coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceExpr {
    pub form: RefForm,
    pub row: Box<Expr>,
    pub col: Box<Expr>,
    pub sheet: Option<Box<Expr>>,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Logical (short-circuit)
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
}
