//! Abstract syntax tree for the expression language.

/// A top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `name = expr;`
    Assignment { name: String, expr: Expr },
    /// `name(arg, ...);`
    FunctionCall { name: String, args: Vec<Expr> },
    /// `if (expr) { ... }`
    If {
        condition: Expr,
        body: Vec<Statement>,
    },
    /// A bare expression terminated by `;`, used for transition guards.
    Condition(Expr),
    /// The literal `else;` fallback marker.
    ElseMarker,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    /// Decimal literal text, converted to a number at evaluation time.
    Number(String),
    Bool(bool),
    Variable(String),
    FunctionCall { name: String, args: Vec<Expr> },
    Unary {
        op: Option<UnaryOp>,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!` logical negation.
    Not,
    /// `~` bitwise complement.
    BitNot,
    /// `-` numeric negation.
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// Maps an operator token's text to its op, if it is a binary operator.
    pub fn from_text(text: &str) -> Option<Self> {
        let op = match text {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            _ => return None,
        };
        Some(op)
    }
}

impl Expr {
    /// Folds a left operand and a flat `(op, operand)` sequence into a
    /// left-associative binary tree: the leftmost operation ends up as the
    /// deepest-left node.
    pub fn fold_binary(left: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
        rest.into_iter().fold(left, |acc, (op, right)| Expr::Binary {
            op,
            left: Box::new(acc),
            right: Box::new(right),
        })
    }

    /// Collects the names of all variables this expression reads, in
    /// left-to-right order.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Str(_) | Expr::Number(_) | Expr::Bool(_) => {}
            Expr::Variable(name) => names.push(name),
            Expr::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_variables(names),
            Expr::Binary { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
        }
    }
}
