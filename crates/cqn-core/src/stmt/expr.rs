use super::{Select, Value};

/// A CQN expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference by path, e.g. `["Books", "title"]` or `["$user", "id"]`
    Ref(ExprRef),

    /// Literal value, bound as a parameter
    Val(Value),

    /// Function call
    Func(ExprFunc),

    /// Raw token sequence, as in CQN `xpr` arrays
    Xpr(Vec<XprToken>),

    /// Binary comparison or arithmetic
    BinaryOp(ExprBinaryOp),

    /// AND of all operands
    And(Vec<Expr>),

    /// OR of all operands
    Or(Vec<Expr>),

    Not(Box<Expr>),

    InList(ExprInList),

    /// LIKE pattern match; a regex value renders as `regexp`
    Like(ExprLike),

    /// Scalar subquery or `IN` subquery operand
    Stmt(Box<Select>),

    /// Parenthesized list of expressions
    List(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprRef {
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprFunc {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XprToken {
    /// Operator or keyword such as `=`, `and`, `not`, `like`
    Keyword(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprBinaryOp {
    pub lhs: Box<Expr>,
    pub op: BinaryOp,
    pub rhs: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Concat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprInList {
    pub expr: Box<Expr>,
    pub list: Vec<Expr>,
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprLike {
    pub expr: Box<Expr>,
    pub pattern: Box<Expr>,
    pub negate: bool,
}

impl Expr {
    /// Reference by dotted path: `Expr::ref_("author.name")`.
    pub fn ref_(path: &str) -> Expr {
        Expr::Ref(ExprRef {
            path: path.split('.').map(str::to_string).collect(),
        })
    }

    pub fn path<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Expr {
        Expr::Ref(ExprRef {
            path: segments.into_iter().map(Into::into).collect(),
        })
    }

    pub fn val(value: impl Into<Value>) -> Expr {
        Expr::Val(value.into())
    }

    pub fn null() -> Expr {
        Expr::Val(Value::Null)
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Func(ExprFunc {
            name: name.into(),
            args,
        })
    }

    pub fn xpr(tokens: Vec<XprToken>) -> Expr {
        Expr::Xpr(tokens)
    }

    pub fn binary_op(lhs: impl Into<Expr>, op: BinaryOp, rhs: impl Into<Expr>) -> Expr {
        Expr::BinaryOp(ExprBinaryOp {
            lhs: Box::new(lhs.into()),
            op,
            rhs: Box::new(rhs.into()),
        })
    }

    pub fn eq(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Expr {
        Expr::binary_op(lhs, BinaryOp::Eq, rhs)
    }

    pub fn ne(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Expr {
        Expr::binary_op(lhs, BinaryOp::Ne, rhs)
    }

    pub fn lt(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Expr {
        Expr::binary_op(lhs, BinaryOp::Lt, rhs)
    }

    pub fn gt(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Expr {
        Expr::binary_op(lhs, BinaryOp::Gt, rhs)
    }

    pub fn and(operands: Vec<Expr>) -> Expr {
        Expr::And(operands)
    }

    pub fn or(operands: Vec<Expr>) -> Expr {
        Expr::Or(operands)
    }

    pub fn not(expr: impl Into<Expr>) -> Expr {
        Expr::Not(Box::new(expr.into()))
    }

    pub fn in_list(expr: impl Into<Expr>, list: Vec<Expr>) -> Expr {
        Expr::InList(ExprInList {
            expr: Box::new(expr.into()),
            list,
            negate: false,
        })
    }

    pub fn like(expr: impl Into<Expr>, pattern: impl Into<Expr>) -> Expr {
        Expr::Like(ExprLike {
            expr: Box::new(expr.into()),
            pattern: Box::new(pattern.into()),
            negate: false,
        })
    }

    pub fn stmt(select: Select) -> Expr {
        Expr::Stmt(Box::new(select))
    }

    /// Conjoins `expr` with an optional existing filter.
    pub fn and_opt(lhs: Option<Expr>, rhs: Expr) -> Expr {
        match lhs {
            None => rhs,
            Some(Expr::And(mut operands)) => {
                operands.push(rhs);
                Expr::And(operands)
            }
            Some(lhs) => Expr::And(vec![lhs, rhs]),
        }
    }

    pub fn is_value_null(&self) -> bool {
        matches!(self, Expr::Val(Value::Null))
    }

    pub fn as_ref_path(&self) -> Option<&[String]> {
        match self {
            Expr::Ref(expr_ref) => Some(&expr_ref.path),
            _ => None,
        }
    }
}

impl ExprRef {
    /// The last path segment, used as the default output name.
    pub fn last(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    /// True for session variable references such as `$user.id`.
    pub fn is_session_variable(&self) -> bool {
        self.path.first().is_some_and(|first| first.starts_with('$'))
    }
}

impl XprToken {
    pub fn kw(keyword: &str) -> XprToken {
        XprToken::Keyword(keyword.to_string())
    }
}

impl From<Expr> for XprToken {
    fn from(value: Expr) -> Self {
        XprToken::Expr(value)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Val(value)
    }
}

impl From<Select> for Expr {
    fn from(value: Select) -> Self {
        Expr::stmt(value)
    }
}
