use super::{value::Input, Comma, Delimited, Formatter, Ident, Literal, Period, ToSql};

use cqn_core::{
    schema::TypeTag,
    stmt::{self, BinaryOp, Expr, Value, XprToken},
    Error, Result,
};

/// Keywords accepted inside raw `xpr` token lists.
const XPR_KEYWORDS: &[&str] = &[
    "=", "==", "!=", "<>", "<", ">", "<=", ">=", "+", "-", "*", "/", "%", "||", "and", "or",
    "not", "like", "glob", "escape", "is", "null", "in", "between", "exists", "case", "when",
    "then", "else", "end", "asc", "desc", "distinct", "(", ")",
];

const COMPARISON_KEYWORDS: &[&str] = &["=", "==", "!=", "<>", "<", ">", "<=", ">=", "like"];

/// An expression whose literal values are bound against a known element type.
struct Hinted<'a>(&'a Expr, Option<TypeTag>);

/// An operand that is parenthesized when it is a compound expression.
struct Operand<'a>(&'a Expr);

/// An operand of AND / OR. Comparisons bind tighter than both, so only raw
/// token lists need parentheses.
struct Conjunct<'a>(&'a Expr);

impl ToSql for &Expr {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        Hinted(self, None).to_sql(f)
    }
}

impl ToSql for Operand<'_> {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let compound = match self.0 {
            Expr::And(operands) => operands.len() > 1,
            Expr::Xpr(tokens) => tokens.len() > 1,
            Expr::BinaryOp(_) | Expr::Not(_) | Expr::Like(_) | Expr::InList(_) => true,
            _ => false,
        };

        if compound {
            fmt!(f, "(" self.0 ")");
        } else {
            fmt!(f, self.0);
        }
        Ok(())
    }
}

impl ToSql for Conjunct<'_> {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        match self.0 {
            Expr::Xpr(tokens) if tokens.len() > 1 => fmt!(f, "(" self.0 ")"),
            expr => fmt!(f, expr),
        }
        Ok(())
    }
}

impl ToSql for Hinted<'_> {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let Hinted(expr, hint) = self;

        match expr {
            Expr::Ref(expr_ref) => expr_ref.to_sql(f)?,
            Expr::Val(value) => Input(value, hint).to_sql(f)?,
            Expr::Func(func) => func.to_sql(f)?,
            Expr::Xpr(tokens) => f.xpr(tokens)?,
            Expr::BinaryOp(expr) => expr.to_sql(f)?,
            Expr::And(operands) => {
                if operands.is_empty() {
                    fmt!(f, "1 = 1");
                } else {
                    fmt!(f, Delimited(operands.iter().map(Conjunct), " AND "));
                }
            }
            Expr::Or(operands) => {
                if operands.is_empty() {
                    fmt!(f, "1 = 0");
                } else {
                    fmt!(f, "(" Delimited(operands.iter().map(Conjunct), " OR ") ")");
                }
            }
            Expr::Not(expr) => fmt!(f, "NOT " Operand(expr)),
            Expr::InList(expr) => expr.to_sql(f)?,
            Expr::Like(expr) => expr.to_sql(f)?,
            Expr::Stmt(select) => {
                fmt!(f, "(");
                f.select(select, false)?;
                fmt!(f, ")");
            }
            Expr::List(items) => {
                if items.is_empty() {
                    return Err(Error::invalid_statement("empty expression list"));
                }
                let items = items.iter().map(|item| Hinted(item, hint));
                fmt!(f, "(" Comma(items) ")");
            }
        }

        Ok(())
    }
}

impl ToSql for &stmt::ExprRef {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::invalid_statement("empty column reference"));
        }

        // `$user.id`, `$now` and friends are read from the session context
        if self.is_session_variable() {
            let key = self.path.join(".");
            fmt!(f, "session_context(" Literal(&key) ")");
        } else {
            fmt!(f, Period(self.path.iter().map(Ident)));
        }
        Ok(())
    }
}

impl ToSql for &stmt::ExprBinaryOp {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let (lhs, rhs) = (&*self.lhs, &*self.rhs);

        // Comparisons with null become `is` / `is not`
        match self.op {
            BinaryOp::Eq | BinaryOp::Ne if rhs.is_value_null() || lhs.is_value_null() => {
                let operand = if rhs.is_value_null() { lhs } else { rhs };
                let is = if self.op == BinaryOp::Eq {
                    " is NULL"
                } else {
                    " is not NULL"
                };
                fmt!(f, Operand(operand) is);
                return Ok(());
            }
            _ => {}
        }

        let lhs_ty = f.type_of(lhs);
        let rhs_ty = f.type_of(rhs);

        fmt!(f, HintedOperand(lhs, rhs_ty) " " self.op " " HintedOperand(rhs, lhs_ty));
        Ok(())
    }
}

/// [`Operand`] with a type hint for literal values.
struct HintedOperand<'a>(&'a Expr, Option<TypeTag>);

impl ToSql for HintedOperand<'_> {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        match self.0 {
            Expr::Val(_) | Expr::List(_) => Hinted(self.0, self.1).to_sql(f),
            expr => Numeric(expr).to_sql(f),
        }
    }
}

/// An operand compared or sorted by value.
///
/// Decimal columns are stored as text, so a reference to one is cast back
/// to a number. Anything else renders as an [`Operand`].
pub(super) struct Numeric<'a>(pub(super) &'a Expr);

impl ToSql for Numeric<'_> {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        if f.type_of(self.0) == Some(TypeTag::Decimal) {
            fmt!(f, "CAST(" self.0 " AS NUMERIC)");
        } else {
            fmt!(f, Operand(self.0));
        }
        Ok(())
    }
}

impl ToSql for BinaryOp {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        f.dst.push_str(match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Concat => "||",
        });
        Ok(())
    }
}

impl ToSql for &stmt::ExprInList {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let not = if self.negate { " NOT IN " } else { " IN " };

        match self.list.as_slice() {
            [] => return Err(Error::invalid_statement("empty IN list")),
            // `x IN (SELECT …)` rather than a parenthesized scalar subquery
            [Expr::Stmt(select)] => {
                fmt!(f, Operand(&self.expr) not "(");
                f.select(select, false)?;
                fmt!(f, ")");
            }
            list => {
                let ty = f.type_of(&self.expr);
                let items = list.iter().map(|item| Hinted(item, ty));
                fmt!(f, Operand(&self.expr) not "(" Comma(items) ")");
            }
        }
        Ok(())
    }
}

impl ToSql for &stmt::ExprLike {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        match &*self.pattern {
            Expr::Val(Value::Regex(pattern)) => {
                let not = if self.negate { "NOT " } else { "" };
                let placeholder = f.push_param(Value::String(pattern.clone()), None);
                fmt!(f, not "regexp(" placeholder ", " self.expr ")");
            }
            pattern => {
                let not = if self.negate { " NOT LIKE " } else { " LIKE " };
                fmt!(f, Operand(&self.expr) not Operand(pattern));
            }
        }
        Ok(())
    }
}

impl ToSql for &stmt::ExprFunc {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let args = self.args.as_slice();

        match (self.name.to_ascii_lowercase().as_str(), args) {
            ("", _) => return Err(Error::invalid_statement("function without a name")),
            ("tolower", _) => fmt!(f, "lower(" Comma(args) ")"),
            ("toupper", _) => fmt!(f, "upper(" Comma(args) ")"),
            ("contains", [haystack, needle]) => {
                fmt!(f, "ifnull(instr(" haystack ", " needle "),0)");
            }
            ("startswith", [haystack, needle]) => {
                fmt!(f, "coalesce(instr(" haystack ", " needle ")=1,false)");
            }
            ("endswith", [haystack, needle]) => {
                fmt!(
                    f,
                    "coalesce(substr(" haystack ", length(" haystack ")+1-length(" needle "))="
                    needle ",false)"
                );
            }
            ("contains" | "startswith" | "endswith", _) => {
                return Err(Error::invalid_statement(format!(
                    "function `{}` expects 2 arguments, got {}",
                    self.name,
                    args.len()
                )));
            }
            ("now", []) => fmt!(f, "session_context('$now')"),
            ("count", []) => fmt!(f, "count(*)"),
            _ => {
                let plain = self
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');

                if !plain {
                    return Err(Error::invalid_statement(format!(
                        "invalid function name `{}`",
                        self.name
                    )));
                }

                fmt!(f, self.name "(" Comma(args) ")");
            }
        }
        Ok(())
    }
}

impl Formatter<'_> {
    /// Renders a raw token list. Comparisons against null become `is` /
    /// `is not`, `like` against a regex becomes `regexp(…)`, and literals
    /// compared with a typed column use its input converter.
    fn xpr(&mut self, tokens: &[XprToken]) -> Result<()> {
        for token in tokens {
            if let XprToken::Keyword(keyword) = token {
                check_keyword(keyword)?;
            }
        }

        let mut s = "";
        let mut i = 0;

        while i < tokens.len() {
            fmt!(self, s);
            s = " ";

            match &tokens[i] {
                XprToken::Keyword(keyword) => {
                    let next_is_null = matches!(tokens.get(i + 1), Some(XprToken::Expr(e)) if e.is_value_null());
                    let prev_is_null = i > 0
                        && matches!(&tokens[i - 1], XprToken::Expr(e) if e.is_value_null());

                    let keyword = match keyword.as_str() {
                        "=" | "==" if next_is_null || prev_is_null => "is",
                        "!=" | "<>" if next_is_null || prev_is_null => "is not",
                        "==" => "=",
                        other => other,
                    };
                    fmt!(self, keyword);
                }
                XprToken::Expr(expr) => {
                    if let Some((pattern, negate, len)) = regex_like(&tokens[i + 1..]) {
                        let like = stmt::ExprLike {
                            expr: Box::new(expr.clone()),
                            pattern: Box::new(pattern.clone()),
                            negate,
                        };
                        fmt!(self, &like);
                        i += 1 + len;
                        continue;
                    }

                    let hint = match expr {
                        Expr::Val(_) => self.xpr_hint(tokens, i),
                        _ => None,
                    };

                    match expr {
                        Expr::Xpr(_) => fmt!(self, "(" expr ")"),
                        _ => fmt!(self, Hinted(expr, hint)),
                    }
                }
            }

            i += 1;
        }

        Ok(())
    }

    /// The element type of the column a literal at `i` is compared with.
    fn xpr_hint(&self, tokens: &[XprToken], i: usize) -> Option<TypeTag> {
        let is_comparison = |token: Option<&XprToken>| {
            matches!(
                token,
                Some(XprToken::Keyword(keyword))
                    if COMPARISON_KEYWORDS.iter().any(|c| c.eq_ignore_ascii_case(keyword))
            )
        };
        let expr_at = |index: usize| match tokens.get(index) {
            Some(XprToken::Expr(expr)) => Some(expr),
            _ => None,
        };

        if i >= 2 && is_comparison(tokens.get(i - 1)) {
            if let Some(ty) = expr_at(i - 2).and_then(|expr| self.type_of(expr)) {
                return Some(ty);
            }
        }

        if is_comparison(tokens.get(i + 1)) {
            return expr_at(i + 2).and_then(|expr| self.type_of(expr));
        }

        None
    }
}

/// Matches `like /re/`, `not like /re/` or `not` `like` `/re/` at the start
/// of `tokens`, returning the pattern, whether it is negated and the number
/// of tokens consumed.
fn regex_like(tokens: &[XprToken]) -> Option<(&Expr, bool, usize)> {
    let mut words = Vec::new();
    let mut len = 0;

    for token in tokens {
        len += 1;
        match token {
            XprToken::Keyword(keyword) => {
                words.extend(keyword.split_whitespace().map(str::to_ascii_lowercase));
                if words.len() > 2 {
                    return None;
                }
            }
            XprToken::Expr(pattern @ Expr::Val(Value::Regex(_))) => {
                return match words.as_slice() {
                    [like] if like == "like" => Some((pattern, false, len)),
                    [not, like] if not == "not" && like == "like" => Some((pattern, true, len)),
                    _ => None,
                };
            }
            XprToken::Expr(_) => return None,
        }
    }

    None
}

fn check_keyword(keyword: &str) -> Result<()> {
    let known = !keyword.trim().is_empty()
        && keyword.split_whitespace().all(|word| {
            XPR_KEYWORDS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(word))
        });

    if known {
        Ok(())
    } else {
        Err(Error::invalid_statement(format!(
            "unknown keyword `{keyword}` in expression"
        )))
    }
}
