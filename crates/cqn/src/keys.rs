use cqn_core::{
    schema::Entity,
    stmt::{BinaryOp, Expr, Record, Value, XprToken},
};

/// Merges the key values an UPDATE filter pins down into `data`.
///
/// Only `key = value` comparisons reachable through `AND` count; keys already
/// present in `data` are kept.
pub fn enrich_from_where(entity: &Entity, filter: Option<&Expr>, data: &mut Record) {
    let Some(filter) = filter else {
        return;
    };

    let mut found = vec![];
    collect(entity, filter, &mut found);

    for (name, value) in found {
        if !data.contains_key(&name) {
            data.insert(name, value);
        }
    }
}

fn collect(entity: &Entity, expr: &Expr, found: &mut Vec<(String, Value)>) {
    match expr {
        Expr::And(operands) => {
            for operand in operands {
                collect(entity, operand, found);
            }
        }
        Expr::BinaryOp(binary_op) if binary_op.op == BinaryOp::Eq => {
            if let Some(pair) = key_value(entity, &binary_op.lhs, &binary_op.rhs) {
                found.push(pair);
            }
        }
        Expr::Xpr(tokens) => {
            // Any `or` makes the individual comparisons optional
            if tokens
                .iter()
                .any(|token| matches!(token, XprToken::Keyword(kw) if kw.eq_ignore_ascii_case("or")))
            {
                return;
            }

            for window in tokens.windows(3) {
                let [XprToken::Expr(lhs), XprToken::Keyword(op), XprToken::Expr(rhs)] = window
                else {
                    continue;
                };

                if op == "=" || op == "==" {
                    if let Some(pair) = key_value(entity, lhs, rhs) {
                        found.push(pair);
                    }
                }
            }
        }
        _ => {}
    }
}

/// `(key, value)` when one side references a key of `entity` and the other
/// is a non-null literal.
fn key_value(entity: &Entity, lhs: &Expr, rhs: &Expr) -> Option<(String, Value)> {
    let (path, value) = match (lhs, rhs) {
        (Expr::Ref(expr_ref), Expr::Val(value)) | (Expr::Val(value), Expr::Ref(expr_ref)) => {
            (&expr_ref.path, value)
        }
        _ => return None,
    };

    let name = match &path[..] {
        [name] => name,
        [qualifier, name] if *qualifier == entity.name => name,
        _ => return None,
    };

    let element = entity.element(name)?;
    if !element.key || element.primitive().is_none() || value.is_null() {
        return None;
    }

    Some((name.clone(), value.clone()))
}
