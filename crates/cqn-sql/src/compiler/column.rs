use super::{Formatter, Ident, Literal, OutputColumn, ToSql};
use crate::convert;

use cqn_core::{
    schema::Type,
    stmt::{Column, Expr, Select},
    Error, Result,
};

/// A column of the select list, with its output name resolved.
pub(super) struct Projected {
    pub(super) expr: Expr,

    /// Output name: the alias, or a name derived from the expression
    pub(super) name: String,

    /// True when row mode must emit `AS name`
    pub(super) aliased: bool,

    pub(super) cast: Option<Type>,

    /// The cast type, or the element type of a column reference
    pub(super) ty: Option<Type>,
}

impl Projected {
    pub(super) fn output_column(&self) -> OutputColumn {
        OutputColumn {
            name: self.name.clone(),
            ty: self.ty.clone(),
        }
    }
}

impl Formatter<'_> {
    /// Resolves the select list of the current scope. Returns `None` when
    /// the list is `*` over a source without known columns.
    pub(super) fn projection(&self, select: &Select, json: bool) -> Result<Option<Vec<Projected>>> {
        if select.columns.is_empty() {
            return self.expand_all(json);
        }

        select
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| self.project(i, column))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn project(&self, index: usize, column: &Column) -> Result<Projected> {
        let (name, mut aliased) = match (&column.alias, &column.expr) {
            (Some(alias), _) => (alias.clone(), true),
            (None, Expr::Ref(expr_ref)) => {
                let Some(last) = expr_ref.last() else {
                    return Err(Error::invalid_statement("empty column reference"));
                };

                let synthesized = !expr_ref.is_session_variable()
                    && self
                        .scope()
                        .is_some_and(|scope| scope.is_order_by_alias(last));

                (
                    last.to_string(),
                    synthesized || expr_ref.is_session_variable(),
                )
            }
            (None, Expr::Func(func)) => (func.name.clone(), true),
            (None, _) => (format!("column_{index}"), true),
        };

        let ty = match &column.cast {
            Some(cast) => Some(cast.clone()),
            None => match &column.expr {
                Expr::Ref(expr_ref) if !expr_ref.is_session_variable() => self
                    .resolve(&expr_ref.path)
                    .and_then(|element| element.primitive().cloned()),
                _ => None,
            },
        };

        // A converted or cast column loses its natural name
        aliased |= column.cast.is_some()
            || ty
                .as_ref()
                .is_some_and(|ty| convert::output_converter(ty.tag()).is_some());

        Ok(Projected {
            expr: column.expr.clone(),
            name,
            aliased,
            cast: column.cast.clone(),
            ty,
        })
    }

    /// Expands `*` into the stored columns of every entity source.
    fn expand_all(&self, json: bool) -> Result<Option<Vec<Projected>>> {
        let Some(scope) = self.scope() else {
            return Ok(None);
        };

        if scope.has_derived() {
            if json {
                return Err(Error::invalid_statement(
                    "cannot project `*` of a derived table as JSON; list the columns",
                ));
            }
            return Ok(None);
        }

        let qualify = !scope.is_single_source();
        let mut projected = vec![];

        for (source, entity) in scope.entities() {
            for element in entity.columns() {
                let expr = if qualify {
                    Expr::path([source, element.name.as_str()])
                } else {
                    Expr::path([element.name.as_str()])
                };

                let ty = element.primitive().cloned();
                let aliased = ty
                    .as_ref()
                    .is_some_and(|ty| convert::output_converter(ty.tag()).is_some());

                projected.push(Projected {
                    expr,
                    name: element.name.clone(),
                    aliased,
                    cast: None,
                    ty,
                });
            }
        }

        Ok(Some(projected))
    }

    /// Renders one projected column without its alias: the expression,
    /// cast when requested, wrapped by the output converter of its type.
    fn projected_expr(&mut self, column: &Projected) -> Result<String> {
        let inner = self.capture(|f| {
            match &column.cast {
                Some(cast) => {
                    fmt!(f, "CAST(" column.expr " AS " convert::storage_type(cast) ")");
                }
                None => fmt!(f, column.expr),
            }
            Ok(())
        })?;

        Ok(match &column.ty {
            Some(ty) => convert::convert_output(ty.tag(), &inner),
            None => inner,
        })
    }

    /// Row mode: `expr AS alias, …`.
    pub(super) fn row_columns(&mut self, columns: &[Projected]) -> Result<()> {
        let mut s = "";
        for column in columns {
            let expr = self.projected_expr(column)?;
            fmt!(self, s expr);
            if column.aliased {
                fmt!(self, " AS " Ident(&column.name));
            }
            s = ", ";
        }
        Ok(())
    }

    /// JSON mode: `json_object('alias', expr, …) AS _json_`.
    pub(super) fn json_columns(&mut self, columns: &[Projected]) -> Result<()> {
        fmt!(self, "json_object(");
        let mut s = "";
        for column in columns {
            let expr = self.projected_expr(column)?;
            fmt!(self, s Literal(&column.name) "," expr);
            s = ",";
        }
        fmt!(self, ") AS _json_");
        Ok(())
    }
}
