use super::{expr::Numeric, value::Input, Comma, Formatter, Ident, OutputColumn, ToSql};

use cqn_core::{
    schema::{Element, Entity},
    stmt::{self, Direction, Expr, JoinKind, Select, Source, Statement, Value},
    Error, Result,
};

impl ToSql for &Statement {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        match self {
            Statement::Select(select) => {
                f.select(select, select.json)?;
            }
            Statement::Insert(stmt) => stmt.to_sql(f)?,
            Statement::Update(stmt) => stmt.to_sql(f)?,
            Statement::Delete(stmt) => stmt.to_sql(f)?,
            Statement::CreateTable(stmt) => stmt.to_sql(f)?,
            Statement::DropTable(stmt) => stmt.to_sql(f)?,
        }
        Ok(())
    }
}

impl Formatter<'_> {
    /// Renders a SELECT and returns its logical output columns.
    pub(super) fn select(&mut self, select: &Select, json: bool) -> Result<Vec<OutputColumn>> {
        self.push_scope(&select.from, &select.order_by)?;

        let projection = self.projection(select, json)?;

        fmt!(self, "SELECT ");

        if select.distinct {
            fmt!(self, "DISTINCT ");
        }

        let columns = match &projection {
            Some(columns) if json => {
                self.json_columns(columns)?;
                columns.iter().map(|column| column.output_column()).collect()
            }
            Some(columns) => {
                self.row_columns(columns)?;
                columns.iter().map(|column| column.output_column()).collect()
            }
            None => {
                fmt!(self, "*");
                vec![]
            }
        };

        fmt!(self, " FROM ");

        // An inline filter on the root entity joins the WHERE clause
        let filter = match &select.from {
            Source::Entity(source) => {
                fmt!(self, source);
                match (&source.filter, &select.filter) {
                    (Some(inline), Some(filter)) => {
                        Some(Expr::and(vec![inline.clone(), filter.clone()]))
                    }
                    (inline, filter) => inline.clone().or_else(|| filter.clone()),
                }
            }
            from => {
                fmt!(self, from);
                select.filter.clone()
            }
        };

        if let Some(filter) = filter.as_ref().filter(|filter| !is_empty_filter(filter)) {
            fmt!(self, " WHERE " filter);
        }

        if !select.group_by.is_empty() {
            fmt!(self, " GROUP BY " Comma(&select.group_by));
        }

        if let Some(having) = &select.having {
            fmt!(self, " HAVING " having);
        }

        if !select.order_by.is_empty() {
            fmt!(self, " ORDER BY " Comma(&select.order_by));
        }

        match (select.one, &select.limit) {
            (true, limit) => {
                fmt!(self, " LIMIT 1");
                if let Some(offset) = limit.and_then(|limit| limit.offset) {
                    fmt!(self, " OFFSET " offset);
                }
            }
            (false, Some(limit)) => {
                fmt!(self, " LIMIT " limit.rows);
                if let Some(offset) = limit.offset {
                    fmt!(self, " OFFSET " offset);
                }
            }
            (false, None) => {}
        }

        self.pop_scope();

        Ok(columns)
    }
}

fn is_empty_filter(filter: &Expr) -> bool {
    matches!(filter, Expr::And(operands) if operands.is_empty())
}

impl ToSql for &stmt::SourceEntity {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        fmt!(f, Ident(&self.name));
        if let Some(alias) = &self.alias {
            fmt!(f, " AS " Ident(alias));
        }
        Ok(())
    }
}

impl ToSql for &Source {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        match self {
            // Filtered entities below the root become derived tables
            Source::Entity(source) if source.filter.is_some() => {
                let alias = source.alias.as_ref().unwrap_or(&source.name);
                let query = Select::from(source.name.clone());
                let query = match &source.filter {
                    Some(filter) => query.filter(filter.clone()),
                    None => query,
                };

                fmt!(f, "(");
                f.select(&query, false)?;
                fmt!(f, ") AS " Ident(alias));
            }
            Source::Entity(source) => fmt!(f, source),
            Source::Select { query, alias } => {
                fmt!(f, "(");
                f.select(query, false)?;
                fmt!(f, ") AS " Ident(alias));
            }
            Source::Join(join) => {
                let kind = match join.kind {
                    JoinKind::Inner => " JOIN ",
                    JoinKind::Left => " LEFT JOIN ",
                };
                fmt!(f, join.left kind join.right " ON " join.on);
            }
        }
        Ok(())
    }
}

impl ToSql for &stmt::OrderBy {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        fmt!(f, Numeric(&self.expr));

        match self.direction {
            Some(Direction::Asc) => fmt!(f, " ASC"),
            Some(Direction::Desc) => fmt!(f, " DESC"),
            None => {}
        }
        Ok(())
    }
}

impl ToSql for &stmt::Insert {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let entity = f.compiler.model.entity(&self.into)?;

        if let Some(source) = &self.source {
            fmt!(f, "INSERT INTO " Ident(&entity.name));
            if !self.columns.is_empty() {
                let columns = stored_columns(entity, &self.columns)?;
                fmt!(f, " (" Comma(columns.iter().map(|column| Ident(&column.name))) ")");
            }
            fmt!(f, " ");
            f.select(source, false)?;
            return Ok(());
        }

        if self.is_bulk() {
            let columns = stored_columns(entity, &self.columns)?;

            for (i, row) in self.rows.iter().enumerate() {
                if row.len() != columns.len() {
                    return Err(Error::invalid_statement(format!(
                        "row {i} of INSERT INTO `{}` has {} values for {} columns",
                        entity.name,
                        row.len(),
                        columns.len()
                    )));
                }
            }

            fmt!(f, "INSERT INTO " Ident(&entity.name)
                " (" Comma(columns.iter().map(|column| Ident(&column.name))) ") VALUES ");

            let mut s = "";
            for row in &self.rows {
                let values = row
                    .iter()
                    .zip(&columns)
                    .map(|(value, column)| Input(value, Some(column.tag())));
                fmt!(f, s "(" Comma(values) ")");
                s = ", ";
            }
            return Ok(());
        }

        if self.entries.is_empty() {
            return Err(Error::invalid_statement(format!(
                "INSERT INTO `{}` without data",
                entity.name
            )));
        }

        // Union of the stored elements present in any entry, plus elements
        // with a default, in declaration order
        for entry in &self.entries {
            for (name, _) in entry.iter() {
                entity.expect_element(name)?;
            }
        }

        let columns: Vec<&Element> = entity
            .columns()
            .filter(|column| {
                column.default.is_some()
                    || self
                        .entries
                        .iter()
                        .any(|entry| entry.contains_key(&column.name))
            })
            .collect();

        if columns.is_empty() {
            fmt!(f, "INSERT INTO " Ident(&entity.name) " DEFAULT VALUES");
            return Ok(());
        }

        fmt!(f, "INSERT INTO " Ident(&entity.name)
            " (" Comma(columns.iter().map(|column| Ident(&column.name))) ") VALUES ");

        let null = Value::Null;
        let mut s = "";
        for entry in &self.entries {
            let values = columns.iter().map(|column| {
                let value = entry
                    .get(&column.name)
                    .or(column.default.as_ref())
                    .unwrap_or(&null);
                Input(value, Some(column.tag()))
            });
            fmt!(f, s "(" Comma(values) ")");
            s = ", ";
        }

        Ok(())
    }
}

impl ToSql for &stmt::Update {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let entity = f.compiler.model.entity(&self.entity)?;

        let mut assignments = vec![];

        for (name, value) in self.data.iter() {
            let element = entity.expect_element(name)?;

            // Keys identify the row; associations are written separately
            if element.key || element.primitive().is_none() {
                continue;
            }

            assignments.push((element, Assignment::Value(value)));
        }

        for (name, expr) in &self.with {
            let element = entity.expect_element(name)?;

            if element.primitive().is_none() {
                return Err(Error::invalid_statement(format!(
                    "cannot assign an expression to association `{}.{name}`",
                    entity.name
                )));
            }

            assignments.push((element, Assignment::Expr(expr)));
        }

        if assignments.is_empty() {
            return Err(Error::invalid_statement(format!(
                "UPDATE `{}` without assignments",
                entity.name
            )));
        }

        f.push_entity_scope(entity);

        fmt!(f, "UPDATE " Ident(&entity.name) " SET ");

        let mut s = "";
        for (element, assignment) in &assignments {
            fmt!(f, s Ident(&element.name) " = ");
            match assignment {
                Assignment::Value(value) => fmt!(f, Input(value, Some(element.tag()))),
                Assignment::Expr(expr) => fmt!(f, *expr),
            }
            s = ", ";
        }

        if let Some(filter) = self.filter.as_ref().filter(|filter| !is_empty_filter(filter)) {
            fmt!(f, " WHERE " filter);
        }

        f.pop_scope();
        Ok(())
    }
}

enum Assignment<'a> {
    Value(&'a Value),
    Expr(&'a Expr),
}

impl ToSql for &stmt::Delete {
    fn to_sql(self, f: &mut Formatter<'_>) -> Result<()> {
        let entity = f.compiler.model.entity(&self.from)?;

        f.push_entity_scope(entity);

        fmt!(f, "DELETE FROM " Ident(&entity.name));

        if let Some(filter) = self.filter.as_ref().filter(|filter| !is_empty_filter(filter)) {
            fmt!(f, " WHERE " filter);
        }

        f.pop_scope();
        Ok(())
    }
}

/// Resolves explicit column names to stored elements.
fn stored_columns<'a>(entity: &'a Entity, names: &[String]) -> Result<Vec<&'a Element>> {
    names
        .iter()
        .map(|name| {
            let element = entity.expect_element(name)?;
            if element.primitive().is_none() {
                return Err(Error::invalid_statement(format!(
                    "`{}.{name}` is not a stored column",
                    entity.name
                )));
            }
            Ok(element)
        })
        .collect()
}
