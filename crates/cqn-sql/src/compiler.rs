#[macro_use]
mod fmt;
use fmt::ToSql;

mod column;

mod ddl;

mod delim;
use delim::{Comma, Delimited, Period};

mod expr;

mod ident;
use ident::{Ident, Literal};

mod params;
pub use params::{Param, Placeholder};

mod scope;
use scope::Scope;

// Statement serializers
mod statement;
mod value;

use cqn_core::{
    schema::{Model, Type},
    stmt::Statement,
    Result,
};

/// Compiles CQN statements into SQLite SQL text and bound parameters.
#[derive(Debug)]
pub struct Compiler<'a> {
    /// Model against which statements are compiled
    model: &'a Model,
}

/// The output of [`Compiler::compile`].
#[derive(Debug)]
pub struct CompiledStatement {
    pub sql: String,

    /// Parameters in placeholder order
    pub params: Vec<Param>,

    /// Logical output columns of a SELECT. In JSON mode these are the
    /// fields of each `_json_` object.
    pub columns: Vec<OutputColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub name: String,

    /// Declared type, when the column maps to a typed element or a cast
    pub ty: Option<Type>,
}

struct Formatter<'a> {
    /// Handle to the compiler
    compiler: &'a Compiler<'a>,

    /// Where to write the SQL
    dst: String,

    /// Where to store parameters
    params: Vec<Param>,

    /// Name resolution scopes, innermost last
    scopes: Vec<Scope<'a>>,
}

impl<'a> Compiler<'a> {
    pub fn sqlite(model: &'a Model) -> Compiler<'a> {
        Compiler { model }
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn compile(&self, stmt: &Statement) -> Result<CompiledStatement> {
        let mut f = Formatter {
            compiler: self,
            dst: String::new(),
            params: vec![],
            scopes: vec![],
        };

        let columns = match stmt {
            Statement::Select(select) => f.select(select, select.json)?,
            _ => {
                stmt.to_sql(&mut f)?;
                vec![]
            }
        };

        tracing::debug!(sql = %f.dst, params = f.params.len(), "compiled statement");

        Ok(CompiledStatement {
            sql: f.dst,
            params: f.params,
            columns,
        })
    }
}

impl Formatter<'_> {
    /// Renders into a scratch buffer and returns the text. Parameters are
    /// still appended in order, so the captured text must be emitted at
    /// the position it was rendered for.
    fn capture(&mut self, render: impl FnOnce(&mut Self) -> Result<()>) -> Result<String> {
        let saved = std::mem::take(&mut self.dst);
        let res = render(self);
        let captured = std::mem::replace(&mut self.dst, saved);
        res.map(|_| captured)
    }
}
