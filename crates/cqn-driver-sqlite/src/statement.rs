use crate::{
    connection,
    stream::{BlobReader, JsonRows, StreamOutput},
    Connection, Value,
};

use cqn_core::{
    stmt::{self, Record},
    Error, Result,
};
use cqn_sql::Param;
use rusqlite::{params_from_iter, Connection as RusqliteConnection};
use std::sync::Mutex;
use tokio::{sync::mpsc, task};

/// A result row, keyed by column name.
pub type Row = Record;

/// Outcome of a mutating statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// Number of rows inserted, updated or deleted
    pub changes: u64,
    pub last_insert_rowid: i64,
}

/// Name of the single column a JSON-mode SELECT projects.
const JSON_COLUMN: &str = "_json_";

/// A prepared statement with uniform `run`/`get`/`all`/`stream` semantics.
///
/// The engine keeps the compiled statement in its cache, so executing the
/// same SQL again is cheap.
#[derive(Debug)]
pub struct Statement<'c> {
    connection: &'c Connection,
    sql: String,
    columns: Vec<String>,
}

impl<'c> Statement<'c> {
    pub(crate) fn new(connection: &'c Connection, sql: String) -> Result<Self> {
        let conn = connection.lock()?;
        let stmt = conn
            .prepare_cached(&sql)
            .map_err(|err| Error::statement_failed(err, sql.as_str()))?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        drop(stmt);
        drop(conn);

        Ok(Self {
            connection,
            sql,
            columns,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Names of the result columns, empty for statements without output.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Executes a mutating statement.
    ///
    /// Stream parameters are drained completely before anything is bound.
    pub async fn run(&self, params: &[Param]) -> Result<RunResult> {
        let values = bind_all(params).await?;

        tracing::debug!(sql = %self.sql, params = values.len(), "run");

        let conn = self.connection.lock()?;
        let mut stmt = conn.prepare_cached(&self.sql).map_err(|err| self.failed(err))?;
        let changes = stmt
            .execute(params_from_iter(values.iter()))
            .map_err(|err| self.failed(err))?;

        Ok(RunResult {
            changes: changes as u64,
            last_insert_rowid: conn.last_insert_rowid(),
        })
    }

    /// First result row, if any.
    pub fn get(&self, params: &[Param]) -> Result<Option<Row>> {
        let values = bind_scalars(params);

        tracing::debug!(sql = %self.sql, params = values.len(), "get");

        let conn = self.connection.lock()?;
        let mut stmt = conn.prepare_cached(&self.sql).map_err(|err| self.failed(err))?;
        let mut rows = stmt
            .query(params_from_iter(values.iter()))
            .map_err(|err| self.failed(err))?;

        let row = match rows.next().map_err(|err| self.failed(err))? {
            Some(row) => Some(self.row(row)?),
            None => None,
        };
        Ok(row)
    }

    /// All result rows.
    pub fn all(&self, params: &[Param]) -> Result<Vec<Row>> {
        let values = bind_scalars(params);

        tracing::debug!(sql = %self.sql, params = values.len(), "all");

        let conn = self.connection.lock()?;
        let mut stmt = conn.prepare_cached(&self.sql).map_err(|err| self.failed(err))?;
        let mut rows = stmt
            .query(params_from_iter(values.iter()))
            .map_err(|err| self.failed(err))?;

        let mut ret = vec![];
        while let Some(row) = rows.next().map_err(|err| self.failed(err))? {
            ret.push(self.row(row)?);
        }
        Ok(ret)
    }

    /// Streams the result.
    ///
    /// A statement projecting a single column other than `_json_` is read as
    /// a binary payload stored as base64 text. Anything else is read as JSON
    /// row payloads, framed as a JSON array unless `one` is set. JSON rows
    /// are pulled from the cursor as the consumer reads them; the call
    /// itself waits for the first row only.
    pub async fn stream(&self, params: &[Param], one: bool) -> Result<StreamOutput> {
        let values = bind_all(params).await?;

        tracing::debug!(sql = %self.sql, params = values.len(), one, "stream");

        if self.columns.len() == 1 && self.columns[0] != JSON_COLUMN {
            return self.stream_blob(&values);
        }

        // Capacity one keeps a single row in flight ahead of the consumer
        let (tx, mut rx) = mpsc::channel(1);
        let connection = self.connection.shared();
        let sql = self.sql.clone();

        task::spawn_blocking(move || {
            if let Err(err) = feed(&connection, &sql, &values, one, &tx) {
                let _ = tx.blocking_send(Err(err));
            }
        });

        let first = match rx.recv().await {
            Some(Ok(payload)) => Some(payload),
            Some(Err(err)) => return Err(err),
            None => None,
        };

        Ok(StreamOutput::Json(JsonRows::new(rx, first, one)))
    }

    fn stream_blob(&self, values: &[Value]) -> Result<StreamOutput> {
        let conn = self.connection.lock()?;
        let mut stmt = conn.prepare_cached(&self.sql).map_err(|err| self.failed(err))?;
        let mut rows = stmt
            .query(params_from_iter(values.iter()))
            .map_err(|err| self.failed(err))?;

        let Some(row) = rows.next().map_err(|err| self.failed(err))? else {
            return Ok(StreamOutput::NoContent);
        };

        let data = match Value::from_sql(row, 0)
            .map_err(|err| self.failed(err))?
            .into_inner()
        {
            stmt::Value::Null => return Ok(StreamOutput::Null),
            stmt::Value::String(text) => text.into_bytes(),
            stmt::Value::Bytes(bytes) => bytes,
            stmt::Value::I64(value) => value.to_string().into_bytes(),
            stmt::Value::Double(value) => value.to_string().into_bytes(),
            value => {
                return Err(Error::invalid_statement(format!(
                    "column `{}` cannot be streamed: {value:?}",
                    self.columns[0]
                )))
            }
        };

        Ok(StreamOutput::Blob(BlobReader::from_base64(data)))
    }

    fn row(&self, row: &rusqlite::Row<'_>) -> Result<Row> {
        self.columns
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let value = Value::from_sql(row, index).map_err(|err| self.failed(err))?;
                Ok((name.clone(), value.into_inner()))
            })
            .collect()
    }

    fn failed(&self, err: rusqlite::Error) -> Error {
        Error::statement_failed(err, self.sql.as_str())
    }
}

/// Steps the cursor of `sql` on a blocking thread, sending the first column
/// of each row as JSON text. Stops after the first row with `one`, or as soon
/// as the receiver is gone.
fn feed(
    connection: &Mutex<RusqliteConnection>,
    sql: &str,
    values: &[Value],
    one: bool,
    tx: &mpsc::Sender<Result<String>>,
) -> Result<()> {
    let failed = |err: rusqlite::Error| Error::statement_failed(err, sql);

    let conn = connection::lock(connection)?;
    let mut stmt = conn.prepare_cached(sql).map_err(failed)?;
    let mut rows = stmt
        .query(params_from_iter(values.iter()))
        .map_err(failed)?;

    while let Some(row) = rows.next().map_err(failed)? {
        let payload = match Value::from_sql(row, 0).map_err(failed)?.into_inner() {
            stmt::Value::Null => "null".to_string(),
            stmt::Value::String(text) => text,
            stmt::Value::I64(value) => value.to_string(),
            stmt::Value::Double(value) => value.to_string(),
            value => {
                return Err(Error::invalid_statement(format!(
                    "row payload is not JSON text: {value:?}"
                )))
            }
        };

        if tx.blocking_send(Ok(payload)).is_err() || one {
            break;
        }
    }

    Ok(())
}

/// Resolves parameters, draining streams first so the statement never sees a
/// partial bind.
async fn bind_all(params: &[Param]) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(params.len());
    for param in params {
        values.push(Value::bind(param).await?);
    }
    Ok(values)
}

/// Scalar parameters only; a stream parameter fails when bound.
fn bind_scalars(params: &[Param]) -> Vec<Value> {
    params
        .iter()
        .map(|param| Value::from(param.value.clone()))
        .collect()
}
