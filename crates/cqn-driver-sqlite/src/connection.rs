use crate::{
    functions::{self, SessionContext},
    Sqlite, Statement,
};

use cqn_core::{err, Error, Result};
use rusqlite::Connection as RusqliteConnection;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

/// The engine connection, shared with the blocking tasks that feed JSON
/// cursors.
pub(crate) type Shared = Arc<Mutex<RusqliteConnection>>;

/// A physical connection to one SQLite database.
///
/// The engine runs statements synchronously. The connection is guarded by a
/// mutex that is never held across an `.await`. An open JSON cursor holds it
/// from its blocking task until the rows are consumed or closed, so other
/// statements on the same connection wait for that.
pub struct Connection {
    connection: Shared,
    session: SessionContext,
    target: Sqlite,
}

impl Connection {
    /// Opens `target`, registers the custom SQL functions and enables WAL
    /// journaling for file databases.
    pub fn open(target: &Sqlite) -> Result<Self> {
        let connection = match target {
            Sqlite::File(path) => RusqliteConnection::open(path),
            Sqlite::InMemory => RusqliteConnection::open_in_memory(),
        }
        .map_err(Error::driver_operation_failed)?;

        let session = SessionContext::default();
        functions::register(&connection, session.clone())
            .map_err(Error::driver_operation_failed)?;

        if !target.is_in_memory() {
            connection
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })
                .map_err(Error::driver_operation_failed)?;
        }

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            session,
            target: target.clone(),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(&Sqlite::InMemory)
    }

    pub fn target(&self) -> &Sqlite {
        &self.target
    }

    /// Prepares `sql`. Errors carry the SQL text.
    pub fn prepare(&self, sql: impl Into<String>) -> Result<Statement<'_>> {
        Statement::new(self, sql.into())
    }

    /// Executes one or more statements without parameters, e.g. DDL.
    pub fn exec(&self, sql: &str) -> Result<()> {
        tracing::debug!(sql, "exec");
        self.lock()?
            .execute_batch(sql)
            .map_err(|err| Error::statement_failed(err, sql))
    }

    /// Merges `variables` into the session context.
    pub fn set<K, V>(&self, variables: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut session = self.session()?;
        for (key, value) in variables {
            session.insert(key.into(), value.into());
        }
        Ok(())
    }

    /// Current value of the session variable `key`.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.session()?.get(key).cloned())
    }

    /// Drops all session variables.
    pub fn clear_session(&self) -> Result<()> {
        self.session()?.clear();
        Ok(())
    }

    /// True when the connection still answers queries.
    pub fn is_open(&self) -> bool {
        self.lock()
            .and_then(|connection| {
                connection
                    .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map_err(Error::driver_operation_failed)
            })
            .is_ok()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, RusqliteConnection>> {
        lock(&self.connection)
    }

    pub(crate) fn shared(&self) -> Shared {
        self.connection.clone()
    }

    fn session(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.session
            .lock()
            .map_err(|_| err!("session context lock poisoned"))
    }
}

pub(crate) fn lock(
    connection: &Mutex<RusqliteConnection>,
) -> Result<MutexGuard<'_, RusqliteConnection>> {
    connection
        .lock()
        .map_err(|_| err!("connection lock poisoned"))
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn session_variables_are_visible_to_sql() {
        let connection = Connection::in_memory().unwrap();
        connection.set([("$user.id", "alice")]).unwrap();
        connection.set([("$tenant", "t1")]).unwrap();

        let value: Option<String> = connection
            .lock()
            .unwrap()
            .query_row("SELECT session_context('$user.id')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value.as_deref(), Some("alice"));
        assert_eq!(connection.get("$tenant").unwrap().as_deref(), Some("t1"));

        connection.clear_session().unwrap();
        let value: Option<String> = connection
            .lock()
            .unwrap()
            .query_row("SELECT session_context('$user.id')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn exec_errors_carry_sql() {
        let connection = Connection::in_memory().unwrap();
        let err = connection.exec("CREATE TABLE").unwrap_err();
        assert_eq!(err.sql(), Some("CREATE TABLE"));
        assert!(err.to_string().ends_with(" in:\nCREATE TABLE"));
        assert!(connection.is_open());
    }
}
