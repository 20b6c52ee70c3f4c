use super::Error;

/// Error when the embedded engine fails to prepare or execute a statement.
///
/// This wraps rusqlite errors: syntax errors, I/O failures, lock contention
/// (`SQLITE_BUSY`) and constraint violations. When the failing SQL text is
/// known it is appended to the message so the offending statement is visible
/// in diagnostics.
#[derive(Debug)]
pub(super) struct DriverOperationFailed {
    pub(super) inner: Box<dyn std::error::Error + Send + Sync>,
    pub(super) sql: Option<Box<str>>,
}

impl std::error::Error for DriverOperationFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl DriverOperationFailed {
    /// The engine's message and its source chain, without the SQL text.
    pub(super) fn engine_message(&self) -> String {
        let mut message = self.inner.to_string();
        let mut source = self.inner.source();
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }
}

impl core::fmt::Display for DriverOperationFailed {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.engine_message())?;
        if let Some(sql) = &self.sql {
            write!(f, " in:\n{sql}")?;
        }
        Ok(())
    }
}

impl Error {
    /// Creates an error from a driver operation failure.
    pub fn driver_operation_failed(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::from(super::ErrorKind::DriverOperationFailed(
            DriverOperationFailed {
                inner: Box::new(err),
                sql: None,
            },
        ))
    }

    /// Creates an error from a driver failure while preparing or running `sql`.
    pub fn statement_failed(
        err: impl std::error::Error + Send + Sync + 'static,
        sql: impl Into<String>,
    ) -> Error {
        Error::from(super::ErrorKind::DriverOperationFailed(
            DriverOperationFailed {
                inner: Box::new(err),
                sql: Some(sql.into().into()),
            },
        ))
    }

    /// Returns `true` if this error is a driver operation failure.
    pub fn is_driver_operation_failed(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::DriverOperationFailed(_))
    }

    /// The engine's own message of a driver failure, without the SQL text.
    pub fn engine_message(&self) -> Option<String> {
        self.chain().find_map(|err| match err.kind() {
            super::ErrorKind::DriverOperationFailed(err) => Some(err.engine_message()),
            _ => None,
        })
    }

    /// The SQL text of the statement that failed, if known.
    pub fn sql(&self) -> Option<&str> {
        self.chain().find_map(|err| match err.kind() {
            super::ErrorKind::DriverOperationFailed(err) => err.sql.as_deref(),
            _ => None,
        })
    }
}
