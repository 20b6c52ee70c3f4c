use super::Error;

/// Failure to create a tenant's connection pool or to check a connection out
/// of it.
#[derive(Debug)]
pub(super) struct ConnectionPoolError {
    /// URL of the database the pool serves
    url: Box<str>,
    cause: Box<dyn std::error::Error + Send + Sync>,
}

impl std::error::Error for ConnectionPoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

impl core::fmt::Display for ConnectionPoolError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "connection pool of `{}`: {}", self.url, self.cause)?;

        let mut source = self.cause.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

impl Error {
    /// Wraps a pool error (build or checkout) of the database at `url`.
    pub fn connection_pool(
        url: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Error {
        Error::from(super::ErrorKind::ConnectionPool(ConnectionPoolError {
            url: url.into().into(),
            cause: Box::new(cause),
        }))
    }

    pub fn is_connection_pool(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::ConnectionPool(_))
    }
}
