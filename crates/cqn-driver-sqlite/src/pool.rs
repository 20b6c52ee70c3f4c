//! Connection pooling for tenant databases.

use crate::{Connection, PoolOptions, Sqlite, SqliteConfig};

use cqn_core::Result;
use std::ops::Deref;

/// A pool of connections to one SQLite database.
#[derive(Debug, Clone)]
pub struct Pool {
    inner: deadpool::managed::Pool<Manager>,
}

impl Pool {
    /// Creates a pool for `target`. In-memory databases are private to their
    /// connection, so their pool never holds more than one.
    pub fn new(target: Sqlite, options: &PoolOptions) -> Result<Self> {
        let max_size = if target.is_in_memory() {
            1
        } else {
            options.max.max(1)
        };

        let url = target.url();
        tracing::info!(%url, max_size, "creating connection pool");

        let inner = deadpool::managed::Pool::builder(Manager { target })
            .runtime(deadpool::Runtime::Tokio1)
            .max_size(max_size)
            .build()
            .map_err(|err| cqn_core::Error::connection_pool(url, err))?;

        Ok(Self { inner })
    }

    /// Creates the pool of `tenant`'s database.
    pub fn for_tenant(config: &SqliteConfig, tenant: Option<&str>) -> Result<Self> {
        Self::new(config.target(tenant)?, &config.pool)
    }

    /// Retrieves a connection from the pool, waiting while all are in use.
    pub async fn get(&self) -> Result<PoolConnection> {
        let connection = self
            .inner
            .get()
            .await
            .map_err(|err| cqn_core::Error::connection_pool(self.target().url(), err))?;
        Ok(PoolConnection { inner: connection })
    }

    pub fn target(&self) -> &Sqlite {
        &self.inner.manager().target
    }
}

#[derive(Debug)]
struct Manager {
    target: Sqlite,
}

impl deadpool::managed::Manager for Manager {
    type Type = Connection;
    type Error = cqn_core::Error;

    async fn create(&self) -> Result<Connection> {
        Connection::open(&self.target)
    }

    async fn recycle(
        &self,
        connection: &mut Connection,
        _metrics: &deadpool::managed::Metrics,
    ) -> deadpool::managed::RecycleResult<Self::Error> {
        if !connection.is_open() {
            return Err(deadpool::managed::RecycleError::Message(
                "connection is closed".into(),
            ));
        }

        connection
            .clear_session()
            .map_err(deadpool::managed::RecycleError::Backend)
    }
}

/// A connection retrieved from a pool.
///
/// When dropped, its session context is cleared and the connection is
/// returned to the pool for reuse.
pub struct PoolConnection {
    inner: deadpool::managed::Object<Manager>,
}

impl Deref for PoolConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        if let Err(err) = self.inner.clear_session() {
            tracing::warn!(%err, "failed to clear session context on release");
        }
    }
}

impl std::fmt::Debug for PoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConnection")
            .field("connection", &*self.inner)
            .finish()
    }
}
