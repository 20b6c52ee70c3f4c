mod config;
pub use config::{PoolOptions, SqliteConfig};

mod connection;
pub use connection::Connection;

mod functions;

mod pool;
pub use pool::{Pool, PoolConnection};

mod statement;
pub use statement::{Row, RunResult, Statement};

mod stream;
pub use stream::{BlobReader, JsonRows, StreamOutput};

mod value;
pub(crate) use value::Value;

use cqn_core::Result;
use std::path::{Path, PathBuf};
use url::Url;

/// Location of a SQLite database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sqlite {
    File(PathBuf),
    InMemory,
}

impl Sqlite {
    /// Create a new SQLite target from a `sqlite:` connection URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url_str = url.into();
        let url = Url::parse(&url_str).map_err(|err| {
            cqn_core::Error::invalid_connection_url(format!("{err}; url={url_str}"))
        })?;

        if url.scheme() != "sqlite" {
            return Err(cqn_core::Error::invalid_connection_url(format!(
                "connection URL does not have a `sqlite` scheme; url={}",
                url_str
            )));
        }

        Ok(Self::from_database(url.path()))
    }

    /// Target for a plain database name, where `:memory:` selects an
    /// in-memory database
    pub fn from_database(database: &str) -> Self {
        if database == ":memory:" {
            Self::InMemory
        } else {
            Self::File(PathBuf::from(database))
        }
    }

    /// Create an in-memory SQLite database
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Open a SQLite database at the specified file path
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self, Self::InMemory)
    }

    pub fn url(&self) -> String {
        match self {
            Sqlite::InMemory => "sqlite::memory:".to_string(),
            Sqlite::File(path) => format!("sqlite:{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urls() {
        assert_eq!(Sqlite::new("sqlite::memory:").unwrap(), Sqlite::InMemory);
        assert_eq!(
            Sqlite::new("sqlite:db.sqlite").unwrap(),
            Sqlite::File(PathBuf::from("db.sqlite"))
        );
        assert!(Sqlite::new("postgres://localhost/db")
            .unwrap_err()
            .to_string()
            .contains("sqlite"));
        assert_eq!(Sqlite::in_memory().url(), "sqlite::memory:");
    }
}
