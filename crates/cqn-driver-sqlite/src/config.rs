use crate::Sqlite;

use cqn_core::Result;
use regex::Regex;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

/// Connection settings of a SQLite service.
///
/// `database` takes precedence over `url`. When neither is set, or the
/// database is `:memory:`, every tenant gets its own in-memory database.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// A `sqlite:` connection URL
    pub url: Option<String>,

    /// Path to the database file
    pub database: Option<String>,

    pub pool: PoolOptions,

    /// Directory that relative database paths resolve against. Defaults to
    /// the current working directory.
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Maximum number of physical connections per tenant database
    pub max: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self { max: 1 }
    }
}

impl SqliteConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            database: Some(path.as_ref().display().to_string()),
            ..Self::default()
        }
    }

    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Database location of `tenant`, or of the shared database when no
    /// tenant is given.
    pub fn target(&self, tenant: Option<&str>) -> Result<Sqlite> {
        let base = match (&self.database, &self.url) {
            (Some(database), _) => Sqlite::from_database(database),
            (None, Some(url)) => Sqlite::new(url.as_str())?,
            (None, None) => Sqlite::InMemory,
        };

        let Sqlite::File(path) = base else {
            return Ok(Sqlite::InMemory);
        };

        let mut path = path.display().to_string();
        if let Some(tenant) = tenant {
            path = tenant_database(&path, tenant);
        }

        let path = PathBuf::from(path);
        Ok(match &self.root {
            Some(root) if path.is_relative() => Sqlite::File(root.join(path)),
            _ => match std::env::current_dir() {
                Ok(cwd) if path.is_relative() => Sqlite::File(cwd.join(path)),
                _ => Sqlite::File(path),
            },
        })
    }

    /// Connection URL of `tenant`'s database.
    pub fn url_for(&self, tenant: Option<&str>) -> Result<String> {
        Ok(self.target(tenant)?.url())
    }
}

fn extension_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.(db|sqlite)$").expect("valid pattern"))
}

/// `name.db` becomes `name-<tenant>.db`. Names without a known extension
/// get the suffix appended so tenants never share a file.
fn tenant_database(database: &str, tenant: &str) -> String {
    let pattern = extension_pattern();
    if pattern.is_match(database) {
        pattern
            .replace(database, format!("-{tenant}.$1").as_str())
            .into_owned()
    } else {
        format!("{database}-{tenant}")
    }
}
