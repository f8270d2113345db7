//! Connection pools for the run database.
//!
//! The configured `database.path` is either a file path, a `sqlite:` URL or
//! `:memory:`. File databases run in WAL mode so `runs list` can read while a
//! run checkpoints. An in-memory database lives only as long as its single
//! connection, so that pool never lets the connection go idle.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::DatabaseConfig;

const MEMORY: &str = ":memory:";

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to open run database {location}: {source}")]
    Open {
        location: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("Run database path is empty")]
    EmptyPath,
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the run database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

impl DatabaseLocation {
    /// Interpret a configured path. `sqlite:` and `sqlite://` prefixes are
    /// accepted.
    pub fn parse(path: &str) -> Result<Self, ConnectionError> {
        let bare = path
            .strip_prefix("sqlite://")
            .or_else(|| path.strip_prefix("sqlite:"))
            .unwrap_or(path)
            .trim();

        match bare {
            "" => Err(ConnectionError::EmptyPath),
            MEMORY => Ok(Self::Memory),
            file => Ok(Self::File(PathBuf::from(file))),
        }
    }
}

impl std::fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => f.write_str(MEMORY),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked file before failing.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from(&DatabaseConfig::default())
    }
}

impl From<&DatabaseConfig> for PoolConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(1),
            acquire_timeout: Duration::from_secs(3),
            busy_timeout: Duration::from_secs(30),
        }
    }
}

/// Open a pool for `location`, creating the file and its directory if needed.
pub async fn open_pool(
    location: &DatabaseLocation,
    config: &PoolConfig,
) -> Result<SqlitePool, ConnectionError> {
    let open_error = |source| ConnectionError::Open {
        location: location.to_string(),
        source,
    };

    match location {
        DatabaseLocation::File(path) => {
            ensure_parent_directory(path)?;
            let connect_options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(config.busy_timeout);

            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.acquire_timeout)
                .connect_with(connect_options)
                .await
                .map_err(open_error)
        }
        DatabaseLocation::Memory => {
            let connect_options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(open_error)?;

            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .acquire_timeout(config.acquire_timeout)
                .connect_with(connect_options)
                .await
                .map_err(open_error)
        }
    }
}

/// Pool for the database named in `config`.
pub async fn open_configured_pool(config: &DatabaseConfig) -> Result<SqlitePool, ConnectionError> {
    let location = DatabaseLocation::parse(&config.path)?;
    open_pool(&location, &PoolConfig::from(config)).await
}

/// Private in-memory database for tests.
pub async fn create_test_pool() -> Result<SqlitePool, ConnectionError> {
    open_pool(&DatabaseLocation::Memory, &PoolConfig::default()).await
}

fn ensure_parent_directory(path: &Path) -> Result<(), ConnectionError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|source| {
                ConnectionError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source,
                }
            })
        }
        _ => Ok(()),
    }
}
