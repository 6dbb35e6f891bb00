//! Connection provider abstraction for db-relay.
//!
//! Provides a trait-based interface over pooled connections, so the executor
//! can drive any backend without knowing which driver sits underneath.

mod any;
mod mock;
mod mysql;
mod postgres;
mod sqlite;
mod types;

pub use any::{AnyConnection, AnyProvider};
pub use mock::{MockConnection, MockProvider, MockStats};
pub use mysql::{MySqlConnection, MySqlProvider};
pub use postgres::{PostgresConnection, PostgresProvider};
pub use sqlite::{SqliteConnection, SqliteProvider};
pub use types::{Record, Value};

use crate::config::DatabaseConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    MySql,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a URL scheme.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

/// How a connection is handed back once an attempt is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseMode {
    /// Put the connection back into the pool's idle set.
    #[default]
    #[serde(alias = "release")]
    Return,
    /// Disconnect the physical connection; the pool opens a replacement
    /// on demand. Closing can fail.
    #[serde(alias = "disconnect")]
    Close,
}

impl std::str::FromStr for ReleaseMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "return" | "release" => Ok(Self::Return),
            "close" | "disconnect" => Ok(Self::Close),
            _ => Err(format!(
                "Invalid release mode: {s}. Expected: return or close"
            )),
        }
    }
}

/// Creates a provider for the backend named by the configuration URL.
///
/// This is the central factory for pooled providers.
pub async fn connect(config: &DatabaseConfig) -> Result<AnyProvider> {
    match config.backend()? {
        DatabaseBackend::Postgres => Ok(AnyProvider::Postgres(
            PostgresProvider::connect(config).await?,
        )),
        DatabaseBackend::MySql => Ok(AnyProvider::MySql(MySqlProvider::connect(config).await?)),
        DatabaseBackend::Sqlite => Ok(AnyProvider::Sqlite(SqliteProvider::connect(config).await?)),
    }
}

/// Yields single connections out of a pool.
///
/// Implementations own the pool; the executor only borrows them for the
/// duration of one attempt.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// The connection handed out by this provider.
    type Connection: PooledConnection;

    /// Takes one connection out of the pool.
    async fn acquire(&self) -> Result<Self::Connection>;
}

/// A connection checked out of a pool for exactly one attempt.
#[async_trait]
pub trait PooledConnection: Send {
    /// Row type produced by `run`. Opaque to the executor.
    type Row: Send;

    /// Runs one statement with positional parameters and returns all rows.
    async fn run(&mut self, statement: &str, params: &[Value]) -> Result<Vec<Self::Row>>;

    /// Hands the connection back to its pool.
    async fn release(self) -> Result<()>
    where
        Self: Sized;
}

/// Row type produced by a provider's connections.
pub type RowOf<P> = <<P as ConnectionProvider>::Connection as PooledConnection>::Row;

#[async_trait]
impl<P> ConnectionProvider for std::sync::Arc<P>
where
    P: ConnectionProvider,
{
    type Connection = P::Connection;

    async fn acquire(&self) -> Result<Self::Connection> {
        (**self).acquire().await
    }
}
