//! Provider selected at runtime from the configured URL.

use crate::db::{
    ConnectionProvider, DatabaseBackend, MySqlConnection, MySqlProvider, PooledConnection,
    PostgresConnection, PostgresProvider, Record, SqliteConnection, SqliteProvider, Value,
};
use crate::error::Result;
use async_trait::async_trait;

/// Either of the sqlx-backed providers.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Postgres(PostgresProvider),
    MySql(MySqlProvider),
    Sqlite(SqliteProvider),
}

impl AnyProvider {
    pub fn backend(&self) -> DatabaseBackend {
        match self {
            Self::Postgres(_) => DatabaseBackend::Postgres,
            Self::MySql(_) => DatabaseBackend::MySql,
            Self::Sqlite(_) => DatabaseBackend::Sqlite,
        }
    }

    /// Closes the underlying pool, waiting for checked-out connections to
    /// come back.
    pub async fn close(&self) {
        match self {
            Self::Postgres(provider) => provider.pool().close().await,
            Self::MySql(provider) => provider.pool().close().await,
            Self::Sqlite(provider) => provider.pool().close().await,
        }
    }
}

impl From<PostgresProvider> for AnyProvider {
    fn from(provider: PostgresProvider) -> Self {
        Self::Postgres(provider)
    }
}

impl From<MySqlProvider> for AnyProvider {
    fn from(provider: MySqlProvider) -> Self {
        Self::MySql(provider)
    }
}

impl From<SqliteProvider> for AnyProvider {
    fn from(provider: SqliteProvider) -> Self {
        Self::Sqlite(provider)
    }
}

#[async_trait]
impl ConnectionProvider for AnyProvider {
    type Connection = AnyConnection;

    async fn acquire(&self) -> Result<AnyConnection> {
        match self {
            Self::Postgres(provider) => provider.acquire().await.map(AnyConnection::Postgres),
            Self::MySql(provider) => provider.acquire().await.map(AnyConnection::MySql),
            Self::Sqlite(provider) => provider.acquire().await.map(AnyConnection::Sqlite),
        }
    }
}

/// Connection handed out by [`AnyProvider`].
pub enum AnyConnection {
    Postgres(PostgresConnection),
    MySql(MySqlConnection),
    Sqlite(SqliteConnection),
}

#[async_trait]
impl PooledConnection for AnyConnection {
    type Row = Record;

    async fn run(&mut self, statement: &str, params: &[Value]) -> Result<Vec<Record>> {
        match self {
            Self::Postgres(conn) => conn.run(statement, params).await,
            Self::MySql(conn) => conn.run(statement, params).await,
            Self::Sqlite(conn) => conn.run(statement, params).await,
        }
    }

    async fn release(self) -> Result<()> {
        match self {
            Self::Postgres(conn) => conn.release().await,
            Self::MySql(conn) => conn.release().await,
            Self::Sqlite(conn) => conn.release().await,
        }
    }
}
