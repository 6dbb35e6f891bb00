//! SQLite connection provider.
//!
//! Provides `SqliteProvider`, which hands out pooled sqlx connections and runs
//! statements with positional `?` parameters.

use crate::config::DatabaseConfig;
use crate::db::{ConnectionProvider, PooledConnection, Record, ReleaseMode, Value};
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, Sqlite, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::debug;

/// SQLite connection provider.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    pool: SqlitePool,
    release: ReleaseMode,
}

impl SqliteProvider {
    /// Creates a provider from an existing connection pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            release: ReleaseMode::default(),
        }
    }

    /// Sets how connections are handed back after each attempt.
    pub fn with_release_mode(mut self, release: ReleaseMode) -> Self {
        self.release = release;
        self
    }

    /// Opens a pool for the configured URL, creating the file if needed.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        debug!("Opening SQLite pool for {}", config.display_string());

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| RelayError::config(format!("Invalid database path: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| {
                RelayError::acquisition(format!(
                    "Failed to open {}: {e}",
                    config.display_string()
                ))
            })?;

        Ok(Self {
            pool,
            release: config.release,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for SqliteProvider {
    type Connection = SqliteConnection;

    async fn acquire(&self) -> Result<SqliteConnection> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RelayError::acquisition(e.to_string()))?;

        debug!("Acquired SQLite connection ({} idle)", self.pool.num_idle());

        Ok(SqliteConnection {
            conn,
            release: self.release,
        })
    }
}

/// A SQLite connection checked out of the pool.
pub struct SqliteConnection {
    conn: PoolConnection<Sqlite>,
    release: ReleaseMode,
}

#[async_trait]
impl PooledConnection for SqliteConnection {
    type Row = Record;

    async fn run(&mut self, statement: &str, params: &[Value]) -> Result<Vec<Record>> {
        let rows = bind_params(sqlx::query(statement), params)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| RelayError::execution(format_query_error(e)))?;

        Ok(rows.iter().map(convert_row).collect())
    }

    async fn release(self) -> Result<()> {
        match self.release {
            ReleaseMode::Return => {
                drop(self.conn);
                Ok(())
            }
            ReleaseMode::Close => self
                .conn
                .close()
                .await
                .map_err(|e| RelayError::release(e.to_string())),
        }
    }
}

/// Binds parameters positionally (`?`, `?2`, ...).
fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param.clone() {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(v),
            Value::Int(v) => query.bind(v),
            Value::Float(v) => query.bind(v),
            Value::String(v) => query.bind(v),
            Value::Bytes(v) => query.bind(v),
        };
    }
    query
}

/// Converts a sqlx SqliteRow to a Record.
fn convert_row(row: &SqliteRow) -> Record {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| (col.name().to_string(), convert_value(row, i)))
        .collect()
}

/// Converts a single cell using its storage class rather than the declared
/// column type, since expressions have no declared type in SQLite.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let Ok(raw) = row.try_get_raw(index) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let storage = raw.type_info().name().to_uppercase();

    match storage.as_str() {
        "INTEGER" | "INT8" | "BIGINT" => row
            .try_get::<i64, _>(index)
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "BOOLEAN" => row
            .try_get::<bool, _>(index)
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "REAL" | "NUMERIC" => row
            .try_get::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Formats a query error, keeping SQLite's own message when there is one.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => format!("{} (code {code})", db_error.message()),
            None => db_error.message().to_string(),
        },
        None => error.to_string(),
    }
}
