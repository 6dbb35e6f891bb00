//! MySQL connection provider.
//!
//! Provides `MySqlProvider`, which hands out pooled sqlx connections and runs
//! statements with positional `?` parameters.

use crate::config::DatabaseConfig;
use crate::db::{ConnectionProvider, PooledConnection, Record, ReleaseMode, Value};
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Column as SqlxColumn, MySql, Row as SqlxRow, TypeInfo};
use tracing::debug;

/// MySQL connection provider.
#[derive(Debug, Clone)]
pub struct MySqlProvider {
    pool: MySqlPool,
    release: ReleaseMode,
}

impl MySqlProvider {
    /// Creates a provider from an existing connection pool.
    pub fn from_pool(pool: MySqlPool) -> Self {
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

    /// Opens a pool for the configured URL.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        debug!("Opening MySQL pool for {}", config.display_string());

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| map_connection_error(e, config))?;

        Ok(Self {
            pool,
            release: config.release,
        })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for MySqlProvider {
    type Connection = MySqlConnection;

    async fn acquire(&self) -> Result<MySqlConnection> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RelayError::acquisition(e.to_string()))?;

        debug!("Acquired MySQL connection ({} idle)", self.pool.num_idle());

        Ok(MySqlConnection {
            conn,
            release: self.release,
        })
    }
}

/// A MySQL connection checked out of the pool.
pub struct MySqlConnection {
    conn: PoolConnection<MySql>,
    release: ReleaseMode,
}

#[async_trait]
impl PooledConnection for MySqlConnection {
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

/// Binds parameters positionally (`?`).
fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
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

/// Converts a sqlx MySqlRow to a Record.
fn convert_row(row: &MySqlRow) -> Record {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            (
                col.name().to_string(),
                convert_value(row, i, col.type_info().name()),
            )
        })
        .collect()
}

/// Converts a single column value from a MySqlRow to our Value type.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        // Values above i64::MAX are kept as text.
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row
            .try_get::<Option<u64>, _>(index)
            .ok()
            .flatten()
            .map(|v| {
                i64::try_from(v)
                    .map(Value::Int)
                    .unwrap_or_else(|_| Value::String(v.to_string()))
            })
            .unwrap_or(Value::Null),

        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Maps pool creation errors to messages that name the target, not the
/// credentials.
fn map_connection_error(error: sqlx::Error, config: &DatabaseConfig) -> RelayError {
    let target = config.display_string();
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        RelayError::acquisition(format!(
            "Cannot connect to {target}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        RelayError::acquisition(format!(
            "Authentication failed for {target}. Check your credentials."
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        RelayError::acquisition(format!(
            "Connection to {target} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        RelayError::acquisition(error.to_string())
    }
}

/// Formats a query error the way the mysql client prints it:
/// `ERROR <number> (<sqlstate>): <message>`.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    match db_error.try_downcast_ref::<MySqlDatabaseError>() {
        Some(mysql_error) => match mysql_error.code() {
            Some(state) => format!(
                "ERROR {} ({state}): {}",
                mysql_error.number(),
                mysql_error.message()
            ),
            None => format!("ERROR {}: {}", mysql_error.number(), mysql_error.message()),
        },
        None => format!("ERROR: {}", db_error.message()),
    }
}
