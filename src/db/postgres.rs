//! PostgreSQL connection provider.
//!
//! Provides `PostgresProvider`, which hands out pooled sqlx connections and
//! runs statements with positional `$n` parameters.

use crate::config::DatabaseConfig;
use crate::db::{ConnectionProvider, PooledConnection, Record, ReleaseMode, Value};
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column as SqlxColumn, Postgres, Row as SqlxRow, TypeInfo};
use tracing::debug;

/// PostgreSQL connection provider.
#[derive(Debug, Clone)]
pub struct PostgresProvider {
    pool: PgPool,
    release: ReleaseMode,
}

impl PostgresProvider {
    /// Creates a provider from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
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
        debug!("Opening PostgreSQL pool for {}", config.display_string());

        let pool = PgPoolOptions::new()
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

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for PostgresProvider {
    type Connection = PostgresConnection;

    async fn acquire(&self) -> Result<PostgresConnection> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RelayError::acquisition(e.to_string()))?;

        debug!(
            "Acquired PostgreSQL connection ({} idle)",
            self.pool.num_idle()
        );

        Ok(PostgresConnection {
            conn,
            release: self.release,
        })
    }
}

/// A PostgreSQL connection checked out of the pool.
pub struct PostgresConnection {
    conn: PoolConnection<Postgres>,
    release: ReleaseMode,
}

#[async_trait]
impl PooledConnection for PostgresConnection {
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
                // Dropping a PoolConnection returns it to the idle set.
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

/// Binds parameters positionally (`$1`, `$2`, ...).
///
/// `Value::Null` is sent as a TEXT NULL. Comparing it against a column of
/// another type needs an explicit cast in the statement (`$1::int8`).
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[Value],
) -> Query<'q, Postgres, PgArguments> {
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

/// Converts a sqlx PgRow to a Record.
fn convert_row(row: &PgRow) -> Record {
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

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // Everything else is read as text when the driver allows it.
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

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        RelayError::acquisition(format!(
            "Cannot connect to {target}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
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

/// Formats a query error with the server's detail and hint if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }

        if let Some(constraint) = pg_error.constraint() {
            result.push_str("\n  CONSTRAINT: ");
            result.push_str(constraint);
        }
    }

    result
}
