//! End-to-end execution against SQLite.
//!
//! Uses an in-memory database behind a single-connection pool, so a leaked
//! connection shows up as an acquisition failure on the next call.

use std::time::Duration;

use db_relay::config::DatabaseConfig;
use db_relay::db::{ConnectionProvider, ReleaseMode, SqliteProvider, Value};
use db_relay::{MessagePolicy, QueryExecutor, Status};
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;

/// Pool of one in-memory connection with table `t` holding three rows.
async fn seeded_provider() -> SqliteProvider {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(200))
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO t (id, name) VALUES (1, 'alice'), (2, 'bob'), (3, NULL)")
        .execute(&pool)
        .await
        .unwrap();

    SqliteProvider::from_pool(pool)
}

#[tokio::test]
async fn test_select_three_rows() {
    let provider = seeded_provider().await;

    let success = QueryExecutor::new()
        .execute_with_future(&provider, "SELECT * FROM t ORDER BY id", &[])
        .await
        .unwrap();

    assert_eq!(success.status(), Status::Success);
    assert_eq!(success.count(), Some(3));
    assert_eq!(success.message(), "operation succeeded");

    let rows = success.into_data().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
    assert_eq!(rows[1].get("name"), Some(&Value::from("bob")));
    assert_eq!(rows[2].get("name"), Some(&Value::Null));
}

#[tokio::test]
async fn test_envelope_wire_shape() {
    let provider = seeded_provider().await;

    let success = QueryExecutor::new()
        .execute_with_future(&provider, "SELECT id, name FROM t WHERE id < 3 ORDER BY id", &[])
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&success).unwrap(),
        json!({
            "status": 1,
            "data": [
                {"id": 1, "name": "alice"},
                {"id": 2, "name": "bob"}
            ],
            "count": 2,
            "message": "operation succeeded"
        })
    );
}

#[tokio::test]
async fn test_zero_rows_is_success() {
    let provider = seeded_provider().await;

    let success = QueryExecutor::new()
        .execute_with_future(&provider, "SELECT * FROM t WHERE id > 100", &[])
        .await
        .unwrap();

    assert_eq!(success.count(), Some(0));
    assert_eq!(success.data().map(|rows| rows.len()), Some(0));
    assert_eq!(success.message(), "operation succeeded");
}

#[tokio::test]
async fn test_positional_params() {
    let provider = seeded_provider().await;

    let success = QueryExecutor::new()
        .execute_with_future(
            &provider,
            "SELECT name FROM t WHERE id = ? OR name = ?",
            &[Value::Int(2), Value::from("alice")],
        )
        .await
        .unwrap();

    assert_eq!(success.count(), Some(2));
}

#[tokio::test]
async fn test_write_statement_returns_empty_success() {
    let provider = seeded_provider().await;
    let executor = QueryExecutor::new();

    let inserted = executor
        .execute_with_future(
            &provider,
            "INSERT INTO t (id, name) VALUES (?, ?)",
            &[Value::Int(4), Value::from("dave")],
        )
        .await
        .unwrap();
    assert_eq!(inserted.count(), Some(0));

    let counted = executor
        .execute_with_future(&provider, "SELECT COUNT(*) AS n FROM t", &[])
        .await
        .unwrap();
    assert_eq!(counted.data().unwrap()[0].get("n"), Some(&Value::Int(4)));
}

#[tokio::test]
async fn test_syntax_error_releases_connection() {
    let provider = seeded_provider().await;
    let executor = QueryExecutor::new();

    let failure = executor
        .execute_with_future(&provider, "SELEC * FROM t", &[])
        .await
        .unwrap_err();

    assert_eq!(failure.status(), Status::Failure);
    assert!(failure.message().contains("syntax error"));
    assert!(failure.data().is_none());
    assert!(failure.count().is_none());

    // Single-connection pool: this only works if the failed attempt released.
    let success = executor
        .execute_with_future(&provider, "SELECT 1 AS one", &[])
        .await
        .unwrap();
    assert_eq!(success.count(), Some(1));
}

#[tokio::test]
async fn test_syntax_error_generic_policy() {
    let provider = seeded_provider().await;

    let failure = QueryExecutor::with_policy(MessagePolicy::Generic)
        .execute_with_future(&provider, "SELEC * FROM t", &[])
        .await
        .unwrap_err();

    assert_eq!(failure.message(), "operation failed");
}

#[tokio::test]
async fn test_pool_exhausted_is_connection_failure() {
    let provider = seeded_provider().await;
    let held = provider.acquire().await.unwrap();

    let mut delivered = Vec::new();
    QueryExecutor::new()
        .execute_with_callback(&provider, "SELECT * FROM t", &[], |envelope| {
            delivered.push(envelope)
        })
        .await;

    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status(), Status::Failure);
    assert_eq!(delivered[0].message(), "connection failed");
    assert!(delivered[0].data().is_none());

    drop(held);
}

#[tokio::test]
async fn test_callback_style_success() {
    let provider = seeded_provider().await;
    let mut delivered = Vec::new();

    QueryExecutor::new()
        .execute_with_callback(&provider, "SELECT * FROM t", &[], |envelope| {
            delivered.push(envelope)
        })
        .await;

    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].count(), Some(3));
}

#[tokio::test]
async fn test_close_release_mode_reopens_connections() {
    let dir = tempfile::tempdir().unwrap();
    let mut config =
        DatabaseConfig::from_url(format!("sqlite://{}", dir.path().join("relay.db").display()));
    config.max_connections = 1;
    config.release = ReleaseMode::Close;

    let provider = SqliteProvider::connect(&config).await.unwrap();
    let executor = QueryExecutor::new();

    for statement in [
        "CREATE TABLE notes (body TEXT)",
        "INSERT INTO notes (body) VALUES ('kept on disk')",
    ] {
        let settled = executor.execute_with_future(&provider, statement, &[]).await;
        assert!(settled.is_ok(), "{statement}");
    }

    let success = executor
        .execute_with_future(&provider, "SELECT body FROM notes", &[])
        .await
        .unwrap();
    assert_eq!(
        success.data().unwrap()[0].get("body"),
        Some(&Value::from("kept on disk"))
    );
}
