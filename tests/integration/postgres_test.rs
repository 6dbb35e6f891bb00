//! End-to-end execution against PostgreSQL.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

use db_relay::config::DatabaseConfig;
use db_relay::db::{PostgresProvider, ReleaseMode, Value};
use db_relay::{QueryExecutor, Status};

/// Helper to create a test provider.
async fn get_test_provider(release: ReleaseMode) -> Option<PostgresProvider> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let mut config = DatabaseConfig::from_url(url);
    config.max_connections = 1;
    config.release = release;
    PostgresProvider::connect(&config).await.ok()
}

#[tokio::test]
async fn test_select_three_rows() {
    let Some(provider) = get_test_provider(ReleaseMode::Return).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let success = QueryExecutor::new()
        .execute_with_future(
            &provider,
            "SELECT * FROM (VALUES (1::int8), (2::int8), (3::int8)) AS t(id)",
            &[],
        )
        .await
        .unwrap();

    assert_eq!(success.count(), Some(3));
    assert_eq!(success.data().unwrap()[2].get("id"), Some(&Value::Int(3)));

    provider.pool().close().await;
}

#[tokio::test]
async fn test_zero_rows() {
    let Some(provider) = get_test_provider(ReleaseMode::Return).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let success = QueryExecutor::new()
        .execute_with_future(&provider, "SELECT 1 AS one WHERE false", &[])
        .await
        .unwrap();

    assert_eq!(success.count(), Some(0));

    provider.pool().close().await;
}

#[tokio::test]
async fn test_positional_params() {
    let Some(provider) = get_test_provider(ReleaseMode::Return).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let success = QueryExecutor::new()
        .execute_with_future(
            &provider,
            "SELECT $1::int8 + 1 AS next, $2::text AS label",
            &[Value::Int(41), Value::from("answer")],
        )
        .await
        .unwrap();

    let row = &success.data().unwrap()[0];
    assert_eq!(row.get("next"), Some(&Value::Int(42)));
    assert_eq!(row.get("label"), Some(&Value::from("answer")));

    provider.pool().close().await;
}

#[tokio::test]
async fn test_null_param_with_cast() {
    let Some(provider) = get_test_provider(ReleaseMode::Return).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let success = QueryExecutor::new()
        .execute_with_future(
            &provider,
            "SELECT id FROM (VALUES (1::int8), (2::int8)) AS t(id) \
             WHERE id = $1::int8 OR $1::int8 IS NULL",
            &[Value::Null],
        )
        .await
        .unwrap();

    assert_eq!(success.count(), Some(2));

    provider.pool().close().await;
}

#[tokio::test]
async fn test_syntax_error_then_recovery() {
    let Some(provider) = get_test_provider(ReleaseMode::Return).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let executor = QueryExecutor::new();

    let mut delivered = Vec::new();
    executor
        .execute_with_callback(&provider, "SELEC 1", &[], |envelope| {
            delivered.push(envelope)
        })
        .await;

    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status(), Status::Failure);
    assert!(delivered[0].message().contains("syntax error"));

    // One-connection pool: the failed attempt must have released it.
    let success = executor
        .execute_with_future(&provider, "SELECT 1 AS one", &[])
        .await
        .unwrap();
    assert_eq!(success.count(), Some(1));

    provider.pool().close().await;
}

#[tokio::test]
async fn test_close_release_mode() {
    let Some(provider) = get_test_provider(ReleaseMode::Close).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let executor = QueryExecutor::new();

    for _ in 0..3 {
        let success = executor
            .execute_with_future(&provider, "SELECT 1 AS one", &[])
            .await
            .unwrap();
        assert_eq!(success.count(), Some(1));
    }

    provider.pool().close().await;
}
