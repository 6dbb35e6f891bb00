//! Delivery guarantees of both completion protocols.
//!
//! Runs every combination of acquire/run/release outcomes through a scripted
//! provider and checks that exactly one well-formed envelope comes back.

use std::sync::Arc;
use std::time::Duration;

use db_relay::db::{MockProvider, MockStats, Record};
use db_relay::{Envelope, QueryExecutor, Status};

const RUN_ERROR: &str = "relation \"t\" does not exist";

#[derive(Debug, Clone, Copy)]
struct Case {
    acquire_ok: bool,
    run_ok: bool,
    release_ok: bool,
}

fn cases() -> Vec<Case> {
    let mut cases = Vec::new();
    for acquire_ok in [true, false] {
        for run_ok in [true, false] {
            for release_ok in [true, false] {
                cases.push(Case {
                    acquire_ok,
                    run_ok,
                    release_ok,
                });
            }
        }
    }
    cases
}

fn rows() -> Vec<Record> {
    vec![
        Record::new().with("id", 1).with("name", "alice"),
        Record::new().with("id", 2).with("name", "bob"),
    ]
}

fn provider_for(case: Case) -> MockProvider {
    let mut provider = MockProvider::new().with_rows(rows());
    if !case.acquire_ok {
        provider = provider.failing_acquire("pool timed out while waiting for an open connection");
    }
    if !case.run_ok {
        provider = provider.failing_run(RUN_ERROR);
    }
    if !case.release_ok {
        provider = provider.failing_release("connection reset by peer");
    }
    provider
}

fn check(case: Case, envelope: &Envelope<Record>, stats: &MockStats) {
    if !case.acquire_ok {
        assert_eq!(envelope.status(), Status::Failure, "{case:?}");
        assert_eq!(envelope.message(), "connection failed", "{case:?}");
        assert_eq!(stats.ran(), 0, "{case:?}");
        assert_eq!(stats.released(), 0, "{case:?}");
    } else {
        assert_eq!(stats.acquired(), 1, "{case:?}");
        assert_eq!(stats.ran(), 1, "{case:?}");
        assert_eq!(stats.released(), 1, "{case:?}");

        if case.run_ok {
            assert_eq!(envelope.status(), Status::Success, "{case:?}");
            assert_eq!(envelope.message(), "operation succeeded", "{case:?}");
        } else {
            assert_eq!(envelope.status(), Status::Failure, "{case:?}");
            assert_eq!(envelope.message(), RUN_ERROR, "{case:?}");
        }
    }

    match envelope.status() {
        Status::Success => {
            let data = envelope.data().expect("success carries data");
            assert_eq!(envelope.count(), Some(data.len()), "{case:?}");
        }
        Status::Failure => {
            assert!(envelope.data().is_none(), "{case:?}");
            assert!(envelope.count().is_none(), "{case:?}");
            assert!(!envelope.message().is_empty(), "{case:?}");
        }
    }
}

#[tokio::test]
async fn test_callback_delivers_exactly_once_for_every_case() {
    for case in cases() {
        let provider = provider_for(case);
        let stats = provider.stats();
        let mut delivered = Vec::new();

        QueryExecutor::new()
            .execute_with_callback(&provider, "SELECT id, name FROM t", &[], |envelope| {
                delivered.push(envelope)
            })
            .await;

        assert_eq!(delivered.len(), 1, "{case:?}");
        check(case, &delivered[0], &stats);
    }
}

#[tokio::test]
async fn test_future_settles_exactly_once_for_every_case() {
    for case in cases() {
        let provider = provider_for(case);
        let stats = provider.stats();

        let settled = QueryExecutor::new()
            .execute_with_future(&provider, "SELECT id, name FROM t", &[])
            .await;

        let envelope = match settled {
            Ok(success) => {
                assert!(success.is_success(), "{case:?}");
                success
            }
            Err(failure) => {
                assert!(!failure.is_success(), "{case:?}");
                failure
            }
        };
        check(case, &envelope, &stats);
    }
}

#[tokio::test]
async fn test_spawned_future_matches_inline_future() {
    for case in cases() {
        let provider = Arc::new(provider_for(case));
        let stats = provider.stats();

        let settled = QueryExecutor::new()
            .spawn_with_future(Arc::clone(&provider), "SELECT id, name FROM t", Vec::new())
            .await;

        let envelope = settled.unwrap_or_else(|failure| failure);
        check(case, &envelope, &stats);
    }
}

#[tokio::test]
async fn test_protocols_agree() {
    for case in cases() {
        let mut via_callback = None;
        QueryExecutor::new()
            .execute_with_callback(&provider_for(case), "SELECT 1", &[], |envelope| {
                via_callback = Some(envelope)
            })
            .await;

        let via_future = QueryExecutor::new()
            .execute_with_future(&provider_for(case), "SELECT 1", &[])
            .await
            .unwrap_or_else(|failure| failure);

        assert_eq!(via_callback, Some(via_future), "{case:?}");
    }
}

#[tokio::test]
async fn test_concurrent_calls_are_independent() {
    let provider = MockProvider::new()
        .with_rows(rows())
        .with_delay(Duration::from_millis(2));
    let stats = provider.stats();
    let executor = QueryExecutor::new();

    let attempts = (0..16).map(|i| {
        let provider = &provider;
        async move {
            let statement = format!("SELECT {i}");
            executor
                .execute_with_future(provider, &statement, &[])
                .await
        }
    });
    let settled = futures::future::join_all(attempts).await;

    assert!(settled.iter().all(|s| s.is_ok()));
    assert_eq!(stats.acquired(), 16);
    assert_eq!(stats.released(), 16);
    assert_eq!(stats.outstanding(), 0);
}

#[tokio::test]
async fn test_panicking_acquire_never_escapes() {
    let provider = MockProvider::new().panicking_acquire();
    let mut delivered = Vec::new();

    QueryExecutor::new()
        .execute_with_callback(&provider, "SELECT 1", &[], |envelope| {
            delivered.push(envelope)
        })
        .await;

    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].message(), "operation exception");
    assert_eq!(provider.stats().released(), 0);
}
