//! Mock connection provider for testing.
//!
//! Scripted acquire/run/release outcomes plus call counters, so the executor's
//! lifecycle guarantees can be checked without a database.

use super::{ConnectionProvider, PooledConnection, Record, Value};
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Script {
    Succeed,
    Fail(RelayError),
    Panic,
}

impl Script {
    fn play(&self, step: &str) -> Result<()> {
        match self {
            Self::Succeed => Ok(()),
            Self::Fail(err) => Err(err.clone()),
            Self::Panic => panic!("mock {step} panicked"),
        }
    }
}

/// Counts what happened to a [`MockProvider`]'s connections.
#[derive(Debug, Clone, Default)]
pub struct MockStats {
    inner: Arc<StatsInner>,
}

#[derive(Debug, Default)]
struct StatsInner {
    acquired: AtomicUsize,
    ran: AtomicUsize,
    released: AtomicUsize,
    statements: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockStats {
    /// Number of `acquire` calls that handed out a connection.
    pub fn acquired(&self) -> usize {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    /// Number of `run` calls.
    pub fn ran(&self) -> usize {
        self.inner.ran.load(Ordering::SeqCst)
    }

    /// Number of `release` calls, failed ones included.
    pub fn released(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Connections handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }

    /// Statements and parameters seen by `run`, in order.
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.inner
            .statements
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

/// A mock provider that returns predefined results.
#[derive(Debug, Clone)]
pub struct MockProvider {
    rows: Vec<Record>,
    acquire: Script,
    run: Script,
    release: Script,
    delay: Option<Duration>,
    stats: MockStats,
}

impl MockProvider {
    /// Creates a provider whose every step succeeds and whose statements
    /// return no rows.
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            acquire: Script::Succeed,
            run: Script::Succeed,
            release: Script::Succeed,
            delay: None,
            stats: MockStats::default(),
        }
    }

    /// Rows returned by every successful `run`.
    pub fn with_rows(mut self, rows: Vec<Record>) -> Self {
        self.rows = rows;
        self
    }

    pub fn failing_acquire(mut self, msg: impl Into<String>) -> Self {
        self.acquire = Script::Fail(RelayError::acquisition(msg));
        self
    }

    /// `acquire` fails with an error outside the acquisition taxonomy.
    pub fn faulting_acquire(mut self, msg: impl Into<String>) -> Self {
        self.acquire = Script::Fail(RelayError::unexpected(msg));
        self
    }

    pub fn failing_run(mut self, msg: impl Into<String>) -> Self {
        self.run = Script::Fail(RelayError::execution(msg));
        self
    }

    /// `run` fails with an error outside the acquisition/execution taxonomy.
    pub fn faulting_run(mut self, msg: impl Into<String>) -> Self {
        self.run = Script::Fail(RelayError::unexpected(msg));
        self
    }

    pub fn failing_release(mut self, msg: impl Into<String>) -> Self {
        self.release = Script::Fail(RelayError::release(msg));
        self
    }

    pub fn panicking_acquire(mut self) -> Self {
        self.acquire = Script::Panic;
        self
    }

    pub fn panicking_run(mut self) -> Self {
        self.run = Script::Panic;
        self
    }

    pub fn panicking_release(mut self) -> Self {
        self.release = Script::Panic;
        self
    }

    /// Suspends for `delay` before acquiring and before running.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Counters shared with every connection this provider hands out.
    pub fn stats(&self) -> MockStats {
        self.stats.clone()
    }

    async fn pause(delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for MockProvider {
    type Connection = MockConnection;

    async fn acquire(&self) -> Result<MockConnection> {
        Self::pause(self.delay).await;
        self.acquire.play("acquire")?;
        self.stats.inner.acquired.fetch_add(1, Ordering::SeqCst);

        Ok(MockConnection {
            rows: self.rows.clone(),
            run: self.run.clone(),
            release: self.release.clone(),
            delay: self.delay,
            stats: self.stats.clone(),
        })
    }
}

/// Connection handed out by [`MockProvider`].
#[derive(Debug)]
pub struct MockConnection {
    rows: Vec<Record>,
    run: Script,
    release: Script,
    delay: Option<Duration>,
    stats: MockStats,
}

#[async_trait]
impl PooledConnection for MockConnection {
    type Row = Record;

    async fn run(&mut self, statement: &str, params: &[Value]) -> Result<Vec<Record>> {
        MockProvider::pause(self.delay).await;
        self.stats.inner.ran.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut statements) = self.stats.inner.statements.lock() {
            statements.push((statement.to_string(), params.to_vec()));
        }
        self.run.play("run")?;
        Ok(self.rows.clone())
    }

    async fn release(self) -> Result<()> {
        self.stats.inner.released.fetch_add(1, Ordering::SeqCst);
        self.release.play("release")
    }
}
