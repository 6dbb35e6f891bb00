//! Statement execution with a normalized outcome.
//!
//! Both completion protocols run the same attempt: acquire a connection, run
//! the statement, release the connection, then deliver an [`Envelope`]. They
//! differ only in how the envelope reaches the caller.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, warn};

use super::mapping::{self, MessagePolicy};
use super::pending::PendingEnvelope;
use crate::config::ExecutorConfig;
use crate::db::{ConnectionProvider, PooledConnection, RowOf, Value};
use crate::envelope::Envelope;

/// Outcome of the future-style protocol: `Ok` holds a Success envelope,
/// `Err` a Failure envelope.
pub type Settled<R> = Result<Envelope<R>, Envelope<R>>;

/// Runs statements against a provider and normalizes the outcome.
///
/// Holds no connection state; one executor can serve any number of
/// concurrent calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryExecutor {
    policy: MessagePolicy,
}

impl QueryExecutor {
    /// Creates an executor with the default message policy.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: MessagePolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::with_policy(config.message_policy)
    }

    pub fn policy(&self) -> MessagePolicy {
        self.policy
    }

    /// Executes `statement` and hands the envelope to `on_complete`.
    ///
    /// `on_complete` runs after the connection has been released. It is
    /// called outside the fault guards, so a panicking callback propagates
    /// instead of being reported a second time.
    pub async fn execute_with_callback<P, F>(
        &self,
        provider: &P,
        statement: &str,
        params: &[Value],
        on_complete: F,
    ) where
        P: ConnectionProvider,
        F: FnOnce(Envelope<RowOf<P>>),
    {
        let envelope = self.attempt(provider, statement, params).await;
        on_complete(envelope);
    }

    /// Executes `statement` and settles with `Ok(success)` or `Err(failure)`.
    pub async fn execute_with_future<P>(
        &self,
        provider: &P,
        statement: &str,
        params: &[Value],
    ) -> Settled<RowOf<P>>
    where
        P: ConnectionProvider,
    {
        self.attempt(provider, statement, params)
            .await
            .into_result()
    }

    /// Starts the attempt on a tokio task right away and returns a handle
    /// that settles once it is done.
    pub fn spawn_with_future<P>(
        &self,
        provider: Arc<P>,
        statement: impl Into<String>,
        params: Vec<Value>,
    ) -> PendingEnvelope<RowOf<P>>
    where
        P: ConnectionProvider + 'static,
        P::Connection: 'static,
        RowOf<P>: 'static,
    {
        let executor = *self;
        let statement = statement.into();
        let handle = tokio::spawn(async move {
            executor
                .attempt(provider.as_ref(), &statement, &params)
                .await
        });
        PendingEnvelope::new(handle)
    }

    /// Acquires, runs and releases, turning errors and panics from each step
    /// into the matching envelope.
    ///
    /// Each provider call is guarded on its own, so a panic while running
    /// still leaves the connection in hand for release.
    async fn attempt<P>(&self, provider: &P, statement: &str, params: &[Value]) -> Envelope<RowOf<P>>
    where
        P: ConnectionProvider,
    {
        let mut conn = match AssertUnwindSafe(provider.acquire()).catch_unwind().await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!("Connection acquisition failed: {e}");
                return mapping::acquisition_failure(&e);
            }
            Err(payload) => {
                error!(
                    "Connection acquisition panicked: {}",
                    mapping::panic_message(payload.as_ref())
                );
                return mapping::fault();
            }
        };

        debug!(params = params.len(), "Running statement: {statement}");
        let outcome = AssertUnwindSafe(conn.run(statement, params))
            .catch_unwind()
            .await;

        // The outcome is decided; a failed release is only reported.
        match AssertUnwindSafe(conn.release()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Connection release failed: {e}"),
            Err(payload) => error!(
                "Connection release panicked: {}",
                mapping::panic_message(payload.as_ref())
            ),
        }

        match outcome {
            Ok(Ok(rows)) => {
                debug!(rows = rows.len(), "Statement succeeded");
                Envelope::success(rows)
            }
            Ok(Err(e)) => {
                warn!("Statement failed: {e}");
                mapping::execution_failure(&e, self.policy)
            }
            Err(payload) => {
                error!(
                    "Statement panicked: {}",
                    mapping::panic_message(payload.as_ref())
                );
                mapping::fault()
            }
        }
    }
}

/// [`QueryExecutor::execute_with_callback`] with the default executor.
pub async fn execute_with_callback<P, F>(
    provider: &P,
    statement: &str,
    params: &[Value],
    on_complete: F,
) where
    P: ConnectionProvider,
    F: FnOnce(Envelope<RowOf<P>>),
{
    QueryExecutor::new()
        .execute_with_callback(provider, statement, params, on_complete)
        .await
}

/// [`QueryExecutor::execute_with_future`] with the default executor.
pub async fn execute_with_future<P>(
    provider: &P,
    statement: &str,
    params: &[Value],
) -> Settled<RowOf<P>>
where
    P: ConnectionProvider,
{
    QueryExecutor::new()
        .execute_with_future(provider, statement, params)
        .await
}
