//! Eagerly started attempt that settles once.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::error;

use super::mapping;
use crate::envelope::Envelope;

/// Handle to an attempt running on its own tokio task.
///
/// Resolves to `Ok` with the Success envelope or `Err` with the Failure
/// envelope. Dropping the handle does not cancel the attempt.
#[derive(Debug)]
pub struct PendingEnvelope<R> {
    handle: JoinHandle<Envelope<R>>,
}

impl<R> PendingEnvelope<R> {
    pub(crate) fn new(handle: JoinHandle<Envelope<R>>) -> Self {
        Self { handle }
    }
}

impl<R> Future for PendingEnvelope<R> {
    type Output = Result<Envelope<R>, Envelope<R>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.handle.poll_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(envelope)) => Poll::Ready(envelope.into_result()),
            Poll::Ready(Err(join_error)) => {
                error!("Attempt task ended without an outcome: {join_error}");
                Poll::Ready(Err(mapping::fault()))
            }
        }
    }
}
