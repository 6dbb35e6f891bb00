//! Error-to-envelope mapping shared by both completion protocols.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, MSG_CONNECTION_FAILED, MSG_EXCEPTION, MSG_OPERATION_FAILED};
use crate::error::RelayError;

/// How much driver detail an execution failure exposes in its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePolicy {
    /// Use the driver's message, falling back to "operation failed".
    #[default]
    PassThrough,
    /// Always "operation failed".
    Generic,
}

/// Failure for an error raised while acquiring. The driver detail only goes
/// to the logs.
pub fn acquisition_failure<R>(err: &RelayError) -> Envelope<R> {
    match err {
        RelayError::Unexpected(_) => Envelope::failure(MSG_EXCEPTION),
        _ => Envelope::failure(MSG_CONNECTION_FAILED),
    }
}

/// Failure for an error raised while running the statement.
pub fn execution_failure<R>(err: &RelayError, policy: MessagePolicy) -> Envelope<R> {
    match (err, policy) {
        (RelayError::Unexpected(_), _) => Envelope::failure(MSG_EXCEPTION),
        (_, MessagePolicy::PassThrough) => Envelope::failure(err.detail()),
        (_, MessagePolicy::Generic) => Envelope::failure(MSG_OPERATION_FAILED),
    }
}

/// Failure for a panic or a lost task.
pub fn fault<R>() -> Envelope<R> {
    Envelope::failure(MSG_EXCEPTION)
}

/// Best-effort text of a panic payload, for logging.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
