//! The result envelope delivered for every execution attempt.
//!
//! An envelope is either a Success carrying the returned rows and their count,
//! or a Failure carrying only a message. The fields are private so that the
//! two shapes can only be produced by [`Envelope::success`] and
//! [`Envelope::failure`]; deserialized envelopes are validated the same way.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Message attached to every Success envelope.
pub const MSG_SUCCEEDED: &str = "operation succeeded";

/// Message for a Failure caused by connection acquisition.
pub const MSG_CONNECTION_FAILED: &str = "connection failed";

/// Generic message for a Failure caused by statement execution.
pub const MSG_OPERATION_FAILED: &str = "operation failed";

/// Message for a Failure caused by any other fault during the attempt.
pub const MSG_EXCEPTION: &str = "operation exception";

/// Outcome status. Serialized as `0` (Failure) or `1` (Success).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Status {
    #[default]
    Failure,
    Success,
}

impl Status {
    /// Wire code of the status.
    pub fn code(self) -> u8 {
        match self {
            Self::Failure => 0,
            Self::Success => 1,
        }
    }

    /// Parses a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Failure),
            1 => Some(Self::Success),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure => write!(f, "failure"),
            Self::Success => write!(f, "success"),
        }
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u8::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| D::Error::custom(format!("invalid status {code}, expected 0 or 1")))
    }
}

/// Normalized outcome of one execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope<R>")]
#[serde(bound(deserialize = "R: Deserialize<'de>"))]
pub struct Envelope<R> {
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Vec<R>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    message: String,
}

impl<R> Envelope<R> {
    /// Builds a Success envelope from the returned rows.
    pub fn success(rows: Vec<R>) -> Self {
        Self {
            status: Status::Success,
            count: Some(rows.len()),
            data: Some(rows),
            message: MSG_SUCCEEDED.to_string(),
        }
    }

    /// Builds a Failure envelope. An empty message is replaced with the
    /// generic "operation failed".
    pub fn failure(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = MSG_OPERATION_FAILED.to_string();
        }
        Self {
            status: Status::Failure,
            data: None,
            count: None,
            message,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returned rows; `None` on Failure.
    pub fn data(&self) -> Option<&[R]> {
        self.data.as_deref()
    }

    /// Number of returned rows; `None` on Failure.
    pub fn count(&self) -> Option<usize> {
        self.count
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Consumes the envelope, returning the rows of a Success.
    pub fn into_data(self) -> Option<Vec<R>> {
        self.data
    }

    /// Splits the envelope into the settled shape used by the future-style
    /// protocol: `Ok` for Success, `Err` for Failure.
    pub fn into_result(self) -> Result<Self, Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self)
        }
    }

    /// Maps each row, keeping status and message.
    pub fn map_rows<U, F>(self, f: F) -> Envelope<U>
    where
        F: FnMut(R) -> U,
    {
        Envelope {
            status: self.status,
            data: self.data.map(|rows| rows.into_iter().map(f).collect()),
            count: self.count,
            message: self.message,
        }
    }
}

/// Unvalidated wire form. `number` is accepted as a legacy name for `count`.
#[derive(Deserialize)]
struct RawEnvelope<R> {
    status: Status,
    data: Option<Vec<R>>,
    #[serde(alias = "number")]
    count: Option<usize>,
    message: String,
}

impl<R> TryFrom<RawEnvelope<R>> for Envelope<R> {
    type Error = String;

    fn try_from(raw: RawEnvelope<R>) -> Result<Self, Self::Error> {
        if raw.message.is_empty() {
            return Err("envelope message must not be empty".to_string());
        }

        match raw.status {
            Status::Success => {
                let data = raw
                    .data
                    .ok_or_else(|| "success envelope without data".to_string())?;
                if let Some(count) = raw.count {
                    if count != data.len() {
                        return Err(format!(
                            "count {count} does not match {} data rows",
                            data.len()
                        ));
                    }
                }
                Ok(Self {
                    status: Status::Success,
                    count: Some(data.len()),
                    data: Some(data),
                    message: raw.message,
                })
            }
            Status::Failure => {
                if raw.data.is_some() || raw.count.is_some() {
                    return Err("failure envelope must not carry data or count".to_string());
                }
                Ok(Self {
                    status: Status::Failure,
                    data: None,
                    count: None,
                    message: raw.message,
                })
            }
        }
    }
}
