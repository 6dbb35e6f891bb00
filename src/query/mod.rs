//! Query execution for db-relay.
//!
//! This module holds the executor, its two completion protocols and the
//! mapping from faults to envelopes that they share.

pub mod executor;
pub mod mapping;
mod pending;

pub use executor::{execute_with_callback, execute_with_future, QueryExecutor, Settled};
pub use mapping::MessagePolicy;
pub use pending::PendingEnvelope;
