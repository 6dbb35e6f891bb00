//! db-relay - A uniform query-execution facade over pooled database connections.
//!
//! Statements go through a [`query::QueryExecutor`], which acquires a pooled
//! connection from a [`db::ConnectionProvider`], runs the statement, releases
//! the connection and reports an [`envelope::Envelope`] either to a callback
//! or as a settled future.

pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod query;

pub use envelope::{Envelope, Status};
pub use error::{RelayError, Result};
pub use query::{execute_with_callback, execute_with_future, MessagePolicy, QueryExecutor};
