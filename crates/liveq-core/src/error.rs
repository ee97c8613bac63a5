#![forbid(unsafe_code)]

//! Error taxonomy for the query boundary.
//!
//! Three kinds, with very different handling downstream:
//!
//! - [`QueryError`]: query-level, structured, recoverable. Wraps a non-empty
//!   ordered list of [`GraphError`]s. Surfaced in the render-facing snapshot
//!   and triggers transparent resubscription.
//! - [`TransportFault`]: everything the subscription error channel delivers
//!   that is *not* query-shaped. Not recoverable here; re-raised to the host
//!   rendering layer's fault boundary.
//! - [`ExecutorError`]: the union the error channel actually carries.
//!
//! Errors are compared by deep equality: the binding layer suppresses
//! re-renders for an error identical to the one already rendered.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// One upstream error as reported by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphError {
    /// Human-readable message.
    pub message: String,
    /// Response path the error applies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
    /// Free-form extension payload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphError {
    /// A message-only error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A query-level error: a non-empty ordered list of upstream errors.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("query failed: {}", self.summary())]
pub struct QueryError {
    graph_errors: Vec<GraphError>,
}

impl QueryError {
    /// Wrap a list of upstream errors. `errors` must be non-empty; use
    /// [`QueryError::try_from_errors`] when the list may be empty.
    #[must_use]
    pub fn new(errors: Vec<GraphError>) -> Self {
        debug_assert!(!errors.is_empty(), "QueryError requires at least one error");
        Self {
            graph_errors: errors,
        }
    }

    /// Wrap a possibly-empty list; `None` when there is nothing to wrap.
    #[must_use]
    pub fn try_from_errors(errors: Vec<GraphError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self::new(errors))
        }
    }

    /// A single message-only error.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(vec![GraphError::new(message)])
    }

    /// The wrapped upstream errors, in delivery order. Never empty.
    #[must_use]
    pub fn graph_errors(&self) -> &[GraphError] {
        &self.graph_errors
    }

    fn summary(&self) -> String {
        self.graph_errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A non-query-shaped failure from the subscription error channel.
///
/// Transport breakdowns, programming faults in the executor, anything that
/// does not carry structured query errors. The binding layer re-raises these
/// to the host instead of absorbing them.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("transport fault: {message}")]
pub struct TransportFault {
    /// Description of the fault.
    pub message: String,
}

impl TransportFault {
    /// Create a fault from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// What the subscription error channel delivers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutorError {
    /// Query-level: recoverable, surfaced in the snapshot.
    #[error(transparent)]
    Query(QueryError),
    /// Transport/programming fault: re-raised to the host.
    #[error(transparent)]
    Fault(TransportFault),
}
