#![forbid(unsafe_code)]

//! Executor-side result shapes.

use crate::error::{GraphError, QueryError};
use crate::status::NetworkStatus;

/// What [`ObservableQuery::current_result`] reports.
///
/// `errors` is the raw upstream error list; `error` is a pre-wrapped
/// query-level error some executors report instead. The binding layer folds
/// the two into one (`errors` wins when non-empty).
///
/// `partial` marks a cache read that could not fully satisfy the query's
/// requested fields.
///
/// [`ObservableQuery::current_result`]: crate::query::ObservableQuery::current_result
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSnapshot<T> {
    /// Whether a request for this query is in flight.
    pub loading: bool,
    /// The executor's network state for this query.
    pub network_status: NetworkStatus,
    /// The current payload, if any.
    pub data: Option<T>,
    /// Raw upstream errors, in delivery order.
    pub errors: Vec<GraphError>,
    /// Pre-wrapped query-level error, if the executor reports one.
    pub error: Option<QueryError>,
    /// Whether `data` came from a partial cache read.
    pub partial: bool,
}

impl<T> ExecutorSnapshot<T> {
    /// A first-request-in-flight snapshot.
    #[must_use]
    pub fn loading() -> Self {
        Self {
            loading: true,
            network_status: NetworkStatus::Loading,
            data: None,
            errors: Vec::new(),
            error: None,
            partial: false,
        }
    }

    /// A settled snapshot with data.
    #[must_use]
    pub fn ready(data: T) -> Self {
        Self {
            loading: false,
            network_status: NetworkStatus::Ready,
            data: Some(data),
            errors: Vec::new(),
            error: None,
            partial: false,
        }
    }

    /// A settled snapshot carrying upstream errors.
    #[must_use]
    pub fn failed(errors: Vec<GraphError>) -> Self {
        Self {
            loading: false,
            network_status: NetworkStatus::Error,
            data: None,
            errors,
            error: None,
            partial: false,
        }
    }
}

/// One push delivery from an observable query to its subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification<T> {
    /// Whether a request is in flight.
    pub loading: bool,
    /// The executor's network state.
    pub network_status: NetworkStatus,
    /// The payload delivered with this notification, if any.
    pub data: Option<T>,
}

impl<T: Clone> From<&ExecutorSnapshot<T>> for Notification<T> {
    fn from(snapshot: &ExecutorSnapshot<T>) -> Self {
        Self {
            loading: snapshot.loading,
            network_status: snapshot.network_status,
            data: snapshot.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn constructors() {
        let l: ExecutorSnapshot<Value> = ExecutorSnapshot::loading();
        assert!(l.loading);
        assert_eq!(l.network_status, NetworkStatus::Loading);
        assert!(l.data.is_none());

        let r = ExecutorSnapshot::ready(json!({ "a": 1 }));
        assert!(!r.loading);
        assert_eq!(r.network_status, NetworkStatus::Ready);

        let f: ExecutorSnapshot<Value> = ExecutorSnapshot::failed(vec![GraphError::new("x")]);
        assert_eq!(f.network_status, NetworkStatus::Error);
        assert_eq!(f.errors.len(), 1);
    }

    #[test]
    fn notification_from_snapshot() {
        let snapshot = ExecutorSnapshot::ready(json!({ "a": 1 }));
        let n = Notification::from(&snapshot);
        assert!(!n.loading);
        assert_eq!(n.network_status, NetworkStatus::Ready);
        assert_eq!(n.data, Some(json!({ "a": 1 })));
    }
}
