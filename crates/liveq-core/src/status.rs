#![forbid(unsafe_code)]

//! Network status codes reported by an observable query.

use serde::{Deserialize, Serialize};

/// The executor's per-query network state.
///
/// The discriminants are the executor's wire numbering; `5` is unused there
/// and stays unused here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NetworkStatus {
    /// The first request for this query is in flight.
    Loading = 1,
    /// A request triggered by a variable change is in flight.
    SetVariables = 2,
    /// A `fetch_more` request is in flight.
    FetchMore = 3,
    /// An explicit refetch is in flight.
    Refetch = 4,
    /// A poll request is in flight.
    Poll = 6,
    /// No request in flight; data is available.
    Ready = 7,
    /// No request in flight; the last request failed.
    Error = 8,
}

impl NetworkStatus {
    /// Whether a request is currently in flight.
    #[must_use]
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            NetworkStatus::Loading
                | NetworkStatus::SetVariables
                | NetworkStatus::FetchMore
                | NetworkStatus::Refetch
                | NetworkStatus::Poll
        )
    }

    /// The wire code.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}
