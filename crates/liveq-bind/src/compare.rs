#![forbid(unsafe_code)]

//! The render/suppress comparator for push notifications.
//!
//! Every notification from the observable query is classified against the
//! previously rendered snapshot before a render is requested. The comparator
//! is a pure function over `(loading, network status, data)` pairs so the
//! suppression policy can be tested without any subscription plumbing.
//!
//! # Invariants
//!
//! 1. With no previous snapshot, every notification renders.
//! 2. A notification deeply equal to the previous snapshot never renders.
//! 3. While a fetch-more is in flight, a notification whose data equals the
//!    already-rendered data never renders, regardless of its own loading or
//!    status fields. (`fetch_more` reports once before the caller's merge
//!    function finishes; rendering that artifact would show pre-merge data.)

use liveq_core::{NetworkStatus, Notification};

/// What to do with one push notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDecision {
    /// The notification carries a new state; request a render.
    Render,
    /// Pre-merge fetch-more artifact; drop without rendering.
    SuppressFetchMoreArtifact,
    /// Deeply equal to what is already rendered; drop without rendering.
    SuppressDuplicate,
}

impl NotifyDecision {
    /// Whether this decision requests a render.
    #[must_use]
    pub fn should_render(self) -> bool {
        matches!(self, NotifyDecision::Render)
    }
}

/// Classify `incoming` against the previously rendered state.
///
/// `prev_loading`, `prev_status`, `prev_data` describe the snapshot the
/// rendering unit last saw. Callers with no previous snapshot should render
/// unconditionally instead of calling this.
#[must_use]
pub fn classify_notification<T: PartialEq>(
    prev_loading: bool,
    prev_status: NetworkStatus,
    prev_data: Option<&T>,
    incoming: &Notification<T>,
) -> NotifyDecision {
    let same_data = prev_data == incoming.data.as_ref();

    if prev_loading && prev_status == NetworkStatus::FetchMore && same_data {
        return NotifyDecision::SuppressFetchMoreArtifact;
    }

    if prev_loading == incoming.loading && prev_status == incoming.network_status && same_data {
        return NotifyDecision::SuppressDuplicate;
    }

    NotifyDecision::Render
}
