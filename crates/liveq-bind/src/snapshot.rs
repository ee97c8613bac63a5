#![forbid(unsafe_code)]

//! The render-facing result snapshot and its synthesizer.
//!
//! [`QuerySnapshot`] is what the rendering unit consumes: one coherent view
//! of loading/error/data state plus the imperative action bundle and a
//! client reference. Synthesis reconciles the observable handle's latest
//! state with the previously rendered snapshot:
//!
//! 1. Skipped bindings report an empty, settled snapshot.
//! 2. A non-empty upstream error list is folded into one query-level error.
//! 3. While loading, displayed data is the shallow merge of the previous
//!    payload and whatever has already arrived — a background refetch never
//!    flashes empty content.
//! 4. On error, displayed data is the handle's last known good payload,
//!    never the failed attempt.
//! 5. A settled partial cache read with no data triggers the one-shot
//!    partial-refetch recovery when the policy allows it.

use tracing::debug;

use liveq_core::{
    ClientHandle, FetchPolicy, NetworkStatus, ObservableQuery, QueryError, ResultData, Variables,
};

use crate::actions::QueryActions;
use crate::options::EffectiveOptions;

/// The externally visible result of one query binding.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T: ResultData> {
    /// Whether a request is in flight.
    pub loading: bool,
    /// The executor's network state.
    pub network_status: NetworkStatus,
    /// Displayed payload, per the merge rules above.
    pub data: Option<T>,
    /// The current query-level error, if any.
    pub error: Option<QueryError>,
    /// Whether this binding has ever executed. `false` only for a lazy
    /// binding that has not been triggered.
    pub called: bool,
    /// The variables this snapshot was produced under.
    pub variables: Variables,
    /// Imperative actions, stable while the handle is unchanged.
    pub actions: QueryActions<T>,
    /// The owning query client.
    pub client: ClientHandle<T>,
}

impl<T: ResultData> QuerySnapshot<T> {
    /// Snapshot for a lazy binding that has not been triggered.
    #[must_use]
    pub(crate) fn idle(variables: Variables, client: ClientHandle<T>) -> Self {
        Self {
            loading: false,
            network_status: NetworkStatus::Ready,
            data: None,
            error: None,
            called: false,
            variables,
            actions: QueryActions::detached(),
            client,
        }
    }

    /// Snapshot for a skipped execution.
    #[must_use]
    pub(crate) fn skipped(
        variables: Variables,
        actions: QueryActions<T>,
        client: ClientHandle<T>,
    ) -> Self {
        Self {
            loading: false,
            network_status: NetworkStatus::Ready,
            data: None,
            error: None,
            called: true,
            variables,
            actions,
            client,
        }
    }

    /// Placeholder returned during a server render pass.
    #[must_use]
    pub(crate) fn server_loading(
        variables: Variables,
        actions: QueryActions<T>,
        client: ClientHandle<T>,
    ) -> Self {
        Self {
            loading: true,
            network_status: NetworkStatus::Loading,
            data: None,
            error: None,
            called: true,
            variables,
            actions,
            client,
        }
    }
}

/// Synthesize the snapshot for a live (non-skipped) execution.
///
/// `previous_data` is the payload of the previously rendered snapshot; it
/// feeds the loading-state merge. The partial-refetch recovery issues its
/// refetch through `actions` before returning.
pub(crate) fn synthesize_active<T: ResultData>(
    handle: &dyn ObservableQuery<T>,
    options: &EffectiveOptions<T>,
    previous_data: Option<&T>,
    actions: QueryActions<T>,
    client: ClientHandle<T>,
) -> QuerySnapshot<T> {
    let current = handle.current_result();

    // Fold raw upstream errors into one query-level error; a pre-wrapped
    // error from the executor is used as-is otherwise.
    let error = QueryError::try_from_errors(current.errors.clone()).or(current.error.clone());

    let mut loading = current.loading;
    let mut network_status = current.network_status;
    let data;

    if loading {
        // Keep last-known fields visible while the request is in flight,
        // folding in whatever has already arrived.
        data = match (previous_data, current.data.as_ref()) {
            (Some(prev), Some(new)) => Some(T::shallow_merge(prev, new)),
            (Some(prev), None) => Some(prev.clone()),
            (None, new) => new.cloned(),
        };
    } else if error.is_some() {
        // A transient error must not blank out previously rendered content:
        // show the last known good payload, never the failed attempt.
        data = handle.last_result().and_then(|r| r.data);
    } else if options.partial_refetch
        && current.data.is_none()
        && current.partial
        && handle.fetch_policy() != FetchPolicy::CacheOnly
    {
        // Cache-miss-after-mutation: the cache can no longer satisfy the
        // query's fields. Report loading and issue exactly one refetch.
        debug!(document = %options.document, "partial cache result with no data; refetching");
        loading = true;
        network_status = NetworkStatus::Loading;
        actions.refetch(None);
        data = None;
    } else {
        data = current.data.clone();
    }

    QuerySnapshot {
        loading,
        network_status,
        data,
        error,
        called: true,
        variables: handle.variables(),
        actions,
        client,
    }
}
