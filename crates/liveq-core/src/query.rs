#![forbid(unsafe_code)]

//! The observable-query interface the binding layer consumes.
//!
//! [`ObservableQuery`] is the live, stateful handle representing one
//! executing/cached operation. The binding layer owns at most one handle and
//! at most one [`Subscription`] to it per binding instance; everything else
//! about the executor (cache, normalization, transport) stays behind this
//! trait.
//!
//! # Invariants expected of implementations
//!
//! 1. Notifications are delivered to subscribers in order.
//! 2. A subscriber registered while a last-error marker is set receives that
//!    error synchronously. The binding layer's resubscription protocol
//!    (park the markers, resubscribe, restore) exists because of this.
//! 3. Dropping a [`Subscription`] stops delivery to that subscriber before
//!    the next notification.
//! 4. `apply_options` failures are also re-delivered on the subscription
//!    error channel; callers may therefore absorb the returned `Err`.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::data::ResultData;
use crate::document::QueryDocument;
use crate::error::{ExecutorError, QueryError};
use crate::policy::FetchPolicy;
use crate::result::{ExecutorSnapshot, Notification};
use crate::variables::Variables;

// ---------------------------------------------------------------------------
// Options applied to a live handle
// ---------------------------------------------------------------------------

/// The prepared, executor-facing option record.
///
/// This is the exact record option diffing compares: two executions with
/// equal `WatchOptions` must not reconfigure the live handle. Every field is
/// value-comparable; render-side concerns (skip, ssr, callbacks) never reach
/// the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    /// The operation document.
    pub document: QueryDocument,
    /// Operation variables.
    pub variables: Variables,
    /// Cache/network preference.
    pub fetch_policy: FetchPolicy,
    /// Poll interval, when polling is requested declaratively.
    pub poll_interval: Option<Duration>,
    /// Ambient request context forwarded to the transport.
    pub context: Variables,
}

// ---------------------------------------------------------------------------
// Subscription plumbing
// ---------------------------------------------------------------------------

/// The callback pair a subscriber registers.
pub struct Observer<T> {
    /// Called for every (loading, network status, data) delivery.
    pub next: Rc<dyn Fn(Notification<T>)>,
    /// Called when the query errors.
    pub error: Rc<dyn Fn(ExecutorError)>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            next: Rc::clone(&self.next),
            error: Rc::clone(&self.error),
        }
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").finish_non_exhaustive()
    }
}

/// RAII guard for an active subscription. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap a cancellation action.
    #[must_use]
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A guard with nothing to cancel.
    #[must_use]
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Unsubscribe now, consuming the guard.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Imperative request shapes
// ---------------------------------------------------------------------------

/// A `fetch_more` request: optional variable overrides plus the merge
/// function combining the previous payload with the incoming page.
pub struct FetchMoreRequest<T> {
    /// Variable overrides for the additional fetch.
    pub variables: Option<Variables>,
    /// `(previous, incoming) -> merged` payload combinator.
    pub update: Rc<dyn Fn(Option<&T>, Option<&T>) -> Option<T>>,
}

impl<T> Clone for FetchMoreRequest<T> {
    fn clone(&self) -> Self {
        Self {
            variables: self.variables.clone(),
            update: Rc::clone(&self.update),
        }
    }
}

impl<T> fmt::Debug for FetchMoreRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchMoreRequest")
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

/// A `subscribe_to_more` request: a subscription document plus the merge
/// function folding pushed events into the query payload.
pub struct SubscribeToMoreRequest<T> {
    /// The subscription operation document.
    pub document: QueryDocument,
    /// Variables for the subscription operation.
    pub variables: Option<Variables>,
    /// `(previous, event) -> merged` payload combinator.
    pub update: Rc<dyn Fn(Option<&T>, Option<&T>) -> Option<T>>,
}

impl<T> Clone for SubscribeToMoreRequest<T> {
    fn clone(&self) -> Self {
        Self {
            document: self.document.clone(),
            variables: self.variables.clone(),
            update: Rc::clone(&self.update),
        }
    }
}

impl<T> fmt::Debug for SubscribeToMoreRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeToMoreRequest")
            .field("document", &self.document)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ObservableQuery + QueryClient
// ---------------------------------------------------------------------------

/// A live, stateful handle for one executing/cached query operation.
pub trait ObservableQuery<T: ResultData> {
    /// The latest snapshot, readable synchronously at any time.
    fn current_result(&self) -> ExecutorSnapshot<T>;

    /// Register a subscriber. See the module invariants for the synchronous
    /// last-error re-delivery behavior.
    fn subscribe(&self, observer: Observer<T>) -> Subscription;

    /// Reconfigure the handle in place. Failures are also re-delivered on
    /// the subscription error channel.
    fn apply_options(&self, options: WatchOptions) -> Result<(), QueryError>;

    /// Re-execute, optionally with new variables merged over the current
    /// ones.
    fn refetch(&self, variables: Option<Variables>);

    /// Fetch an additional page and merge it into the payload.
    fn fetch_more(&self, request: FetchMoreRequest<T>);

    /// Rewrite the cached payload in place. `map` receives the current
    /// payload and the current variables.
    fn update_query(&self, map: &dyn Fn(Option<&T>, &Variables) -> Option<T>);

    /// Start polling at `interval`.
    fn start_polling(&self, interval: Duration);

    /// Stop polling.
    fn stop_polling(&self);

    /// Attach a subscription operation whose events merge into this query's
    /// payload.
    fn subscribe_to_more(&self, request: SubscribeToMoreRequest<T>) -> Subscription;

    /// Clear stored query-level errors so a later clean response is not
    /// shadowed by a stale error marker.
    fn reset_query_store_errors(&self);

    /// The last-error marker, if set.
    fn last_error(&self) -> Option<QueryError>;

    /// The last-result marker, if set.
    fn last_result(&self) -> Option<ExecutorSnapshot<T>>;

    /// Clear both markers.
    fn reset_last_results(&self);

    /// Restore previously captured markers. Together with
    /// [`reset_last_results`](ObservableQuery::reset_last_results) this
    /// supports the resubscription protocol: park the markers so a fresh
    /// subscriber does not refire, then put them back.
    fn restore_last_results(
        &self,
        error: Option<QueryError>,
        result: Option<ExecutorSnapshot<T>>,
    );

    /// The handle's current variables.
    fn variables(&self) -> Variables;

    /// The handle's current fetch policy.
    fn fetch_policy(&self) -> FetchPolicy;
}

/// The query executor's entry point: turn prepared options into a live
/// observable handle.
pub trait QueryClient<T: ResultData> {
    /// Create (or reuse, at the executor's discretion) a live query handle.
    fn watch_query(&self, options: WatchOptions) -> Rc<dyn ObservableQuery<T>>;
}

/// A shared client reference attachable to render-facing snapshots.
///
/// Identity is pointer identity: two handles compare equal iff they wrap the
/// same client instance.
pub struct ClientHandle<T: ResultData> {
    client: Rc<dyn QueryClient<T>>,
}

impl<T: ResultData> ClientHandle<T> {
    /// Wrap a client.
    #[must_use]
    pub fn new(client: Rc<dyn QueryClient<T>>) -> Self {
        Self { client }
    }

    /// The wrapped client.
    #[must_use]
    pub fn client(&self) -> &Rc<dyn QueryClient<T>> {
        &self.client
    }

    /// Whether both handles wrap the same client instance.
    #[must_use]
    pub fn same_client(&self, other: &ClientHandle<T>) -> bool {
        Rc::ptr_eq(&self.client, &other.client)
    }
}

impl<T: ResultData> Clone for ClientHandle<T> {
    fn clone(&self) -> Self {
        Self {
            client: Rc::clone(&self.client),
        }
    }
}

impl<T: ResultData> fmt::Debug for ClientHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn subscription_cancels_on_drop() {
        let cancelled = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancelled);
        let sub = Subscription::new(move || flag.set(true));
        assert!(!cancelled.get());
        drop(sub);
        assert!(cancelled.get());
    }

    #[test]
    fn subscription_explicit_unsubscribe() {
        let cancelled = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancelled);
        let sub = Subscription::new(move || flag.set(true));
        sub.unsubscribe();
        assert!(cancelled.get());
    }

    #[test]
    fn empty_subscription_is_inert() {
        let sub = Subscription::empty();
        drop(sub);
    }

    #[test]
    fn watch_options_value_equality() {
        let doc = QueryDocument::new("Hero", "query Hero { hero { name } }");
        let a = WatchOptions {
            document: doc.clone(),
            variables: Variables::new(),
            fetch_policy: FetchPolicy::CacheFirst,
            poll_interval: None,
            context: Variables::new(),
        };
        let b = a.clone();
        assert_eq!(a, b);

        let mut c = a.clone();
        c.fetch_policy = FetchPolicy::NetworkOnly;
        assert_ne!(a, c);
    }
}
