#![forbid(unsafe_code)]

//! Imperative action bindings with stable identity.
//!
//! [`QueryActions`] bundles the imperative surface of the current observable
//! handle (refetch, fetch-more, update-in-place, polling control,
//! subscribe-to-more). The bundle is memoized by handle identity: as long as
//! the binding keeps the same live handle, every render sees the *same*
//! bundle, so callers may store it in effect dependency lists without
//! triggering spurious re-subscriptions. The bundle is rebuilt only when the
//! handle is replaced.
//!
//! A binding that is skipped (or lazy and not yet triggered) has no handle;
//! its bundle is *detached* — actions log a warning and no-op rather than
//! panic, mirroring a render that races an imperative call.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::warn;

use liveq_core::{
    FetchMoreRequest, ObservableQuery, ResultData, SubscribeToMoreRequest, Subscription,
    Variables,
};

/// The imperative action surface of one query binding.
pub struct QueryActions<T: ResultData> {
    handle: Option<Rc<dyn ObservableQuery<T>>>,
}

impl<T: ResultData> Clone for QueryActions<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.as_ref().map(Rc::clone),
        }
    }
}

impl<T: ResultData> fmt::Debug for QueryActions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryActions")
            .field("detached", &self.is_detached())
            .finish()
    }
}

impl<T: ResultData> QueryActions<T> {
    /// A bundle with no handle behind it.
    #[must_use]
    pub fn detached() -> Self {
        Self { handle: None }
    }

    /// A bundle bound to `handle`.
    #[must_use]
    pub fn bound(handle: Rc<dyn ObservableQuery<T>>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Reuse `cached` when it is already keyed to `handle`; otherwise build
    /// a fresh bundle. This is the memoization point that gives actions
    /// stable identity across renders.
    #[must_use]
    pub(crate) fn for_handle(
        cached: Option<&QueryActions<T>>,
        handle: Option<&Rc<dyn ObservableQuery<T>>>,
    ) -> QueryActions<T> {
        if let Some(cached) = cached {
            let matches = match (&cached.handle, handle) {
                (None, None) => true,
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                _ => false,
            };
            if matches {
                return cached.clone();
            }
        }
        match handle {
            Some(handle) => Self::bound(Rc::clone(handle)),
            None => Self::detached(),
        }
    }

    /// Whether there is no live handle behind this bundle.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.handle.is_none()
    }

    /// Whether both bundles drive the same live handle (or are both
    /// detached). This is the identity callers can key dependency lists on.
    #[must_use]
    pub fn same_handle(&self, other: &QueryActions<T>) -> bool {
        match (&self.handle, &other.handle) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Re-execute the query, optionally with new variables merged over the
    /// current ones.
    pub fn refetch(&self, variables: Option<Variables>) {
        match &self.handle {
            Some(handle) => handle.refetch(variables),
            None => warn!("refetch called before the query started; ignoring"),
        }
    }

    /// Fetch an additional page and merge it into the payload.
    pub fn fetch_more(&self, request: FetchMoreRequest<T>) {
        match &self.handle {
            Some(handle) => handle.fetch_more(request),
            None => warn!("fetch_more called before the query started; ignoring"),
        }
    }

    /// Rewrite the cached payload in place.
    pub fn update_query(&self, map: &dyn Fn(Option<&T>, &Variables) -> Option<T>) {
        match &self.handle {
            Some(handle) => handle.update_query(map),
            None => warn!("update_query called before the query started; ignoring"),
        }
    }

    /// Start polling at `interval`.
    pub fn start_polling(&self, interval: Duration) {
        match &self.handle {
            Some(handle) => handle.start_polling(interval),
            None => warn!("start_polling called before the query started; ignoring"),
        }
    }

    /// Stop polling.
    pub fn stop_polling(&self) {
        match &self.handle {
            Some(handle) => handle.stop_polling(),
            None => warn!("stop_polling called before the query started; ignoring"),
        }
    }

    /// Attach a subscription operation to this query. Returns `None` when
    /// detached.
    #[must_use]
    pub fn subscribe_to_more(&self, request: SubscribeToMoreRequest<T>) -> Option<Subscription> {
        match &self.handle {
            Some(handle) => Some(handle.subscribe_to_more(request)),
            None => {
                warn!("subscribe_to_more called before the query started; ignoring");
                None
            }
        }
    }
}
