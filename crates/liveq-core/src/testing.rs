#![forbid(unsafe_code)]

//! Scriptable fake executor for driving the binding layer in tests.
//!
//! [`FakeQuery`] implements [`ObservableQuery`] over in-memory state. Tests
//! hold a clone of the fake and script it: set the current snapshot, push
//! notifications or errors, and assert on the imperative calls the binding
//! layer made (refetches, option applications, marker resets, polling).
//!
//! Behavioral fidelity that matters to the binding layer:
//!
//! 1. A subscriber registered while the last-error marker is set receives
//!    that error synchronously (the refire the resubscription protocol has
//!    to defuse).
//! 2. Notifications are delivered to a snapshot of the subscriber list, so
//!    a callback may unsubscribe/resubscribe mid-delivery.
//! 3. `push` records the delivered snapshot as the last-result marker, and
//!    `push_error` records the last-error marker, like a real executor.
//!
//! Nothing here fetches anything: `refetch`/`fetch_more` only record the
//! call, and tests push the follow-up notifications themselves.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::data::ResultData;
use crate::error::{ExecutorError, QueryError, TransportFault};
use crate::policy::FetchPolicy;
use crate::query::{
    FetchMoreRequest, ObservableQuery, Observer, QueryClient, SubscribeToMoreRequest,
    Subscription, WatchOptions,
};
use crate::result::{ExecutorSnapshot, Notification};
use crate::variables::Variables;

// ---------------------------------------------------------------------------
// FakeQuery
// ---------------------------------------------------------------------------

struct FakeQueryState<T: ResultData> {
    current: RefCell<ExecutorSnapshot<T>>,
    variables: RefCell<Variables>,
    fetch_policy: Cell<FetchPolicy>,

    observers: RefCell<Vec<(u64, Observer<T>)>>,
    next_observer_id: Cell<u64>,
    subscribe_count: Cell<u64>,

    last_error: RefCell<Option<QueryError>>,
    last_result: RefCell<Option<ExecutorSnapshot<T>>>,
    reset_last_calls: Cell<u64>,
    restore_last_calls: Cell<u64>,

    applied_options: RefCell<Vec<WatchOptions>>,
    apply_outcome: RefCell<Result<(), QueryError>>,

    refetch_calls: RefCell<Vec<Option<Variables>>>,
    fetch_more_calls: RefCell<Vec<Option<Variables>>>,
    subscribe_to_more_calls: Cell<u64>,
    store_error_resets: Cell<u64>,
    polling: RefCell<Option<Duration>>,
}

/// A scriptable in-memory [`ObservableQuery`].
///
/// Clones share state; keep one in the test and hand
/// [`handle`](FakeQuery::handle) to the code under test.
pub struct FakeQuery<T: ResultData> {
    state: Rc<FakeQueryState<T>>,
}

impl<T: ResultData> Clone for FakeQuery<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: ResultData> FakeQuery<T> {
    /// A fake whose current result is `initial`.
    #[must_use]
    pub fn new(initial: ExecutorSnapshot<T>) -> Self {
        Self {
            state: Rc::new(FakeQueryState {
                current: RefCell::new(initial),
                variables: RefCell::new(Variables::new()),
                fetch_policy: Cell::new(FetchPolicy::default()),
                observers: RefCell::new(Vec::new()),
                next_observer_id: Cell::new(1),
                subscribe_count: Cell::new(0),
                last_error: RefCell::new(None),
                last_result: RefCell::new(None),
                reset_last_calls: Cell::new(0),
                restore_last_calls: Cell::new(0),
                applied_options: RefCell::new(Vec::new()),
                apply_outcome: RefCell::new(Ok(())),
                refetch_calls: RefCell::new(Vec::new()),
                fetch_more_calls: RefCell::new(Vec::new()),
                subscribe_to_more_calls: Cell::new(0),
                store_error_resets: Cell::new(0),
                polling: RefCell::new(None),
            }),
        }
    }

    /// A fake created from prepared options, as a client would build it.
    #[must_use]
    pub fn from_options(options: &WatchOptions) -> Self {
        let fake = Self::new(ExecutorSnapshot::loading());
        *fake.state.variables.borrow_mut() = options.variables.clone();
        fake.state.fetch_policy.set(options.fetch_policy);
        fake
    }

    /// This fake as a shared trait object.
    #[must_use]
    pub fn handle(&self) -> Rc<dyn ObservableQuery<T>> {
        Rc::new(self.clone())
    }

    // -- scripting ----------------------------------------------------------

    /// Replace the current snapshot without notifying anyone.
    pub fn set_current(&self, snapshot: ExecutorSnapshot<T>) {
        *self.state.current.borrow_mut() = snapshot;
    }

    /// Deliver `snapshot`: update the current result, record the
    /// last-result marker, and notify subscribers.
    pub fn push(&self, snapshot: ExecutorSnapshot<T>) {
        let notification = Notification::from(&snapshot);
        *self.state.last_result.borrow_mut() = Some(snapshot.clone());
        *self.state.current.borrow_mut() = snapshot;
        self.notify_next(&notification);
    }

    /// Deliver a query-level error: record the last-error marker, settle the
    /// current result into the error state, and notify subscribers.
    pub fn push_error(&self, error: QueryError) {
        *self.state.last_error.borrow_mut() = Some(error.clone());
        {
            let mut current = self.state.current.borrow_mut();
            current.loading = false;
            current.network_status = crate::status::NetworkStatus::Error;
            current.error = Some(error.clone());
        }
        self.notify_error(ExecutorError::Query(error));
    }

    /// Deliver a transport fault. No marker is recorded.
    pub fn push_fault(&self, fault: TransportFault) {
        self.notify_error(ExecutorError::Fault(fault));
    }

    /// Configure the outcome of the next `apply_options` calls.
    pub fn set_apply_outcome(&self, outcome: Result<(), QueryError>) {
        *self.state.apply_outcome.borrow_mut() = outcome;
    }

    // -- assertions ---------------------------------------------------------

    /// Variables passed to `refetch`, in call order.
    #[must_use]
    pub fn refetch_calls(&self) -> Vec<Option<Variables>> {
        self.state.refetch_calls.borrow().clone()
    }

    /// Variables passed to `fetch_more`, in call order.
    #[must_use]
    pub fn fetch_more_calls(&self) -> Vec<Option<Variables>> {
        self.state.fetch_more_calls.borrow().clone()
    }

    /// Option records applied via `apply_options`, in call order.
    #[must_use]
    pub fn applied_options(&self) -> Vec<WatchOptions> {
        self.state.applied_options.borrow().clone()
    }

    /// Total `subscribe` calls ever made.
    #[must_use]
    pub fn subscribe_count(&self) -> u64 {
        self.state.subscribe_count.get()
    }

    /// Currently registered subscribers.
    #[must_use]
    pub fn active_subscribers(&self) -> usize {
        self.state.observers.borrow().len()
    }

    /// Total `reset_query_store_errors` calls.
    #[must_use]
    pub fn store_error_resets(&self) -> u64 {
        self.state.store_error_resets.get()
    }

    /// Total `reset_last_results` calls.
    #[must_use]
    pub fn reset_last_calls(&self) -> u64 {
        self.state.reset_last_calls.get()
    }

    /// Total `restore_last_results` calls.
    #[must_use]
    pub fn restore_last_calls(&self) -> u64 {
        self.state.restore_last_calls.get()
    }

    /// Total `subscribe_to_more` calls.
    #[must_use]
    pub fn subscribe_to_more_calls(&self) -> u64 {
        self.state.subscribe_to_more_calls.get()
    }

    /// The active poll interval, if polling.
    #[must_use]
    pub fn polling(&self) -> Option<Duration> {
        *self.state.polling.borrow()
    }

    // -- delivery -----------------------------------------------------------

    fn notify_next(&self, notification: &Notification<T>) {
        // Snapshot the subscriber list first: a callback may unsubscribe or
        // resubscribe while we deliver.
        let observers: Vec<Observer<T>> = self
            .state
            .observers
            .borrow()
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        for observer in observers {
            (observer.next)(notification.clone());
        }
    }

    fn notify_error(&self, error: ExecutorError) {
        let observers: Vec<Observer<T>> = self
            .state
            .observers
            .borrow()
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        for observer in observers {
            (observer.error)(error.clone());
        }
    }
}

impl<T: ResultData> ObservableQuery<T> for FakeQuery<T> {
    fn current_result(&self) -> ExecutorSnapshot<T> {
        self.state.current.borrow().clone()
    }

    fn subscribe(&self, observer: Observer<T>) -> Subscription {
        let id = self.state.next_observer_id.get();
        self.state.next_observer_id.set(id + 1);
        self.state.subscribe_count.set(self.state.subscribe_count.get() + 1);
        self.state.observers.borrow_mut().push((id, observer.clone()));

        // A set last-error marker refires synchronously at the new
        // subscriber, exactly like the real executor.
        let refire = self.state.last_error.borrow().clone();
        if let Some(error) = refire {
            (observer.error)(ExecutorError::Query(error));
        }

        let state = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.observers.borrow_mut().retain(|(sid, _)| *sid != id);
            }
        })
    }

    fn apply_options(&self, options: WatchOptions) -> Result<(), QueryError> {
        self.state.applied_options.borrow_mut().push(options.clone());
        *self.state.variables.borrow_mut() = options.variables;
        self.state.fetch_policy.set(options.fetch_policy);
        self.state.apply_outcome.borrow().clone()
    }

    fn refetch(&self, variables: Option<Variables>) {
        if let Some(vars) = &variables {
            let merged = self.state.variables.borrow().merged(vars);
            *self.state.variables.borrow_mut() = merged;
        }
        self.state.refetch_calls.borrow_mut().push(variables);
    }

    fn fetch_more(&self, request: FetchMoreRequest<T>) {
        self.state.fetch_more_calls.borrow_mut().push(request.variables);
    }

    fn update_query(&self, map: &dyn Fn(Option<&T>, &Variables) -> Option<T>) {
        let variables = self.state.variables.borrow().clone();
        let mapped = {
            let current = self.state.current.borrow();
            map(current.data.as_ref(), &variables)
        };
        let snapshot = {
            let mut current = self.state.current.borrow_mut();
            current.data = mapped;
            current.clone()
        };
        self.push(snapshot);
    }

    fn start_polling(&self, interval: Duration) {
        *self.state.polling.borrow_mut() = Some(interval);
    }

    fn stop_polling(&self) {
        *self.state.polling.borrow_mut() = None;
    }

    fn subscribe_to_more(&self, _request: SubscribeToMoreRequest<T>) -> Subscription {
        self.state
            .subscribe_to_more_calls
            .set(self.state.subscribe_to_more_calls.get() + 1);
        Subscription::empty()
    }

    fn reset_query_store_errors(&self) {
        self.state
            .store_error_resets
            .set(self.state.store_error_resets.get() + 1);
        let mut current = self.state.current.borrow_mut();
        current.errors.clear();
        current.error = None;
    }

    fn last_error(&self) -> Option<QueryError> {
        self.state.last_error.borrow().clone()
    }

    fn last_result(&self) -> Option<ExecutorSnapshot<T>> {
        self.state.last_result.borrow().clone()
    }

    fn reset_last_results(&self) {
        self.state.reset_last_calls.set(self.state.reset_last_calls.get() + 1);
        *self.state.last_error.borrow_mut() = None;
        *self.state.last_result.borrow_mut() = None;
    }

    fn restore_last_results(
        &self,
        error: Option<QueryError>,
        result: Option<ExecutorSnapshot<T>>,
    ) {
        self.state
            .restore_last_calls
            .set(self.state.restore_last_calls.get() + 1);
        *self.state.last_error.borrow_mut() = error;
        *self.state.last_result.borrow_mut() = result;
    }

    fn variables(&self) -> Variables {
        self.state.variables.borrow().clone()
    }

    fn fetch_policy(&self) -> FetchPolicy {
        self.state.fetch_policy.get()
    }
}

// ---------------------------------------------------------------------------
// FakeClient
// ---------------------------------------------------------------------------

struct FakeClientState<T: ResultData> {
    created: RefCell<Vec<FakeQuery<T>>>,
    watch_calls: RefCell<Vec<WatchOptions>>,
}

/// A [`QueryClient`] that mints a fresh [`FakeQuery`] per `watch_query`
/// call and records every option record it was asked to watch.
pub struct FakeClient<T: ResultData> {
    state: Rc<FakeClientState<T>>,
}

impl<T: ResultData> Clone for FakeClient<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: ResultData> Default for FakeClient<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ResultData> FakeClient<T> {
    /// A client with no queries yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(FakeClientState {
                created: RefCell::new(Vec::new()),
                watch_calls: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Every fake created so far, in creation order.
    #[must_use]
    pub fn created(&self) -> Vec<FakeQuery<T>> {
        self.state.created.borrow().clone()
    }

    /// The most recently created fake.
    #[must_use]
    pub fn last_created(&self) -> Option<FakeQuery<T>> {
        self.state.created.borrow().last().cloned()
    }

    /// Option records passed to `watch_query`, in call order.
    #[must_use]
    pub fn watch_calls(&self) -> Vec<WatchOptions> {
        self.state.watch_calls.borrow().clone()
    }
}

impl<T: ResultData> QueryClient<T> for FakeClient<T> {
    fn watch_query(&self, options: WatchOptions) -> Rc<dyn ObservableQuery<T>> {
        self.state.watch_calls.borrow_mut().push(options.clone());
        let fake = FakeQuery::from_options(&options);
        self.state.created.borrow_mut().push(fake.clone());
        fake.handle()
    }
}
