#![forbid(unsafe_code)]

//! The query binding: one live query, one coherent snapshot per render.
//!
//! [`QueryBinding`] sequences the options resolver, the observable manager,
//! the subscription controller, and the result synthesizer across the host's
//! render cycle:
//!
//! - [`execute`](QueryBinding::execute) runs during a render pass and
//!   returns the snapshot for that pass.
//! - [`after_execute`](QueryBinding::after_execute) runs after the pass
//!   committed: it marks the binding mounted, dispatches the one-shot
//!   completion/error callbacks, schedules the deferred error-marker clear,
//!   and returns a [`MountGuard`] whose drop unmounts.
//! - [`execute_lazy`](QueryBinding::execute_lazy) is the deferred variant:
//!   inert until its [`LazyTrigger`] fires, an eager binding afterwards.
//!
//! All state lives in one per-instance record ([`BindingState`]) behind a
//! single `RefCell`; subscription callbacks reach it through a `Weak`, so a
//! dropped binding silently detaches from late deliveries.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use liveq_core::{
    ClientHandle, QueryClient, QueryDocument, QueryError, ResultData, Variables,
};

use crate::actions::QueryActions;
use crate::host::RenderLink;
use crate::observable::ObservableManager;
use crate::options::{EffectiveOptions, LazyOverrides, LazyState, QueryOptions};
use crate::prefetch::PrefetchCoordinator;
use crate::scheduler::DeferredQueue;
use crate::snapshot::{QuerySnapshot, synthesize_active};
use crate::subscription::SubscriptionState;

// ---------------------------------------------------------------------------
// Per-instance state
// ---------------------------------------------------------------------------

/// Identity of one execution, for callback dedup.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CallbackKey {
    pub(crate) document: QueryDocument,
    pub(crate) variables: Variables,
}

/// What the previous execution left behind.
///
/// Transition rules: `result`/`loading_before` are written by every
/// synthesis; `document`/`skip` by every execute; `exec_key` at the end of
/// every after-execute pass (so callback dedup compares against the pass
/// before the current one). `cleanup` discards `result` but keeps
/// `document`, matching the teardown-recreate cycle of a lazy re-arm.
pub(crate) struct PreviousData<T: ResultData> {
    /// Snapshot handed to the rendering unit by the latest synthesis.
    pub(crate) result: Option<QuerySnapshot<T>>,
    /// Loading flag of the snapshot before that one.
    pub(crate) loading_before: bool,
    /// Document seen by the latest execution.
    pub(crate) document: Option<QueryDocument>,
    /// Whether the latest execution was skipped.
    pub(crate) skip: bool,
    /// (document, variables) of the latest completed pass.
    pub(crate) exec_key: Option<CallbackKey>,
}

impl<T: ResultData> Default for PreviousData<T> {
    fn default() -> Self {
        Self {
            result: None,
            loading_before: false,
            document: None,
            skip: false,
            exec_key: None,
        }
    }
}

/// The binding's entire mutable state, one record, named fields.
pub(crate) struct BindingState<T: ResultData> {
    pub(crate) options: QueryOptions<T>,
    pub(crate) lazy: LazyState,
    pub(crate) mounted: bool,
    /// Bumped per after-execute pass; stale [`MountGuard`]s compare against
    /// it so only the latest guard unmounts.
    pub(crate) mount_epoch: u64,
    pub(crate) manager: ObservableManager<T>,
    pub(crate) sub: SubscriptionState,
    pub(crate) previous: PreviousData<T>,
    /// Memoized action bundle, keyed by handle identity.
    pub(crate) actions: Option<QueryActions<T>>,
}

pub(crate) struct BindingInner<T: ResultData> {
    pub(crate) client: ClientHandle<T>,
    pub(crate) host: Rc<dyn RenderLink>,
    pub(crate) prefetch: Option<Rc<dyn PrefetchCoordinator<T>>>,
    pub(crate) deferred: Rc<DeferredQueue>,
    pub(crate) state: RefCell<BindingState<T>>,
}

// ---------------------------------------------------------------------------
// QueryBinding
// ---------------------------------------------------------------------------

/// A reactive binding from one observable query to one rendering unit.
///
/// Clones share the instance. See the module docs for the render-cycle
/// protocol.
pub struct QueryBinding<T: ResultData> {
    pub(crate) inner: Rc<BindingInner<T>>,
}

impl<T: ResultData> Clone for QueryBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: ResultData> fmt::Debug for QueryBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("QueryBinding")
            .field("mounted", &state.mounted)
            .field("lazy_armed", &state.lazy.armed())
            .field("has_handle", &state.manager.handle().is_some())
            .field("subscribed", &state.sub.is_subscribed())
            .finish()
    }
}

impl<T: ResultData> QueryBinding<T> {
    /// A binding for interactive rendering.
    #[must_use]
    pub fn new(
        client: Rc<dyn QueryClient<T>>,
        host: Rc<dyn RenderLink>,
        options: QueryOptions<T>,
    ) -> Self {
        Self::build(client, host, options, None)
    }

    /// A binding participating in a server render pass.
    #[must_use]
    pub fn for_server_render(
        client: Rc<dyn QueryClient<T>>,
        host: Rc<dyn RenderLink>,
        options: QueryOptions<T>,
        coordinator: Rc<dyn PrefetchCoordinator<T>>,
    ) -> Self {
        Self::build(client, host, options, Some(coordinator))
    }

    fn build(
        client: Rc<dyn QueryClient<T>>,
        host: Rc<dyn RenderLink>,
        options: QueryOptions<T>,
        prefetch: Option<Rc<dyn PrefetchCoordinator<T>>>,
    ) -> Self {
        Self {
            inner: Rc::new(BindingInner {
                client: ClientHandle::new(client),
                host,
                prefetch,
                deferred: Rc::new(DeferredQueue::new()),
                state: RefCell::new(BindingState {
                    options,
                    lazy: LazyState::default(),
                    mounted: false,
                    mount_epoch: 0,
                    manager: ObservableManager::default(),
                    sub: SubscriptionState::default(),
                    previous: PreviousData::default(),
                    actions: None,
                }),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<BindingInner<T>>) -> Self {
        Self { inner }
    }

    /// Replace the caller options for the next execution.
    pub fn set_options(&self, options: QueryOptions<T>) {
        self.inner.state.borrow_mut().options = options;
    }

    /// Whether the binding is currently mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.state.borrow().mounted
    }

    /// The deferred-task queue the host should drain after render cycles.
    #[must_use]
    pub fn deferred(&self) -> &Rc<DeferredQueue> {
        &self.inner.deferred
    }

    fn resolve(&self) -> EffectiveOptions<T> {
        let state = self.inner.state.borrow();
        EffectiveOptions::resolve(&state.options, &state.lazy)
    }

    // -- execution ----------------------------------------------------------

    /// Run one render pass and return its snapshot.
    pub fn execute(&self) -> QuerySnapshot<T> {
        let effective = self.resolve();

        {
            let mut state = self.inner.state.borrow_mut();
            let doc_changed = state
                .previous
                .document
                .as_ref()
                .is_some_and(|d| *d != effective.document);
            let skip_rising = effective.skip && !state.previous.skip;

            if effective.skip || doc_changed {
                state.sub.clear();
            }
            if doc_changed || skip_rising {
                // The handle is recreated lazily on the next non-skipped use.
                state.manager.teardown();
            }
            state.previous.document = Some(effective.document.clone());
            state.previous.skip = effective.skip;

            if !effective.skip {
                if state.manager.handle().is_none() {
                    state
                        .manager
                        .ensure(&effective, &self.inner.client, self.inner.prefetch.as_ref());
                } else {
                    state
                        .manager
                        .reconcile(&effective, self.inner.prefetch.is_some());
                }
            }
        }

        if self.is_mounted() {
            self.start_subscription();
        }

        if let Some(coordinator) = &self.inner.prefetch {
            let placeholder = QuerySnapshot::server_loading(
                effective.variables.clone(),
                self.refresh_actions(),
                self.inner.client.clone(),
            );
            if !effective.ssr {
                // Opted out of prefetching: report loading and leave it there.
                return placeholder;
            }
            let watch = effective.watch_options(true);
            let mut produce = || self.execute_result(&effective);
            if let Some(snapshot) = coordinator.add_query_promise(&watch, &mut produce) {
                return snapshot;
            }
            return placeholder;
        }

        self.execute_result(&effective)
    }

    /// The lazy entry point: a trigger plus the snapshot for this pass.
    /// Inert (`called == false`, executor untouched) until the trigger
    /// fires; a plain [`execute`](QueryBinding::execute) afterwards.
    pub fn execute_lazy(&self) -> (LazyTrigger<T>, QuerySnapshot<T>) {
        let trigger = LazyTrigger {
            binding: self.clone(),
        };
        let armed = self.inner.state.borrow().lazy.armed();
        if armed {
            let snapshot = self.execute();
            (trigger, snapshot)
        } else {
            let variables = self.inner.state.borrow().options.variables.clone();
            let snapshot = QuerySnapshot::idle(variables, self.inner.client.clone());
            (trigger, snapshot)
        }
    }

    fn execute_result(&self, effective: &EffectiveOptions<T>) -> QuerySnapshot<T> {
        let snapshot = self.synthesize(effective);
        self.start_subscription();
        snapshot
    }

    fn synthesize(&self, effective: &EffectiveOptions<T>) -> QuerySnapshot<T> {
        let (handle, actions, previous_data) = {
            let mut state = self.inner.state.borrow_mut();
            let handle = state.manager.handle().cloned();
            let actions = QueryActions::for_handle(state.actions.as_ref(), handle.as_ref());
            state.actions = Some(actions.clone());
            let previous_data = state.previous.result.as_ref().and_then(|r| r.data.clone());
            (handle, actions, previous_data)
        };

        let snapshot = match (&handle, effective.skip) {
            (Some(handle), false) => synthesize_active(
                handle.as_ref(),
                effective,
                previous_data.as_ref(),
                actions,
                self.inner.client.clone(),
            ),
            _ => QuerySnapshot::skipped(
                effective.variables.clone(),
                actions,
                self.inner.client.clone(),
            ),
        };

        let mut state = self.inner.state.borrow_mut();
        state.previous.loading_before =
            state.previous.result.as_ref().is_some_and(|r| r.loading);
        state.previous.result = Some(snapshot.clone());
        snapshot
    }

    fn refresh_actions(&self) -> QueryActions<T> {
        let mut state = self.inner.state.borrow_mut();
        let handle = state.manager.handle().cloned();
        let actions = QueryActions::for_handle(state.actions.as_ref(), handle.as_ref());
        state.actions = Some(actions.clone());
        actions
    }

    // -- post-render --------------------------------------------------------

    /// Commit an eager render pass. See the module docs.
    pub fn after_execute(&self) -> MountGuard<T> {
        self.finish_execute(false)
    }

    /// Commit a lazy render pass. Callback dispatch and the deferred error
    /// clear only happen once the binding has been triggered.
    pub fn after_execute_lazy(&self) -> MountGuard<T> {
        self.finish_execute(true)
    }

    fn finish_execute(&self, lazy: bool) -> MountGuard<T> {
        let armed = {
            let mut state = self.inner.state.borrow_mut();
            state.mounted = true;
            state.mount_epoch += 1;
            state.lazy.armed()
        };

        if !lazy || armed {
            self.dispatch_callbacks();

            // Stored query errors are cleared on a deferred tick: this pass
            // still renders them, a later clean response is not shadowed.
            let weak = Rc::downgrade(&self.inner);
            self.inner.deferred.post(move || {
                if let Some(inner) = weak.upgrade() {
                    let handle = inner.state.borrow().manager.handle().cloned();
                    if let Some(handle) = handle {
                        handle.reset_query_store_errors();
                    }
                }
            });
        }

        let effective = self.resolve();
        let mut state = self.inner.state.borrow_mut();
        state.previous.exec_key = Some(CallbackKey {
            document: effective.document,
            variables: effective.variables,
        });
        MountGuard {
            inner: Rc::downgrade(&self.inner),
            epoch: state.mount_epoch,
        }
    }

    /// Fire `on_completed`/`on_error` at most once per settled
    /// (document, variables) pair. A pass whose options equal the previous
    /// pass's while the previous snapshot was already settled is a pure
    /// re-render, not a new transition: dispatch is suppressed.
    fn dispatch_callbacks(&self) {
        let (handle, effective, prev_key, prev_loading) = {
            let state = self.inner.state.borrow();
            let effective = EffectiveOptions::resolve(&state.options, &state.lazy);
            (
                state.manager.handle().cloned(),
                effective,
                state.previous.exec_key.clone(),
                state.previous.loading_before,
            )
        };
        let Some(handle) = handle else { return };

        let current = handle.current_result();
        if current.loading {
            return;
        }

        let key = CallbackKey {
            document: effective.document.clone(),
            variables: effective.variables.clone(),
        };
        if let Some(prev) = prev_key
            && !prev_loading
            && prev == key
        {
            return;
        }

        let error = QueryError::try_from_errors(current.errors.clone()).or(current.error.clone());
        match error {
            None => {
                if let Some(on_completed) = &effective.on_completed {
                    on_completed(current.data.as_ref());
                }
            }
            Some(error) => {
                if let Some(on_error) = &effective.on_error {
                    on_error(&error);
                }
            }
        }
    }

    // -- teardown -----------------------------------------------------------

    /// Tear down the subscription and handle and forget the previous result,
    /// so the next execution starts from a clean slate.
    pub fn cleanup(&self) {
        let mut state = self.inner.state.borrow_mut();
        state.sub.clear();
        state.manager.teardown();
        state.previous.result = None;
        state.actions = None;
    }

    /// Unmount: synchronously stop producing render requests, then clean up.
    pub fn unmount(&self) {
        self.inner.state.borrow_mut().mounted = false;
        self.cleanup();
    }

    // -- lazy + prefetch ----------------------------------------------------

    pub(crate) fn run_lazy(&self, overrides: Option<LazyOverrides>) {
        debug!("lazy query triggered");
        self.cleanup();
        self.inner.state.borrow_mut().lazy.arm(overrides);
        self.inner.host.request_render();
    }

    /// Whether a server render pass must await this binding: not skipped,
    /// not opted out of SSR, and its current result still loading.
    #[must_use]
    pub fn needs_prefetch(&self) -> bool {
        let state = self.inner.state.borrow();
        let effective = EffectiveOptions::resolve(&state.options, &state.lazy);
        if effective.skip || !effective.ssr {
            return false;
        }
        match state.manager.handle() {
            Some(handle) => handle.current_result().loading,
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// MountGuard + LazyTrigger
// ---------------------------------------------------------------------------

/// Teardown action returned by the after-execute pass. Dropping the guard
/// unmounts the binding — unless a newer pass has superseded it.
pub struct MountGuard<T: ResultData> {
    inner: Weak<BindingInner<T>>,
    epoch: u64,
}

impl<T: ResultData> Drop for MountGuard<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            if inner.state.borrow().mount_epoch != self.epoch {
                // A later pass owns the mount now.
                return;
            }
            QueryBinding::from_inner(inner).unmount();
        }
    }
}

impl<T: ResultData> fmt::Debug for MountGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountGuard").field("epoch", &self.epoch).finish()
    }
}

/// Fires a lazy binding. Cloneable; stable for the binding's lifetime.
pub struct LazyTrigger<T: ResultData> {
    binding: QueryBinding<T>,
}

impl<T: ResultData> Clone for LazyTrigger<T> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
        }
    }
}

impl<T: ResultData> fmt::Debug for LazyTrigger<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyTrigger").finish_non_exhaustive()
    }
}

impl<T: ResultData> LazyTrigger<T> {
    /// Trigger the query. Clears current state, arms the binding, stores
    /// the overrides, and requests a render; the render then executes
    /// eagerly with `overrides` merged over the base options.
    pub fn trigger(&self, overrides: Option<LazyOverrides>) {
        self.binding.run_lazy(overrides);
    }
}
