#![forbid(unsafe_code)]

//! The subscription controller: at most one live subscription per binding.
//!
//! State machine:
//!
//! ```text
//! Unsubscribed --(mounted ∧ ¬skip ∧ handle exists)--> Subscribed
//! Subscribed --(unmount ∨ skip ∨ handle replaced)--> Unsubscribed
//! Subscribed --(error notification)--> Resubscribing --> Subscribed
//! ```
//!
//! There is no terminal error state: while mounted and not skipped the
//! controller keeps exactly one subscription alive. The executor terminates
//! a subscription internally after delivering an error, so every error is
//! answered with an immediate teardown-and-resubscribe.
//!
//! The resubscription protocol has to defuse a refire: the handle keeps a
//! last-error marker, and a fresh subscriber receives it synchronously. The
//! markers are captured, reset, the subscription recreated, and the markers
//! restored — the just-received error stays observable, the new
//! subscription stays open.
//!
//! Push notifications go through the pure comparator in [`crate::compare`];
//! only a [`NotifyDecision::Render`] reaches the host.

use std::rc::Rc;

use tracing::trace;

use liveq_core::{
    ExecutorError, Notification, Observer, QueryError, ResultData, Subscription,
};

use crate::binding::QueryBinding;
use crate::compare::{NotifyDecision, classify_notification};
use crate::options::EffectiveOptions;

/// The controller's slot: the RAII guard plus the last error it delivered.
#[derive(Default)]
pub(crate) struct SubscriptionState {
    subscription: Option<Subscription>,
    /// The most recently delivered query-level error; an identical
    /// follow-up error does not re-render.
    pub(crate) last_error: Option<QueryError>,
}

impl SubscriptionState {
    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub(crate) fn set(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
    }

    /// Drop the guard, unsubscribing synchronously.
    pub(crate) fn clear(&mut self) {
        self.subscription = None;
    }
}

impl<T: ResultData> QueryBinding<T> {
    /// Enter `Subscribed` if the preconditions hold; no-op otherwise.
    pub(crate) fn start_subscription(&self) {
        let handle = {
            let state = self.inner.state.borrow();
            if state.sub.is_subscribed() {
                return;
            }
            if EffectiveOptions::resolve(&state.options, &state.lazy).skip {
                return;
            }
            match state.manager.handle() {
                Some(handle) => Rc::clone(handle),
                None => return,
            }
        };

        // No state borrow across the subscribe call: a handle with a stale
        // error marker delivers synchronously, re-entering `on_error`.
        let subscription = handle.subscribe(self.make_observer());

        let mut state = self.inner.state.borrow_mut();
        if state.sub.is_subscribed() {
            // A synchronous delivery resubscribed underneath us; that
            // subscription wins, ours is discarded.
            drop(state);
            drop(subscription);
        } else {
            state.sub.set(subscription);
        }
    }

    fn make_observer(&self) -> Observer<T> {
        let weak_next = Rc::downgrade(&self.inner);
        let weak_error = Rc::downgrade(&self.inner);
        Observer {
            next: Rc::new(move |notification| {
                if let Some(inner) = weak_next.upgrade() {
                    QueryBinding::from_inner(inner).on_next(notification);
                }
            }),
            error: Rc::new(move |error| {
                if let Some(inner) = weak_error.upgrade() {
                    QueryBinding::from_inner(inner).on_error(error);
                }
            }),
        }
    }

    fn on_next(&self, notification: Notification<T>) {
        let decision = {
            let state = self.inner.state.borrow();
            match state.previous.result.as_ref() {
                None => NotifyDecision::Render,
                Some(prev) => classify_notification(
                    prev.loading,
                    prev.network_status,
                    prev.data.as_ref(),
                    &notification,
                ),
            }
        };

        match decision {
            NotifyDecision::Render => self.inner.host.request_render(),
            NotifyDecision::SuppressFetchMoreArtifact => {
                trace!("suppressing pre-merge fetch-more notification");
            }
            NotifyDecision::SuppressDuplicate => {
                trace!("suppressing duplicate notification");
            }
        }
    }

    fn on_error(&self, error: ExecutorError) {
        // The executor has terminated the subscription; recover it before
        // looking at the error at all.
        self.resubscribe();

        match error {
            ExecutorError::Fault(fault) => {
                // Not query-shaped: this is the host's problem.
                self.inner.host.raise_fault(fault);
            }
            ExecutorError::Query(error) => {
                let changed = {
                    let mut state = self.inner.state.borrow_mut();
                    if state.sub.last_error.as_ref() == Some(&error) {
                        false
                    } else {
                        state.sub.last_error = Some(error);
                        true
                    }
                };
                if changed {
                    self.inner.host.request_render();
                }
            }
        }
    }

    /// The `Resubscribing` micro-state: teardown, park the handle's
    /// last-error/last-result markers, subscribe, restore the markers.
    fn resubscribe(&self) {
        let handle = {
            let mut state = self.inner.state.borrow_mut();
            state.sub.clear();
            match state.manager.handle() {
                Some(handle) => Rc::clone(handle),
                None => return,
            }
        };

        let last_error = handle.last_error();
        let last_result = handle.last_result();
        handle.reset_last_results();
        self.start_subscription();
        handle.restore_last_results(last_error, last_result);
    }
}
