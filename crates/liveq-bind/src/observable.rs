#![forbid(unsafe_code)]

//! Lifecycle of the one live observable query handle per binding.
//!
//! The manager owns the handle exclusively: it creates it lazily on the
//! first non-skipped execution, reconfigures it in place when the prepared
//! options change, and tears it down when the query document changes (or
//! skip rises), leaving recreation to the next use.
//!
//! # Transition rules
//!
//! - `ensure`: no handle → construct one (or adopt the server-render
//!   registry's handle for the same operation). Existing handle → no-op.
//! - `reconcile`: handle exists and the prepared options differ from the
//!   last applied record → apply them. Application failures are logged and
//!   absorbed; the same fault is re-delivered on the subscription error
//!   channel, which is where it is handled.
//! - `teardown`: drop the handle and every record derived from it.

use std::rc::Rc;

use tracing::debug;

use liveq_core::{ClientHandle, ObservableQuery, QueryDocument, ResultData, WatchOptions};

use crate::options::EffectiveOptions;
use crate::prefetch::PrefetchCoordinator;

/// Owner of the binding's live observable handle.
pub(crate) struct ObservableManager<T: ResultData> {
    handle: Option<Rc<dyn ObservableQuery<T>>>,
    /// The option record most recently applied to the handle.
    applied: Option<WatchOptions>,
    /// The document the current handle was created from.
    document: Option<QueryDocument>,
}

impl<T: ResultData> Default for ObservableManager<T> {
    fn default() -> Self {
        Self {
            handle: None,
            applied: None,
            document: None,
        }
    }
}

impl<T: ResultData> ObservableManager<T> {
    /// The current handle, if one exists.
    pub(crate) fn handle(&self) -> Option<&Rc<dyn ObservableQuery<T>>> {
        self.handle.as_ref()
    }

    /// Whether `document` differs from the one the current handle was
    /// created from.
    pub(crate) fn document_changed(&self, document: &QueryDocument) -> bool {
        self.document.as_ref().is_some_and(|d| d != document)
    }

    /// Create the handle if none exists.
    ///
    /// During a server render pass the coordinator's registry is consulted
    /// first so one prefetch pass never creates duplicate handles for the
    /// same operation; a newly created handle is registered back.
    pub(crate) fn ensure(
        &mut self,
        options: &EffectiveOptions<T>,
        client: &ClientHandle<T>,
        coordinator: Option<&Rc<dyn PrefetchCoordinator<T>>>,
    ) {
        if self.handle.is_some() {
            return;
        }

        let watch = options.watch_options(coordinator.is_some());

        if let Some(coordinator) = coordinator
            && let Some(existing) = coordinator.ssr_observable(&watch)
        {
            self.document = Some(watch.document.clone());
            self.applied = Some(watch);
            self.handle = Some(existing);
            return;
        }

        let handle = client.client().watch_query(watch.clone());
        if let Some(coordinator) = coordinator {
            coordinator.register_ssr_observable(Rc::clone(&handle), &watch);
        }

        self.document = Some(watch.document.clone());
        self.applied = Some(watch);
        self.handle = Some(handle);
    }

    /// Apply the prepared options to the existing handle when they differ
    /// from the last applied record. No-op without a handle.
    pub(crate) fn reconcile(&mut self, options: &EffectiveOptions<T>, server_render: bool) {
        let Some(handle) = &self.handle else { return };

        let next = options.watch_options(server_render);
        if self.applied.as_ref() == Some(&next) {
            return;
        }

        self.applied = Some(next.clone());
        if let Err(error) = handle.apply_options(next) {
            // The rejection re-arrives on the subscription error channel;
            // surfacing it twice would double-report.
            debug!(document = %options.document, %error, "option application rejected");
        }
    }

    /// Drop the handle and everything derived from it.
    pub(crate) fn teardown(&mut self) {
        self.handle = None;
        self.applied = None;
        self.document = None;
    }
}
