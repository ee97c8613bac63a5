#![forbid(unsafe_code)]

//! Server-render (prefetch) coordination.
//!
//! During a non-interactive, single-pass server render there is no
//! subscription loop: bindings register themselves with a render-pass
//! coordinator, the host awaits the executor, and a repeat pass renders the
//! settled results. The coordinator also deduplicates observable handles
//! across bindings that request the identical operation, so one prefetch
//! pass never fetches the same thing twice.
//!
//! Ownership: the dedup registry belongs to the coordinator, not to the
//! bindings. A binding only consults it while creating its handle and when
//! deciding what to return from `execute`.

use std::cell::RefCell;
use std::rc::Rc;

use liveq_core::{ObservableQuery, QueryDocument, ResultData, Variables, WatchOptions};

use crate::snapshot::QuerySnapshot;

/// The render-pass collaborator a binding consults while server rendering.
pub trait PrefetchCoordinator<T: ResultData> {
    /// Register this binding's operation for prefetching. Returns a settled
    /// snapshot (obtained via `produce`) when the operation has already been
    /// awaited in a previous pass, `None` while it is still pending.
    fn add_query_promise(
        &self,
        options: &WatchOptions,
        produce: &mut dyn FnMut() -> QuerySnapshot<T>,
    ) -> Option<QuerySnapshot<T>>;

    /// A handle previously registered for the identical operation, if any.
    fn ssr_observable(&self, options: &WatchOptions) -> Option<Rc<dyn ObservableQuery<T>>>;

    /// Publish a newly created handle for reuse by later bindings in the
    /// same pass.
    fn register_ssr_observable(&self, handle: Rc<dyn ObservableQuery<T>>, options: &WatchOptions);
}

// ---------------------------------------------------------------------------
// RenderPassRegistry
// ---------------------------------------------------------------------------

struct RegistryEntry<T: ResultData> {
    document: QueryDocument,
    variables: Variables,
    handle: Option<Rc<dyn ObservableQuery<T>>>,
    /// Whether the host has awaited this operation to completion.
    settled: bool,
}

/// A single-pass [`PrefetchCoordinator`]: operations are keyed by
/// (document, variables), handles are deduplicated, and the host marks
/// operations settled between passes.
pub struct RenderPassRegistry<T: ResultData> {
    entries: RefCell<Vec<RegistryEntry<T>>>,
}

impl<T: ResultData> Default for RenderPassRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ResultData> RenderPassRegistry<T> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Operations registered but not yet marked settled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| !e.settled)
            .count()
    }

    /// Mark an operation settled; the next pass returns real snapshots for
    /// it instead of placeholders.
    pub fn mark_settled(&self, options: &WatchOptions) {
        let mut entries = self.entries.borrow_mut();
        if let Some(entry) = entries
            .iter_mut()
            .find(|e| e.document == options.document && e.variables == options.variables)
        {
            entry.settled = true;
        }
    }

    fn position(&self, options: &WatchOptions) -> Option<usize> {
        self.entries
            .borrow()
            .iter()
            .position(|e| e.document == options.document && e.variables == options.variables)
    }
}

impl<T: ResultData> PrefetchCoordinator<T> for RenderPassRegistry<T> {
    fn add_query_promise(
        &self,
        options: &WatchOptions,
        produce: &mut dyn FnMut() -> QuerySnapshot<T>,
    ) -> Option<QuerySnapshot<T>> {
        if let Some(index) = self.position(options) {
            // Release the borrow before producing: synthesis is free to
            // consult the registry.
            let settled = self.entries.borrow()[index].settled;
            if settled {
                return Some(produce());
            }
            return None;
        }
        self.entries.borrow_mut().push(RegistryEntry {
            document: options.document.clone(),
            variables: options.variables.clone(),
            handle: None,
            settled: false,
        });
        None
    }

    fn ssr_observable(&self, options: &WatchOptions) -> Option<Rc<dyn ObservableQuery<T>>> {
        let index = self.position(options)?;
        self.entries.borrow()[index].handle.as_ref().map(Rc::clone)
    }

    fn register_ssr_observable(
        &self,
        handle: Rc<dyn ObservableQuery<T>>,
        options: &WatchOptions,
    ) {
        let mut entries = self.entries.borrow_mut();
        match entries
            .iter_mut()
            .find(|e| e.document == options.document && e.variables == options.variables)
        {
            Some(entry) => entry.handle = Some(handle),
            None => entries.push(RegistryEntry {
                document: options.document.clone(),
                variables: options.variables.clone(),
                handle: Some(handle),
                settled: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveq_core::testing::FakeQuery;
    use liveq_core::{ExecutorSnapshot, FetchPolicy};
    use serde_json::Value;

    fn watch(name: &str) -> WatchOptions {
        WatchOptions {
            document: QueryDocument::new(name, "query Q { q }"),
            variables: Variables::new(),
            fetch_policy: FetchPolicy::CacheFirst,
            poll_interval: None,
            context: Variables::new(),
        }
    }

    #[test]
    fn handles_are_deduplicated_by_operation() {
        let registry: RenderPassRegistry<Value> = RenderPassRegistry::new();
        let options = watch("A");

        assert!(registry.ssr_observable(&options).is_none());

        let fake: FakeQuery<Value> = FakeQuery::new(ExecutorSnapshot::loading());
        let handle = fake.handle();
        registry.register_ssr_observable(Rc::clone(&handle), &options);

        let found = registry.ssr_observable(&options).unwrap();
        assert!(Rc::ptr_eq(&found, &handle));

        // A different operation does not match.
        assert!(registry.ssr_observable(&watch("B")).is_none());
    }

    #[test]
    fn promises_settle_between_passes() {
        let registry: RenderPassRegistry<Value> = RenderPassRegistry::new();
        let options = watch("A");
        let mut produced = 0u32;

        {
            let mut produce = || {
                produced += 1;
                panic!("must not produce while pending");
            };
            // First pass: pending.
            assert!(registry.add_query_promise(&options, &mut produce).is_none());
            assert!(registry.add_query_promise(&options, &mut produce).is_none());
        }
        assert_eq!(registry.pending(), 1);

        registry.mark_settled(&options);
        assert_eq!(registry.pending(), 0);

        let fake: FakeQuery<Value> = FakeQuery::new(ExecutorSnapshot::loading());
        let mut produce = || {
            produced += 1;
            crate::snapshot::QuerySnapshot::skipped(
                Variables::new(),
                crate::actions::QueryActions::bound(fake.handle()),
                liveq_core::ClientHandle::new(Rc::new(
                    liveq_core::testing::FakeClient::<Value>::new(),
                )),
            )
        };
        assert!(registry.add_query_promise(&options, &mut produce).is_some());
        assert_eq!(produced, 1);
    }
}
