//! E2E scenarios for the query binding: a scripted fake executor plus a
//! counting render host, driven through full render cycles.
//!
//! Covers:
//! 1. Loading → data flow with render requests only for real transitions.
//! 2. Flash-free refetching (stale data stays visible while in flight).
//! 3. Fetch-more artifact suppression and merge rendering.
//! 4. Error → transparent resubscription → later success.
//! 5. Skip/unmount teardown semantics.
//! 6. Partial-refetch one-shot recovery.
//! 7. Callback at-most-once dispatch.
//! 8. Server-render placeholder, dedup, and settled passes.
//! 9. Stable action identity across renders.

#![forbid(unsafe_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use liveq_bind::{QueryBinding, QueryOptions, RenderLink, RenderPassRegistry};
use liveq_core::testing::FakeClient;
use liveq_core::{
    ExecutorSnapshot, FetchMoreRequest, FetchPolicy, GraphError, NetworkStatus, ObservableQuery,
    QueryDocument, QueryError, TransportFault, Variables, vars,
};
use serde_json::{Value, json};

// ── Harness ─────────────────────────────────────────────────────────────

struct TestHost {
    renders: Cell<u32>,
    faults: RefCell<Vec<TransportFault>>,
}

impl TestHost {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            renders: Cell::new(0),
            faults: RefCell::new(Vec::new()),
        })
    }
}

impl RenderLink for TestHost {
    fn request_render(&self) {
        self.renders.set(self.renders.get() + 1);
    }
    fn raise_fault(&self, fault: TransportFault) {
        self.faults.borrow_mut().push(fault);
    }
}

fn doc() -> QueryDocument {
    QueryDocument::new("Hero", "query Hero($id: ID!) { hero(id: $id) { name } }")
}

fn setup(options: QueryOptions<Value>) -> (QueryBinding<Value>, Rc<TestHost>, FakeClient<Value>) {
    let client = FakeClient::new();
    let host = TestHost::new();
    let binding = QueryBinding::new(Rc::new(client.clone()), host.clone(), options);
    (binding, host, client)
}

/// Executor state for a settled result.
fn ready(data: Value) -> ExecutorSnapshot<Value> {
    ExecutorSnapshot::ready(data)
}

/// Executor state for an in-flight request with `status`.
fn in_flight(status: NetworkStatus, data: Option<Value>) -> ExecutorSnapshot<Value> {
    ExecutorSnapshot {
        loading: true,
        network_status: status,
        data,
        errors: Vec::new(),
        error: None,
        partial: false,
    }
}

// ── 1. Loading → data ───────────────────────────────────────────────────

#[test]
fn e2e_simple_query_lifecycle() {
    let (binding, host, client) = setup(QueryOptions::new(doc()));

    let first = binding.execute();
    assert!(first.loading);
    assert!(first.called);
    assert!(first.data.is_none());
    assert_eq!(first.network_status, NetworkStatus::Loading);
    let _mount = binding.after_execute();

    let fake = client.last_created().unwrap();
    assert_eq!(fake.active_subscribers(), 1);

    fake.push(ready(json!({ "hero": { "name": "R2" } })));
    assert_eq!(host.renders.get(), 1);

    let second = binding.execute();
    assert!(!second.loading);
    assert_eq!(second.network_status, NetworkStatus::Ready);
    assert_eq!(second.data, Some(json!({ "hero": { "name": "R2" } })));
    assert!(second.error.is_none());
}

#[test]
fn e2e_duplicate_notification_does_not_rerender() {
    let (binding, host, client) = setup(QueryOptions::new(doc()));
    binding.execute();
    let fake = client.last_created().unwrap();

    let data = json!({ "hero": { "name": "R2" } });
    fake.push(ready(data.clone()));
    binding.execute();
    assert_eq!(host.renders.get(), 1);

    // The executor re-delivers the identical state.
    fake.push(ready(data));
    assert_eq!(host.renders.get(), 1);
}

// ── 2. Flash-free refetching ────────────────────────────────────────────

#[test]
fn e2e_refetch_with_different_variables_keeps_stale_data_visible() {
    let (binding, host, client) = setup(
        QueryOptions::new(doc()).with_variables(vars! { "id" => 1 }),
    );
    binding.execute();
    let fake = client.last_created().unwrap();

    let d1 = json!({ "hero": { "name": "R2" } });
    fake.push(ready(d1.clone()));
    let settled = binding.execute();
    assert_eq!(settled.data, Some(d1.clone()));

    // Caller refetches with different variables.
    settled.actions.refetch(Some(vars! { "id" => 2 }));
    assert_eq!(fake.refetch_calls().len(), 1);
    assert_eq!(fake.variables().get("id"), Some(&json!(2)));

    fake.push(in_flight(NetworkStatus::Refetch, None));
    assert_eq!(host.renders.get(), 2);

    let refetching = binding.execute();
    assert!(refetching.loading);
    assert_eq!(refetching.network_status, NetworkStatus::Refetch);
    // Stale data stays visible; no flash of empty content.
    assert_eq!(refetching.data, Some(d1));

    let d2 = json!({ "hero": { "name": "C3PO" } });
    fake.push(ready(d2.clone()));
    let resolved = binding.execute();
    assert_eq!(resolved.data, Some(d2));

    // Going back to the original variables works without re-declaring.
    resolved.actions.refetch(Some(vars! { "id" => 1 }));
    assert_eq!(fake.refetch_calls().len(), 2);
    fake.push(in_flight(NetworkStatus::Refetch, None));
    binding.execute();
    fake.push(ready(json!({ "hero": { "name": "R2" } })));
    let back = binding.execute();
    assert_eq!(back.data, Some(json!({ "hero": { "name": "R2" } })));
}

// ── 3. Fetch-more ───────────────────────────────────────────────────────

#[test]
fn e2e_fetch_more_suppresses_pre_merge_artifact() {
    let (binding, host, client) = setup(QueryOptions::new(doc()));
    binding.execute();
    let fake = client.last_created().unwrap();

    let page1 = json!({ "items": [1, 2] });
    fake.push(ready(page1.clone()));
    let settled = binding.execute();
    assert_eq!(host.renders.get(), 1);

    settled.actions.fetch_more(FetchMoreRequest {
        variables: Some(vars! { "page" => 2 }),
        update: Rc::new(|prev: Option<&Value>, incoming: Option<&Value>| {
            let mut merged = prev.cloned().unwrap_or_else(|| json!({ "items": [] }));
            if let (Some(list), Some(Value::Array(more))) = (
                merged.get_mut("items").and_then(Value::as_array_mut),
                incoming.and_then(|i| i.get("items")),
            ) {
                list.extend(more.iter().cloned());
            }
            Some(merged)
        }),
    });
    assert_eq!(fake.fetch_more_calls().len(), 1);

    // Fetch-more goes in flight, still showing page 1.
    fake.push(in_flight(NetworkStatus::FetchMore, Some(page1.clone())));
    assert_eq!(host.renders.get(), 2);
    let fetching = binding.execute();
    assert!(fetching.loading);
    assert_eq!(fetching.data, Some(page1.clone()));

    // The executor reports once more before the merge finishes: the data
    // equals what is already rendered, so no render happens.
    fake.push(ExecutorSnapshot {
        loading: false,
        network_status: NetworkStatus::Ready,
        data: Some(page1),
        errors: Vec::new(),
        error: None,
        partial: false,
    });
    assert_eq!(host.renders.get(), 2);

    // The merged list lands in a single render.
    let merged = json!({ "items": [1, 2, 3, 4] });
    fake.push(ready(merged.clone()));
    assert_eq!(host.renders.get(), 3);
    let after = binding.execute();
    assert_eq!(after.data, Some(merged));
}

// ── 4. Errors ───────────────────────────────────────────────────────────

#[test]
fn e2e_error_then_success_through_resubscription() {
    let (binding, host, client) = setup(QueryOptions::new(doc()));
    binding.execute();
    let fake = client.last_created().unwrap();

    let d1 = json!({ "hero": { "name": "R2" } });
    fake.push(ready(d1.clone()));
    binding.execute();
    assert_eq!(host.renders.get(), 1);

    fake.push_error(QueryError::new(vec![GraphError::new("upstream boom")]));
    assert_eq!(host.renders.get(), 2);
    // Subscription recovered transparently.
    assert_eq!(fake.active_subscribers(), 1);

    let errored = binding.execute();
    assert!(!errored.loading);
    assert_eq!(errored.error, Some(QueryError::from_message("upstream boom")));
    // Previously rendered content survives the error.
    assert_eq!(errored.data, Some(d1));

    // Errors persist across re-renders that change nothing.
    let rerendered = binding.execute();
    assert_eq!(
        rerendered.error,
        Some(QueryError::from_message("upstream boom"))
    );

    // A later success still arrives and renders cleanly.
    let d2 = json!({ "hero": { "name": "C3PO" } });
    fake.push(ready(d2.clone()));
    assert_eq!(host.renders.get(), 3);
    let recovered = binding.execute();
    assert!(recovered.error.is_none());
    assert_eq!(recovered.data, Some(d2));
}

#[test]
fn e2e_deferred_tick_clears_stored_errors() {
    let (binding, _host, client) = setup(QueryOptions::new(doc()));
    binding.execute();
    let fake = client.last_created().unwrap();

    fake.push_error(QueryError::from_message("boom"));
    binding.execute();
    let _mount = binding.after_execute();

    // Nothing cleared synchronously.
    assert_eq!(fake.store_error_resets(), 0);

    binding.deferred().drain();
    assert_eq!(fake.store_error_resets(), 1);
}

#[test]
fn e2e_transport_fault_reaches_host_boundary() {
    let (binding, host, client) = setup(QueryOptions::new(doc()));
    binding.execute();
    let fake = client.last_created().unwrap();

    fake.push_fault(TransportFault::new("connection reset"));
    assert_eq!(host.faults.borrow().len(), 1);
    assert_eq!(host.faults.borrow()[0].message, "connection reset");
    // No render for a fault, and the subscription is still alive.
    assert_eq!(host.renders.get(), 0);
    assert_eq!(fake.active_subscribers(), 1);
}

// ── 5. Skip + unmount ───────────────────────────────────────────────────

#[test]
fn e2e_skip_tears_down_and_unskip_recreates() {
    let (binding, host, client) = setup(QueryOptions::new(doc()));
    binding.execute();
    let _mount = binding.after_execute();
    let fake = client.last_created().unwrap();
    fake.push(ready(json!({ "hero": 1 })));
    binding.execute();
    let renders_before = host.renders.get();

    binding.set_options(QueryOptions::new(doc()).with_skip(true));
    let skipped = binding.execute();
    assert!(!skipped.loading);
    assert!(skipped.data.is_none());
    assert!(skipped.error.is_none());
    assert!(skipped.called);
    assert_eq!(fake.active_subscribers(), 0);

    // Deliveries from the abandoned handle produce nothing.
    fake.push(ready(json!({ "hero": 2 })));
    assert_eq!(host.renders.get(), renders_before);

    // Lifting skip creates a fresh handle and subscribes again.
    binding.set_options(QueryOptions::new(doc()));
    binding.execute();
    assert_eq!(client.created().len(), 2);
    assert_eq!(client.last_created().unwrap().active_subscribers(), 1);
}

#[test]
fn e2e_unmount_stops_renders_synchronously() {
    let (binding, host, client) = setup(QueryOptions::new(doc()));
    binding.execute();
    let mount = binding.after_execute();
    let fake = client.last_created().unwrap();

    drop(mount);
    assert!(!binding.is_mounted());
    assert_eq!(fake.active_subscribers(), 0);

    fake.push(ready(json!({ "hero": 1 })));
    assert_eq!(host.renders.get(), 0);
}

// ── 6. Partial refetch ──────────────────────────────────────────────────

#[test]
fn e2e_partial_refetch_is_one_shot() {
    let (binding, _host, client) = setup(
        QueryOptions::new(doc()).with_partial_refetch(true),
    );
    binding.execute();
    let fake = client.last_created().unwrap();

    // Cache-miss-after-mutation: settled, partial, no data.
    fake.set_current(ExecutorSnapshot {
        loading: false,
        network_status: NetworkStatus::Ready,
        data: None,
        errors: Vec::new(),
        error: None,
        partial: true,
    });

    let recovering = binding.execute();
    assert!(recovering.loading);
    assert_eq!(recovering.network_status, NetworkStatus::Loading);
    assert_eq!(fake.refetch_calls().len(), 1, "exactly one refetch");

    // The refetch resolves; no further recovery fires.
    fake.push(ready(json!({ "hero": 1 })));
    let settled = binding.execute();
    assert!(!settled.loading);
    assert_eq!(settled.data, Some(json!({ "hero": 1 })));
    assert_eq!(fake.refetch_calls().len(), 1);
}

// ── 7. Callback dispatch ────────────────────────────────────────────────

#[test]
fn e2e_on_completed_fires_once_per_variables() {
    let completed: Rc<RefCell<Vec<Option<Value>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&completed);

    let options = QueryOptions::new(doc())
        .with_variables(vars! { "id" => 1 })
        .on_completed(move |data: Option<&Value>| sink.borrow_mut().push(data.cloned()));
    let (binding, _host, client) = setup(options.clone());

    // Loading pass: no dispatch.
    binding.execute();
    drop(binding.after_execute());
    assert!(completed.borrow().is_empty());

    let fake = client.last_created().unwrap();
    fake.push(ready(json!({ "hero": 1 })));
    binding.execute();
    drop(binding.after_execute());
    assert_eq!(completed.borrow().len(), 1);
    assert_eq!(completed.borrow()[0], Some(json!({ "hero": 1 })));

    // Pure re-render: suppressed.
    binding.execute();
    drop(binding.after_execute());
    assert_eq!(completed.borrow().len(), 1);

    // New variables are a new transition.
    binding.set_options(options.with_variables(vars! { "id" => 2 }));
    binding.execute();
    drop(binding.after_execute());
    assert_eq!(completed.borrow().len(), 2);
}

#[test]
fn e2e_on_error_fires_once() {
    let errors: Rc<RefCell<Vec<QueryError>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);

    let options = QueryOptions::<Value>::new(doc())
        .on_error(move |error: &QueryError| sink.borrow_mut().push(error.clone()));
    let (binding, _host, client) = setup(options);

    binding.execute();
    drop(binding.after_execute());

    let fake = client.last_created().unwrap();
    fake.push_error(QueryError::from_message("boom"));
    binding.execute();
    drop(binding.after_execute());
    assert_eq!(errors.borrow().len(), 1);

    // Re-render without a new transition: no second dispatch.
    binding.execute();
    drop(binding.after_execute());
    assert_eq!(errors.borrow().len(), 1);
}

// ── 8. Server rendering ─────────────────────────────────────────────────

#[test]
fn e2e_server_render_placeholder_dedup_and_settle() {
    let client = FakeClient::new();
    let host = TestHost::new();
    let registry = Rc::new(RenderPassRegistry::new());

    let options = QueryOptions::<Value>::new(doc())
        .with_variables(vars! { "id" => 1 })
        .with_fetch_policy(FetchPolicy::NetworkOnly);
    let binding = QueryBinding::for_server_render(
        Rc::new(client.clone()),
        host.clone(),
        options.clone(),
        registry.clone(),
    );

    // First pass: placeholder, policy downgraded, operation registered.
    let placeholder = binding.execute();
    assert!(placeholder.loading);
    assert!(placeholder.called);
    assert!(placeholder.data.is_none());
    assert_eq!(client.watch_calls().len(), 1);
    assert_eq!(client.watch_calls()[0].fetch_policy, FetchPolicy::CacheFirst);
    assert_eq!(registry.pending(), 1);
    assert!(binding.needs_prefetch());

    // A sibling binding for the identical operation reuses the handle.
    let sibling = QueryBinding::for_server_render(
        Rc::new(client.clone()),
        host.clone(),
        options.clone(),
        registry.clone(),
    );
    sibling.execute();
    assert_eq!(client.watch_calls().len(), 1);

    // The host awaits the executor, then marks the operation settled.
    let fake = client.last_created().unwrap();
    fake.push(ready(json!({ "hero": { "name": "R2" } })));
    assert!(!binding.needs_prefetch());
    registry.mark_settled(&client.watch_calls()[0]);

    let settled = binding.execute();
    assert!(!settled.loading);
    assert_eq!(settled.data, Some(json!({ "hero": { "name": "R2" } })));
}

#[test]
fn e2e_server_render_disabled_stays_loading() {
    let client = FakeClient::new();
    let host = TestHost::new();
    let registry: Rc<RenderPassRegistry<Value>> = Rc::new(RenderPassRegistry::new());

    let binding = QueryBinding::for_server_render(
        Rc::new(client.clone()),
        host,
        QueryOptions::new(doc()).with_ssr(false),
        registry.clone(),
    );

    let snapshot = binding.execute();
    assert!(snapshot.loading);
    // Opted out: never registered for awaiting.
    assert_eq!(registry.pending(), 0);
    assert!(!binding.needs_prefetch());
}

// ── 9. Stable identities ────────────────────────────────────────────────

#[test]
fn e2e_actions_identity_stable_until_handle_replaced() {
    let (binding, _host, client) = setup(QueryOptions::new(doc()));
    let first = binding.execute();
    let fake = client.last_created().unwrap();
    fake.push(ready(json!({ "hero": 1 })));
    let second = binding.execute();

    assert!(first.actions.same_handle(&second.actions));

    // A document change replaces the handle, and with it the actions.
    binding.set_options(QueryOptions::new(QueryDocument::new(
        "Villain",
        "query Villain { villain { name } }",
    )));
    let third = binding.execute();
    assert!(!second.actions.same_handle(&third.actions));
    assert_eq!(client.created().len(), 2);
}

#[test]
fn e2e_lazy_binding_runs_only_after_trigger() {
    let (binding, host, client) = setup(
        QueryOptions::new(doc())
            .with_variables(vars! { "id" => 1 })
            .with_skip(true),
    );

    let (trigger, idle) = binding.execute_lazy();
    assert!(!idle.called);
    assert!(!idle.loading);
    assert!(client.created().is_empty());
    let _mount = binding.after_execute_lazy();

    trigger.trigger(Some(liveq_bind::LazyOverrides {
        variables: vars! { "id" => 5 },
        context: Variables::new(),
    }));
    assert_eq!(host.renders.get(), 1);

    // Triggered: executes eagerly, overrides merged, skip stripped.
    let (_trigger, running) = binding.execute_lazy();
    assert!(running.called);
    assert!(running.loading);
    assert_eq!(client.created().len(), 1);
    assert_eq!(
        client.watch_calls()[0].variables.get("id"),
        Some(&json!(5))
    );
}
