#![forbid(unsafe_code)]

//! Query-to-render binding layer for LiveQuery.
//!
//! A rendering unit pulls: it re-renders on demand and reads state
//! synchronously. A query executor pushes: network responses, cache updates,
//! and errors arrive on their own schedule. This crate is the adapter
//! between the two — a small state machine that:
//!
//! - owns at most one live observable query handle and at most one
//!   subscription to it per binding instance ([`QueryBinding`]),
//! - decides per push notification whether a render is necessary or
//!   redundant ([`classify_notification`]),
//! - reconciles asynchronous error/loading/data transitions into one
//!   coherent [`QuerySnapshot`] per render pass,
//! - exposes imperative actions with stable identity across renders
//!   ([`QueryActions`]),
//! - and coordinates server-render prefetching ([`PrefetchCoordinator`],
//!   [`RenderPassRegistry`]).
//!
//! # Render-cycle protocol
//!
//! ```ignore
//! let binding = QueryBinding::new(client, host, options);
//!
//! // During every render pass:
//! let snapshot = binding.execute();
//! draw(&snapshot);
//!
//! // After the pass committed:
//! let mount = binding.after_execute();
//!
//! // Sometime after the render cycle:
//! binding.deferred().drain();
//!
//! // Dropping `mount` unmounts: subscription torn down synchronously.
//! ```
//!
//! The lazy variant ([`QueryBinding::execute_lazy`]) returns a
//! `(trigger, snapshot)` pair and touches the executor only once the
//! trigger has fired.
//!
//! # Invariants
//!
//! 1. A subscription exists iff the binding is mounted, not skipped, and a
//!    handle exists; errors resubscribe transparently, never terminally.
//! 2. A notification deeply equal to the rendered state never renders;
//!    neither does the pre-merge fetch-more artifact.
//! 3. While loading after a prior success, `data` is never silently
//!    `None`: last-known fields stay visible through refetches.
//! 4. `on_completed`/`on_error` fire at most once per settled
//!    (document, variables) pair.
//! 5. Unmount and skip tear the subscription down synchronously; no later
//!    delivery produces a render request.
//!
//! Everything is single-threaded and callback-driven; deferred work goes
//! through an explicit [`DeferredQueue`], never a hidden timer.

pub mod actions;
pub mod binding;
pub mod compare;
pub mod host;
pub mod observable;
pub mod options;
pub mod prefetch;
pub mod scheduler;
pub mod snapshot;
pub mod subscription;

pub use actions::QueryActions;
pub use binding::{LazyTrigger, MountGuard, QueryBinding};
pub use compare::{NotifyDecision, classify_notification};
pub use host::RenderLink;
pub use options::{
    CompletedCallback, EffectiveOptions, ErrorCallback, LazyOverrides, LazyState, QueryOptions,
};
pub use prefetch::{PrefetchCoordinator, RenderPassRegistry};
pub use scheduler::DeferredQueue;
pub use snapshot::QuerySnapshot;
