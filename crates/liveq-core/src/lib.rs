#![forbid(unsafe_code)]

//! Shared data model and executor interface for LiveQuery.
//!
//! This crate defines the boundary between the query executor (the transport
//! and caching engine that actually runs operations) and the render-side
//! binding layer in `liveq-bind`:
//!
//! - [`QueryDocument`], [`Variables`], [`FetchPolicy`], [`NetworkStatus`]:
//!   the vocabulary of a query operation.
//! - [`GraphError`], [`QueryError`], [`TransportFault`], [`ExecutorError`]:
//!   the error taxonomy. Query-level errors are recoverable and carry a
//!   non-empty list of upstream errors; transport faults are not.
//! - [`ExecutorSnapshot`], [`Notification`]: what an observable query reports
//!   on pull and pushes to subscribers.
//! - [`ObservableQuery`], [`QueryClient`], [`Subscription`]: the narrow
//!   observable-query interface the binding layer consumes. `Subscription`
//!   is an RAII guard that unsubscribes on drop.
//! - [`ResultData`]: the trait seam for result payloads (deep equality plus
//!   a shallow merge used while a refetch is in flight).
//!
//! Everything here is single-threaded: handles are shared via `Rc` and
//! nothing is `Send`/`Sync`. The executor's own cache, normalization, and
//! network behavior live behind these traits and are out of scope.
//!
//! The `test-helpers` feature exposes `testing::FakeQuery` and
//! `testing::FakeClient`, a scriptable executor pair for driving the
//! binding layer in tests.

pub mod data;
pub mod document;
pub mod error;
pub mod policy;
pub mod query;
pub mod result;
pub mod status;
pub mod variables;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use data::ResultData;
pub use document::QueryDocument;
pub use error::{ExecutorError, GraphError, QueryError, TransportFault};
pub use policy::FetchPolicy;
pub use query::{
    ClientHandle, FetchMoreRequest, ObservableQuery, Observer, QueryClient, SubscribeToMoreRequest,
    Subscription, WatchOptions,
};
pub use result::{ExecutorSnapshot, Notification};
pub use status::NetworkStatus;
pub use variables::Variables;

// Support for macro expansion in downstream crates.
#[doc(hidden)]
pub use serde_json as __serde_json;
