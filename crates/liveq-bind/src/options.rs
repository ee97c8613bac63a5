#![forbid(unsafe_code)]

//! Caller options, lazy overrides, and the per-execution resolver.
//!
//! [`QueryOptions`] is what the caller declares. [`EffectiveOptions`] is
//! what one execution actually runs with: caller options with any lazy
//! overrides shallow-merged in (override wins per key) and `skip` stripped
//! once lazy triggering has occurred. Resolution is a pure function —
//! derived fresh every execution, immutable once computed.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use liveq_core::{
    FetchPolicy, QueryDocument, QueryError, ResultData, Variables, WatchOptions,
};

/// Callback invoked when a query settles successfully.
pub type CompletedCallback<T> = Rc<dyn Fn(Option<&T>)>;
/// Callback invoked when a query settles with a query-level error.
pub type ErrorCallback = Rc<dyn Fn(&QueryError)>;

// ---------------------------------------------------------------------------
// QueryOptions
// ---------------------------------------------------------------------------

/// Caller-declared configuration for one query binding.
pub struct QueryOptions<T: ResultData> {
    /// The operation to run.
    pub document: QueryDocument,
    /// Operation variables.
    pub variables: Variables,
    /// Cache/network preference.
    pub fetch_policy: FetchPolicy,
    /// Render without querying: no handle, no subscription, empty snapshot.
    pub skip: bool,
    /// Whether this binding participates in server-render prefetching.
    pub ssr: bool,
    /// Poll interval, when declarative polling is wanted.
    pub poll_interval: Option<Duration>,
    /// Auto-refetch when a non-loading result is a partial cache read with
    /// no data (the cache-miss-after-mutation condition).
    pub partial_refetch: bool,
    /// Ambient request context forwarded to the transport.
    pub context: Variables,
    /// Fired once per settled (document, variables) success.
    pub on_completed: Option<CompletedCallback<T>>,
    /// Fired once per settled (document, variables) query-level error.
    pub on_error: Option<ErrorCallback>,
}

impl<T: ResultData> QueryOptions<T> {
    /// Options for `document` with every knob at its default.
    #[must_use]
    pub fn new(document: QueryDocument) -> Self {
        Self {
            document,
            variables: Variables::new(),
            fetch_policy: FetchPolicy::default(),
            skip: false,
            ssr: true,
            poll_interval: None,
            partial_refetch: false,
            context: Variables::new(),
            on_completed: None,
            on_error: None,
        }
    }

    /// Set the operation variables.
    #[must_use]
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Set the fetch policy.
    #[must_use]
    pub fn with_fetch_policy(mut self, fetch_policy: FetchPolicy) -> Self {
        self.fetch_policy = fetch_policy;
        self
    }

    /// Set the skip flag.
    #[must_use]
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Opt out of server-render prefetching.
    #[must_use]
    pub fn with_ssr(mut self, ssr: bool) -> Self {
        self.ssr = ssr;
        self
    }

    /// Set a declarative poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Enable the partial-refetch recovery policy.
    #[must_use]
    pub fn with_partial_refetch(mut self, partial_refetch: bool) -> Self {
        self.partial_refetch = partial_refetch;
        self
    }

    /// Set the ambient request context.
    #[must_use]
    pub fn with_context(mut self, context: Variables) -> Self {
        self.context = context;
        self
    }

    /// Set the completion callback.
    #[must_use]
    pub fn on_completed(mut self, callback: impl Fn(Option<&T>) + 'static) -> Self {
        self.on_completed = Some(Rc::new(callback));
        self
    }

    /// Set the error callback.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&QueryError) + 'static) -> Self {
        self.on_error = Some(Rc::new(callback));
        self
    }
}

impl<T: ResultData> Clone for QueryOptions<T> {
    fn clone(&self) -> Self {
        Self {
            document: self.document.clone(),
            variables: self.variables.clone(),
            fetch_policy: self.fetch_policy,
            skip: self.skip,
            ssr: self.ssr,
            poll_interval: self.poll_interval,
            partial_refetch: self.partial_refetch,
            context: self.context.clone(),
            on_completed: self.on_completed.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T: ResultData> fmt::Debug for QueryOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("document", &self.document)
            .field("variables", &self.variables)
            .field("fetch_policy", &self.fetch_policy)
            .field("skip", &self.skip)
            .field("ssr", &self.ssr)
            .field("poll_interval", &self.poll_interval)
            .field("partial_refetch", &self.partial_refetch)
            .field("on_completed", &self.on_completed.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Lazy state
// ---------------------------------------------------------------------------

/// Variable/context overrides supplied when triggering a lazy binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LazyOverrides {
    /// Variables merged over the base options' variables.
    pub variables: Variables,
    /// Context merged over the base options' context.
    pub context: Variables,
}

/// Whether a lazy binding has been triggered, and with what.
///
/// Transitions once from not-armed to armed on the first trigger and never
/// back; later triggers only replace the stored overrides.
#[derive(Debug, Clone, Default)]
pub struct LazyState {
    armed: bool,
    overrides: Option<LazyOverrides>,
}

impl LazyState {
    /// Whether the binding has been triggered.
    #[must_use]
    pub fn armed(&self) -> bool {
        self.armed
    }

    /// The most recent trigger's overrides, if any were supplied.
    #[must_use]
    pub fn overrides(&self) -> Option<&LazyOverrides> {
        self.overrides.as_ref()
    }

    /// Arm (idempotent) and store the trigger's overrides.
    pub fn arm(&mut self, overrides: Option<LazyOverrides>) {
        self.armed = true;
        self.overrides = overrides;
    }
}

// ---------------------------------------------------------------------------
// EffectiveOptions
// ---------------------------------------------------------------------------

/// The configuration one execution actually runs with.
pub struct EffectiveOptions<T: ResultData> {
    /// The operation to run.
    pub document: QueryDocument,
    /// Variables after lazy-override merge.
    pub variables: Variables,
    /// Cache/network preference.
    pub fetch_policy: FetchPolicy,
    /// Skip flag; always `false` once lazy triggering is active.
    pub skip: bool,
    /// Server-render participation.
    pub ssr: bool,
    /// Declarative poll interval.
    pub poll_interval: Option<Duration>,
    /// Partial-refetch recovery policy.
    pub partial_refetch: bool,
    /// Context after lazy-override merge.
    pub context: Variables,
    /// Completion callback.
    pub on_completed: Option<CompletedCallback<T>>,
    /// Error callback.
    pub on_error: Option<ErrorCallback>,
}

impl<T: ResultData> EffectiveOptions<T> {
    /// Resolve caller options against the lazy state. Pure: no side
    /// effects, inputs untouched.
    #[must_use]
    pub fn resolve(base: &QueryOptions<T>, lazy: &LazyState) -> Self {
        let (variables, context) = match lazy.overrides() {
            Some(overrides) if lazy.armed() => (
                base.variables.merged(&overrides.variables),
                base.context.merged(&overrides.context),
            ),
            _ => (base.variables.clone(), base.context.clone()),
        };

        Self {
            document: base.document.clone(),
            variables,
            fetch_policy: base.fetch_policy,
            // A triggered lazy query can never be skipped.
            skip: base.skip && !lazy.armed(),
            ssr: base.ssr,
            poll_interval: base.poll_interval,
            partial_refetch: base.partial_refetch,
            context,
            on_completed: base.on_completed.clone(),
            on_error: base.on_error.clone(),
        }
    }

    /// The executor-facing record, with the fetch policy downgraded when a
    /// server render pass is in progress.
    #[must_use]
    pub fn watch_options(&self, server_render: bool) -> WatchOptions {
        let fetch_policy = if server_render {
            self.fetch_policy.for_server_render()
        } else {
            self.fetch_policy
        };
        WatchOptions {
            document: self.document.clone(),
            variables: self.variables.clone(),
            fetch_policy,
            poll_interval: self.poll_interval,
            context: self.context.clone(),
        }
    }
}

impl<T: ResultData> fmt::Debug for EffectiveOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveOptions")
            .field("document", &self.document)
            .field("variables", &self.variables)
            .field("fetch_policy", &self.fetch_policy)
            .field("skip", &self.skip)
            .field("ssr", &self.ssr)
            .field("partial_refetch", &self.partial_refetch)
            .finish()
    }
}
