#![forbid(unsafe_code)]

//! The result payload seam.
//!
//! The binding layer is generic over the shape of query data. It needs two
//! things from a payload: deep equality (render suppression, option diffing)
//! and a shallow merge (keeping last-known fields visible while a refetch is
//! in flight). [`ResultData`] captures exactly that.

use serde_json::Value;
use std::fmt;

/// A query result payload.
///
/// `shallow_merge` combines a previously rendered payload with a newly
/// arrived one while the query is loading: top-level fields of `overlay`
/// win, fields only present in `base` survive. For non-mergeable shapes the
/// overlay simply replaces the base.
pub trait ResultData: Clone + PartialEq + fmt::Debug + 'static {
    /// Merge `overlay` over `base`, field by field at the top level.
    #[must_use]
    fn shallow_merge(base: &Self, overlay: &Self) -> Self;
}

/// Dynamic JSON payloads merge object keys at the top level; any other
/// combination of shapes is replaced wholesale by the overlay.
impl ResultData for Value {
    fn shallow_merge(base: &Self, overlay: &Self) -> Self {
        match (base, overlay) {
            (Value::Object(b), Value::Object(o)) => {
                let mut merged = b.clone();
                for (k, v) in o {
                    merged.insert(k.clone(), v.clone());
                }
                Value::Object(merged)
            }
            _ => overlay.clone(),
        }
    }
}

/// Degenerate payload for bindings that only care about loading/error state.
impl ResultData for () {
    fn shallow_merge(_base: &Self, _overlay: &Self) -> Self {}
}
