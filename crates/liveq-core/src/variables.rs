#![forbid(unsafe_code)]

//! Operation variables and ambient request context.
//!
//! [`Variables`] is an ordered string → JSON map with the shallow-merge rule
//! used everywhere options are layered: the override side wins on key
//! collision, untouched keys pass through. The same type carries the ambient
//! request context, which merges identically.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered map of variable name → JSON value.
///
/// Equality is deep (`PartialEq` over the JSON values), which is what the
/// binding layer's option diffing and callback dedup rely on.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<String, Value>);

impl Variables {
    /// An empty variable set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert or replace one variable.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a variable by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Shallow merge: every key of `overrides` wins, the rest of `self`
    /// passes through. Neither input is modified.
    #[must_use]
    pub fn merged(&self, overrides: &Variables) -> Variables {
        let mut out = self.0.clone();
        for (k, v) in &overrides.0 {
            out.insert(k.clone(), v.clone());
        }
        Variables(out)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Variables(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Debug for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

/// Build a [`Variables`] map from `key => value` pairs.
///
/// ```
/// use liveq_core::vars;
///
/// let v = vars! { "id" => 1, "name" => "hero" };
/// assert_eq!(v.len(), 2);
/// ```
#[macro_export]
macro_rules! vars {
    () => { $crate::Variables::new() };
    ($($key:expr => $value:tt),+ $(,)?) => {{
        let mut v = $crate::Variables::new();
        $( v.insert($key, $crate::__serde_json::json!($value)); )+
        v
    }};
}
