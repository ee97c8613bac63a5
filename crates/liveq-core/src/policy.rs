#![forbid(unsafe_code)]

//! Fetch policies.

use serde::{Deserialize, Serialize};

/// Controls whether a query prefers the cache, the network, or a combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Read from cache; go to the network only on a miss.
    #[default]
    CacheFirst,
    /// Answer from cache immediately, then refresh from the network.
    CacheAndNetwork,
    /// Always go to the network.
    NetworkOnly,
    /// Never go to the network; a cache miss is a miss.
    CacheOnly,
    /// Go to the network and do not write the result to the cache.
    NoCache,
    /// Do not fetch at all; updates arrive only via cache writes.
    Standby,
}

impl FetchPolicy {
    /// Policy override for a server render pass.
    ///
    /// Network-bound policies are downgraded to `CacheFirst` so a prefetch
    /// pass never issues a network request it cannot await twice.
    #[must_use]
    pub fn for_server_render(self) -> FetchPolicy {
        match self {
            FetchPolicy::NetworkOnly | FetchPolicy::CacheAndNetwork => FetchPolicy::CacheFirst,
            other => other,
        }
    }
}
