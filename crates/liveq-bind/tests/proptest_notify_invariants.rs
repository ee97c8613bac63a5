//! Property-based invariant tests for the notification comparator.
//!
//! These must hold for **any** pair of (previous, incoming) states:
//!
//! 1. An incoming state deeply equal to the previous one never renders.
//! 2. While a fetch-more is in flight, unchanged data never renders,
//!    whatever the incoming loading/status fields say.
//! 3. Any change in data renders, unless invariant 2 applies.
//! 4. Outside the two suppression rules, any change in loading or status
//!    renders.
//! 5. The comparator is deterministic.

#![forbid(unsafe_code)]

use liveq_bind::{NotifyDecision, classify_notification};
use liveq_core::{NetworkStatus, Notification};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

fn status() -> impl Strategy<Value = NetworkStatus> {
    prop_oneof![
        Just(NetworkStatus::Loading),
        Just(NetworkStatus::SetVariables),
        Just(NetworkStatus::FetchMore),
        Just(NetworkStatus::Refetch),
        Just(NetworkStatus::Poll),
        Just(NetworkStatus::Ready),
        Just(NetworkStatus::Error),
    ]
}

/// A tiny data domain: collisions between previous and incoming are common,
/// which is exactly what exercises the suppression rules.
fn data() -> impl Strategy<Value = Option<u8>> {
    prop_oneof![Just(None), (0u8..4).prop_map(Some)]
}

prop_compose! {
    fn state()(loading in any::<bool>(), status in status(), data in data())
        -> (bool, NetworkStatus, Option<u8>) {
        (loading, status, data)
    }
}

fn notification(state: &(bool, NetworkStatus, Option<u8>)) -> Notification<u8> {
    Notification {
        loading: state.0,
        network_status: state.1,
        data: state.2,
    }
}

// ── 1. Deep-equal states never render ───────────────────────────────────

proptest! {
    #[test]
    fn equal_states_never_render(prev in state()) {
        let incoming = notification(&prev);
        let decision =
            classify_notification(prev.0, prev.1, prev.2.as_ref(), &incoming);
        prop_assert!(!decision.should_render());
    }
}

// ── 2. Fetch-more artifacts never render ────────────────────────────────

proptest! {
    #[test]
    fn fetch_more_with_unchanged_data_never_renders(
        data in data(),
        incoming_loading in any::<bool>(),
        incoming_status in status(),
    ) {
        let incoming = Notification {
            loading: incoming_loading,
            network_status: incoming_status,
            data,
        };
        let decision = classify_notification(
            true,
            NetworkStatus::FetchMore,
            data.as_ref(),
            &incoming,
        );
        prop_assert_eq!(decision, NotifyDecision::SuppressFetchMoreArtifact);
    }
}

// ── 3. Data changes render ──────────────────────────────────────────────

proptest! {
    #[test]
    fn changed_data_renders(prev in state(), incoming in state()) {
        prop_assume!(prev.2 != incoming.2);
        let decision =
            classify_notification(prev.0, prev.1, prev.2.as_ref(), &notification(&incoming));
        prop_assert_eq!(decision, NotifyDecision::Render);
    }
}

// ── 4. Loading/status changes render outside the suppression rules ──────

proptest! {
    #[test]
    fn changed_flags_render_unless_fetch_more_artifact(
        prev in state(),
        incoming in state(),
    ) {
        prop_assume!(prev.2 == incoming.2);
        prop_assume!((prev.0, prev.1) != (incoming.0, incoming.1));
        // Outside the fetch-more window, a flag change must render.
        prop_assume!(!(prev.0 && prev.1 == NetworkStatus::FetchMore));

        let decision =
            classify_notification(prev.0, prev.1, prev.2.as_ref(), &notification(&incoming));
        prop_assert_eq!(decision, NotifyDecision::Render);
    }
}

// ── 5. Determinism ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn classification_is_deterministic(prev in state(), incoming in state()) {
        let n = notification(&incoming);
        let a = classify_notification(prev.0, prev.1, prev.2.as_ref(), &n);
        let b = classify_notification(prev.0, prev.1, prev.2.as_ref(), &n);
        prop_assert_eq!(a, b);
    }
}
