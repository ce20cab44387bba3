//! Property tests for selection durability across a session's lifetime.
//!
//! Random sequences of responses, toggles, clears and history reloads must
//! never lose a selected value from the cache, never desynchronize the
//! parallel arrays, and never trip the loop guard at human pace.

use fstate_core::{Facet, FacetMeta, FacetValue, FilterOp, SelectionKey, ValueList};
use fstate_runtime::{ManualClock, MemoryHistory, ReconcilerSession, SessionConfig};
use proptest::prelude::*;
use std::time::Duration;

const COLORS: [&str; 4] = ["red", "blue", "green", "teal"];

#[derive(Debug, Clone)]
enum Op {
    /// Respond with the colors in the bitmask; 0 omits the facet.
    Ingest(u8),
    /// Toggle the n-th value currently offered.
    Toggle(usize),
    Clear,
    /// Re-read the current history entry.
    Reload,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..16).prop_map(Op::Ingest),
        3 => (0usize..8).prop_map(Op::Toggle),
        1 => Just(Op::Clear),
        1 => Just(Op::Reload),
    ]
}

fn key() -> SelectionKey {
    SelectionKey::new("color", FilterOp::Any)
}

fn response(mask: u8) -> Vec<Facet> {
    if mask == 0 {
        return Vec::new();
    }
    let picked: Vec<(usize, &str)> = COLORS
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(i, c)| (i, *c))
        .collect();
    let list = ValueList::new(picked.iter().map(|(_, c)| *c))
        .with_counts(picked.iter().map(|(i, _)| *i as u64 + 1).collect::<Vec<_>>());
    vec![Facet::new("color", FilterOp::Any, FacetMeta::Checkbox(list))]
}

fn offered(session: &ReconcilerSession) -> Vec<FacetValue> {
    session
        .cache()
        .find(&key())
        .and_then(|facet| facet.meta.values().map(|list| list.values.clone()))
        .unwrap_or_default()
}

fn selected_values(session: &ReconcilerSession) -> Vec<FacetValue> {
    session
        .selected()
        .iter()
        .find(|f| f.key() == key())
        .and_then(|f| f.data.as_list().map(<[FacetValue]>::to_vec))
        .unwrap_or_default()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn selected_values_stay_offered(ops in proptest::collection::vec(op(), 1..40)) {
        let clock = ManualClock::new();
        let session = ReconcilerSession::builder()
            .with_config(SessionConfig::default())
            .with_clock(clock.clone())
            .with_history(MemoryHistory::new())
            .build();
        session.ingest(response(0b1111));

        for op in ops {
            clock.advance(Duration::from_secs(2));
            match op {
                Op::Ingest(mask) => {
                    session.ingest(response(mask));
                }
                Op::Toggle(n) => {
                    let values = offered(&session);
                    if !values.is_empty() {
                        session.toggle_value(&key(), values[n % values.len()].clone());
                    }
                }
                Op::Clear => {
                    session.clear_filters();
                }
                Op::Reload => {
                    let before = session.selected();
                    session.restore_from_history().unwrap();
                    prop_assert_eq!(session.selected(), before);
                }
            }
            session.microtasks().drain();

            let offered = offered(&session);
            for value in selected_values(&session) {
                prop_assert!(offered.contains(&value), "{value:?} missing from {offered:?}");
            }
            for facet in session.cache().facets() {
                prop_assert!(facet.meta.values().is_none_or(ValueList::is_aligned));
            }
            prop_assert!(!session.is_guard_tripped());
        }
    }
}
