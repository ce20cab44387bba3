//! Property-based invariant tests for facet reconciliation.
//!
//! 1. Reconciliation is idempotent.
//! 2. Every emitted value list has aligned parallel arrays after a merge.
//! 3. Selected options of facets the server stopped returning survive with
//!    zero counts, and nothing unselected survives with them.
//! 4. Selections for facets never seen locally or remotely contribute nothing.
//! 5. Every emitted facet is either in the response or still selected.
//! 6. The documented color scenario produces the exact expected arrays.

use fstate_core::model::{
    Facet, FacetMeta, FacetValue, FilterOp, SelectedFilter, SelectionKey, ValueList,
};
use fstate_core::reconcile::reconcile;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashSet;

// ── Helpers ─────────────────────────────────────────────────────────────

const FIELDS: &[&str] = &["color", "size", "brand", "material"];
const VALUES: &[&str] = &["a", "b", "c", "d", "e", "f"];
const SEGMENTS: &[&str] = &["x", "y", "z"];

fn value_strategy() -> impl Strategy<Value = FacetValue> {
    prop::sample::select(VALUES).prop_map(FacetValue::from)
}

fn path_strategy() -> impl Strategy<Value = FacetValue> {
    prop::collection::vec(prop::sample::select(SEGMENTS), 1..=3)
        .prop_map(FacetValue::path)
}

fn list_strategy(value: BoxedStrategy<FacetValue>) -> impl Strategy<Value = ValueList> {
    prop::collection::vec((value, 0u64..20), 0..6).prop_flat_map(|rows| {
        let n = rows.len();
        (Just(rows), any::<bool>(), 0..=n).prop_map(|(rows, with_names, counts_len)| {
            let values: Vec<FacetValue> = rows.iter().map(|(v, _)| v.clone()).collect();
            let mut list = ValueList {
                values,
                ..ValueList::default()
            };
            if with_names {
                list.names = Some(rows.iter().map(|(v, _)| v.label().to_uppercase()).collect());
            }
            // Deliberately allow short count arrays from the server.
            list.counts = Some(rows.iter().take(counts_len).map(|(_, c)| *c).collect());
            list
        })
    })
}

fn facet_strategy() -> impl Strategy<Value = Facet> {
    (
        prop::sample::select(FIELDS),
        prop_oneof![
            list_strategy(value_strategy().boxed()).prop_map(FacetMeta::Checkbox),
            list_strategy(value_strategy().boxed()).prop_map(FacetMeta::Radio),
            list_strategy(path_strategy().boxed()).prop_map(FacetMeta::CheckboxHierarchical),
            (0.0f64..10.0, 10.0f64..100.0).prop_map(|(min, max)| FacetMeta::Range { min, max }),
        ],
    )
        .prop_map(|(field, meta)| Facet::new(field, FilterOp::Any, meta))
}

fn selection_strategy() -> impl Strategy<Value = SelectedFilter> {
    (
        prop::sample::select(FIELDS),
        prop::collection::vec(prop_oneof![value_strategy(), path_strategy()], 0..4),
    )
        .prop_map(|(field, values)| SelectedFilter::list(field, FilterOp::Any, values))
}

fn facets() -> impl Strategy<Value = Vec<Facet>> {
    prop::collection::vec(facet_strategy(), 0..5)
}

fn selections() -> impl Strategy<Value = Vec<SelectedFilter>> {
    prop::collection::vec(selection_strategy(), 0..4)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Idempotence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn reconcile_is_idempotent(remote in facets(), cache in facets(), selected in selections()) {
        let once = reconcile(&remote, &cache, &selected);
        let twice = reconcile(&remote, &once, &selected);
        prop_assert_eq!(twice, once);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Parallel arrays stay aligned through merges
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn merged_lists_are_aligned(remote in facets(), cache in facets(), selected in selections()) {
        let out = reconcile(&remote, &cache, &selected);
        for facet in &out {
            let Some(list) = facet.meta.values() else { continue };
            let untouched = remote.iter().any(|r| r == facet);
            prop_assert!(
                untouched || list.is_aligned(),
                "merged facet {} has misaligned arrays: {:?}",
                facet.key(),
                list
            );
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Selection durability
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn stale_selections_are_frozen(remote in facets(), cache in facets(), selected in selections()) {
        let out = reconcile(&remote, &cache, &selected);
        let remote_keys: HashSet<_> = remote.iter().map(Facet::key).collect();

        for local in &cache {
            let key = local.key();
            if remote_keys.contains(&key) || local.meta.values().is_none() {
                continue;
            }
            let Some(selection) = selected.iter().find(|s| s.key() == local.selection_key()) else {
                continue;
            };
            let frozen = out.iter().find(|f| f.key() == key);
            prop_assert!(frozen.is_some(), "stale selected facet {} was dropped", key);
            let list = frozen.and_then(|f| f.meta.values()).expect("value list");
            prop_assert!(list.counts.as_ref().is_none_or(|c| c.iter().all(|&n| n == 0)));
            for value in &list.values {
                prop_assert!(selection.contains(value), "unselected {:?} survived", value);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4/5. Membership
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn output_is_remote_or_selected(remote in facets(), cache in facets(), selected in selections()) {
        let out = reconcile(&remote, &cache, &selected);
        let remote_keys: HashSet<_> = remote.iter().map(Facet::key).collect();
        let selected_keys: HashSet<SelectionKey> = selected.iter().map(SelectedFilter::key).collect();
        let seen_keys: HashSet<SelectionKey> = remote
            .iter()
            .chain(cache.iter())
            .map(Facet::selection_key)
            .collect();

        for facet in &out {
            prop_assert!(
                remote_keys.contains(&facet.key()) || selected_keys.contains(&facet.selection_key())
            );
            prop_assert!(seen_keys.contains(&facet.selection_key()));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Concrete scenarios
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn color_scenario() {
    let remote = vec![Facet::new(
        "color",
        FilterOp::Any,
        FacetMeta::Checkbox(ValueList::new(["red", "blue"]).with_counts([5, 3])),
    )];
    let cache = vec![Facet::new(
        "color",
        FilterOp::Any,
        FacetMeta::Checkbox(ValueList::new(["red", "blue", "green"]).with_counts([2, 1, 4])),
    )];
    let selected = vec![SelectedFilter::list("color", FilterOp::Any, ["green"])];

    let out = reconcile(&remote, &cache, &selected);
    let expected = vec![Facet::new(
        "color",
        FilterOp::Any,
        FacetMeta::Checkbox(ValueList::new(["green", "red", "blue"]).with_counts([0, 5, 3])),
    )];
    assert_eq!(out, expected);
}

/// A selection for a facet that never appeared is dropped from the cache.
/// This is the documented cold-start behavior, not a defect of the merge.
#[test]
fn cold_start_selection_is_absent() {
    let selected = vec![SelectedFilter::list("color", FilterOp::Any, ["green"])];
    assert!(reconcile(&[], &[], &selected).is_empty());
}
