#![forbid(unsafe_code)]

//! Flat facet reconciliation.
//!
//! [`reconcile`] merges three independently updated sources into the local
//! filter cache that rendering reads:
//!
//! ```text
//!   remote snapshot ─┐
//!   previous cache  ─┼─► reconcile ─► new cache
//!   selections      ─┘
//! ```
//!
//! # Algorithm
//!
//! 1. Key remote and local facets by `(field, op, type)`, selections by
//!    `(field, op)`.
//! 2. Visit local-only keys first (cache order), then remote keys (response
//!    order). Facets the user already has context on keep their position.
//! 3. Local-only + selected: emit a *frozen* copy (counts zeroed, list
//!    selections strip every unselected option). Local-only + unselected: drop.
//! 4. Remote-only: emit unchanged.
//! 5. Both: when there is a list selection and both sides carry values,
//!    prepend local entries that are selected but missing from the response
//!    (count 0). Hierarchical facets also keep the direct parent of a selected
//!    path. Otherwise emit the remote facet.
//! 6. Parallel arrays are rebuilt from a single entry list, so they never
//!    desynchronize.
//!
//! # Invariants
//!
//! 1. Pure: inputs are borrowed and never mutated.
//! 2. Idempotent: reconciling the output again against the same remote and
//!    selections yields an equal value.
//! 3. A selection whose `(field, op)` never appeared locally or remotely
//!    contributes nothing to the output.
//!
//! [`reconcile_snapshot`] adds the write decision on top.

use crate::model::{
    Facet, FacetKey, FacetKind, FacetValue, SelectedFilter, SelectionKey, ValueEntry, ValueList,
};
use crate::snapshot::FacetSnapshot;
use std::collections::{HashMap, HashSet};

// ─────────────────────────────────────────────────────────────────────────────
// Local cache
// ─────────────────────────────────────────────────────────────────────────────

/// The last reconciled, rendering-ready view of the facets.
///
/// `revision` changes on every write, even when `facets` is unchanged;
/// downstream consumers use it as the identity of the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFilterCache {
    revision: u64,
    source_revision: Option<u64>,
    facets: Vec<Facet>,
}

impl LocalFilterCache {
    /// The empty cache a session starts with.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            revision: 0,
            source_revision: None,
            facets: Vec::new(),
        }
    }

    /// Create a cache value.
    ///
    /// `source_revision` is the snapshot revision the facets were reconciled
    /// against, or `None` for a cache restored from history.
    #[must_use]
    pub fn new(revision: u64, source_revision: Option<u64>, facets: Vec<Facet>) -> Self {
        Self {
            revision,
            source_revision,
            facets,
        }
    }

    /// Identity of this cache value.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Snapshot revision this cache was built from.
    #[must_use]
    pub fn source_revision(&self) -> Option<u64> {
        self.source_revision
    }

    /// Facets in display order.
    #[must_use]
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// Find a facet by key.
    #[must_use]
    pub fn get(&self, key: &FacetKey) -> Option<&Facet> {
        self.facets.iter().find(|f| &f.key() == key)
    }

    /// Find a facet by selection key (first match of any type).
    #[must_use]
    pub fn find(&self, key: &SelectionKey) -> Option<&Facet> {
        self.facets
            .iter()
            .find(|f| f.field == key.field && f.op == key.op)
    }

    /// Number of facets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facets.len()
    }

    /// Whether the cache has no facets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }
}

impl Default for LocalFilterCache {
    fn default() -> Self {
        Self::empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge
// ─────────────────────────────────────────────────────────────────────────────

/// Reconcile remote facets against the previous cache and the selections.
#[must_use]
pub fn reconcile(remote: &[Facet], local: &[Facet], selected: &[SelectedFilter]) -> Vec<Facet> {
    let remote_keys: HashSet<FacetKey> = remote.iter().map(Facet::key).collect();
    let local_by_key = first_by_key(local);

    let mut selected_by_key: HashMap<SelectionKey, &SelectedFilter> =
        HashMap::with_capacity(selected.len());
    for filter in selected {
        selected_by_key.entry(filter.key()).or_insert(filter);
    }

    let mut out = Vec::with_capacity(remote.len() + local.len());

    let mut seen = HashSet::with_capacity(local.len());
    for facet in local {
        let key = facet.key();
        if remote_keys.contains(&key) || !seen.insert(key.clone()) {
            continue;
        }
        match selected_by_key.get(&key.selection_key()) {
            Some(selection) => {
                crate::trace!(key = %key, "freezing stale selected facet");
                out.push(freeze(facet, selection));
            }
            None => {
                crate::trace!(key = %key, "dropping stale facet");
            }
        }
    }

    let mut seen = HashSet::with_capacity(remote.len());
    for facet in remote {
        let key = facet.key();
        if !seen.insert(key.clone()) {
            continue;
        }
        let merged = match (
            local_by_key.get(&key),
            selected_by_key.get(&key.selection_key()),
        ) {
            (Some(local_facet), Some(selection)) => merge(facet, local_facet, selection),
            _ => facet.clone(),
        };
        out.push(merged);
    }

    out
}

fn first_by_key(facets: &[Facet]) -> HashMap<FacetKey, &Facet> {
    let mut map = HashMap::with_capacity(facets.len());
    for facet in facets {
        map.entry(facet.key()).or_insert(facet);
    }
    map
}

/// Frozen form of a facet the server stopped returning.
fn freeze(local: &Facet, selection: &SelectedFilter) -> Facet {
    let Some(list) = local.meta.values() else {
        return local.clone();
    };
    let chosen: Option<HashSet<&FacetValue>> = selection
        .data
        .as_list()
        .map(|values| values.iter().collect());

    let entries = list
        .entries()
        .into_iter()
        .filter(|entry| chosen.as_ref().is_none_or(|c| c.contains(&entry.value)))
        .map(|entry| ValueEntry {
            count: Some(0),
            ..entry
        })
        .collect();

    local.with_values(ValueList::from_entries(entries, list))
}

/// Value-level merge of a facet present on both sides.
fn merge(remote: &Facet, local: &Facet, selection: &SelectedFilter) -> Facet {
    let (Some(remote_list), Some(local_list), Some(chosen)) = (
        remote.meta.values(),
        local.meta.values(),
        selection.data.as_list(),
    ) else {
        return remote.clone();
    };

    let remote_values: HashSet<&FacetValue> = remote_list.values.iter().collect();
    let chosen_set: HashSet<&FacetValue> = chosen.iter().collect();
    let hierarchical = remote.meta.kind() == FacetKind::CheckboxHierarchical;

    let mut retained = Vec::new();
    let mut retained_values = HashSet::new();
    for entry in local_list.entries() {
        if remote_values.contains(&entry.value) || retained_values.contains(&entry.value) {
            continue;
        }
        let keep = chosen_set.contains(&entry.value)
            || (hierarchical && chosen.iter().any(|c| entry.value.is_parent_of(c)));
        if keep {
            retained_values.insert(entry.value.clone());
            retained.push(ValueEntry {
                count: Some(0),
                ..entry
            });
        }
    }

    if retained.is_empty() {
        return remote.clone();
    }

    crate::trace!(
        field = %remote.field,
        retained = retained.len(),
        "retaining selected options missing from response"
    );

    let entries = retained
        .into_iter()
        .chain(remote_list.entries())
        .collect();
    remote.with_values(ValueList::from_entries(entries, remote_list))
}

// ─────────────────────────────────────────────────────────────────────────────
// Write decision
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// A new cache value must be published.
    Write {
        facets: Vec<Facet>,
        /// Snapshot revision the facets were reconciled against.
        source_revision: u64,
    },
    /// The snapshot is the one the previous cache came from and the merged
    /// facets equal it; publishing would only cause redundant recomputation.
    Unchanged,
}

impl ReconcileOutcome {
    /// Whether a write is required.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

/// Reconcile and decide whether the result must be written.
///
/// A new snapshot revision always produces a write, even when the merged
/// facets equal the previous cache: consumers keyed on the cache identity
/// (hierarchical trees in particular) must observe every response.
#[must_use]
pub fn reconcile_snapshot(
    remote: &FacetSnapshot,
    previous: &LocalFilterCache,
    selected: &[SelectedFilter],
) -> ReconcileOutcome {
    let facets = reconcile(remote.facets(), previous.facets(), selected);
    let remote_changed = previous.source_revision() != Some(remote.revision());
    if !remote_changed && facets == previous.facets() {
        return ReconcileOutcome::Unchanged;
    }
    ReconcileOutcome::Write {
        facets,
        source_revision: remote.revision(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FacetMeta, FilterData, FilterOp};
    use pretty_assertions::assert_eq;

    fn checkbox(field: &str, list: ValueList) -> Facet {
        Facet::new(field, FilterOp::Any, FacetMeta::Checkbox(list))
    }

    fn hierarchical(field: &str, list: ValueList) -> Facet {
        Facet::new(field, FilterOp::Any, FacetMeta::CheckboxHierarchical(list))
    }

    fn values_of(facet: &Facet) -> &ValueList {
        facet.meta.values().unwrap()
    }

    #[test]
    fn retained_selection_is_prepended_with_zero_count() {
        let remote = vec![checkbox(
            "color",
            ValueList::new(["red", "blue"]).with_counts([5, 3]),
        )];
        let cache = vec![checkbox(
            "color",
            ValueList::new(["red", "blue", "green"]).with_counts([2, 1, 4]),
        )];
        let selected = vec![SelectedFilter::list("color", FilterOp::Any, ["green"])];

        let out = reconcile(&remote, &cache, &selected);
        assert_eq!(out.len(), 1);
        let list = values_of(&out[0]);
        assert_eq!(list.values, ValueList::new(["green", "red", "blue"]).values);
        assert_eq!(list.counts, Some(vec![0, 5, 3]));
    }

    #[test]
    fn retained_entry_keeps_local_name_and_swatch() {
        let remote = vec![Facet::new(
            "color",
            FilterOp::Any,
            FacetMeta::CheckboxColor(
                ValueList::new(["red"])
                    .with_names(["Red"])
                    .with_swatches(["#f00"])
                    .with_counts([9]),
            ),
        )];
        let cache = vec![Facet::new(
            "color",
            FilterOp::Any,
            FacetMeta::CheckboxColor(
                ValueList::new(["teal"])
                    .with_names(["Teal"])
                    .with_swatches(["#088"])
                    .with_counts([2]),
            ),
        )];
        let selected = vec![SelectedFilter::list("color", FilterOp::Any, ["teal"])];

        let out = reconcile(&remote, &cache, &selected);
        let list = values_of(&out[0]);
        assert!(list.is_aligned());
        assert_eq!(list.names, Some(vec!["Teal".into(), "Red".into()]));
        assert_eq!(list.swatches, Some(vec!["#088".into(), "#f00".into()]));
        assert_eq!(list.counts, Some(vec![0, 9]));
    }

    #[test]
    fn stale_selected_facet_is_frozen_and_stripped() {
        let cache = vec![checkbox(
            "brand",
            ValueList::new(["acme", "globex", "initech"])
                .with_names(["Acme", "Globex", "Initech"])
                .with_counts([3, 8, 1]),
        )];
        let selected = vec![SelectedFilter::list("brand", FilterOp::Any, ["globex"])];

        let out = reconcile(&[], &cache, &selected);
        assert_eq!(out.len(), 1);
        let list = values_of(&out[0]);
        assert_eq!(list.values, vec![FacetValue::from("globex")]);
        assert_eq!(list.names, Some(vec!["Globex".into()]));
        assert_eq!(list.counts, Some(vec![0]));
    }

    #[test]
    fn stale_unselected_facet_is_dropped() {
        let cache = vec![checkbox("brand", ValueList::new(["acme"]))];
        assert!(reconcile(&[], &cache, &[]).is_empty());
    }

    #[test]
    fn stale_scalar_selection_freezes_without_stripping() {
        let cache = vec![checkbox(
            "brand",
            ValueList::new(["acme", "globex"]).with_counts([1, 2]),
        )];
        let selected = vec![SelectedFilter::new(
            "brand",
            FilterOp::Any,
            FilterData::Scalar("acme".into()),
        )];
        let out = reconcile(&[], &cache, &selected);
        let list = values_of(&out[0]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.counts, Some(vec![0, 0]));
    }

    #[test]
    fn never_seen_selection_is_absent() {
        let remote = vec![checkbox("brand", ValueList::new(["acme"]))];
        let selected = vec![SelectedFilter::list("material", FilterOp::Any, ["wool"])];
        let out = reconcile(&remote, &[], &selected);
        assert_eq!(out, remote);
    }

    #[test]
    fn local_only_facets_come_first() {
        let remote = vec![
            checkbox("brand", ValueList::new(["acme"])),
            checkbox("size", ValueList::new(["m"])),
        ];
        let cache = vec![
            checkbox("size", ValueList::new(["m"])),
            checkbox("material", ValueList::new(["wool", "silk"])),
        ];
        let selected = vec![SelectedFilter::list("material", FilterOp::Any, ["silk"])];

        let out = reconcile(&remote, &cache, &selected);
        let fields: Vec<&str> = out.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["material", "brand", "size"]);
    }

    #[test]
    fn range_facets_take_remote() {
        let remote = vec![Facet::new(
            "price",
            FilterOp::Between,
            FacetMeta::Range { min: 0.0, max: 50.0 },
        )];
        let cache = vec![Facet::new(
            "price",
            FilterOp::Between,
            FacetMeta::Range { min: 0.0, max: 90.0 },
        )];
        let selected = vec![SelectedFilter::new(
            "price",
            FilterOp::Between,
            FilterData::Range(10.0, 80.0),
        )];
        assert_eq!(reconcile(&remote, &cache, &selected), remote);
    }

    #[test]
    fn type_change_is_a_different_facet() {
        let remote = vec![Facet::new(
            "size",
            FilterOp::Any,
            FacetMeta::Radio(ValueList::new(["m"])),
        )];
        let cache = vec![checkbox("size", ValueList::new(["m", "xl"]))];
        let selected = vec![SelectedFilter::list("size", FilterOp::Any, ["xl"])];

        let out = reconcile(&remote, &cache, &selected);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].meta.kind(), FacetKind::Checkbox);
        assert_eq!(values_of(&out[0]).values, vec![FacetValue::from("xl")]);
        assert_eq!(out[1], remote[0]);
    }

    #[test]
    fn hierarchical_keeps_direct_parent_of_selection() {
        let remote = vec![hierarchical(
            "category",
            ValueList::new([FacetValue::path(["Bags"])]).with_counts([7]),
        )];
        let cache = vec![hierarchical(
            "category",
            ValueList::new([
                FacetValue::path(["Shoes"]),
                FacetValue::path(["Shoes", "Boots"]),
                FacetValue::path(["Shoes", "Sneakers"]),
                FacetValue::path(["Bags"]),
            ])
            .with_names(["Shoes", "Boots", "Sneakers", "Bags"])
            .with_counts([9, 4, 5, 3]),
        )];
        let selected = vec![SelectedFilter::list(
            "category",
            FilterOp::Any,
            [FacetValue::path(["Shoes", "Boots"])],
        )];

        let out = reconcile(&remote, &cache, &selected);
        let list = values_of(&out[0]);
        assert_eq!(
            list.values,
            vec![
                FacetValue::path(["Shoes"]),
                FacetValue::path(["Shoes", "Boots"]),
                FacetValue::path(["Bags"]),
            ]
        );
        assert_eq!(list.names, Some(vec!["Shoes".into(), "Boots".into(), "Bags".into()]));
        assert_eq!(list.counts, Some(vec![0, 0, 7]));
    }

    #[test]
    fn flat_facets_do_not_apply_parent_rule() {
        let remote = vec![checkbox("tag", ValueList::new(["x"]))];
        let cache = vec![checkbox(
            "tag",
            ValueList::new([FacetValue::path(["a"]), FacetValue::path(["a", "b"])]),
        )];
        let selected = vec![SelectedFilter::list(
            "tag",
            FilterOp::Any,
            [FacetValue::path(["a", "b"])],
        )];
        let out = reconcile(&remote, &cache, &selected);
        assert_eq!(values_of(&out[0]).len(), 2);
    }

    #[test]
    fn unchanged_when_same_revision_and_equal() {
        let snapshot = FacetSnapshot::new(
            4,
            vec![checkbox("brand", ValueList::new(["acme"]).with_counts([2]))],
        );
        let first = reconcile_snapshot(&snapshot, &LocalFilterCache::empty(), &[]);
        let ReconcileOutcome::Write {
            facets,
            source_revision,
        } = first
        else {
            panic!("first pass must write");
        };
        assert_eq!(source_revision, 4);

        let cache = LocalFilterCache::new(1, Some(source_revision), facets);
        assert_eq!(
            reconcile_snapshot(&snapshot, &cache, &[]),
            ReconcileOutcome::Unchanged
        );
    }

    #[test]
    fn new_revision_always_writes() {
        let facets = vec![checkbox("brand", ValueList::new(["acme"]))];
        let cache = LocalFilterCache::new(1, Some(4), facets.clone());
        let next = FacetSnapshot::new(5, facets);
        assert!(reconcile_snapshot(&next, &cache, &[]).is_write());
    }

    #[test]
    fn restored_cache_always_writes() {
        let facets = vec![checkbox("brand", ValueList::new(["acme"]))];
        let cache = LocalFilterCache::new(1, None, facets.clone());
        let snapshot = FacetSnapshot::new(0, facets);
        assert!(reconcile_snapshot(&snapshot, &cache, &[]).is_write());
    }
}
