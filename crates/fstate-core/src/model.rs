#![forbid(unsafe_code)]

//! Facet and selection data model.
//!
//! A [`Facet`] is one filterable field as the listing API describes it; a
//! [`SelectedFilter`] is the user's durable intent for a field. The two are
//! matched by key:
//!
//! | Type | Key | Notes |
//! |------|-----|-------|
//! | [`Facet`] | [`FacetKey`] `(field, op, type)` | type-sensitive |
//! | [`SelectedFilter`] | [`SelectionKey`] `(field, op)` | type-agnostic |
//!
//! # Invariants
//!
//! 1. [`ValueList`] arrays are parallel: when `names`, `counts` or `swatches`
//!    are present they are indexed by the same position as `values`.
//!    [`ValueList::from_entries`] always produces aligned arrays.
//! 2. Model values are plain data. Nothing here holds reactive state, so a
//!    clone is always a fully detached copy.

use serde::{Deserialize, Serialize};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Operators and values
// ─────────────────────────────────────────────────────────────────────────────

/// Comparison operator of a facet or selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    /// Exact match on a single value.
    Eq,
    /// Match any of the listed values.
    Any,
    /// Match all of the listed values.
    All,
    /// Exclude the listed values.
    #[serde(rename = "none")]
    NoneOf,
    /// Inclusive numeric range.
    Between,
}

impl FilterOp {
    /// Wire name of the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Any => "any",
            Self::All => "all",
            Self::NoneOf => "none",
            Self::Between => "between",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single facet value: a scalar, or a category path for hierarchical facets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetValue {
    Bool(bool),
    Int(i64),
    /// Fractional numbers and integers outside the `i64` range.
    Number(serde_json::Number),
    Text(String),
    /// Category path, root first (e.g. `["Shoes", "Boots"]`).
    Path(Vec<String>),
}

impl FacetValue {
    /// Build a path value from segments.
    #[must_use]
    pub fn path<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Path(segments.into_iter().map(Into::into).collect())
    }

    /// Human-readable fallback label used when the API sends no name.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
            Self::Path(segments) => segments.last().cloned().unwrap_or_default(),
        }
    }

    /// Path segments of this value. Scalars are treated as a single root segment.
    #[must_use]
    pub fn segments(&self) -> Vec<String> {
        match self {
            Self::Path(segments) => segments.clone(),
            other => vec![other.label()],
        }
    }

    /// Whether `self` is the direct parent path of `child`
    /// (a strict prefix exactly one segment shorter).
    #[must_use]
    pub fn is_parent_of(&self, child: &FacetValue) -> bool {
        match (self, child) {
            (Self::Path(parent), Self::Path(child)) => {
                parent.len() + 1 == child.len() && child.starts_with(parent)
            }
            _ => false,
        }
    }
}

impl From<&str> for FacetValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FacetValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FacetValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<serde_json::Number> for FacetValue {
    fn from(value: serde_json::Number) -> Self {
        value.as_i64().map_or(Self::Number(value), Self::Int)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value lists
// ─────────────────────────────────────────────────────────────────────────────

/// Parallel arrays describing the options of a value-list facet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValueList {
    pub values: Vec<FacetValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swatches: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_title: Option<String>,
    #[serde(default)]
    pub group_expanded: bool,
}

/// One row of a [`ValueList`], used to edit the parallel arrays as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEntry {
    pub value: FacetValue,
    pub name: Option<String>,
    pub count: Option<u64>,
    pub swatch: Option<String>,
}

impl ValueList {
    /// Create a list with only values.
    #[must_use]
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FacetValue>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the display names.
    #[must_use]
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Set the per-value result counts.
    #[must_use]
    pub fn with_counts(mut self, counts: impl Into<Vec<u64>>) -> Self {
        self.counts = Some(counts.into());
        self
    }

    /// Set the color swatches.
    #[must_use]
    pub fn with_swatches<I, S>(mut self, swatches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.swatches = Some(swatches.into_iter().map(Into::into).collect());
        self
    }

    /// Set the group title.
    #[must_use]
    pub fn with_group_title(mut self, title: impl Into<String>) -> Self {
        self.group_title = Some(title.into());
        self
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the list has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Split the parallel arrays into rows.
    ///
    /// Arrays shorter than `values` yield `None` for the missing positions;
    /// extra trailing elements are ignored.
    #[must_use]
    pub fn entries(&self) -> Vec<ValueEntry> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, value)| ValueEntry {
                value: value.clone(),
                name: self.names.as_ref().and_then(|n| n.get(i).cloned()),
                count: self.counts.as_ref().and_then(|c| c.get(i).copied()),
                swatch: self.swatches.as_ref().and_then(|s| s.get(i).cloned()),
            })
            .collect()
    }

    /// Rebuild aligned parallel arrays from rows.
    ///
    /// An optional array is emitted when at least one row carries that field;
    /// rows without it are filled (name falls back to the value label, count
    /// to 0, swatch to an empty string). Group metadata is taken from
    /// `template`.
    #[must_use]
    pub fn from_entries(entries: Vec<ValueEntry>, template: &ValueList) -> Self {
        let any_name = entries.iter().any(|e| e.name.is_some());
        let any_count = entries.iter().any(|e| e.count.is_some());
        let any_swatch = entries.iter().any(|e| e.swatch.is_some());

        let mut values = Vec::with_capacity(entries.len());
        let mut names = Vec::with_capacity(if any_name { entries.len() } else { 0 });
        let mut counts = Vec::with_capacity(if any_count { entries.len() } else { 0 });
        let mut swatches = Vec::with_capacity(if any_swatch { entries.len() } else { 0 });

        for entry in entries {
            if any_name {
                names.push(entry.name.unwrap_or_else(|| entry.value.label()));
            }
            if any_count {
                counts.push(entry.count.unwrap_or(0));
            }
            if any_swatch {
                swatches.push(entry.swatch.unwrap_or_default());
            }
            values.push(entry.value);
        }

        Self {
            values,
            names: any_name.then_some(names),
            counts: any_count.then_some(counts),
            swatches: any_swatch.then_some(swatches),
            group_title: template.group_title.clone(),
            group_expanded: template.group_expanded,
        }
    }

    /// Whether every present optional array has the same length as `values`.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        let n = self.values.len();
        self.names.as_ref().is_none_or(|v| v.len() == n)
            && self.counts.as_ref().is_none_or(|v| v.len() == n)
            && self.swatches.as_ref().is_none_or(|v| v.len() == n)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Facets
// ─────────────────────────────────────────────────────────────────────────────

/// Discriminant of [`FacetMeta`], part of the facet identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetKind {
    Range,
    Checkbox,
    CheckboxColor,
    CheckboxGrid,
    Radio,
    CheckboxHierarchical,
}

impl FacetKind {
    /// Wire name of the facet type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Range => "range",
            Self::Checkbox => "checkbox",
            Self::CheckboxColor => "checkbox-color",
            Self::CheckboxGrid => "checkbox-grid",
            Self::Radio => "radio",
            Self::CheckboxHierarchical => "checkbox-hierarchical",
        }
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific facet payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FacetMeta {
    Range { min: f64, max: f64 },
    Checkbox(ValueList),
    CheckboxColor(ValueList),
    CheckboxGrid(ValueList),
    Radio(ValueList),
    CheckboxHierarchical(ValueList),
}

impl FacetMeta {
    /// The variant discriminant.
    #[must_use]
    pub const fn kind(&self) -> FacetKind {
        match self {
            Self::Range { .. } => FacetKind::Range,
            Self::Checkbox(_) => FacetKind::Checkbox,
            Self::CheckboxColor(_) => FacetKind::CheckboxColor,
            Self::CheckboxGrid(_) => FacetKind::CheckboxGrid,
            Self::Radio(_) => FacetKind::Radio,
            Self::CheckboxHierarchical(_) => FacetKind::CheckboxHierarchical,
        }
    }

    /// The value list, if this variant carries one.
    #[must_use]
    pub const fn values(&self) -> Option<&ValueList> {
        match self {
            Self::Range { .. } => None,
            Self::Checkbox(list)
            | Self::CheckboxColor(list)
            | Self::CheckboxGrid(list)
            | Self::Radio(list)
            | Self::CheckboxHierarchical(list) => Some(list),
        }
    }

    /// Same variant with its value list replaced. Ranges are returned as-is.
    #[must_use]
    pub fn with_values(&self, list: ValueList) -> Self {
        match self {
            Self::Range { min, max } => Self::Range {
                min: *min,
                max: *max,
            },
            Self::Checkbox(_) => Self::Checkbox(list),
            Self::CheckboxColor(_) => Self::CheckboxColor(list),
            Self::CheckboxGrid(_) => Self::CheckboxGrid(list),
            Self::Radio(_) => Self::Radio(list),
            Self::CheckboxHierarchical(_) => Self::CheckboxHierarchical(list),
        }
    }
}

/// One filterable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub field: String,
    pub op: FilterOp,
    pub meta: FacetMeta,
}

impl Facet {
    /// Create a facet.
    #[must_use]
    pub fn new(field: impl Into<String>, op: FilterOp, meta: FacetMeta) -> Self {
        Self {
            field: field.into(),
            op,
            meta,
        }
    }

    /// Identity key `(field, op, type)`.
    #[must_use]
    pub fn key(&self) -> FacetKey {
        FacetKey {
            field: self.field.clone(),
            op: self.op,
            kind: self.meta.kind(),
        }
    }

    /// Key of the selection that targets this facet.
    #[must_use]
    pub fn selection_key(&self) -> SelectionKey {
        SelectionKey::new(self.field.clone(), self.op)
    }

    /// Copy of this facet with a different value list.
    #[must_use]
    pub fn with_values(&self, list: ValueList) -> Self {
        Self {
            field: self.field.clone(),
            op: self.op,
            meta: self.meta.with_values(list),
        }
    }
}

/// Facet identity: `(field, op, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FacetKey {
    pub field: String,
    pub op: FilterOp,
    pub kind: FacetKind,
}

impl FacetKey {
    /// The type-agnostic part of the key.
    #[must_use]
    pub fn selection_key(&self) -> SelectionKey {
        SelectionKey::new(self.field.clone(), self.op)
    }
}

impl fmt::Display for FacetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.field, self.op, self.kind)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Selections
// ─────────────────────────────────────────────────────────────────────────────

/// Selection identity: `(field, op)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionKey {
    pub field: String,
    pub op: FilterOp,
}

impl SelectionKey {
    /// Create a selection key.
    #[must_use]
    pub fn new(field: impl Into<String>, op: FilterOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.op)
    }
}

/// Payload of a selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FilterData {
    Scalar(FacetValue),
    Range(f64, f64),
    List(Vec<FacetValue>),
}

impl FilterData {
    /// The chosen values when this is a list selection.
    #[must_use]
    pub fn as_list(&self) -> Option<&[FacetValue]> {
        match self {
            Self::List(values) => Some(values),
            Self::Scalar(_) | Self::Range(..) => None,
        }
    }
}

/// The user's chosen value(s) for a facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFilter {
    pub field: String,
    pub op: FilterOp,
    pub data: FilterData,
}

impl SelectedFilter {
    /// Create a selection.
    #[must_use]
    pub fn new(field: impl Into<String>, op: FilterOp, data: FilterData) -> Self {
        Self {
            field: field.into(),
            op,
            data,
        }
    }

    /// Convenience constructor for a list selection.
    #[must_use]
    pub fn list<I, V>(field: impl Into<String>, op: FilterOp, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FacetValue>,
    {
        Self::new(
            field,
            op,
            FilterData::List(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Identity key `(field, op)`.
    #[must_use]
    pub fn key(&self) -> SelectionKey {
        SelectionKey::new(self.field.clone(), self.op)
    }

    /// Whether `value` is among the chosen values of a list selection.
    #[must_use]
    pub fn contains(&self, value: &FacetValue) -> bool {
        match &self.data {
            FilterData::List(values) => values.contains(value),
            FilterData::Scalar(v) => v == value,
            FilterData::Range(..) => false,
        }
    }
}
