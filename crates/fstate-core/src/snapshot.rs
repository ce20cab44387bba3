#![forbid(unsafe_code)]

//! Keyed view over the latest server facet response.
//!
//! A [`FacetSnapshot`] is replaced wholesale on every response. Its
//! `revision` is the identity the reconciler compares against: two snapshots
//! with equal content but different revisions are different responses.

use crate::model::{Facet, FacetKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Errors from parsing a facet response.
#[derive(Debug)]
pub enum SnapshotError {
    /// The payload is not valid facet JSON.
    Parse(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Parse(msg) => write!(f, "facet response parse error: {msg}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// The `{"facets": [...]}` response envelope.
#[derive(Deserialize)]
struct Envelope {
    facets: Vec<Facet>,
}

/// The latest facet response, indexed by [`FacetKey`].
#[derive(Debug, Clone)]
pub struct FacetSnapshot {
    revision: u64,
    facets: Vec<Facet>,
    index: HashMap<FacetKey, usize>,
}

impl FacetSnapshot {
    /// Wrap a facet response.
    ///
    /// Duplicate keys keep their first occurrence.
    #[must_use]
    pub fn new(revision: u64, facets: Vec<Facet>) -> Self {
        let mut unique = Vec::with_capacity(facets.len());
        let mut index = HashMap::with_capacity(facets.len());
        for facet in facets {
            let key = facet.key();
            if index.contains_key(&key) {
                crate::debug!(key = %key, revision, "duplicate facet in response, keeping first");
                continue;
            }
            index.insert(key, unique.len());
            unique.push(facet);
        }
        Self {
            revision,
            facets: unique,
            index,
        }
    }

    /// The empty snapshot a session starts from.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    /// Parse a JSON facet response.
    pub fn from_json(revision: u64, json: &str) -> Result<Self, SnapshotError> {
        // Branch on the outer shape so serde reports the real failure.
        let parsed = if json.trim_start().starts_with('{') {
            serde_json::from_str::<Envelope>(json).map(|envelope| envelope.facets)
        } else {
            serde_json::from_str::<Vec<Facet>>(json)
        };
        let facets = parsed.map_err(|e| SnapshotError::Parse(e.to_string()))?;
        Ok(Self::new(revision, facets))
    }

    /// Response identity.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Facets in response order.
    #[must_use]
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// Look up a facet by key.
    #[must_use]
    pub fn get(&self, key: &FacetKey) -> Option<&Facet> {
        self.index.get(key).map(|&i| &self.facets[i])
    }

    /// Whether the response contains `key`.
    #[must_use]
    pub fn contains(&self, key: &FacetKey) -> bool {
        self.index.contains_key(key)
    }

    /// Number of facets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facets.len()
    }

    /// Whether the response has no facets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }
}

impl Default for FacetSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
