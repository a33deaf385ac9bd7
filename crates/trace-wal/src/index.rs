// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::{BTreeMap, BTreeSet};

use trace_types::SearchEntry;

/// Per-block search index: a header of tag names, each linking to a
/// sorted list of values, each value linking to a posting list of
/// record offsets (indices into the block's record vector here, since
/// this subsystem treats row-group layout as opaque).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchIndex {
    tag_values: BTreeMap<String, BTreeMap<String, Vec<usize>>>,
}

impl SearchIndex {
    /// Builds the index from `(record_index, search_entry)` pairs.
    pub fn build<'a>(entries: impl IntoIterator<Item = (usize, &'a SearchEntry)>) -> Self {
        let mut tag_values: BTreeMap<String, BTreeMap<String, Vec<usize>>> = BTreeMap::new();
        for (idx, entry) in entries {
            for (key, value) in &entry.tags {
                tag_values
                    .entry(key.clone())
                    .or_default()
                    .entry(value.clone())
                    .or_default()
                    .push(idx);
            }
        }
        Self { tag_values }
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tag_values.keys().cloned().collect()
    }

    pub fn tag_values(&self, key: &str) -> Vec<String> {
        self.tag_values
            .get(key)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Intersects posting lists for every `(key, value)` predicate.
    /// Returns `None` when there are no predicates at all (caller must
    /// fall back to a full scan), `Some(empty set)` when any predicate
    /// has no matches.
    pub fn candidates(&self, filters: &[(String, String)]) -> Option<BTreeSet<usize>> {
        if filters.is_empty() {
            return None;
        }
        let mut result: Option<BTreeSet<usize>> = None;
        for (key, value) in filters {
            let postings: BTreeSet<usize> = self
                .tag_values
                .get(key)
                .and_then(|values| values.get(value))
                .map(|list| list.iter().copied().collect())
                .unwrap_or_default();
            result = Some(match result {
                None => postings,
                Some(acc) => acc.intersection(&postings).copied().collect(),
            });
        }
        result
    }

    /// A normalized byte estimate of the on-disk index representation:
    /// tag name + value stored once, plus 8 bytes per posting, rather
    /// than a full `SearchEntry` per record -- strictly smaller than
    /// the raw WAL byte sum for the same traces, per the metrics
    /// contract.
    pub fn normalized_size(&self) -> usize {
        self.tag_values
            .iter()
            .map(|(key, values)| {
                key.len()
                    + values
                        .iter()
                        .map(|(value, postings)| value.len() + postings.len() * 8)
                        .sum::<usize>()
            })
            .sum()
    }
}
