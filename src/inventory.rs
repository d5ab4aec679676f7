//! The in-memory working set of package records.
//!
//! Owned by exactly one writer (the [`Session`](crate::session::Session)).
//! Records are keyed by `(source, name)`, so merging backend results is
//! order-independent: APT-then-Snap and Snap-then-APT give the same set.

use crate::types::{PackageKey, PackageRecord, PackageSource, SourceFilter};
use std::collections::BTreeMap;

/// Record counts per tab
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCounts {
    pub all: usize,
    pub apt: usize,
    pub snap: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    records: BTreeMap<PackageKey, PackageRecord>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one backend's results. A record with an existing key replaces it.
    pub fn merge(&mut self, packages: impl IntoIterator<Item = PackageRecord>) {
        for record in packages {
            self.records.insert(record.key(), record);
        }
    }

    /// Drop a record after its removal was confirmed
    pub fn remove(&mut self, source: PackageSource, name: &str) -> Option<PackageRecord> {
        self.records.remove(&PackageKey::new(source, name))
    }

    pub fn get(&self, source: PackageSource, name: &str) -> Option<&PackageRecord> {
        self.records.get(&PackageKey::new(source, name))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, ordered by source then name
    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.values()
    }

    pub fn counts(&self) -> SourceCounts {
        let apt = self
            .records
            .keys()
            .filter(|k| k.source == PackageSource::Apt)
            .count();
        SourceCounts {
            all: self.records.len(),
            apt,
            snap: self.records.len() - apt,
        }
    }

    /// Records passing the source tab and a case-insensitive search on name
    /// or description, sorted by name
    pub fn filtered(&self, filter: SourceFilter, search: &str) -> Vec<&PackageRecord> {
        let needle = search.trim().to_lowercase();
        let mut matches: Vec<&PackageRecord> = self
            .records
            .values()
            .filter(|r| filter.admits(r.source()))
            .filter(|r| r.matches_search(&needle))
            .collect();
        matches.sort_by(|a, b| a.name().cmp(b.name()).then(a.source().cmp(&b.source())));
        matches
    }
}
