//! Zone snapshots
//!
//! A [`ZoneSnapshot`] is the canonical view of one zone, desired or current.
//! It holds at most one [`Record`] per [`RecordKey`]; inserting a second
//! record under the same key merges its values into the first.

use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashMap;

use crate::record::{Record, RecordKey};

/// Canonical records of one zone, keyed by (name, type)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneSnapshot {
    zone: String,
    records: BTreeMap<RecordKey, Record>,
}

impl ZoneSnapshot {
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            records: BTreeMap::new(),
        }
    }

    pub fn from_records(zone: impl Into<String>, records: impl IntoIterator<Item = Record>) -> Self {
        let mut snapshot = Self::new(zone);
        for record in records {
            snapshot.insert(record);
        }
        snapshot
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Insert a record, merging values into any record already under its key.
    ///
    /// On merge the first record's TTL wins.
    pub fn insert(&mut self, record: Record) {
        match self.records.entry(record.key()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
            }
            btree_map::Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if existing.ttl != record.ttl {
                    tracing::debug!(
                        "TTL mismatch while merging {}: keeping {}, dropping {}",
                        existing.key(),
                        existing.ttl,
                        record.ttl
                    );
                }
                existing.values.extend(record.values);
            }
        }
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in key order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.records.keys()
    }

    /// Copy of this snapshot with the given keys removed
    pub fn without<'a>(&self, excluded: impl IntoIterator<Item = &'a RecordKey>) -> Self {
        let mut out = self.clone();
        for key in excluded {
            out.records.remove(key);
        }
        out
    }
}

impl IntoIterator for ZoneSnapshot {
    type Item = Record;
    type IntoIter = btree_map::IntoValues<RecordKey, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

/// Provider ids of the entries backing each key of a current snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteIndex {
    ids: HashMap<RecordKey, Vec<String>>,
}

impl RemoteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: RecordKey, id: impl Into<String>) {
        self.ids.entry(key).or_default().push(id.into());
    }

    pub fn ids(&self, key: &RecordKey) -> &[String] {
        self.ids.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}
