//! Desired vs. current comparison
//!
//! [`diff`] is pure: it performs no I/O and its output depends only on the two
//! snapshots.

use std::collections::HashSet;

use crate::plan::{Change, Plan};
use crate::snapshot::ZoneSnapshot;

/// Compute the minimal plan converging `current` to `desired`.
///
/// Changes are sorted by key, except that a delete sharing its name with a
/// create or update is moved after every create and update, so a name is
/// never left without records in between.
///
/// A desired record with no values is treated as absent.
pub fn diff(desired: &ZoneSnapshot, current: &ZoneSnapshot) -> Plan {
    let mut changes = Vec::new();

    for record in desired.iter().filter(|r| !r.values.is_empty()) {
        match current.get(&record.key()) {
            None => changes.push(Change::Create(record.clone())),
            Some(existing) if !existing.same_content(record) => changes.push(Change::Update {
                existing: existing.clone(),
                desired: record.clone(),
            }),
            Some(_) => {}
        }
    }

    for record in current.iter() {
        let wanted = desired
            .get(&record.key())
            .is_some_and(|r| !r.values.is_empty());
        if !wanted {
            changes.push(Change::Delete(record.clone()));
        }
    }

    changes.sort_by_key(Change::key);

    let written: HashSet<String> = changes
        .iter()
        .filter(|c| !matches!(c, Change::Delete(_)))
        .map(|c| c.key().name)
        .collect();
    let (deferred, mut ordered): (Vec<Change>, Vec<Change>) = changes
        .into_iter()
        .partition(|c| matches!(c, Change::Delete(r) if written.contains(&r.name)));
    ordered.extend(deferred);

    Plan::new(desired.zone(), ordered)
}
