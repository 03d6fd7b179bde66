//! Change sets
//!
//! A [`Plan`] is the ordered list of [`Change`]s that converges one zone. It
//! can be rendered for review before anything is applied.

use std::collections::HashSet;
use std::fmt;

use crate::record::{Record, RecordKey};

/// A single mutation of one record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Create(Record),
    Update { existing: Record, desired: Record },
    Delete(Record),
}

/// Discriminant of a [`Change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        })
    }
}

impl Change {
    pub fn key(&self) -> RecordKey {
        match self {
            Change::Create(record) | Change::Delete(record) => record.key(),
            Change::Update { desired, .. } => desired.key(),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Create(_) => ChangeKind::Create,
            Change::Update { .. } => ChangeKind::Update,
            Change::Delete(_) => ChangeKind::Delete,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Create(record) => write!(f, "+ {record}"),
            Change::Delete(record) => write!(f, "- {record}"),
            Change::Update { existing, desired } => {
                write!(f, "~ {}", desired.key())?;
                if existing.ttl != desired.ttl {
                    write!(f, " ttl {} -> {}", existing.ttl, desired.ttl)?;
                }
                if existing.sorted_values() != desired.sorted_values() {
                    write!(
                        f,
                        " [{}] -> [{}]",
                        existing.values.join(", "),
                        desired.values.join(", ")
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// Ordered changes for one zone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub zone: String,
    pub changes: Vec<Change>,
}

impl Plan {
    pub fn new(zone: impl Into<String>, changes: Vec<Change>) -> Self {
        Self {
            zone: zone.into(),
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind() == kind).count()
    }

    pub fn creates(&self) -> impl Iterator<Item = &Record> {
        self.changes.iter().filter_map(|c| match c {
            Change::Create(record) => Some(record),
            _ => None,
        })
    }

    pub fn deletes(&self) -> impl Iterator<Item = &Record> {
        self.changes.iter().filter_map(|c| match c {
            Change::Delete(record) => Some(record),
            _ => None,
        })
    }

    /// The changes touching `keys`, in this plan's order
    pub fn subset<'a>(&self, keys: impl IntoIterator<Item = &'a RecordKey>) -> Plan {
        let keys: HashSet<&RecordKey> = keys.into_iter().collect();
        Plan {
            zone: self.zone.clone(),
            changes: self
                .changes
                .iter()
                .filter(|c| keys.contains(&c.key()))
                .cloned()
                .collect(),
        }
    }

    /// One-line count summary, e.g. `example.com: 1 to create, 0 to update, 2 to delete`
    pub fn summary(&self) -> String {
        format!(
            "{}: {} to create, {} to update, {} to delete",
            self.zone,
            self.count(ChangeKind::Create),
            self.count(ChangeKind::Update),
            self.count(ChangeKind::Delete)
        )
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for change in &self.changes {
            writeln!(f, "  {change}")?;
        }
        Ok(())
    }
}
