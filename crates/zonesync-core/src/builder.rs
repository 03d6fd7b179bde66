//! Current-state snapshot construction
//!
//! [`SnapshotBuilder`] lists a zone through a [`RemoteClient`], normalizes
//! every entry and merges same-key entries into one record. Either the whole
//! zone is read or the build fails; partial snapshots are never returned.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::normalize::Normalizer;
use crate::snapshot::{RemoteIndex, ZoneSnapshot};
use crate::traits::RemoteClient;

/// Everything known about a zone's current state after a fetch
#[derive(Debug, Clone, Default)]
pub struct CurrentState {
    pub snapshot: ZoneSnapshot,
    /// Provider ids backing each key
    pub index: RemoteIndex,
    /// Entries left out of the snapshot, one message each
    pub warnings: Vec<String>,
    /// False when the provider does not know the zone yet
    pub exists: bool,
}

/// Builds [`CurrentState`] from a remote client
pub struct SnapshotBuilder {
    client: Arc<dyn RemoteClient>,
}

impl SnapshotBuilder {
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self { client }
    }

    /// Fetch and normalize the whole of `zone`.
    ///
    /// Entries of unsupported types are skipped with a warning.
    /// Authentication and availability errors abort the build, and so does
    /// an entry of a supported type whose value cannot be parsed.
    pub async fn build(&self, zone: &str) -> Result<CurrentState> {
        let normalizer = Normalizer::new(zone, self.client.value_layout());
        let zone = normalizer.zone().to_string();

        let entries = match self.client.list_records(&zone).await {
            Ok(entries) => entries,
            Err(Error::NotFound(_)) => {
                tracing::info!("Zone {} does not exist on {}", zone, self.client.provider_name());
                return Ok(CurrentState {
                    snapshot: ZoneSnapshot::new(zone),
                    index: RemoteIndex::new(),
                    warnings: Vec::new(),
                    exists: false,
                });
            }
            Err(e) => return Err(e),
        };

        let mut snapshot = ZoneSnapshot::new(zone.clone());
        let mut index = RemoteIndex::new();
        let mut warnings = Vec::new();

        for entry in &entries {
            match normalizer.to_canonical(entry) {
                Ok(record) => {
                    if let Some(id) = &entry.id {
                        index.insert(record.key(), id.clone());
                    }
                    snapshot.insert(record);
                }
                Err(e @ Error::UnsupportedRecordType(_)) => {
                    let message = format!("Skipping {} {}: {}", entry.name, entry.record_type, e);
                    tracing::warn!("{}: {}", zone, message);
                    warnings.push(message);
                }
                Err(e) => {
                    tracing::error!("{}: cannot read {} {}: {}", zone, entry.name, entry.record_type, e);
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            "Built snapshot of {}: {} entries, {} record sets, {} skipped",
            zone,
            entries.len(),
            snapshot.len(),
            warnings.len()
        );

        Ok(CurrentState {
            snapshot,
            index,
            warnings,
            exists: true,
        })
    }
}
