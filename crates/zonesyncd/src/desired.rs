//! Desired zone files
//!
//! A desired zone is a JSON document listing record sets in the same shape the
//! core crate uses:
//!
//! ```json
//! { "records": [{ "name": "www", "type": "A", "ttl": 300, "values": ["192.0.2.1"] }] }
//! ```
//!
//! Unknown keys are rejected so that dynamic or geo-routed definitions fail
//! loudly instead of being reconciled as plain records.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use zonesync_core::{Record, RecordType};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DesiredZone {
    #[serde(default)]
    records: Vec<DesiredRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DesiredRecord {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    record_type: RecordType,
    ttl: u32,
    values: Vec<String>,
}

impl From<DesiredRecord> for Record {
    fn from(r: DesiredRecord) -> Self {
        Record::new(r.name, r.record_type, r.ttl, r.values)
    }
}

/// Parse a desired zone document
pub fn parse(json: &str) -> Result<Vec<Record>> {
    let zone: DesiredZone = serde_json::from_str(json)?;
    Ok(zone.records.into_iter().map(Record::from).collect())
}

/// Load the desired records for one zone from `path`
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read desired zone {}", path.display()))?;
    parse(&json).with_context(|| format!("Invalid desired zone {}", path.display()))
}
