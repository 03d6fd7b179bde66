// # Remote Client Trait
//
// Defines the interface to a DNS hosting provider's record API.
//
// ## Implementations
//
// - Gandi LiveDNS: `zonesync-provider-gandi` crate
// - Tests: `InMemoryRemote` in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::RemoteClient;
//
// async fn dump(client: &dyn RemoteClient) -> zonesync_core::Result<()> {
//     for entry in client.list_records("example.com").await? {
//         println!("{} {} {:?}", entry.name, entry.record_type, entry.values);
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{ProviderConfig, RetryConfig};
use crate::normalize::Normalizer;
use crate::record::RecordKey;

/// How a provider stores multi-value record sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueLayout {
    /// One entry per (name, type) holding every value
    RecordSet,
    /// One entry per value; a set of N values is N entries
    PerValue,
}

/// A record as the provider reports and accepts it
///
/// Values are in the provider's textual form; [`Normalizer`] converts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Provider-assigned identifier, if the provider has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Relative name, `@` for the apex
    pub name: String,
    /// Type as the provider spells it
    pub record_type: String,
    pub ttl: u32,
    pub values: Vec<String>,
    /// Dynamic/geo routing configuration; entries carrying it are not managed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<serde_json::Value>,
}

impl RemoteEntry {
    pub fn new(
        name: impl Into<String>,
        record_type: impl Into<String>,
        ttl: u32,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            record_type: record_type.into(),
            ttl,
            values: values.into_iter().map(Into::into).collect(),
            routing: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Trait for provider record APIs
///
/// Implementations perform authenticated requests, paginate listings, and map
/// HTTP failures onto [`crate::Error`] (see [`crate::Error::from_status`]).
/// Transient failures are retried inside the client using
/// [`crate::retry::RetryPolicy`]; callers only see the final outcome.
///
/// # Thread Safety
///
/// Implementations must be thread-safe; one client is shared by every zone
/// reconciled in a run.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Provider name for logging (e.g. "gandi")
    fn provider_name(&self) -> &'static str;

    /// How this provider stores multi-value sets
    fn value_layout(&self) -> ValueLayout {
        ValueLayout::RecordSet
    }

    /// List every entry in `zone`, following all pages
    ///
    /// Returns [`crate::Error::NotFound`] when the zone itself does not exist.
    async fn list_records(&self, zone: &str) -> crate::Result<Vec<RemoteEntry>>;

    /// Create an entry and return its provider id
    async fn create_record(&self, zone: &str, entry: &RemoteEntry) -> crate::Result<String>;

    /// Replace the entry identified by `id`
    async fn update_record(&self, zone: &str, id: &str, entry: &RemoteEntry) -> crate::Result<()>;

    /// Delete the entry identified by `id`
    async fn delete_record(&self, zone: &str, id: &str) -> crate::Result<()>;

    /// Fetch the entries currently stored under `key`
    ///
    /// The default lists the zone and filters; providers with a cheaper
    /// lookup should override it.
    async fn fetch(&self, zone: &str, key: &RecordKey) -> crate::Result<Vec<RemoteEntry>> {
        let normalizer = Normalizer::new(zone, self.value_layout());
        let entries = self.list_records(zone).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| {
                normalizer
                    .to_canonical(entry)
                    .map(|record| &record.key() == key)
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Zones the account can manage, sorted, without trailing dots
    ///
    /// The default reports none.
    async fn list_zones(&self) -> crate::Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Make sure `zone` exists, creating it when the provider allows
    ///
    /// Returns `true` when the zone was created. The default does nothing.
    async fn ensure_zone(&self, zone: &str) -> crate::Result<bool> {
        let _ = zone;
        Ok(false)
    }
}

/// Helper trait for constructing remote clients from configuration
pub trait RemoteClientFactory: Send + Sync {
    /// Create a client from provider configuration and the shared retry policy
    fn create(
        &self,
        config: &ProviderConfig,
        retry: &RetryConfig,
    ) -> crate::Result<Arc<dyn RemoteClient>>;
}
