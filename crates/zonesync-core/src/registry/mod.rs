//! Plugin-based provider registry
//!
//! The registry allows remote clients to be registered dynamically at
//! runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonesync_core::registry::ProviderRegistry;
//! use zonesync_core::config::{ProviderConfig, RetryConfig};
//!
//! let registry = ProviderRegistry::new();
//! zonesync_provider_gandi::register(&registry);
//!
//! let config = ProviderConfig::Gandi { token, per_page: None, endpoint: None };
//! let client = registry.create_client(&config, &RetryConfig::default())?;
//! ```
//!
//! ## Registration
//!
//! Provider crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("gandi", Box::new(GandiFactory));
//! }
//! ```

use crate::config::{ProviderConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::traits::{RemoteClient, RemoteClientFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of remote client factories keyed by provider name
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn RemoteClientFactory>>>,
}

fn poisoned<T>(_: T) -> Error {
    Error::Other("provider registry lock poisoned".to_string())
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a remote client factory under `name` (e.g. "gandi")
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RemoteClientFactory>,
    ) -> Result<()> {
        let name = name.into();
        tracing::debug!("Registering provider: {}", name);
        self.providers.write().map_err(poisoned)?.insert(name, factory);
        Ok(())
    }

    /// Create a remote client from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn RemoteClient>)`: Created client
    /// - `Err(Error::Config)`: If the provider type is not registered
    pub fn create_client(
        &self,
        config: &ProviderConfig,
        retry: &RetryConfig,
    ) -> Result<Arc<dyn RemoteClient>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().map_err(poisoned)?;

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config, retry)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        self.providers
            .read()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers
            .read()
            .map(|p| p.contains_key(name))
            .unwrap_or(false)
    }
}
