//! Configuration types for zone reconciliation
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::record::{canonical_name, RecordKey, RecordType};

/// Main zonesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Zones to reconcile
    pub zones: Vec<ZoneConfig>,

    /// Provider-managed records left out of every diff
    #[serde(default)]
    pub exclusions: Vec<ExclusionConfig>,

    /// Retry and pacing for remote calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Reconciler settings
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl SyncConfig {
    /// Create a configuration for a provider with no zones
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            zones: Vec::new(),
            exclusions: Vec::new(),
            retry: RetryConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(Error::config("No zones configured"));
        }
        for zone in &self.zones {
            if zone.name.trim().trim_end_matches('.').is_empty() {
                return Err(Error::config("Zone name cannot be empty"));
            }
        }

        self.provider.validate()?;
        self.retry.validate()?;

        Ok(())
    }

    /// Exclusion keys resolved against `zone`
    pub fn exclusion_keys(&self, zone: &str) -> Result<Vec<RecordKey>> {
        self.exclusions.iter().map(|e| e.key(zone)).collect()
    }
}

/// One zone and where its desired records come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone apex, e.g. "example.com"
    pub name: String,

    /// Path to the desired-state file
    pub source: String,
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Gandi LiveDNS
    Gandi {
        /// Personal access token
        token: String,
        /// Listing page size (provider default when unset)
        #[serde(default)]
        per_page: Option<u32>,
        /// API base URL override
        #[serde(default)]
        endpoint: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Gandi {
                per_page, endpoint, ..
            } => f
                .debug_struct("Gandi")
                .field("token", &"<REDACTED>")
                .field("per_page", per_page)
                .field("endpoint", endpoint)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<REDACTED>")
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            ProviderConfig::Gandi {
                token, per_page, ..
            } => {
                if token.is_empty() {
                    return Err(Error::config("Gandi token cannot be empty"));
                }
                if *per_page == Some(0) {
                    return Err(Error::config("per_page must be a positive integer"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom provider factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(Error::config("Custom provider config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Gandi { .. } => "gandi",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// A provider-managed record to leave alone, e.g. the apex NS set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionConfig {
    /// Record name; `@` or empty for the apex
    pub name: String,

    #[serde(rename = "type")]
    pub record_type: RecordType,
}

impl ExclusionConfig {
    pub fn new(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
        }
    }

    /// Canonical key of this exclusion within `zone`
    pub fn key(&self, zone: &str) -> Result<RecordKey> {
        Ok(RecordKey::new(
            canonical_name(&self.name, zone)?,
            self.record_type,
        ))
    }
}

/// Parses `name/TYPE`, e.g. `@/NS`
impl FromStr for ExclusionConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, record_type) = s
            .trim()
            .rsplit_once('/')
            .ok_or_else(|| Error::config(format!("Exclusion must be name/TYPE: {s}")))?;
        Ok(Self::new(name, record_type.parse()?))
    }
}

/// Retry and pacing configuration for remote calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay (in milliseconds); doubles per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff cap (in milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Wait after a 429 without a Retry-After header (in seconds)
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,

    /// Minimum spacing between requests to the provider (in milliseconds)
    ///
    /// Set to 0 to disable pacing.
    #[serde(default)]
    pub min_request_interval_ms: u64,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::config("base_delay_ms cannot exceed max_delay_ms"));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
            min_request_interval_ms: 0,
        }
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Capacity of the reconcile event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_rate_limit_backoff_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}
