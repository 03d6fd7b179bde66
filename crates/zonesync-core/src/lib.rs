// # zonesync-core
//
// Core library for declarative DNS zone reconciliation.
//
// ## Architecture Overview
//
// - **Record**: Canonical, provider-agnostic record set keyed by (name, type)
// - **RemoteClient**: Trait for a provider's paginated record API
// - **Normalizer**: Per-type translation between provider entries and records
// - **SnapshotBuilder**: Fetches a whole zone into a `ZoneSnapshot`
// - **diff**: Pure desired-vs-current comparison producing a `Plan`
// - **ChangeApplier**: Sequential, failure-isolated plan execution
// - **Reconciler**: Orchestrates the above per zone
// - **ProviderRegistry**: Plugin-based registry for remote clients
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Provider wire details stay behind `RemoteClient`
// 2. **Plugin-Based**: Providers are registered by name, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Re-running a plan after a partial failure is safe

pub mod applier;
pub mod builder;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod plan;
pub mod rate_limit;
pub mod record;
pub mod registry;
pub mod retry;
pub mod snapshot;
pub mod traits;

// Re-export core types for convenience
pub use applier::{ApplyResult, ApplyStatus, ChangeApplier, ChangeOutcome, ChangeState};
pub use builder::{CurrentState, SnapshotBuilder};
pub use config::{ExclusionConfig, ProviderConfig, ReconcileConfig, RetryConfig, SyncConfig, ZoneConfig};
pub use diff::diff;
pub use engine::{Mode, ReconcileEvent, Reconciler, Stage, StageFailure, ZoneReport};
pub use error::{Error, ErrorKind, Result};
pub use normalize::Normalizer;
pub use plan::{Change, ChangeKind, Plan};
pub use rate_limit::RateLimiter;
pub use record::{Record, RecordKey, RecordType};
pub use registry::ProviderRegistry;
pub use retry::RetryPolicy;
pub use snapshot::{RemoteIndex, ZoneSnapshot};
pub use traits::{RemoteClient, RemoteClientFactory, RemoteEntry, ValueLayout};
