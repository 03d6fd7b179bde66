//! Core traits for zone reconciliation
//!
//! - [`RemoteClient`]: Read and mutate records through a provider API

pub mod remote_client;

pub use remote_client::{RemoteClient, RemoteClientFactory, RemoteEntry, ValueLayout};
