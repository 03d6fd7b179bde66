//! Test doubles and common utilities for reconciliation contract tests
//!
//! [`InMemoryRemote`] behaves like a provider API for a single zone: it pages
//! listings, assigns ids, reports conflicts and missing entries, and counts
//! every call. Failures can be scripted per record name.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use zonesync_core::config::{ExclusionConfig, ProviderConfig, SyncConfig, ZoneConfig};
use zonesync_core::error::{Error, Result};
use zonesync_core::traits::{RemoteClient, RemoteEntry, ValueLayout};

/// In-memory provider for one zone
pub struct InMemoryRemote {
    zone: String,
    layout: ValueLayout,
    page_size: usize,
    exists: Mutex<bool>,
    can_create_zone: bool,
    entries: Mutex<BTreeMap<String, RemoteEntry>>,
    next_id: AtomicUsize,
    /// Mutations on these names fail with the given error
    failures: Mutex<HashMap<String, Error>>,
    /// Listing fails with this error
    list_failure: Mutex<Option<Error>>,
    /// Latency of every create, to keep a request in flight
    create_delay: Duration,
    pub list_calls: AtomicUsize,
    pub page_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub creates_finished: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub ensure_calls: AtomicUsize,
}

impl InMemoryRemote {
    pub fn new(zone: &str) -> Self {
        Self {
            zone: zone.to_string(),
            layout: ValueLayout::RecordSet,
            page_size: 100,
            exists: Mutex::new(true),
            can_create_zone: true,
            entries: Mutex::new(BTreeMap::new()),
            next_id: AtomicUsize::new(1),
            failures: Mutex::new(HashMap::new()),
            list_failure: Mutex::new(None),
            create_delay: Duration::ZERO,
            list_calls: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            creates_finished: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            ensure_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_layout(mut self, layout: ValueLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Start with the zone absent
    pub fn missing_zone(self, can_create: bool) -> Self {
        *self.exists.lock().unwrap() = false;
        Self {
            can_create_zone: can_create,
            ..self
        }
    }

    /// Store an entry as if it had been created earlier
    pub fn seed(&self, entry: RemoteEntry) {
        let id = self.assign_id(&entry);
        self.entries.lock().unwrap().insert(id.clone(), entry.with_id(id));
    }

    pub fn fail_mutations_on(&self, name: &str, error: Error) {
        self.failures.lock().unwrap().insert(name.to_string(), error);
    }

    pub fn fail_listing(&self, error: Error) {
        *self.list_failure.lock().unwrap() = Some(error);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
        *self.list_failure.lock().unwrap() = None;
    }

    /// Stored entries, in id order
    pub fn entries(&self) -> Vec<RemoteEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    pub fn mutation_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
            + self.update_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }

    fn assign_id(&self, entry: &RemoteEntry) -> String {
        match self.layout {
            ValueLayout::RecordSet => format!("{}/{}", entry.name, entry.record_type),
            ValueLayout::PerValue => format!("e{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        }
    }

    fn check_zone(&self, zone: &str) -> Result<()> {
        if zone != self.zone || !*self.exists.lock().unwrap() {
            return Err(Error::not_found(format!("zone {zone}")));
        }
        Ok(())
    }

    fn check_failure(&self, name: &str) -> Result<()> {
        match self.failures.lock().unwrap().get(name) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn name_of(&self, id: &str) -> Option<String> {
        self.entries.lock().unwrap().get(id).map(|e| e.name.clone())
    }
}

#[async_trait]
impl RemoteClient for InMemoryRemote {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn value_layout(&self) -> ValueLayout {
        self.layout
    }

    async fn list_records(&self, zone: &str) -> Result<Vec<RemoteEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.list_failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.check_zone(zone)?;

        let all = self.entries();
        let mut out = Vec::new();
        let mut page = 0;
        loop {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            let chunk: Vec<RemoteEntry> = all
                .iter()
                .skip(page * self.page_size)
                .take(self.page_size)
                .cloned()
                .collect();
            let len = chunk.len();
            out.extend(chunk);
            if len < self.page_size {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    async fn create_record(&self, zone: &str, entry: &RemoteEntry) -> Result<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        self.check_zone(zone)?;
        self.check_failure(&entry.name)?;

        let mut entries = self.entries.lock().unwrap();
        let conflict = entries.values().any(|e| {
            e.name == entry.name
                && e.record_type == entry.record_type
                && (self.layout == ValueLayout::RecordSet || e.values == entry.values)
        });
        if conflict {
            return Err(Error::AlreadyExists(format!(
                "{} {}",
                entry.name, entry.record_type
            )));
        }

        let id = self.assign_id(entry);
        entries.insert(id.clone(), entry.clone().with_id(id.clone()));
        self.creates_finished.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update_record(&self, zone: &str, id: &str, entry: &RemoteEntry) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_zone(zone)?;
        self.check_failure(&entry.name)?;

        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(id) {
            Some(stored) => {
                *stored = entry.clone().with_id(id);
                Ok(())
            }
            None => Err(Error::not_found(id.to_string())),
        }
    }

    async fn delete_record(&self, zone: &str, id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_zone(zone)?;
        if let Some(name) = self.name_of(id) {
            self.check_failure(&name)?;
        }

        match self.entries.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::not_found(id.to_string())),
        }
    }

    async fn ensure_zone(&self, zone: &str) -> Result<bool> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        let mut exists = self.exists.lock().unwrap();
        if *exists {
            return Ok(false);
        }
        if !self.can_create_zone || zone != self.zone {
            return Err(Error::UnknownZone(zone.to_string()));
        }
        *exists = true;
        Ok(true)
    }
}

/// Minimal configuration for one zone with optional exclusions
pub fn minimal_config(zone: &str, exclusions: Vec<ExclusionConfig>) -> SyncConfig {
    let mut config = SyncConfig::new(ProviderConfig::Custom {
        factory: "memory".to_string(),
        config: serde_json::json!({}),
    });
    config.zones.push(ZoneConfig {
        name: zone.to_string(),
        source: format!("{zone}.json"),
    });
    config.exclusions = exclusions;
    config
}
