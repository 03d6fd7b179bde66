//! Plan execution
//!
//! The [`ChangeApplier`] runs a [`Plan`]'s changes one at a time, in order.
//! Each change ends `Applied` or `Failed`; a failure never stops the changes
//! after it. Nothing already applied is rolled back.
//!
//! Re-running a plan that was (partly) applied is safe:
//!
//! - a create that finds an identical record already present counts as applied
//! - a delete of a record that is already gone counts as applied
//! - an update between identical records makes no remote call

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::builder::CurrentState;
use crate::error::{Error, Result};
use crate::normalize::Normalizer;
use crate::plan::{Change, Plan};
use crate::record::{Record, RecordKey};
use crate::snapshot::{RemoteIndex, ZoneSnapshot};
use crate::traits::{RemoteClient, ValueLayout};

/// Lifecycle of one change during apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeState {
    Pending,
    Applying,
    Applied,
    Failed(Error),
}

impl ChangeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChangeState::Applied | ChangeState::Failed(_))
    }
}

/// A change and where it ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeOutcome {
    pub change: Change,
    pub state: ChangeState,
}

/// Overall result of an apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    /// Every change applied (or there was nothing to do)
    Succeeded,
    /// Some changes applied, some failed
    Partial,
    /// No change applied
    Failed,
    /// Stopped early; unstarted changes stay pending
    Cancelled,
}

/// Per-change outcome of applying one plan
#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub zone: String,
    pub outcomes: Vec<ChangeOutcome>,
    pub status: ApplyStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.status == ApplyStatus::Succeeded
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == ChangeState::Applied)
            .count()
    }

    /// Changes that failed, with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&Change, &Error)> {
        self.outcomes.iter().filter_map(|o| match &o.state {
            ChangeState::Failed(e) => Some((&o.change, e)),
            _ => None,
        })
    }

    /// Keys of every change that did not reach `Applied`
    pub fn failed_keys(&self) -> Vec<RecordKey> {
        self.outcomes
            .iter()
            .filter(|o| o.state != ChangeState::Applied)
            .map(|o| o.change.key())
            .collect()
    }

    /// The changes that did not complete, as a new plan
    pub fn failed_plan(&self) -> Plan {
        Plan::new(
            self.zone.clone(),
            self.outcomes
                .iter()
                .filter(|o| o.state != ChangeState::Applied)
                .map(|o| o.change.clone())
                .collect(),
        )
    }
}

/// Executes plans against a remote client
pub struct ChangeApplier {
    client: Arc<dyn RemoteClient>,
}

impl ChangeApplier {
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self { client }
    }

    /// Apply `plan` against the zone described by `current`.
    ///
    /// `cancel` is checked before each change; once it fires the remaining
    /// changes are left `Pending` and the status is `Cancelled`.
    pub async fn apply(
        &self,
        plan: &Plan,
        current: &CurrentState,
        mut cancel: Option<oneshot::Receiver<()>>,
    ) -> ApplyResult {
        let started_at = Utc::now();
        let normalizer = Normalizer::new(&plan.zone, self.client.value_layout());
        let zone = normalizer.zone().to_string();

        let mut outcomes: Vec<ChangeOutcome> = plan
            .changes
            .iter()
            .map(|change| ChangeOutcome {
                change: change.clone(),
                state: ChangeState::Pending,
            })
            .collect();

        if !current.exists && !plan.is_empty() {
            match self.client.ensure_zone(&zone).await {
                Ok(created) => {
                    if created {
                        info!("Created zone {} on {}", zone, self.client.provider_name());
                    }
                }
                Err(e) => {
                    warn!("Cannot prepare zone {}: {}", zone, e);
                    for outcome in &mut outcomes {
                        outcome.state = ChangeState::Failed(e.clone());
                    }
                    return ApplyResult {
                        zone,
                        outcomes,
                        status: ApplyStatus::Failed,
                        started_at,
                        finished_at: Utc::now(),
                    };
                }
            }
        }

        let mut cancelled = false;
        for outcome in &mut outcomes {
            if is_cancelled(&mut cancel) {
                info!("Apply of {} cancelled", zone);
                cancelled = true;
                break;
            }

            outcome.state = ChangeState::Applying;
            debug!("Applying {}", outcome.change);

            outcome.state = match self
                .apply_change(&normalizer, &outcome.change, &current.index)
                .await
            {
                Ok(()) => {
                    info!("Applied {}", outcome.change);
                    ChangeState::Applied
                }
                Err(e) => {
                    warn!("Failed {}: {}", outcome.change, e);
                    ChangeState::Failed(e)
                }
            };
        }

        let applied = outcomes
            .iter()
            .filter(|o| o.state == ChangeState::Applied)
            .count();
        let status = if cancelled {
            ApplyStatus::Cancelled
        } else if applied == outcomes.len() {
            ApplyStatus::Succeeded
        } else if applied == 0 {
            ApplyStatus::Failed
        } else {
            ApplyStatus::Partial
        };

        ApplyResult {
            zone,
            outcomes,
            status,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn apply_change(
        &self,
        normalizer: &Normalizer,
        change: &Change,
        index: &RemoteIndex,
    ) -> Result<()> {
        match change {
            Change::Create(record) => self.create(normalizer, record).await,
            Change::Delete(record) => {
                let ids = self.resolve_ids(normalizer, &record.key(), index).await?;
                self.delete_ids(normalizer.zone(), &ids).await
            }
            Change::Update { existing, desired } => {
                if existing.same_content(desired) {
                    debug!("{} unchanged, nothing to send", desired.key());
                    return Ok(());
                }
                self.update(normalizer, desired, index).await
            }
        }
    }

    async fn create(&self, normalizer: &Normalizer, record: &Record) -> Result<()> {
        for entry in normalizer.from_canonical(record)? {
            match self.client.create_record(normalizer.zone(), &entry).await {
                Ok(id) => debug!("Created entry {}", id),
                Err(Error::AlreadyExists(msg)) => {
                    return match self.fetch_record(normalizer, &record.key()).await? {
                        Some(remote) if &remote == record => {
                            debug!("{} already present", record.key());
                            Ok(())
                        }
                        _ => Err(Error::AlreadyExists(msg)),
                    };
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn update(&self, normalizer: &Normalizer, desired: &Record, index: &RemoteIndex) -> Result<()> {
        let key = desired.key();
        let ids = self.resolve_ids(normalizer, &key, index).await?;

        match (self.client.value_layout(), ids.as_slice()) {
            (ValueLayout::RecordSet, [id]) => {
                let entries = normalizer.from_canonical(desired)?;
                for entry in &entries {
                    match self.client.update_record(normalizer.zone(), id, entry).await {
                        Err(Error::NotFound(_)) => {
                            debug!("{} vanished before update, creating", key);
                            return self.create(normalizer, desired).await;
                        }
                        other => other?,
                    }
                }
                Ok(())
            }
            _ => {
                self.delete_ids(normalizer.zone(), &ids).await?;
                self.create(normalizer, desired).await
            }
        }
    }

    async fn delete_ids(&self, zone: &str, ids: &[String]) -> Result<()> {
        for id in ids {
            match self.client.delete_record(zone, id).await {
                Ok(()) => {}
                Err(Error::NotFound(_)) => debug!("Entry {} already deleted", id),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Ids from the snapshot index, or from a fresh fetch when the index has none
    async fn resolve_ids(
        &self,
        normalizer: &Normalizer,
        key: &RecordKey,
        index: &RemoteIndex,
    ) -> Result<Vec<String>> {
        let known = index.ids(key);
        if !known.is_empty() {
            return Ok(known.to_vec());
        }
        let entries = self.client.fetch(normalizer.zone(), key).await?;
        Ok(entries.into_iter().filter_map(|e| e.id).collect())
    }

    async fn fetch_record(&self, normalizer: &Normalizer, key: &RecordKey) -> Result<Option<Record>> {
        let entries = self.client.fetch(normalizer.zone(), key).await?;
        let mut snapshot = ZoneSnapshot::new(normalizer.zone());
        for entry in &entries {
            snapshot.insert(normalizer.to_canonical(entry)?);
        }
        Ok(snapshot.get(key).cloned())
    }
}

/// A dropped sender is not a cancellation
fn is_cancelled(cancel: &mut Option<oneshot::Receiver<()>>) -> bool {
    cancel
        .as_mut()
        .is_some_and(|rx| rx.try_recv().is_ok())
}
