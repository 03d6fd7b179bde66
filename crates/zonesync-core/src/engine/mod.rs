//! Zone reconciliation
//!
//! The Reconciler drives one run per zone:
//!
//! ```text
//!  desired records            RemoteClient
//!        │                         │
//!        ▼                         ▼
//!  ┌────────────┐          ┌─────────────────┐
//!  │ Normalizer │          │ SnapshotBuilder │   stage: Fetch
//!  └────────────┘          └─────────────────┘
//!        │                         │
//!        └──── minus exclusions ───┘
//!                     │
//!                     ▼
//!               ┌──────────┐
//!               │   diff   │──► Plan ──► (plan mode: stop here)
//!               └──────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ ChangeApplier │                  stage: Apply
//!             └───────────────┘
//!                     │
//!                     ▼
//!                ZoneReport
//! ```
//!
//! Progress is published as [`ReconcileEvent`]s on a bounded channel.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::applier::{ApplyResult, ApplyStatus, ChangeApplier, ChangeState};
use crate::builder::{CurrentState, SnapshotBuilder};
use crate::config::{ExclusionConfig, SyncConfig};
use crate::diff::diff;
use crate::error::{Error, ErrorKind, Result};
use crate::normalize::Normalizer;
use crate::plan::{Change, ChangeKind, Plan};
use crate::record::{Record, RecordKey};
use crate::snapshot::ZoneSnapshot;
use crate::traits::RemoteClient;

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Current state fetched
    SnapshotBuilt {
        zone: String,
        records: usize,
        warnings: usize,
    },

    /// Fetching current state failed
    FetchFailed { zone: String, error: String },

    /// Plan computed
    Planned {
        zone: String,
        creates: usize,
        updates: usize,
        deletes: usize,
    },

    /// One change applied
    ChangeApplied { zone: String, change: String },

    /// One change failed
    ChangeFailed {
        zone: String,
        change: String,
        error: String,
    },

    /// Zone run finished
    Finished { zone: String, success: bool },
}

/// Whether a run stops after planning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Plan,
    Apply,
}

/// Where a zone run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading current state, or preparing desired records
    Fetch,
    /// Applying the plan
    Apply,
    /// The zone's task died before producing a report
    Task,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Apply => "apply",
            Stage::Task => "task",
        })
    }
}

/// Why a zone run did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
    /// Changes that did not complete; empty for fetch failures
    pub failed_changes: Vec<Change>,
}

/// Bridge a shared cancel flag to the one-shot signal the applier takes
fn forward_cancel(
    mut cancel: watch::Receiver<bool>,
) -> (oneshot::Receiver<()>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = oneshot::channel();
    let forwarder = tokio::spawn(async move {
        if cancel.wait_for(|cancelled| *cancelled).await.is_ok() {
            let _ = tx.send(());
        }
    });
    (rx, forwarder)
}

/// Result of reconciling one zone
#[derive(Debug, Clone)]
pub struct ZoneReport {
    pub zone: String,
    /// Entries skipped while building the current snapshot
    pub warnings: Vec<String>,
    /// Empty when the fetch failed
    pub plan: Plan,
    /// Present in apply mode once the fetch succeeded
    pub apply: Option<ApplyResult>,
    pub failure: Option<StageFailure>,
}

impl ZoneReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    fn fetch_failed(zone: &str, err: &Error) -> Self {
        Self {
            zone: zone.to_string(),
            warnings: Vec::new(),
            plan: Plan::new(zone, Vec::new()),
            apply: None,
            failure: Some(StageFailure {
                stage: Stage::Fetch,
                kind: err.kind(),
                message: err.to_string(),
                failed_changes: Vec::new(),
            }),
        }
    }

    /// The zone's task panicked; changes may be partly applied
    fn task_failed(zone: &str) -> Self {
        Self {
            zone: zone.to_string(),
            warnings: Vec::new(),
            plan: Plan::new(zone, Vec::new()),
            apply: None,
            failure: Some(StageFailure {
                stage: Stage::Task,
                kind: ErrorKind::Other,
                message: "zone task panicked before reporting".to_string(),
                failed_changes: Vec::new(),
            }),
        }
    }
}

impl std::fmt::Display for ZoneReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.failure {
            None => write!(f, "{}: ok ({})", self.zone, self.plan.summary()),
            Some(failure) => {
                write!(
                    f,
                    "{}: {} failed with {}: {}",
                    self.zone, failure.stage, failure.kind, failure.message
                )?;
                for change in &failure.failed_changes {
                    write!(f, "\n  not applied: {change}")?;
                }
                Ok(())
            }
        }
    }
}

/// Orchestrates fetch, diff and apply for zones of one provider account
///
/// ## Threading
///
/// Zones run concurrently under [`Reconciler::reconcile_all`]; within a zone
/// every remote call is awaited before the next one starts.
pub struct Reconciler {
    client: Arc<dyn RemoteClient>,

    /// Provider-managed records excluded from every diff
    exclusions: Vec<ExclusionConfig>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// reconcile events
    pub fn new(
        client: Arc<dyn RemoteClient>,
        config: &SyncConfig,
    ) -> (Self, mpsc::Receiver<ReconcileEvent>) {
        let (tx, rx) = mpsc::channel(config.reconcile.event_channel_capacity.max(1));
        let reconciler = Self {
            client,
            exclusions: config.exclusions.clone(),
            event_tx: tx,
        };
        (reconciler, rx)
    }

    /// Fetch current state and compute the plan for `zone`
    pub async fn plan(&self, zone: &str, desired: &[Record]) -> Result<(CurrentState, Plan)> {
        let normalizer = Normalizer::new(zone, self.client.value_layout());
        let zone = normalizer.zone();

        let desired = desired
            .iter()
            .map(|r| normalizer.canonicalize(r))
            .collect::<Result<Vec<_>>>()?;

        let current = SnapshotBuilder::new(self.client.clone()).build(zone).await?;
        self.emit_event(ReconcileEvent::SnapshotBuilt {
            zone: zone.to_string(),
            records: current.snapshot.len(),
            warnings: current.warnings.len(),
        });

        let excluded = self
            .exclusions
            .iter()
            .map(|e| e.key(zone))
            .collect::<Result<Vec<RecordKey>>>()?;
        let desired = ZoneSnapshot::from_records(zone, desired).without(&excluded);
        let remote = current.snapshot.without(&excluded);

        let plan = diff(&desired, &remote);
        debug!("{}", plan);
        self.emit_event(ReconcileEvent::Planned {
            zone: zone.to_string(),
            creates: plan.count(ChangeKind::Create),
            updates: plan.count(ChangeKind::Update),
            deletes: plan.count(ChangeKind::Delete),
        });

        Ok((current, plan))
    }

    /// Apply a plan computed by [`Reconciler::plan`]
    pub async fn apply(
        &self,
        plan: &Plan,
        current: &CurrentState,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> ApplyResult {
        let result = ChangeApplier::new(self.client.clone())
            .apply(plan, current, cancel)
            .await;

        for outcome in &result.outcomes {
            match &outcome.state {
                ChangeState::Applied => self.emit_event(ReconcileEvent::ChangeApplied {
                    zone: result.zone.clone(),
                    change: outcome.change.to_string(),
                }),
                ChangeState::Failed(e) => self.emit_event(ReconcileEvent::ChangeFailed {
                    zone: result.zone.clone(),
                    change: outcome.change.to_string(),
                    error: e.to_string(),
                }),
                ChangeState::Pending | ChangeState::Applying => {}
            }
        }

        result
    }

    /// Run one zone end to end
    pub async fn reconcile(
        &self,
        zone: &str,
        desired: &[Record],
        mode: Mode,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> ZoneReport {
        let (current, plan) = match self.plan(zone, desired).await {
            Ok(planned) => planned,
            Err(e) => {
                error!("{}: fetch failed: {}", zone, e);
                self.emit_event(ReconcileEvent::FetchFailed {
                    zone: zone.to_string(),
                    error: e.to_string(),
                });
                self.emit_event(ReconcileEvent::Finished {
                    zone: zone.to_string(),
                    success: false,
                });
                return ZoneReport::fetch_failed(zone, &e);
            }
        };

        info!("{}", plan.summary());

        let mut report = ZoneReport {
            zone: plan.zone.clone(),
            warnings: current.warnings.clone(),
            plan,
            apply: None,
            failure: None,
        };

        if mode == Mode::Apply {
            let result = self.apply(&report.plan, &current, cancel).await;
            report.failure = apply_failure(&result);
            report.apply = Some(result);
        }

        match &report.failure {
            None => info!("{}: reconciled", report.zone),
            Some(failure) => warn!(
                "{}: {} of {} changes not applied",
                report.zone,
                failure.failed_changes.len(),
                report.plan.len()
            ),
        }
        self.emit_event(ReconcileEvent::Finished {
            zone: report.zone.clone(),
            success: report.is_success(),
        });

        report
    }

    /// Reconcile several zones concurrently, one task per zone
    ///
    /// Reports come back in the order of `zones`. Setting `cancel` to `true`
    /// stops every zone between changes; requests already in flight finish
    /// and the reports describe what was left undone.
    pub async fn reconcile_all(
        self: &Arc<Self>,
        zones: Vec<(String, Vec<Record>)>,
        mode: Mode,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Vec<ZoneReport> {
        let mut tasks = JoinSet::new();
        for (position, (zone, desired)) in zones.iter().cloned().enumerate() {
            let reconciler = Arc::clone(self);
            let cancel = cancel.clone().map(forward_cancel);
            tasks.spawn(async move {
                let (zone_cancel, forwarder) = cancel.unzip();
                let report = reconciler.reconcile(&zone, &desired, mode, zone_cancel).await;
                if let Some(forwarder) = forwarder {
                    forwarder.abort();
                }
                (position, report)
            });
        }

        let mut reports: Vec<Option<ZoneReport>> = vec![None; zones.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, report)) => reports[position] = Some(report),
                Err(e) => error!("Zone task failed: {}", e),
            }
        }

        reports
            .into_iter()
            .zip(zones)
            .map(|(report, (zone, _))| report.unwrap_or_else(|| ZoneReport::task_failed(&zone)))
            .collect()
    }

    /// Emit a reconcile event
    fn emit_event(&self, event: ReconcileEvent) {
        // Channel full means the consumer is behind; drop rather than block
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

fn apply_failure(result: &ApplyResult) -> Option<StageFailure> {
    if result.status == ApplyStatus::Succeeded {
        return None;
    }

    let failed_changes = result.failed_plan().changes;
    let (kind, message) = match result.failures().next() {
        Some((change, e)) => (e.kind(), format!("{change}: {e}")),
        None => (ErrorKind::Cancelled, Error::Cancelled.to_string()),
    };

    Some(StageFailure {
        stage: Stage::Apply,
        kind,
        message,
        failed_changes,
    })
}
