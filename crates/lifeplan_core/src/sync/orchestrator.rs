//! Reconciliation pass entry point.
//!
//! # Responsibility
//! - Sequence the objective phase strictly before the task phase.
//! - Aggregate per-item failures into one outcome.
//! - Drive the status state machine and its listeners.
//!
//! # Invariants
//! - An unauthenticated or overlapping call returns immediately, without a
//!   state transition or listener notification.
//! - Each pass starts from a fresh identity mapping.
//! - The outcome reports failure counts only; itemized causes go to the log.

use crate::config::SyncConfig;
use crate::model::task::DayWindow;
use crate::repo::objective_repo::ObjectiveRepository;
use crate::repo::task_repo::TaskRepository;
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::identity::{IdentityResolver, ReconciliationContext};
use crate::sync::objective_reconciler::ObjectiveReconciler;
use crate::sync::remote::RemoteApi;
use crate::sync::report::PhaseReport;
use crate::sync::status::{SyncState, SyncStatusPublisher};
use crate::sync::task_reconciler::TaskReconciler;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Result of one `sync` call, as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub success: bool,
    /// Human-readable summary: a failure count or the pass-level error.
    pub message: String,
    pub created: usize,
    pub matched: usize,
    pub downloaded: usize,
    pub deferred: usize,
    pub failed_items: usize,
}

impl SyncOutcome {
    fn from_report(report: &PhaseReport) -> Self {
        let failed_items = report.errors.len();
        let message = if failed_items == 0 {
            "sync completed".to_string()
        } else {
            format!("{failed_items} item(s) failed to sync")
        };

        Self {
            success: failed_items == 0,
            message,
            created: report.created,
            matched: report.matched,
            downloaded: report.downloaded,
            deferred: report.deferred,
            failed_items,
        }
    }

    fn failed(err: &SyncError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            created: 0,
            matched: 0,
            downloaded: 0,
            deferred: 0,
            failed_items: 0,
        }
    }
}

/// Clears the running flag when a pass ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the collaborators of one sync engine instance.
pub struct SyncOrchestrator<R, O, T> {
    remote: R,
    objectives: O,
    tasks: T,
    config: SyncConfig,
    publisher: SyncStatusPublisher,
    running: AtomicBool,
    last_identities: Mutex<IdentityResolver>,
}

impl<R, O, T> SyncOrchestrator<R, O, T>
where
    R: RemoteApi,
    O: ObjectiveRepository,
    T: TaskRepository,
{
    pub fn new(remote: R, objectives: O, tasks: T, config: SyncConfig) -> Self {
        Self {
            remote,
            objectives,
            tasks,
            config,
            publisher: SyncStatusPublisher::new(),
            running: AtomicBool::new(false),
            last_identities: Mutex::new(IdentityResolver::new()),
        }
    }

    pub fn publisher(&self) -> &SyncStatusPublisher {
        &self.publisher
    }

    pub fn sync_state(&self) -> SyncState {
        self.publisher.sync_state()
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Mapping produced by the most recent pass that ran to completion.
    pub fn last_identity_map(&self) -> IdentityResolver {
        self.last_identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs one reconciliation pass for the current instant.
    pub async fn sync(&self) -> SyncOutcome {
        self.sync_at(Utc::now()).await
    }

    /// Runs one reconciliation pass treating `now` as the current instant.
    pub async fn sync_at(&self, now: DateTime<Utc>) -> SyncOutcome {
        if !self.remote.is_authenticated() {
            info!("event=sync_pass module=sync status=skip reason=auth_required");
            return SyncOutcome::failed(&SyncError::AuthRequired);
        }
        let Some(_running) = RunningGuard::acquire(&self.running) else {
            warn!("event=sync_pass module=sync status=skip reason=already_running");
            return SyncOutcome::failed(&SyncError::AlreadyRunning);
        };

        let started_at = Instant::now();
        info!("event=sync_pass module=sync status=start");
        self.publisher.begin();

        let mut context = ReconciliationContext::new();
        match self.run_pass(&mut context, now).await {
            Ok(report) => {
                *self
                    .last_identities
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = context.identities;

                let outcome = SyncOutcome::from_report(&report);
                if outcome.success {
                    self.publisher.succeed(Utc::now());
                } else {
                    self.publisher.fail(outcome.message.clone());
                }
                info!(
                    "event=sync_pass module=sync status={} duration_ms={} created={} matched={} downloaded={} deferred={} failed={}",
                    if outcome.success { "ok" } else { "error" },
                    started_at.elapsed().as_millis(),
                    outcome.created,
                    outcome.matched,
                    outcome.downloaded,
                    outcome.deferred,
                    outcome.failed_items
                );
                outcome
            }
            Err(err) => {
                error!(
                    "event=sync_pass module=sync status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                let outcome = SyncOutcome::failed(&err);
                self.publisher.fail(outcome.message.clone());
                outcome
            }
        }
    }

    async fn run_pass(
        &self,
        context: &mut ReconciliationContext,
        now: DateTime<Utc>,
    ) -> SyncResult<PhaseReport> {
        let mut report = ObjectiveReconciler::new(&self.remote, &self.objectives)
            .reconcile(context)
            .await?;

        let day = DayWindow::containing(now, self.config.utc_offset_minutes);
        let task_report = TaskReconciler::new(&self.remote, &self.tasks)
            .reconcile(context, day)
            .await?;

        report.absorb(task_report);
        Ok(report)
    }
}
