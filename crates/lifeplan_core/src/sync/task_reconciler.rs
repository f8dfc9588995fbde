//! Reconciliation of the current day's tasks.
//!
//! # Responsibility
//! - Upload local tasks whose objective is already mapped; defer the rest.
//! - Push local status changes for tasks both sides know.
//! - Insert remote tasks that are missing locally under either id.
//!
//! # Invariants
//! - Only tasks scheduled inside the given day window are considered.
//! - Creation failures are reported; status-push failures are only logged.
//! - `overdue` never leaves the device; it is pushed as `pending`.

use crate::model::task::{DayWindow, Task};
use crate::repo::task_repo::TaskRepository;
use crate::sync::error::SyncResult;
use crate::sync::identity::{mint_canonical_id, ReconciliationContext};
use crate::sync::remote::RemoteApi;
use crate::sync::report::PhaseReport;
use crate::sync::wire::{RemoteTask, RemoteTaskStatus, TaskStatusUpdate};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Reconciles one day of tasks with the remote store.
pub struct TaskReconciler<'a, R: ?Sized, T: ?Sized> {
    remote: &'a R,
    tasks: &'a T,
}

impl<'a, R, T> TaskReconciler<'a, R, T>
where
    R: RemoteApi + ?Sized,
    T: TaskRepository + ?Sized,
{
    pub fn new(remote: &'a R, tasks: &'a T) -> Self {
        Self { remote, tasks }
    }

    /// Runs the task phase of one pass for `day`.
    ///
    /// Must run after the objective phase: uploads resolve objective ids
    /// through `context`.
    ///
    /// # Errors
    /// - Returns an error only when the remote listing or the local day
    ///   cannot be read.
    pub async fn reconcile(
        &self,
        context: &mut ReconciliationContext,
        day: DayWindow,
    ) -> SyncResult<PhaseReport> {
        let started_at = Instant::now();
        let date = day.iso_date();
        info!("event=task_reconcile module=sync status=start date={date}");

        let remote_tasks = self.remote.list_tasks(&date).await?;
        let local_tasks = self.tasks.list_tasks_between(day.start, day.end)?;
        let remote_by_id: HashMap<&str, &RemoteTask> = remote_tasks
            .iter()
            .map(|task| (task.id.as_str(), task))
            .collect();
        let mut report = PhaseReport::default();

        for task in &local_tasks {
            if !remote_by_id.contains_key(task.remote_key()) {
                self.upload(task, context, &mut report).await;
            }
        }

        for task in &local_tasks {
            if let Some(remote) = remote_by_id.get(task.remote_key()) {
                context.identities.register(&task.id, &remote.id);
                report.matched += 1;
                self.push_status(task, remote, &mut report).await;
            }
        }

        let local_keys: HashSet<&str> = local_tasks
            .iter()
            .flat_map(|task| std::iter::once(task.id.as_str()).chain(task.canonical_id.as_deref()))
            .collect();
        for remote in &remote_tasks {
            if !local_keys.contains(remote.id.as_str()) {
                self.download(remote, context, &mut report);
            }
        }

        info!(
            "event=task_reconcile module=sync status=ok date={date} duration_ms={} local={} remote={} created={} deferred={} status_pushed={} downloaded={} failed={}",
            started_at.elapsed().as_millis(),
            local_tasks.len(),
            remote_tasks.len(),
            report.created,
            report.deferred,
            report.status_pushed,
            report.downloaded,
            report.errors.len()
        );
        Ok(report)
    }

    async fn upload(
        &self,
        task: &Task,
        context: &mut ReconciliationContext,
        report: &mut PhaseReport,
    ) {
        let Some(objective_id) = context
            .identities
            .resolve(&task.objective_id)
            .map(str::to_string)
        else {
            debug!(
                "event=task_upload module=sync status=skip reason=objective_unmapped task_id={} objective_id={}",
                task.id, task.objective_id
            );
            report.deferred += 1;
            return;
        };

        let payload = RemoteTask {
            id: mint_canonical_id(task.remote_key()),
            objective_id,
            pillar_id: context.resolve_reference(task.pillar_id.as_deref()),
            ritual_id: context.resolve_reference(task.ritual_id.as_deref()),
            title: task.title.clone(),
            description: task.description.clone(),
            rationale: task.rationale.clone(),
            scheduled_at: task.scheduled_at,
            duration_minutes: task.duration_minutes,
            status: task.status.into(),
            completed_at: task.completed_at,
            skip_reason: task.skip_reason.clone(),
        };

        match self.remote.create_task(&payload).await {
            Ok(created) => {
                context.identities.register(&task.id, &created.id);
                if let Err(err) = self.tasks.record_canonical_id(&task.id, &created.id) {
                    warn!(
                        "event=task_upload module=sync status=error task_id={} error_code=record_canonical_failed error={}",
                        task.id, err
                    );
                }
                report.created += 1;
            }
            Err(err) => report.record_error("task", &task.id, err.to_string()),
        }
    }

    /// Pushes the local status when it differs from the remote one.
    /// Failures are logged and otherwise ignored.
    async fn push_status(&self, task: &Task, remote: &RemoteTask, report: &mut PhaseReport) {
        let desired = RemoteTaskStatus::from(task.status);
        if desired == remote.status {
            return;
        }

        let update = TaskStatusUpdate {
            status: desired,
            completed_at: task.completed_at,
            skip_reason: task.skip_reason.clone(),
        };
        match self.remote.update_task(&remote.id, &update).await {
            Ok(_) => report.status_pushed += 1,
            Err(err) => warn!(
                "event=task_status_push module=sync status=error task_id={} canonical_id={} error={}",
                task.id, remote.id, err
            ),
        }
    }

    fn download(
        &self,
        remote: &RemoteTask,
        context: &mut ReconciliationContext,
        report: &mut PhaseReport,
    ) {
        match self.tasks.find_task_by_key(&remote.id) {
            Ok(Some(existing)) => {
                context.identities.register(&existing.id, &remote.id);
                debug!(
                    "event=task_download module=sync status=skip reason=outside_local_day task_id={} canonical_id={}",
                    existing.id, remote.id
                );
                return;
            }
            Ok(None) => {}
            Err(err) => {
                report.record_error("task_download", &remote.id, err.to_string());
                return;
            }
        }

        let task = remote.clone().materialize();
        match self.tasks.insert_task(&task) {
            Ok(()) => {
                context.identities.register(&task.id, &task.id);
                report.downloaded += 1;
            }
            Err(err) => report.record_error("task_download", &remote.id, err.to_string()),
        }
    }
}
