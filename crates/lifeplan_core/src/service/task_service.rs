//! Task use-cases.
//!
//! # Responsibility
//! - Create tasks and apply status changes with consistent completion fields.
//! - Derive the local-only `overdue` presentation state.
//!
//! # Invariants
//! - `completed_at` is set only for `completed`; `skip_reason` only for
//!   `skipped`.
//! - `overdue` is assigned by `refresh_overdue`, never by callers.

use crate::model::task::{DayWindow, Task, TaskStatus};
use crate::repo::task_repo::{TaskRepository, TaskStatusChange};
use crate::service::plan_service::{new_local_id, PlanServiceError, PlanServiceResult};
use chrono::{DateTime, Utc};
use log::{info, warn};

/// Task input from the planner or the schedule editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub id: Option<String>,
    pub objective_id: String,
    pub pillar_id: Option<String>,
    pub ritual_id: Option<String>,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
}

impl TaskDraft {
    pub fn new(
        objective_id: impl Into<String>,
        title: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            id: None,
            objective_id: objective_id.into(),
            pillar_id: None,
            ritual_id: None,
            title: title.into(),
            description: String::new(),
            rationale: String::new(),
            scheduled_at,
            duration_minutes,
        }
    }
}

/// Use-case service for scheduled tasks.
pub struct TaskService<R: TaskRepository> {
    repo: R,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists a new `pending` task.
    ///
    /// # Errors
    /// - `InvalidDraft` for an empty title, objective id, or zero duration.
    pub fn create_task(&self, draft: &TaskDraft) -> PlanServiceResult<Task> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(PlanServiceError::InvalidDraft(
                "task title cannot be empty".to_string(),
            ));
        }
        if draft.objective_id.trim().is_empty() {
            return Err(PlanServiceError::InvalidDraft(
                "task objective id cannot be empty".to_string(),
            ));
        }
        if draft.duration_minutes == 0 {
            return Err(PlanServiceError::InvalidDraft(
                "task duration must be positive".to_string(),
            ));
        }

        let id = match draft.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => new_local_id(),
        };
        let mut task = Task::new(
            id,
            draft.objective_id.clone(),
            title,
            draft.scheduled_at,
            draft.duration_minutes,
        );
        task.pillar_id = draft.pillar_id.clone();
        task.ritual_id = draft.ritual_id.clone();
        task.description = draft.description.clone();
        task.rationale = draft.rationale.clone();

        self.repo.insert_task(&task)?;
        info!(
            "event=task_create module=service status=ok task_id={} objective_id={}",
            task.id, task.objective_id
        );
        Ok(task)
    }

    /// Applies a status change stamped with the current time.
    pub fn set_task_status(
        &self,
        id: &str,
        status: TaskStatus,
        skip_reason: Option<String>,
    ) -> PlanServiceResult<Task> {
        self.set_task_status_at(id, status, skip_reason, Utc::now())
    }

    /// Applies a status change treating `now` as the completion instant.
    ///
    /// # Errors
    /// - `InvalidDraft` when `status` is `overdue`.
    /// - `NotFound` when no task has `id`.
    pub fn set_task_status_at(
        &self,
        id: &str,
        status: TaskStatus,
        skip_reason: Option<String>,
        now: DateTime<Utc>,
    ) -> PlanServiceResult<Task> {
        if status == TaskStatus::Overdue {
            return Err(PlanServiceError::InvalidDraft(
                "overdue is derived and cannot be set directly".to_string(),
            ));
        }

        let change = TaskStatusChange {
            status,
            completed_at: (status == TaskStatus::Completed).then_some(now),
            skip_reason: if status == TaskStatus::Skipped {
                skip_reason.filter(|reason| !reason.trim().is_empty())
            } else {
                None
            },
        };
        self.repo.update_task_status(id, &change)?;
        info!(
            "event=task_status_set module=service status=ok task_id={} task_status={}",
            id,
            status.as_str()
        );

        self.repo
            .get_task(id)?
            .ok_or_else(|| PlanServiceError::NotFound(id.to_string()))
    }

    /// Marks pending tasks whose scheduled end has passed as `overdue`.
    ///
    /// Returns how many tasks changed.
    pub fn refresh_overdue(&self, now: DateTime<Utc>) -> PlanServiceResult<usize> {
        let mut changed = 0;
        for task in self.repo.list_tasks_with_status(TaskStatus::Pending)? {
            if !task.is_past_due(now) {
                continue;
            }
            let change = TaskStatusChange {
                status: TaskStatus::Overdue,
                completed_at: None,
                skip_reason: None,
            };
            match self.repo.update_task_status(&task.id, &change) {
                Ok(()) => changed += 1,
                Err(err) => {
                    warn!(
                        "event=task_overdue_refresh module=service status=error task_id={} error={}",
                        task.id, err
                    );
                    return Err(err.into());
                }
            }
        }

        if changed > 0 {
            info!("event=task_overdue_refresh module=service status=ok changed={changed}");
        }
        Ok(changed)
    }

    /// Local tasks scheduled inside the device's calendar day at `now`.
    pub fn tasks_for_day(
        &self,
        now: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> PlanServiceResult<Vec<Task>> {
        let day = DayWindow::containing(now, utc_offset_minutes);
        Ok(self.repo.list_tasks_between(day.start, day.end)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{TaskDraft, TaskService};
    use crate::db::open_db_in_memory;
    use crate::model::task::TaskStatus;
    use crate::repo::task_repo::SqliteTaskRepository;
    use crate::service::plan_service::PlanServiceError;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn create_task_validates_and_starts_pending() {
        let conn = open_db_in_memory().unwrap();
        let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

        let task = service
            .create_task(&TaskDraft::new("obj-1", " Stretch ", at, 15))
            .unwrap();
        assert_eq!(task.title, "Stretch");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.id.starts_with("local-"));

        for draft in [
            TaskDraft::new("obj-1", "  ", at, 15),
            TaskDraft::new("obj-1", "Stretch", at, 0),
            TaskDraft::new("", "Stretch", at, 15),
        ] {
            assert!(matches!(
                service.create_task(&draft).unwrap_err(),
                PlanServiceError::InvalidDraft(_)
            ));
        }
    }

    #[test]
    fn status_changes_keep_completion_fields_consistent() {
        let conn = open_db_in_memory().unwrap();
        let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let done_at = at + Duration::minutes(20);
        let task = service
            .create_task(&TaskDraft::new("obj-1", "Read", at, 20))
            .unwrap();

        let completed = service
            .set_task_status_at(&task.id, TaskStatus::Completed, None, done_at)
            .unwrap();
        assert_eq!(completed.completed_at, Some(done_at));

        let skipped = service
            .set_task_status_at(
                &task.id,
                TaskStatus::Skipped,
                Some("travel".to_string()),
                done_at,
            )
            .unwrap();
        assert_eq!(skipped.completed_at, None);
        assert_eq!(skipped.skip_reason.as_deref(), Some("travel"));

        let reopened = service
            .set_task_status_at(
                &task.id,
                TaskStatus::Pending,
                Some("ignored".to_string()),
                done_at,
            )
            .unwrap();
        assert_eq!(reopened.skip_reason, None);

        assert!(matches!(
            service
                .set_task_status_at(&task.id, TaskStatus::Overdue, None, done_at)
                .unwrap_err(),
            PlanServiceError::InvalidDraft(_)
        ));
        assert!(matches!(
            service
                .set_task_status("missing", TaskStatus::Completed, None)
                .unwrap_err(),
            PlanServiceError::NotFound(_)
        ));
    }

    #[test]
    fn refresh_overdue_only_touches_past_pending_tasks() {
        let conn = open_db_in_memory().unwrap();
        let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();

        let past = service
            .create_task(&TaskDraft::new("o", "Past", now - Duration::hours(2), 30))
            .unwrap();
        let running = service
            .create_task(&TaskDraft::new("o", "Running", now - Duration::minutes(10), 30))
            .unwrap();
        let done = service
            .create_task(&TaskDraft::new("o", "Done", now - Duration::hours(3), 30))
            .unwrap();
        service
            .set_task_status_at(&done.id, TaskStatus::Completed, None, now)
            .unwrap();

        assert_eq!(service.refresh_overdue(now).unwrap(), 1);
        assert_eq!(service.refresh_overdue(now).unwrap(), 0);

        let today = service.tasks_for_day(now, 0).unwrap();
        let status_of = |id: &str| {
            today
                .iter()
                .find(|task| task.id == id)
                .map(|task| task.status)
        };
        assert_eq!(status_of(&past.id), Some(TaskStatus::Overdue));
        assert_eq!(status_of(&running.id), Some(TaskStatus::Pending));
        assert_eq!(status_of(&done.id), Some(TaskStatus::Completed));
    }

    #[test]
    fn tasks_for_day_follows_device_offset() {
        let conn = open_db_in_memory().unwrap();
        let service = TaskService::new(SqliteTaskRepository::try_new(&conn).unwrap());
        // 23:30 UTC on May 1 is already May 2 at UTC+2.
        let late = Utc.with_ymd_and_hms(2026, 5, 1, 23, 30, 0).unwrap();
        service
            .create_task(&TaskDraft::new("o", "Late", late, 15))
            .unwrap();

        let noon = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(service.tasks_for_day(noon, 0).unwrap().len(), 1);
        assert!(service.tasks_for_day(noon, 120).unwrap().is_empty());
    }
}
