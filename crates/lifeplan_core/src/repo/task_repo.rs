//! Task repository and SQLite implementation.
//!
//! # Invariants
//! - Timestamps are stored as epoch milliseconds (UTC).
//! - Day listings are ordered by `scheduled_at ASC, id ASC`.

use crate::model::task::{Task, TaskStatus};
use crate::repo::objective_repo::parse_column;
use crate::repo::{ensure_connection_ready, from_epoch_ms, to_epoch_ms, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    canonical_id,
    objective_id,
    pillar_id,
    ritual_id,
    title,
    description,
    rationale,
    scheduled_at,
    duration_minutes,
    status,
    completed_at,
    skip_reason
FROM tasks";

/// Status change applied to one local task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatusChange {
    pub status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub skip_reason: Option<String>,
}

/// Repository interface for scheduled tasks.
pub trait TaskRepository {
    /// Lists tasks with `start <= scheduled_at < end`.
    fn list_tasks_between(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> RepoResult<Vec<Task>>;
    /// Lists every task currently in `status`, ordered by schedule.
    fn list_tasks_with_status(&self, status: TaskStatus) -> RepoResult<Vec<Task>>;
    fn get_task(&self, id: &str) -> RepoResult<Option<Task>>;
    /// Finds the task whose local id or recorded canonical id is `key`.
    fn find_task_by_key(&self, key: &str) -> RepoResult<Option<Task>>;
    fn insert_task(&self, task: &Task) -> RepoResult<()>;
    fn update_task_status(&self, id: &str, change: &TaskStatusChange) -> RepoResult<()>;
    /// Stores the canonical id the remote store accepted for `id`.
    fn record_canonical_id(&self, id: &str, canonical_id: &str) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn list_tasks_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE scheduled_at >= ?1 AND scheduled_at < ?2
             ORDER BY scheduled_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![to_epoch_ms(start), to_epoch_ms(end)])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn list_tasks_with_status(&self, status: TaskStatus) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL} WHERE status = ?1 ORDER BY scheduled_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([status.as_str()])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn get_task(&self, id: &str) -> RepoResult<Option<Task>> {
        self.conn
            .query_row(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"), [id], |row| {
                Ok(parse_task_row(row))
            })
            .optional()?
            .transpose()
    }

    fn find_task_by_key(&self, key: &str) -> RepoResult<Option<Task>> {
        self.conn
            .query_row(
                &format!("{TASK_SELECT_SQL} WHERE id = ?1 OR canonical_id = ?1 LIMIT 1;"),
                [key],
                |row| Ok(parse_task_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn insert_task(&self, task: &Task) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO tasks (
                id,
                canonical_id,
                objective_id,
                pillar_id,
                ritual_id,
                title,
                description,
                rationale,
                scheduled_at,
                duration_minutes,
                status,
                completed_at,
                skip_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                task.id,
                task.canonical_id,
                task.objective_id,
                task.pillar_id,
                task.ritual_id,
                task.title,
                task.description,
                task.rationale,
                to_epoch_ms(task.scheduled_at),
                task.duration_minutes,
                task.status.as_str(),
                task.completed_at.map(to_epoch_ms),
                task.skip_reason,
            ],
        )?;
        Ok(())
    }

    fn update_task_status(&self, id: &str, change: &TaskStatusChange) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET status = ?2, completed_at = ?3, skip_reason = ?4
             WHERE id = ?1;",
            params![
                id,
                change.status.as_str(),
                change.completed_at.map(to_epoch_ms),
                change.skip_reason,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn record_canonical_id(&self, id: &str, canonical_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks SET canonical_id = ?2 WHERE id = ?1;",
            params![id, canonical_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let status_text: String = row.get("status")?;
    let completed_at = match row.get::<_, Option<i64>>("completed_at")? {
        Some(value) => Some(from_epoch_ms(value, "tasks.completed_at")?),
        None => None,
    };

    Ok(Task {
        id: row.get("id")?,
        canonical_id: row.get("canonical_id")?,
        objective_id: row.get("objective_id")?,
        pillar_id: row.get("pillar_id")?,
        ritual_id: row.get("ritual_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        rationale: row.get("rationale")?,
        scheduled_at: from_epoch_ms(row.get("scheduled_at")?, "tasks.scheduled_at")?,
        duration_minutes: row.get("duration_minutes")?,
        status: parse_column(&status_text, TaskStatus::parse, "tasks.status")?,
        completed_at,
        skip_reason: row.get("skip_reason")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{SqliteTaskRepository, TaskRepository, TaskStatusChange};
    use crate::db::open_db_in_memory;
    use crate::model::task::{Task, TaskStatus};
    use crate::repo::RepoError;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn list_between_is_half_open_and_ordered() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::try_new(&conn).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(1);

        repo.insert_task(&Task::new("b", "o", "Late", start + Duration::hours(20), 30))
            .unwrap();
        repo.insert_task(&Task::new("a", "o", "Early", start, 15)).unwrap();
        repo.insert_task(&Task::new("c", "o", "Tomorrow", end, 15)).unwrap();

        let tasks = repo.list_tasks_between(start, end).unwrap();
        let ids: Vec<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn status_change_round_trips_completion_fields() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::try_new(&conn).unwrap();
        let scheduled = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        repo.insert_task(&Task::new("t-1", "o", "Read", scheduled, 20))
            .unwrap();

        let change = TaskStatusChange {
            status: TaskStatus::Completed,
            completed_at: Some(scheduled + Duration::minutes(25)),
            skip_reason: None,
        };
        repo.update_task_status("t-1", &change).unwrap();

        let loaded = repo.get_task("t-1").unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Completed);
        assert_eq!(loaded.completed_at, change.completed_at);

        let err = repo.update_task_status("nope", &change).unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));

        assert!(repo
            .list_tasks_with_status(TaskStatus::Pending)
            .unwrap()
            .is_empty());
        assert_eq!(
            repo.list_tasks_with_status(TaskStatus::Completed)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn find_by_key_matches_local_or_canonical_id() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::try_new(&conn).unwrap();
        let scheduled = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        repo.insert_task(&Task::new("local-1", "o", "Read", scheduled, 20))
            .unwrap();
        repo.record_canonical_id("local-1", "c-1").unwrap();

        assert_eq!(repo.find_task_by_key("local-1").unwrap().unwrap().id, "local-1");
        assert_eq!(repo.find_task_by_key("c-1").unwrap().unwrap().id, "local-1");
        assert!(repo.get_task("c-1").unwrap().is_none());
        assert!(repo.find_task_by_key("c-2").unwrap().is_none());
    }
}
