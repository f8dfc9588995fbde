//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose objective and task use-cases to Dart via FRB.
//! - Translate core errors into plain strings for the UI.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - The store path is fixed on first use; later attempts to move it fail.

use chrono::{DateTime, TimeZone, Utc};
use lifeplan_core::db::open_db;
use lifeplan_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    ObjectiveDraft, PlanService, SqliteObjectiveRepository, SqliteTaskRepository, SyncConfig,
    Task, TaskDraft, TaskService, TaskStatus,
};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const STORE_PATH_ENV: &str = "LIFEPLAN_DB_PATH";
static STORE_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Returns empty string on success and the error message on failure.
/// Repeating the active `level + log_dir` is a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Pins the on-device store file.
///
/// Must run before any store-backed call. Returns empty string on success.
/// Repeating the active path is a no-op; any other path is rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_store(db_path: String) -> String {
    let trimmed = db_path.trim();
    if trimmed.is_empty() || !Path::new(trimmed).is_absolute() {
        return format!("db_path must be an absolute path, got `{trimmed}`");
    }

    let requested = PathBuf::from(trimmed);
    let active = STORE_PATH.get_or_init(|| requested.clone());
    if *active != requested {
        return format!(
            "store already configured at `{}`; refusing to switch to `{}`",
            active.display(),
            requested.display()
        );
    }
    info!(
        "event=store_configure module=ffi status=ok db_path={}",
        active.display()
    );
    String::new()
}

/// Result envelope for create/update calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanActionResponse {
    pub ok: bool,
    /// Local id of the created or updated record.
    pub id: Option<String>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl PlanActionResponse {
    fn success(message: impl Into<String>, id: String) -> Self {
        Self {
            ok: true,
            id: Some(id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

/// Task row as shown on the day view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub task_id: String,
    pub objective_id: String,
    pub title: String,
    pub scheduled_at_ms: i64,
    pub duration_minutes: u32,
    /// `pending|in_progress|completed|skipped|overdue`.
    pub status: String,
    pub skip_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TasksTodayResponse {
    pub items: Vec<TaskItem>,
    pub message: String,
}

/// Creates an objective with no pillars.
#[flutter_rust_bridge::frb(sync)]
pub fn objective_create(name: String, category: String) -> PlanActionResponse {
    let mut draft = ObjectiveDraft::new(name);
    draft.category = category.trim().to_string();

    match with_plan_service(|service| {
        service
            .create_objective(&draft)
            .map_err(|err| err.to_string())
    }) {
        Ok(objective) => PlanActionResponse::success("Objective created.", objective.id),
        Err(err) => PlanActionResponse::failure(format!("objective_create failed: {err}")),
    }
}

/// Schedules a `pending` task for an objective.
#[flutter_rust_bridge::frb(sync)]
pub fn task_create(
    objective_id: String,
    title: String,
    scheduled_at_ms: i64,
    duration_minutes: u32,
) -> PlanActionResponse {
    let Some(scheduled_at) = from_epoch_ms(scheduled_at_ms) else {
        return PlanActionResponse::failure(format!(
            "task_create failed: invalid scheduled_at_ms `{scheduled_at_ms}`"
        ));
    };
    let draft = TaskDraft::new(objective_id.trim(), title, scheduled_at, duration_minutes);

    match with_task_service(|service| service.create_task(&draft).map_err(|err| err.to_string()))
    {
        Ok(task) => PlanActionResponse::success("Task created.", task.id),
        Err(err) => PlanActionResponse::failure(format!("task_create failed: {err}")),
    }
}

/// Sets a task status; `skip_reason` is kept only for `skipped`.
#[flutter_rust_bridge::frb(sync)]
pub fn task_set_status(
    task_id: String,
    status: String,
    skip_reason: Option<String>,
) -> PlanActionResponse {
    let Some(status) = TaskStatus::parse(status.trim()) else {
        return PlanActionResponse::failure(format!(
            "task_set_status failed: unsupported status `{}`",
            status.trim()
        ));
    };

    let result = with_task_service(|service| {
        service
            .set_task_status(task_id.trim(), status, skip_reason)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(task) => PlanActionResponse::success("Task updated.", task.id),
        Err(err) => PlanActionResponse::failure(format!("task_set_status failed: {err}")),
    }
}

/// Lists today's tasks for the device offset, refreshing `overdue` first.
#[flutter_rust_bridge::frb(sync)]
pub fn tasks_today(utc_offset_minutes: i32) -> TasksTodayResponse {
    let now = Utc::now();
    let result = with_task_service(|service| {
        service.refresh_overdue(now).map_err(|err| err.to_string())?;
        service
            .tasks_for_day(now, utc_offset_minutes)
            .map_err(|err| err.to_string())
    });

    match result {
        Ok(tasks) => {
            let items: Vec<TaskItem> = tasks.into_iter().map(to_task_item).collect();
            let message = if items.is_empty() {
                "No tasks today.".to_string()
            } else {
                format!("{} task(s) today.", items.len())
            };
            TasksTodayResponse { items, message }
        }
        Err(err) => TasksTodayResponse {
            items: Vec::new(),
            message: format!("tasks_today failed: {err}"),
        },
    }
}

fn resolve_store_path() -> PathBuf {
    STORE_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(STORE_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(SyncConfig::default().db_file_name)
        })
        .clone()
}

fn with_plan_service<T>(
    f: impl FnOnce(&PlanService<SqliteObjectiveRepository<'_>>) -> Result<T, String>,
) -> Result<T, String> {
    let conn = open_db(resolve_store_path()).map_err(|err| format!("store open failed: {err}"))?;
    let repo = SqliteObjectiveRepository::try_new(&conn)
        .map_err(|err| format!("objective repo init failed: {err}"))?;
    f(&PlanService::new(repo))
}

fn with_task_service<T>(
    f: impl FnOnce(&TaskService<SqliteTaskRepository<'_>>) -> Result<T, String>,
) -> Result<T, String> {
    let conn = open_db(resolve_store_path()).map_err(|err| format!("store open failed: {err}"))?;
    let repo = SqliteTaskRepository::try_new(&conn)
        .map_err(|err| format!("task repo init failed: {err}"))?;
    f(&TaskService::new(repo))
}

fn from_epoch_ms(value: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(value).single()
}

fn to_task_item(task: Task) -> TaskItem {
    TaskItem {
        scheduled_at_ms: task.scheduled_at.timestamp_millis(),
        status: task.status.as_str().to_string(),
        task_id: task.id,
        objective_id: task.objective_id,
        title: task.title,
        duration_minutes: task.duration_minutes,
        skip_reason: task.skip_reason,
    }
}
