//! Core domain logic for LifePlan.
//! Local objective/task store plus the reconciliation engine that keeps it
//! aligned with the remote store.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{ConfigError, SyncConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::objective::{Metric, Objective, Pillar, Ritual};
pub use model::task::{DayWindow, Task, TaskStatus};
pub use repo::objective_repo::{ObjectiveRepository, SqliteObjectiveRepository};
pub use repo::task_repo::{SqliteTaskRepository, TaskRepository, TaskStatusChange};
pub use repo::{RepoError, RepoResult};
pub use service::plan_service::{ObjectiveDraft, PlanService, PlanServiceError};
pub use service::task_service::{TaskDraft, TaskService};
pub use sync::error::SyncError;
pub use sync::identity::{IdentityResolver, ReconciliationContext};
pub use sync::orchestrator::{SyncOrchestrator, SyncOutcome};
pub use sync::remote::{RemoteApi, RemoteError};
pub use sync::status::{ListenerId, SyncState, SyncStatus, SyncStatusPublisher};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
