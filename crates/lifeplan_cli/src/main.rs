//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `lifeplan_core` linkage and store readability without the app.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `lifeplan_cli [db_path] [config.json]`

use chrono::Utc;
use lifeplan_core::db::open_db;
use lifeplan_core::{
    PlanService, SqliteObjectiveRepository, SqliteTaskRepository, SyncConfig, TaskService,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("lifeplan_core ping={}", lifeplan_core::ping());
    println!("lifeplan_core version={}", lifeplan_core::core_version());

    let mut args = std::env::args().skip(1);
    let Some(db_path) = args.next().map(PathBuf::from) else {
        return ExitCode::SUCCESS;
    };
    let config = match args.next() {
        Some(path) => match SyncConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("config error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => SyncConfig::default(),
    };

    match summarize(&db_path, &config) {
        Ok((objectives, today)) => {
            println!("store objectives={objectives} tasks_today={today}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("store error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn summarize(
    db_path: &Path,
    config: &SyncConfig,
) -> Result<(usize, usize), Box<dyn std::error::Error>> {
    let conn = open_db(db_path)?;
    let objectives = PlanService::new(SqliteObjectiveRepository::try_new(&conn)?)
        .list_objectives()?
        .len();
    let today = TaskService::new(SqliteTaskRepository::try_new(&conn)?)
        .tasks_for_day(Utc::now(), config.utc_offset_minutes)?
        .len();
    Ok((objectives, today))
}
