//! Objective aggregate repository and SQLite implementation.
//!
//! # Invariants
//! - An aggregate is written in one transaction: either the objective and all
//!   of its children land, or nothing does.
//! - Child order is the insertion order (`position`).
//! - Local ids are never rewritten; `record_canonical_id` only fills the
//!   `canonical_id` column.

use crate::model::objective::{
    Metric, MetricReading, MetricValueType, Objective, ObjectiveStatus, Pillar, Priority, Ritual,
    RitualCompletion, RitualFrequency, TargetDirection, ValueSource,
};
use crate::repo::{bool_to_int, ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

const OBJECTIVE_SELECT_SQL: &str = "SELECT
    id,
    canonical_id,
    name,
    category,
    description,
    target_outcome,
    time_frame,
    status,
    priority,
    is_paused
FROM objectives";

/// Repository interface for objective aggregates.
pub trait ObjectiveRepository {
    /// Lists every local objective with its children, oldest first.
    fn list_objectives(&self) -> RepoResult<Vec<Objective>>;
    fn get_objective(&self, id: &str) -> RepoResult<Option<Objective>>;
    /// Inserts one aggregate (objective, pillars, metrics, rituals).
    fn insert_objective(&self, objective: &Objective) -> RepoResult<()>;
    /// Stores the canonical id the remote store accepted for `id`.
    fn record_canonical_id(&self, id: &str, canonical_id: &str) -> RepoResult<()>;
}

/// SQLite-backed objective repository.
pub struct SqliteObjectiveRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectiveRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ObjectiveRepository for SqliteObjectiveRepository<'_> {
    fn list_objectives(&self) -> RepoResult<Vec<Objective>> {
        let mut stmt = self.conn.prepare(&format!(
            "{OBJECTIVE_SELECT_SQL} ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut objectives = Vec::new();
        while let Some(row) = rows.next()? {
            objectives.push(parse_objective_row(row)?);
        }

        for objective in &mut objectives {
            load_children(self.conn, objective)?;
        }
        Ok(objectives)
    }

    fn get_objective(&self, id: &str) -> RepoResult<Option<Objective>> {
        let objective = self
            .conn
            .query_row(
                &format!("{OBJECTIVE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_objective_row(row)),
            )
            .optional()?
            .transpose()?;

        match objective {
            Some(mut objective) => {
                load_children(self.conn, &mut objective)?;
                Ok(Some(objective))
            }
            None => Ok(None),
        }
    }

    fn insert_objective(&self, objective: &Objective) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO objectives (
                id,
                canonical_id,
                name,
                category,
                description,
                target_outcome,
                time_frame,
                status,
                priority,
                is_paused
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                objective.id,
                objective.canonical_id,
                objective.name,
                objective.category,
                objective.description,
                objective.target_outcome,
                objective.time_frame,
                objective.status.as_str(),
                objective.priority.as_str(),
                bool_to_int(objective.is_paused),
            ],
        )?;

        for (position, pillar) in objective.pillars.iter().enumerate() {
            insert_pillar(&tx, &objective.id, position, pillar)?;
        }
        for (position, metric) in objective.metrics.iter().enumerate() {
            insert_metric(&tx, &objective.id, position, metric)?;
        }
        for (position, ritual) in objective.rituals.iter().enumerate() {
            insert_ritual(&tx, &objective.id, position, ritual)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn record_canonical_id(&self, id: &str, canonical_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE objectives SET canonical_id = ?2 WHERE id = ?1;",
            params![id, canonical_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn insert_pillar(
    tx: &Transaction<'_>,
    objective_id: &str,
    position: usize,
    pillar: &Pillar,
) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO pillars (
            objective_id, id, position, name, description, weight, progress
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            objective_id,
            pillar.id,
            position_to_db(position)?,
            pillar.name,
            pillar.description,
            pillar.weight,
            pillar.progress,
        ],
    )?;
    Ok(())
}

fn insert_metric(
    tx: &Transaction<'_>,
    objective_id: &str,
    position: usize,
    metric: &Metric,
) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO metrics (
            objective_id, id, position, pillar_id, name, unit, value_type, target_value,
            target_direction, current_value, value_source, history_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
        params![
            objective_id,
            metric.id,
            position_to_db(position)?,
            metric.pillar_id,
            metric.name,
            metric.unit,
            metric.value_type.as_str(),
            metric.target_value,
            metric.target_direction.as_str(),
            metric.current_value,
            metric.value_source.as_str(),
            to_json(&metric.history, "metrics.history_json")?,
        ],
    )?;
    Ok(())
}

fn insert_ritual(
    tx: &Transaction<'_>,
    objective_id: &str,
    position: usize,
    ritual: &Ritual,
) -> RepoResult<()> {
    let days_json = match &ritual.days_of_week {
        Some(days) => Some(to_json(days, "rituals.days_of_week_json")?),
        None => None,
    };

    tx.execute(
        "INSERT INTO rituals (
            objective_id, id, position, pillar_id, name, description, frequency,
            days_of_week_json, times_per_period, estimated_minutes, current_streak,
            longest_streak, completions_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
        params![
            objective_id,
            ritual.id,
            position_to_db(position)?,
            ritual.pillar_id,
            ritual.name,
            ritual.description,
            ritual.frequency.as_str(),
            days_json,
            ritual.times_per_period,
            ritual.estimated_minutes,
            ritual.current_streak,
            ritual.longest_streak,
            to_json(&ritual.completions, "rituals.completions_json")?,
        ],
    )?;
    Ok(())
}

fn load_children(conn: &Connection, objective: &mut Objective) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, weight, progress
         FROM pillars WHERE objective_id = ?1 ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([objective.id.as_str()])?;
    while let Some(row) = rows.next()? {
        objective.pillars.push(Pillar {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            weight: row.get("weight")?,
            progress: row.get("progress")?,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT id, pillar_id, name, unit, value_type, target_value, target_direction,
                current_value, value_source, history_json
         FROM metrics WHERE objective_id = ?1 ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([objective.id.as_str()])?;
    while let Some(row) = rows.next()? {
        objective.metrics.push(parse_metric_row(row)?);
    }

    let mut stmt = conn.prepare(
        "SELECT id, pillar_id, name, description, frequency, days_of_week_json,
                times_per_period, estimated_minutes, current_streak, longest_streak,
                completions_json
         FROM rituals WHERE objective_id = ?1 ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([objective.id.as_str()])?;
    while let Some(row) = rows.next()? {
        objective.rituals.push(parse_ritual_row(row)?);
    }

    Ok(())
}

fn parse_objective_row(row: &Row<'_>) -> RepoResult<Objective> {
    let status_text: String = row.get("status")?;
    let priority_text: String = row.get("priority")?;
    let is_paused = match row.get::<_, i64>("is_paused")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_paused value `{other}` in objectives.is_paused"
            )));
        }
    };

    Ok(Objective {
        id: row.get("id")?,
        canonical_id: row.get("canonical_id")?,
        name: row.get("name")?,
        category: row.get("category")?,
        description: row.get("description")?,
        target_outcome: row.get("target_outcome")?,
        time_frame: row.get("time_frame")?,
        status: parse_column(&status_text, ObjectiveStatus::parse, "objectives.status")?,
        priority: parse_column(&priority_text, Priority::parse, "objectives.priority")?,
        is_paused,
        pillars: Vec::new(),
        metrics: Vec::new(),
        rituals: Vec::new(),
    })
}

fn parse_metric_row(row: &Row<'_>) -> RepoResult<Metric> {
    let value_type: String = row.get("value_type")?;
    let direction: String = row.get("target_direction")?;
    let source: String = row.get("value_source")?;
    let history_json: String = row.get("history_json")?;

    Ok(Metric {
        id: row.get("id")?,
        name: row.get("name")?,
        unit: row.get("unit")?,
        value_type: parse_column(&value_type, MetricValueType::parse, "metrics.value_type")?,
        target_value: row.get("target_value")?,
        target_direction: parse_column(
            &direction,
            TargetDirection::parse,
            "metrics.target_direction",
        )?,
        current_value: row.get("current_value")?,
        value_source: parse_column(&source, ValueSource::parse, "metrics.value_source")?,
        pillar_id: row.get("pillar_id")?,
        history: from_json::<Vec<MetricReading>>(&history_json, "metrics.history_json")?,
    })
}

fn parse_ritual_row(row: &Row<'_>) -> RepoResult<Ritual> {
    let frequency: String = row.get("frequency")?;
    let days_of_week = match row.get::<_, Option<String>>("days_of_week_json")? {
        Some(json) => Some(from_json::<BTreeSet<u8>>(&json, "rituals.days_of_week_json")?),
        None => None,
    };
    let completions_json: String = row.get("completions_json")?;

    Ok(Ritual {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        frequency: parse_column(&frequency, RitualFrequency::parse, "rituals.frequency")?,
        days_of_week,
        times_per_period: row.get("times_per_period")?,
        estimated_minutes: row.get("estimated_minutes")?,
        current_streak: row.get("current_streak")?,
        longest_streak: row.get("longest_streak")?,
        pillar_id: row.get("pillar_id")?,
        completions: from_json::<Vec<RitualCompletion>>(
            &completions_json,
            "rituals.completions_json",
        )?,
    })
}

pub(crate) fn parse_column<T>(
    value: &str,
    parse: fn(&str) -> Option<T>,
    column: &'static str,
) -> RepoResult<T> {
    parse(value).ok_or_else(|| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}

fn position_to_db(position: usize) -> RepoResult<i64> {
    i64::try_from(position)
        .map_err(|_| RepoError::InvalidData(format!("child position {position} out of range")))
}

fn to_json<T: serde::Serialize>(value: &T, column: &'static str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {column}: {err}")))
}

fn from_json<T: serde::de::DeserializeOwned>(value: &str, column: &'static str) -> RepoResult<T> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot decode {column}: {err}")))
}
