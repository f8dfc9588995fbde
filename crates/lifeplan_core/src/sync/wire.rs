//! Wire schemas exchanged with the remote store.
//!
//! # Responsibility
//! - Give every remote payload an explicit, typed shape.
//! - Convert between wire records and local domain records.
//!
//! # Invariants
//! - `RemoteTaskStatus` has no `overdue` value; local overdue tasks are sent
//!   as `pending`.
//! - Materialized objectives use the canonical id as their local id and start
//!   with empty metric history and ritual completion logs.

use crate::model::objective::{
    Metric, MetricValueType, Objective, ObjectiveStatus, Pillar, Priority, Ritual,
    RitualFrequency, TargetDirection, ValueSource,
};
use crate::model::task::{Task, TaskStatus};
use crate::sync::remote::RemoteError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePillar {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMetric {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub value_type: MetricValueType,
    #[serde(default)]
    pub target_value: f64,
    pub target_direction: TargetDirection,
    #[serde(default)]
    pub current_value: f64,
    pub value_source: ValueSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pillar_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRitual {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub frequency: RitualFrequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<BTreeSet<u8>>,
    #[serde(default = "default_times_per_period")]
    pub times_per_period: u32,
    #[serde(default)]
    pub estimated_minutes: u32,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pillar_id: Option<String>,
}

fn default_times_per_period() -> u32 {
    1
}

/// Objective as listed, fetched in detail, or submitted for creation.
///
/// Listing responses may omit children; detail responses and creation
/// payloads always carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObjective {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_outcome: String,
    #[serde(default)]
    pub time_frame: String,
    pub status: ObjectiveStatus,
    pub priority: Priority,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub pillars: Vec<RemotePillar>,
    #[serde(default)]
    pub metrics: Vec<RemoteMetric>,
    #[serde(default)]
    pub rituals: Vec<RemoteRitual>,
}

/// Task status values the remote store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteTaskStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl From<TaskStatus> for RemoteTaskStatus {
    fn from(value: TaskStatus) -> Self {
        match value {
            TaskStatus::Pending | TaskStatus::Overdue => Self::Pending,
            TaskStatus::InProgress => Self::InProgress,
            TaskStatus::Completed => Self::Completed,
            TaskStatus::Skipped => Self::Skipped,
        }
    }
}

impl From<RemoteTaskStatus> for TaskStatus {
    fn from(value: RemoteTaskStatus) -> Self {
        match value {
            RemoteTaskStatus::Pending => Self::Pending,
            RemoteTaskStatus::InProgress => Self::InProgress,
            RemoteTaskStatus::Completed => Self::Completed,
            RemoteTaskStatus::Skipped => Self::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    pub objective_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pillar_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ritual_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rationale: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: RemoteTaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// Partial task update carrying a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusUpdate {
    pub status: RemoteTaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// `{"objectives": [...]}` listing envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectiveListEnvelope {
    pub objectives: Vec<RemoteObjective>,
}

/// `{"objective": {...}}` single-objective envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectiveEnvelope {
    pub objective: RemoteObjective,
}

/// `{"tasks": [...]}` listing envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskListEnvelope {
    pub tasks: Vec<RemoteTask>,
}

/// `{"task": {...}}` single-task envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskEnvelope {
    pub task: RemoteTask,
}

/// Decodes a 2xx response body; malformed bodies become `RemoteError::Parse`.
pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    serde_json::from_str(body).map_err(|err| RemoteError::Parse(err.to_string()))
}

impl RemoteObjective {
    /// Builds the local aggregate for a downloaded objective.
    pub fn materialize(self) -> Objective {
        Objective {
            canonical_id: Some(self.id.clone()),
            id: self.id,
            name: self.name,
            category: self.category,
            description: self.description,
            target_outcome: self.target_outcome,
            time_frame: self.time_frame,
            status: self.status,
            priority: self.priority,
            is_paused: self.is_paused,
            pillars: self
                .pillars
                .into_iter()
                .map(|pillar| Pillar {
                    id: pillar.id,
                    name: pillar.name,
                    description: pillar.description,
                    weight: pillar.weight,
                    progress: pillar.progress,
                })
                .collect(),
            metrics: self
                .metrics
                .into_iter()
                .map(|metric| Metric {
                    id: metric.id,
                    name: metric.name,
                    unit: metric.unit,
                    value_type: metric.value_type,
                    target_value: metric.target_value,
                    target_direction: metric.target_direction,
                    current_value: metric.current_value,
                    value_source: metric.value_source,
                    pillar_id: metric.pillar_id,
                    history: Vec::new(),
                })
                .collect(),
            rituals: self
                .rituals
                .into_iter()
                .map(|ritual| Ritual {
                    id: ritual.id,
                    name: ritual.name,
                    description: ritual.description,
                    frequency: ritual.frequency,
                    days_of_week: ritual.days_of_week,
                    times_per_period: ritual.times_per_period,
                    estimated_minutes: ritual.estimated_minutes,
                    current_streak: ritual.current_streak,
                    longest_streak: ritual.longest_streak,
                    pillar_id: ritual.pillar_id,
                    completions: Vec::new(),
                })
                .collect(),
        }
    }
}

impl RemoteTask {
    /// Builds the local task for a downloaded remote task, verbatim.
    pub fn materialize(self) -> Task {
        Task {
            canonical_id: Some(self.id.clone()),
            id: self.id,
            objective_id: self.objective_id,
            pillar_id: self.pillar_id,
            ritual_id: self.ritual_id,
            title: self.title,
            description: self.description,
            rationale: self.rationale,
            scheduled_at: self.scheduled_at,
            duration_minutes: self.duration_minutes,
            status: self.status.into(),
            completed_at: self.completed_at,
            skip_reason: self.skip_reason,
        }
    }
}
