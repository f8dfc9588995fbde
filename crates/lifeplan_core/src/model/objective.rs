//! Objective aggregate model.
//!
//! # Responsibility
//! - Define the objective aggregate: one objective owning ordered pillars,
//!   metrics and rituals.
//! - Provide string codecs for persisted enum columns.
//!
//! # Invariants
//! - `id` is the local identifier and never changes after creation.
//! - `canonical_id` is only set once the remote store has accepted the
//!   aggregate (or when the aggregate was downloaded from it).
//! - Child `pillar_id` references point at a pillar of the same aggregate.
//!
//! # See also
//! - docs/architecture/sync.md

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle state of one objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    Active,
    Completed,
    Archived,
}

impl ObjectiveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Shape of the values a metric records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValueType {
    Number,
    Percentage,
    Duration,
    Count,
    Boolean,
}

impl MetricValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Percentage => "percentage",
            Self::Duration => "duration",
            Self::Count => "count",
            Self::Boolean => "boolean",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "number" => Some(Self::Number),
            "percentage" => Some(Self::Percentage),
            "duration" => Some(Self::Duration),
            "count" => Some(Self::Count),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

/// Which way a metric has to move to reach its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDirection {
    Increase,
    Decrease,
    Maintain,
}

impl TargetDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increase => "increase",
            Self::Decrease => "decrease",
            Self::Maintain => "maintain",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "increase" => Some(Self::Increase),
            "decrease" => Some(Self::Decrease),
            "maintain" => Some(Self::Maintain),
            _ => None,
        }
    }
}

/// Where metric readings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Manual,
    Ritual,
    Task,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Ritual => "ritual",
            Self::Task => "task",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "ritual" => Some(Self::Ritual),
            "task" => Some(Self::Task),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RitualFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl RitualFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }
}

/// One recorded metric value. Local-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// One ritual completion log entry. Local-only history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RitualCompletion {
    pub completed_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Weighted area of focus inside one objective.
#[derive(Debug, Clone, PartialEq)]
pub struct Pillar {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Relative weight. Sum across an objective is a creation-flow concern.
    pub weight: f64,
    /// Progress percentage in `0..=100`.
    pub progress: f64,
}

/// Measurable indicator tracked for one objective.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub value_type: MetricValueType,
    pub target_value: f64,
    pub target_direction: TargetDirection,
    pub current_value: f64,
    pub value_source: ValueSource,
    pub pillar_id: Option<String>,
    pub history: Vec<MetricReading>,
}

/// Recurring habit that feeds one objective.
#[derive(Debug, Clone, PartialEq)]
pub struct Ritual {
    pub id: String,
    pub name: String,
    pub description: String,
    pub frequency: RitualFrequency,
    /// Weekdays as `0 = Monday .. 6 = Sunday`.
    pub days_of_week: Option<BTreeSet<u8>>,
    pub times_per_period: u32,
    pub estimated_minutes: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub pillar_id: Option<String>,
    pub completions: Vec<RitualCompletion>,
}

/// Objective aggregate root.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Local identifier; arbitrary token for device-created objectives.
    pub id: String,
    /// Canonical identifier gained through upload or download.
    pub canonical_id: Option<String>,
    pub name: String,
    pub category: String,
    pub description: String,
    pub target_outcome: String,
    pub time_frame: String,
    pub status: ObjectiveStatus,
    pub priority: Priority,
    pub is_paused: bool,
    pub pillars: Vec<Pillar>,
    pub metrics: Vec<Metric>,
    pub rituals: Vec<Ritual>,
}

impl Objective {
    /// Creates an empty active objective with the given identifier.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            canonical_id: None,
            name: name.into(),
            category: String::new(),
            description: String::new(),
            target_outcome: String::new(),
            time_frame: String::new(),
            status: ObjectiveStatus::Active,
            priority: Priority::Medium,
            is_paused: false,
            pillars: Vec::new(),
            metrics: Vec::new(),
            rituals: Vec::new(),
        }
    }

    /// Identifier the remote store is expected to know this objective by.
    pub fn remote_key(&self) -> &str {
        self.canonical_id.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn pillar(&self, pillar_id: &str) -> Option<&Pillar> {
        self.pillars.iter().find(|pillar| pillar.id == pillar_id)
    }
}

impl Pillar {
    pub fn new(id: impl Into<String>, name: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            weight,
            progress: 0.0,
        }
    }
}

impl Metric {
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit: unit.into(),
            value_type: MetricValueType::Number,
            target_value: 0.0,
            target_direction: TargetDirection::Increase,
            current_value: 0.0,
            value_source: ValueSource::Manual,
            pillar_id: None,
            history: Vec::new(),
        }
    }
}

impl Ritual {
    pub fn new(id: impl Into<String>, name: impl Into<String>, frequency: RitualFrequency) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            frequency,
            days_of_week: None,
            times_per_period: 1,
            estimated_minutes: 0,
            current_streak: 0,
            longest_streak: 0,
            pillar_id: None,
            completions: Vec::new(),
        }
    }
}
