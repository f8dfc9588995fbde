//! Scheduled task model and calendar-day window.
//!
//! # Invariants
//! - `TaskStatus::Overdue` is a local presentation state and has no remote
//!   representation.
//! - `completed_at` is only meaningful for `Completed`, `skip_reason` only for
//!   `Skipped`.

use chrono::{DateTime, Duration, NaiveDate, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Local task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
    /// Derived locally for pending tasks whose window has passed.
    Overdue,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Overdue => "overdue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "skipped" => Some(Self::Skipped),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }
}

/// One scheduled unit of work for an objective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    /// Canonical identifier gained through upload or download.
    pub canonical_id: Option<String>,
    pub objective_id: String,
    pub pillar_id: Option<String>,
    pub ritual_id: Option<String>,
    pub title: String,
    pub description: String,
    /// Why the planner scheduled this task.
    pub rationale: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub skip_reason: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        objective_id: impl Into<String>,
        title: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            id: id.into(),
            canonical_id: None,
            objective_id: objective_id.into(),
            pillar_id: None,
            ritual_id: None,
            title: title.into(),
            description: String::new(),
            rationale: String::new(),
            scheduled_at,
            duration_minutes,
            status: TaskStatus::Pending,
            completed_at: None,
            skip_reason: None,
        }
    }

    /// Identifier the remote store is expected to know this task by.
    pub fn remote_key(&self) -> &str {
        self.canonical_id.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Whether a pending task has run past its scheduled end.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.scheduled_end() < now
    }
}

/// Half-open `[start, end)` window covering one device calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Returns the day containing `now` for a device at `utc_offset_minutes`.
    ///
    /// Out-of-range offsets fall back to UTC.
    pub fn containing(now: DateTime<Utc>, utc_offset_minutes: i32) -> Self {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(chrono::FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        let date = now.with_timezone(&offset).date_naive();
        let local_midnight = date.and_time(chrono::NaiveTime::MIN);
        let start = Utc.from_utc_datetime(
            &(local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()))),
        );

        Self {
            date,
            start,
            end: start + Duration::days(1),
        }
    }

    /// ISO-8601 calendar date, as expected by the remote task listing.
    pub fn iso_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::{DayWindow, Task, TaskStatus};
    use chrono::{TimeZone, Utc};

    #[test]
    fn day_window_respects_device_offset() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 23, 30, 0).unwrap();

        let utc_day = DayWindow::containing(now, 0);
        assert_eq!(utc_day.iso_date(), "2026-03-10");
        assert!(utc_day.contains(now));

        let tokyo_day = DayWindow::containing(now, 9 * 60);
        assert_eq!(tokyo_day.iso_date(), "2026-03-11");
        assert_eq!(
            tokyo_day.start,
            Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap()
        );
        assert!(tokyo_day.contains(now));
    }

    #[test]
    fn day_window_falls_back_to_utc_for_invalid_offset() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(DayWindow::containing(now, 100_000), DayWindow::containing(now, 0));
    }

    #[test]
    fn past_due_only_applies_to_pending_tasks() {
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let mut task = Task::new("t", "o", "Stretch", start, 30);
        assert!(task.is_past_due(later));

        task.status = TaskStatus::Completed;
        assert!(!task.is_past_due(later));
    }
}
