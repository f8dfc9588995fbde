//! Per-phase reconciliation counters.

use log::warn;

/// What one reconciliation phase did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Local entities uploaded through a creation call.
    pub created: usize,
    /// Local entities matched to an existing remote entity.
    pub matched: usize,
    /// Remote entities materialized locally.
    pub downloaded: usize,
    /// Local entities skipped until a dependency is mapped.
    pub deferred: usize,
    /// Status updates pushed successfully.
    pub status_pushed: usize,
    /// Itemized failures. Each one counts toward the pass outcome.
    pub errors: Vec<String>,
}

impl PhaseReport {
    /// Records one per-entity failure and emits it on the log side channel.
    pub(crate) fn record_error(&mut self, phase: &'static str, entity_id: &str, error: String) {
        warn!(
            "event=sync_item_failed module=sync status=error phase={phase} entity_id={entity_id} error={error}"
        );
        self.errors.push(format!("{phase} {entity_id}: {error}"));
    }

    /// Folds another phase into this one.
    pub fn absorb(&mut self, other: PhaseReport) {
        self.created += other.created;
        self.matched += other.matched;
        self.downloaded += other.downloaded;
        self.deferred += other.deferred;
        self.status_pushed += other.status_pushed;
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::PhaseReport;

    #[test]
    fn absorb_sums_counters_and_keeps_error_order() {
        let mut objectives = PhaseReport {
            created: 1,
            ..PhaseReport::default()
        };
        objectives.record_error("objective", "o-1", "boom".to_string());

        let mut tasks = PhaseReport {
            created: 2,
            deferred: 1,
            ..PhaseReport::default()
        };
        tasks.record_error("task", "t-1", "bang".to_string());

        objectives.absorb(tasks);
        assert_eq!(objectives.created, 3);
        assert_eq!(objectives.deferred, 1);
        assert_eq!(
            objectives.errors,
            vec!["objective o-1: boom".to_string(), "task t-1: bang".to_string()]
        );
    }
}
