//! Sync status state machine and listener registry.
//!
//! # Responsibility
//! - Hold the current `SyncState` snapshot.
//! - Notify registered listeners synchronously on every transition.
//!
//! # Invariants
//! - Transitions follow `idle -> syncing -> success | error`; a new pass
//!   re-enters `syncing` from either terminal state.
//! - Listeners run outside the registry lock, so they may subscribe or
//!   unsubscribe from inside a callback.
//! - There is no replay: late subscribers read `sync_state()`.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Snapshot delivered to listeners and returned by `sync_state()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub status: SyncStatus,
    /// Completion time of the last successful pass.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Summary of the last failed pass.
    pub error: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            last_synced_at: None,
            error: None,
        }
    }
}

/// Registration handle returned by `subscribe`.
pub type ListenerId = u64;

type Listener = Arc<dyn Fn(&SyncState) + Send + Sync>;

#[derive(Default)]
struct Registry {
    state: SyncState,
    listeners: BTreeMap<ListenerId, Listener>,
    next_id: ListenerId,
}

/// Observer registry owned by one orchestrator.
#[derive(Default)]
pub struct SyncStatusPublisher {
    registry: Mutex<Registry>,
}

impl SyncStatusPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener invoked on every subsequent transition.
    pub fn subscribe(&self, listener: impl Fn(&SyncState) + Send + Sync + 'static) -> ListenerId {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, Arc::new(listener));
        id
    }

    /// Removes a listener. Returns `false` when `id` was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.lock().listeners.remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn sync_state(&self) -> SyncState {
        self.lock().state.clone()
    }

    pub(crate) fn begin(&self) {
        self.transition(|state| {
            state.status = SyncStatus::Syncing;
            state.error = None;
        });
    }

    pub(crate) fn succeed(&self, completed_at: DateTime<Utc>) {
        self.transition(|state| {
            state.status = SyncStatus::Success;
            state.last_synced_at = Some(completed_at);
            state.error = None;
        });
    }

    pub(crate) fn fail(&self, message: String) {
        self.transition(|state| {
            state.status = SyncStatus::Error;
            state.error = Some(message);
        });
    }

    fn transition(&self, apply: impl FnOnce(&mut SyncState)) {
        let (snapshot, listeners) = {
            let mut registry = self.lock();
            apply(&mut registry.state);
            let listeners: Vec<Listener> = registry.listeners.values().cloned().collect();
            (registry.state.clone(), listeners)
        };

        for listener in listeners {
            listener(&snapshot);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{SyncState, SyncStatus, SyncStatusPublisher};
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    fn recording(publisher: &SyncStatusPublisher) -> Arc<Mutex<Vec<SyncState>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        publisher.subscribe(move |state| sink.lock().unwrap().push(state.clone()));
        seen
    }

    #[test]
    fn starts_idle_without_history() {
        let publisher = SyncStatusPublisher::new();
        assert_eq!(publisher.sync_state(), SyncState::default());
        assert_eq!(publisher.sync_state().status, SyncStatus::Idle);
    }

    #[test]
    fn listeners_receive_every_transition_snapshot() {
        let publisher = SyncStatusPublisher::new();
        let seen = recording(&publisher);

        publisher.begin();
        publisher.fail("2 item(s) failed to sync".to_string());
        publisher.begin();
        publisher.succeed(Utc::now());

        let seen = seen.lock().unwrap();
        let statuses: Vec<SyncStatus> = seen.iter().map(|state| state.status).collect();
        assert_eq!(
            statuses,
            vec![
                SyncStatus::Syncing,
                SyncStatus::Error,
                SyncStatus::Syncing,
                SyncStatus::Success
            ]
        );
        assert_eq!(seen[1].error.as_deref(), Some("2 item(s) failed to sync"));
        assert!(seen[1].last_synced_at.is_none());
        assert!(seen[3].error.is_none());
        assert!(seen[3].last_synced_at.is_some());
    }

    #[test]
    fn late_subscriber_sees_only_future_transitions() {
        let publisher = SyncStatusPublisher::new();
        publisher.begin();
        publisher.succeed(Utc::now());

        let seen = recording(&publisher);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(publisher.sync_state().status, SyncStatus::Success);

        publisher.begin();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let publisher = SyncStatusPublisher::new();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let id = publisher.subscribe(move |_| *sink.lock().unwrap() += 1);

        publisher.begin();
        assert!(publisher.unsubscribe(id));
        assert!(!publisher.unsubscribe(id));
        publisher.fail("boom".to_string());

        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(publisher.listener_count(), 0);
    }

    #[test]
    fn listener_may_reenter_registry() {
        let publisher = Arc::new(SyncStatusPublisher::new());
        let inner = Arc::clone(&publisher);
        publisher.subscribe(move |_| {
            let _ = inner.sync_state();
        });

        publisher.begin();
        assert_eq!(publisher.sync_state().status, SyncStatus::Syncing);
    }
}
