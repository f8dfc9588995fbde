#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lifeplan_core::model::objective::{ObjectiveStatus, Priority};
use lifeplan_core::sync::remote::{RemoteApi, RemoteError, RemoteResult};
use lifeplan_core::sync::wire::{
    RemoteObjective, RemotePillar, RemoteTask, RemoteTaskStatus, TaskStatusUpdate,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// One remote call as observed by the fake, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListObjectives,
    ObjectiveDetail(String),
    CreateObjective(String),
    ListTasks(String),
    CreateTask(String),
    UpdateTask(String, RemoteTaskStatus),
}

#[derive(Default)]
struct State {
    objectives: Vec<RemoteObjective>,
    tasks: Vec<RemoteTask>,
    calls: Vec<Call>,
    failing_objective_names: BTreeSet<String>,
    failing_task_titles: BTreeSet<String>,
    fail_status_updates: bool,
    fail_objective_listing: bool,
    omit_listed_children: bool,
}

/// In-memory remote store that records every call.
pub struct FakeRemote {
    authenticated: AtomicBool,
    state: Mutex<State>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            authenticated: AtomicBool::new(true),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_objective(self, objective: RemoteObjective) -> Self {
        self.lock().objectives.push(objective);
        self
    }

    pub fn with_task(self, task: RemoteTask) -> Self {
        self.lock().tasks.push(task);
        self
    }

    pub fn set_authenticated(&self, value: bool) {
        self.authenticated.store(value, Ordering::SeqCst);
    }

    pub fn fail_objective_named(&self, name: &str) {
        self.lock().failing_objective_names.insert(name.to_string());
    }

    pub fn fail_task_titled(&self, title: &str) {
        self.lock().failing_task_titles.insert(title.to_string());
    }

    pub fn heal(&self) {
        let mut state = self.lock();
        state.failing_objective_names.clear();
        state.failing_task_titles.clear();
        state.fail_status_updates = false;
        state.fail_objective_listing = false;
    }

    pub fn fail_status_updates(&self) {
        self.lock().fail_status_updates = true;
    }

    pub fn fail_objective_listing(&self) {
        self.lock().fail_objective_listing = true;
    }

    /// Listings return objectives without pillars, metrics or rituals.
    pub fn omit_listed_children(&self) {
        self.lock().omit_listed_children = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn objectives(&self) -> Vec<RemoteObjective> {
        self.lock().objectives.clone()
    }

    pub fn tasks(&self) -> Vec<RemoteTask> {
        self.lock().tasks.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn list_objectives(&self) -> RemoteResult<Vec<RemoteObjective>> {
        // Lets a second pass interleave in concurrency tests.
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.calls.push(Call::ListObjectives);
        if state.fail_objective_listing {
            return Err(RemoteError::Network("connection reset".to_string()));
        }
        let mut listed = state.objectives.clone();
        if state.omit_listed_children {
            for objective in &mut listed {
                objective.pillars.clear();
                objective.metrics.clear();
                objective.rituals.clear();
            }
        }
        Ok(listed)
    }

    async fn get_objective_detail(&self, canonical_id: &str) -> RemoteResult<RemoteObjective> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::ObjectiveDetail(canonical_id.to_string()));
        state
            .objectives
            .iter()
            .find(|objective| objective.id == canonical_id)
            .cloned()
            .ok_or_else(|| RemoteError::from_response(404, r#"{"detail": "objective not found"}"#))
    }

    async fn create_objective(&self, payload: &RemoteObjective) -> RemoteResult<RemoteObjective> {
        let mut state = self.lock();
        state.calls.push(Call::CreateObjective(payload.name.clone()));
        if state.failing_objective_names.contains(&payload.name) {
            return Err(RemoteError::from_response(
                400,
                r#"{"error": {"message": "rejected objective"}}"#,
            ));
        }
        state.objectives.push(payload.clone());
        Ok(payload.clone())
    }

    async fn list_tasks(&self, date_iso: &str) -> RemoteResult<Vec<RemoteTask>> {
        let mut state = self.lock();
        state.calls.push(Call::ListTasks(date_iso.to_string()));
        Ok(state
            .tasks
            .iter()
            .filter(|task| task.scheduled_at.date_naive().to_string() == date_iso)
            .cloned()
            .collect())
    }

    async fn create_task(&self, payload: &RemoteTask) -> RemoteResult<RemoteTask> {
        let mut state = self.lock();
        state.calls.push(Call::CreateTask(payload.title.clone()));
        if state.failing_task_titles.contains(&payload.title) {
            return Err(RemoteError::from_response(422, r#"{"message": "bad task"}"#));
        }
        state.tasks.push(payload.clone());
        Ok(payload.clone())
    }

    async fn update_task(&self, id: &str, update: &TaskStatusUpdate) -> RemoteResult<RemoteTask> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::UpdateTask(id.to_string(), update.status));
        if state.fail_status_updates {
            return Err(RemoteError::Network("timed out".to_string()));
        }
        let task = state
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| RemoteError::from_response(404, ""))?;
        task.status = update.status;
        task.completed_at = update.completed_at;
        task.skip_reason = update.skip_reason.clone();
        Ok(task.clone())
    }
}

pub fn remote_objective(id: &str, name: &str) -> RemoteObjective {
    RemoteObjective {
        id: id.to_string(),
        name: name.to_string(),
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

pub fn remote_pillar(id: &str, name: &str, weight: f64) -> RemotePillar {
    RemotePillar {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        weight,
        progress: 0.0,
    }
}

pub fn remote_task(
    id: &str,
    objective_id: &str,
    title: &str,
    scheduled_at: DateTime<Utc>,
) -> RemoteTask {
    RemoteTask {
        id: id.to_string(),
        objective_id: objective_id.to_string(),
        pillar_id: None,
        ritual_id: None,
        title: title.to_string(),
        description: String::new(),
        rationale: String::new(),
        scheduled_at,
        duration_minutes: 30,
        status: RemoteTaskStatus::Pending,
        completed_at: None,
        skip_reason: None,
    }
}
