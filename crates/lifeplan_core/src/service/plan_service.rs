//! Objective creation use-cases.
//!
//! # Responsibility
//! - Validate objective drafts before they reach the local store.
//! - Assign local identifiers to the aggregate and its children.
//!
//! # Invariants
//! - Generated local ids are `local-<32 hex>` tokens, never UUID-shaped, so
//!   sync always mints a canonical id for them.
//! - Supplied ids (planner payloads) are kept verbatim.
//! - A persisted objective is always internally consistent: child pillar
//!   references point at pillars of the same aggregate.

use crate::model::objective::{
    Metric, MetricValueType, Objective, Pillar, Priority, Ritual, RitualFrequency,
    TargetDirection, ValueSource,
};
use crate::repo::objective_repo::ObjectiveRepository;
use crate::repo::RepoError;
use log::{info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const WEIGHT_SUM_TOLERANCE: f64 = 0.01;
const LOCAL_ID_PREFIX: &str = "local-";

/// Service error for objective and task use-cases.
#[derive(Debug)]
pub enum PlanServiceError {
    /// Draft or argument rejected before persistence.
    InvalidDraft(String),
    /// Target record does not exist.
    NotFound(String),
    Repo(RepoError),
}

impl Display for PlanServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDraft(message) => write!(f, "invalid input: {message}"),
            Self::NotFound(id) => write!(f, "not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PlanServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PlanServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub type PlanServiceResult<T> = Result<T, PlanServiceError>;

/// Generates a fresh device-local identifier.
pub fn new_local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4().simple())
}

/// Pillar input. `id` is optional; children may reference a pillar by its
/// supplied id or by its name.
#[derive(Debug, Clone, PartialEq)]
pub struct PillarDraft {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub weight: f64,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDraft {
    pub id: Option<String>,
    pub name: String,
    pub unit: String,
    pub value_type: MetricValueType,
    pub target_value: f64,
    pub target_direction: TargetDirection,
    pub value_source: ValueSource,
    pub pillar_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RitualDraft {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub frequency: RitualFrequency,
    pub days_of_week: Option<BTreeSet<u8>>,
    pub times_per_period: u32,
    pub estimated_minutes: u32,
    pub pillar_ref: Option<String>,
}

/// Objective input as produced by the planner or the create form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectiveDraft {
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub description: String,
    pub target_outcome: String,
    pub time_frame: String,
    pub priority: Priority,
    pub pillars: Vec<PillarDraft>,
    pub metrics: Vec<MetricDraft>,
    pub rituals: Vec<RitualDraft>,
}

impl ObjectiveDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl PillarDraft {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            weight,
            progress: 0.0,
        }
    }
}

impl MetricDraft {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            unit: unit.into(),
            value_type: MetricValueType::Number,
            target_value: 0.0,
            target_direction: TargetDirection::Increase,
            value_source: ValueSource::Manual,
            pillar_ref: None,
        }
    }
}

impl RitualDraft {
    pub fn new(name: impl Into<String>, frequency: RitualFrequency) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            frequency,
            days_of_week: None,
            times_per_period: 1,
            estimated_minutes: 0,
            pillar_ref: None,
        }
    }
}

/// Use-case service for objective aggregates.
pub struct PlanService<R: ObjectiveRepository> {
    repo: R,
}

impl<R: ObjectiveRepository> PlanService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validates `draft`, assigns ids and persists the aggregate.
    ///
    /// # Errors
    /// - `InvalidDraft` for an empty name, pillar weights not summing to
    ///   1.0, progress outside `0..=100`, or a dangling pillar reference.
    /// - `Repo` when the aggregate cannot be stored.
    pub fn create_objective(&self, draft: &ObjectiveDraft) -> PlanServiceResult<Objective> {
        let objective = match build_objective(draft) {
            Ok(objective) => objective,
            Err(err) => {
                warn!(
                    "event=objective_create module=service status=error error_code=invalid_draft error={}",
                    err
                );
                return Err(err);
            }
        };

        self.repo.insert_objective(&objective)?;
        info!(
            "event=objective_create module=service status=ok objective_id={} pillars={} metrics={} rituals={}",
            objective.id,
            objective.pillars.len(),
            objective.metrics.len(),
            objective.rituals.len()
        );
        Ok(objective)
    }

    pub fn list_objectives(&self) -> PlanServiceResult<Vec<Objective>> {
        Ok(self.repo.list_objectives()?)
    }

    pub fn get_objective(&self, id: &str) -> PlanServiceResult<Objective> {
        self.repo
            .get_objective(id)?
            .ok_or_else(|| PlanServiceError::NotFound(id.to_string()))
    }
}

fn build_objective(draft: &ObjectiveDraft) -> PlanServiceResult<Objective> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(invalid("objective name cannot be empty"));
    }
    validate_pillars(&draft.pillars)?;

    let mut objective = Objective::new(id_or_new(&draft.id), name);
    objective.category = draft.category.clone();
    objective.description = draft.description.clone();
    objective.target_outcome = draft.target_outcome.clone();
    objective.time_frame = draft.time_frame.clone();
    objective.priority = draft.priority;

    objective.pillars = draft
        .pillars
        .iter()
        .map(|pillar| Pillar {
            id: id_or_new(&pillar.id),
            name: pillar.name.clone(),
            description: pillar.description.clone(),
            weight: pillar.weight,
            progress: pillar.progress,
        })
        .collect();

    for metric in &draft.metrics {
        let pillar_id = resolve_pillar_ref(draft, &objective.pillars, metric.pillar_ref.as_deref())?;
        objective.metrics.push(Metric {
            value_type: metric.value_type,
            target_value: metric.target_value,
            target_direction: metric.target_direction,
            value_source: metric.value_source,
            pillar_id,
            ..Metric::new(id_or_new(&metric.id), metric.name.clone(), metric.unit.clone())
        });
    }

    for ritual in &draft.rituals {
        let pillar_id = resolve_pillar_ref(draft, &objective.pillars, ritual.pillar_ref.as_deref())?;
        objective.rituals.push(Ritual {
            description: ritual.description.clone(),
            days_of_week: ritual.days_of_week.clone(),
            times_per_period: ritual.times_per_period,
            estimated_minutes: ritual.estimated_minutes,
            pillar_id,
            ..Ritual::new(id_or_new(&ritual.id), ritual.name.clone(), ritual.frequency)
        });
    }

    Ok(objective)
}

fn validate_pillars(pillars: &[PillarDraft]) -> PlanServiceResult<()> {
    if pillars.is_empty() {
        return Ok(());
    }

    for pillar in pillars {
        if pillar.name.trim().is_empty() {
            return Err(invalid("pillar name cannot be empty"));
        }
        if !pillar.progress.is_finite() || !(0.0..=100.0).contains(&pillar.progress) {
            return Err(invalid(format!(
                "pillar `{}` progress {} outside 0..=100",
                pillar.name, pillar.progress
            )));
        }
    }

    let total: f64 = pillars.iter().map(|pillar| pillar.weight).sum();
    if !total.is_finite() || (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(invalid(format!("pillar weights sum to {total}, expected 1.0")));
    }
    Ok(())
}

/// Maps a draft-level pillar reference to the assigned pillar id.
fn resolve_pillar_ref(
    draft: &ObjectiveDraft,
    assigned: &[Pillar],
    reference: Option<&str>,
) -> PlanServiceResult<Option<String>> {
    let Some(reference) = reference else {
        return Ok(None);
    };

    draft
        .pillars
        .iter()
        .position(|pillar| pillar.id.as_deref() == Some(reference))
        .or_else(|| draft.pillars.iter().position(|pillar| pillar.name == reference))
        .map(|index| Some(assigned[index].id.clone()))
        .ok_or_else(|| invalid(format!("unknown pillar reference `{reference}`")))
}

fn id_or_new(supplied: &Option<String>) -> String {
    match supplied.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => new_local_id(),
    }
}

fn invalid(message: impl Into<String>) -> PlanServiceError {
    PlanServiceError::InvalidDraft(message.into())
}

#[cfg(test)]
mod tests {
    use super::{
        new_local_id, MetricDraft, ObjectiveDraft, PillarDraft, PlanService, PlanServiceError,
        RitualDraft,
    };
    use crate::db::open_db_in_memory;
    use crate::model::objective::RitualFrequency;
    use crate::repo::objective_repo::SqliteObjectiveRepository;
    use crate::sync::identity::is_canonical_shape;

    fn fitness_draft() -> ObjectiveDraft {
        let mut draft = ObjectiveDraft::new("  Fitness  ");
        draft.category = "health".to_string();
        draft.pillars = vec![
            PillarDraft::new("Strength", 0.6),
            PillarDraft::new("Cardio", 0.4),
        ];
        let mut metric = MetricDraft::new("Bench press", "kg");
        metric.pillar_ref = Some("Strength".to_string());
        draft.metrics.push(metric);
        let mut ritual = RitualDraft::new("Morning run", RitualFrequency::Daily);
        ritual.pillar_ref = Some("Cardio".to_string());
        draft.rituals.push(ritual);
        draft
    }

    #[test]
    fn local_ids_are_tokens_not_canonical_ids() {
        let id = new_local_id();
        assert!(id.starts_with("local-"));
        assert_eq!(id.len(), "local-".len() + 32);
        assert!(!is_canonical_shape(&id));
    }

    #[test]
    fn create_objective_assigns_ids_and_links_children() {
        let conn = open_db_in_memory().unwrap();
        let service = PlanService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());

        let created = service.create_objective(&fitness_draft()).unwrap();
        assert_eq!(created.name, "Fitness");
        assert_eq!(
            created.metrics[0].pillar_id.as_deref(),
            Some(created.pillars[0].id.as_str())
        );
        assert_eq!(
            created.rituals[0].pillar_id.as_deref(),
            Some(created.pillars[1].id.as_str())
        );

        assert_eq!(service.get_objective(&created.id).unwrap(), created);
    }

    #[test]
    fn supplied_ids_are_kept_and_referenced() {
        let conn = open_db_in_memory().unwrap();
        let service = PlanService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());
        let mut draft = fitness_draft();
        draft.id = Some("1712345678901".to_string());
        draft.pillars[0].id = Some("p-strength".to_string());
        draft.metrics[0].pillar_ref = Some("p-strength".to_string());

        let created = service.create_objective(&draft).unwrap();
        assert_eq!(created.id, "1712345678901");
        assert_eq!(created.metrics[0].pillar_id.as_deref(), Some("p-strength"));
    }

    #[test]
    fn rejects_invalid_drafts_without_persisting() {
        let conn = open_db_in_memory().unwrap();
        let service = PlanService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());

        let mut blank = fitness_draft();
        blank.name = "   ".to_string();
        let mut weights = fitness_draft();
        weights.pillars[1].weight = 0.2;
        let mut progress = fitness_draft();
        progress.pillars[0].progress = 120.0;
        let mut dangling = fitness_draft();
        dangling.metrics[0].pillar_ref = Some("Sleep".to_string());

        for draft in [blank, weights, progress, dangling] {
            let err = service.create_objective(&draft).unwrap_err();
            assert!(matches!(err, PlanServiceError::InvalidDraft(_)), "{err}");
        }
        assert!(service.list_objectives().unwrap().is_empty());
    }

    #[test]
    fn weights_within_tolerance_and_pillarless_drafts_are_accepted() {
        let conn = open_db_in_memory().unwrap();
        let service = PlanService::new(SqliteObjectiveRepository::try_new(&conn).unwrap());

        let mut near = fitness_draft();
        near.pillars[1].weight = 0.395;
        service.create_objective(&near).unwrap();
        service.create_objective(&ObjectiveDraft::new("Reading")).unwrap();

        assert_eq!(service.list_objectives().unwrap().len(), 2);
        assert!(matches!(
            service.get_objective("missing").unwrap_err(),
            PlanServiceError::NotFound(_)
        ));
    }
}
