//! Referential integrity guard
//!
//! The backing store does not protect references from session activities
//! to criterion activities, so deletions and edits that would orphan a
//! scheduled activity are refused here, before any remote write.

use crate::error::SyncError;
use pov_model::{CriterionActivityId, CriterionId, Engagement, SessionId};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Something an operation is about to remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteCandidate {
    /// A whole criterion, with every activity it owns
    Criterion(CriterionId),
    /// Activities dropped from a criterion during an edit
    CriterionActivities {
        criterion_id: CriterionId,
        activity_ids: Vec<CriterionActivityId>,
    },
}

/// An entity that still references a delete candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependent {
    pub entity: &'static str,
    pub id: Uuid,
    /// Human-readable name of the dependent's container
    pub label: String,
}

/// One kind of reference the guard protects
pub trait IntegrityRule: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Dependents of `candidate` within `engagement`
    fn dependents(&self, engagement: &Engagement, candidate: &DeleteCandidate) -> Vec<Dependent>;

    /// User-facing refusal
    fn explain(
        &self,
        engagement: &Engagement,
        candidate: &DeleteCandidate,
        dependents: &[Dependent],
    ) -> String;
}

/// Session activities that schedule criterion activities
#[derive(Debug, Default, Clone, Copy)]
pub struct ScheduledCriterionActivities;

impl ScheduledCriterionActivities {
    fn targets(engagement: &Engagement, candidate: &DeleteCandidate) -> BTreeSet<CriterionActivityId> {
        match candidate {
            DeleteCandidate::Criterion(id) => engagement
                .decision_criteria
                .iter()
                .filter(|c| c.id == *id)
                .flat_map(|c| c.activity_ids())
                .collect(),
            DeleteCandidate::CriterionActivities { activity_ids, .. } => {
                activity_ids.iter().copied().collect()
            }
        }
    }
}

impl IntegrityRule for ScheduledCriterionActivities {
    fn name(&self) -> &'static str {
        "scheduled_criterion_activities"
    }

    fn dependents(&self, engagement: &Engagement, candidate: &DeleteCandidate) -> Vec<Dependent> {
        let targets = Self::targets(engagement, candidate);
        if targets.is_empty() {
            return Vec::new();
        }
        let targets = &targets;
        engagement
            .working_sessions
            .iter()
            .flat_map(move |session| {
                session
                    .activities
                    .iter()
                    .filter(move |a| {
                        a.kind
                            .criterion_activity_id()
                            .is_some_and(|id| targets.contains(&id))
                    })
                    .map(move |a| Dependent {
                        entity: "session_activity",
                        id: a.id.as_uuid(),
                        label: session.title.clone(),
                    })
            })
            .collect()
    }

    fn explain(
        &self,
        engagement: &Engagement,
        candidate: &DeleteCandidate,
        dependents: &[Dependent],
    ) -> String {
        let sessions: BTreeSet<&str> = dependents.iter().map(|d| d.label.as_str()).collect();
        let sessions = sessions
            .into_iter()
            .map(|s| format!("\"{s}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let count = dependents.len();
        let noun = if count == 1 { "activity is" } else { "activities are" };

        match candidate {
            DeleteCandidate::Criterion(id) => {
                let title = engagement
                    .decision_criteria
                    .iter()
                    .find(|c| c.id == *id)
                    .map_or("this criterion", |c| c.title.as_str());
                format!(
                    "Cannot delete \"{title}\": {count} of its {noun} scheduled in working sessions ({sessions}). Remove them from those sessions first."
                )
            }
            DeleteCandidate::CriterionActivities { .. } => format!(
                "Cannot remove {count} {noun} still scheduled in working sessions ({sessions}). Remove them from those sessions first."
            ),
        }
    }
}

/// Runs every registered rule against a delete candidate
#[derive(Debug)]
pub struct IntegrityGuard {
    rules: Vec<Box<dyn IntegrityRule>>,
}

impl IntegrityGuard {
    /// Guard with no rules
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    #[must_use]
    pub fn with_rule(mut self, rule: impl IntegrityRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Refuse the candidate if any rule finds dependents
    ///
    /// # Errors
    /// [`SyncError::IntegrityViolation`] from the first rule that objects
    pub fn check(&self, engagement: &Engagement, candidate: &DeleteCandidate) -> Result<(), SyncError> {
        for rule in &self.rules {
            let dependents = rule.dependents(engagement, candidate);
            if dependents.is_empty() {
                continue;
            }
            let message = rule.explain(engagement, candidate, &dependents);
            tracing::info!(rule = rule.name(), dependents = dependents.len(), "delete refused");
            return Err(SyncError::IntegrityViolation {
                message,
                dependents,
            });
        }
        Ok(())
    }

    /// Refuse to schedule a criterion activity already scheduled in another
    /// session
    ///
    /// `session` is the session being edited, or `None` for a new one.
    ///
    /// # Errors
    /// [`SyncError::IntegrityViolation`] naming the sessions that already
    /// schedule one of `incoming`
    pub fn check_schedulable(
        &self,
        engagement: &Engagement,
        session: Option<SessionId>,
        incoming: impl IntoIterator<Item = CriterionActivityId>,
    ) -> Result<(), SyncError> {
        let mut dependents = Vec::new();
        for id in incoming {
            for other in engagement
                .sessions_linking(id)
                .filter(|s| Some(s.id) != session)
            {
                dependents.push(Dependent {
                    entity: "working_session",
                    id: other.id.as_uuid(),
                    label: other.title.clone(),
                });
            }
        }
        if dependents.is_empty() {
            return Ok(());
        }
        let sessions = dependents
            .iter()
            .map(|d| format!("\"{}\"", d.label))
            .collect::<Vec<_>>()
            .join(", ");
        Err(SyncError::IntegrityViolation {
            message: format!(
                "An activity can only be scheduled in one working session; already scheduled in {sessions}."
            ),
            dependents,
        })
    }
}

impl Default for IntegrityGuard {
    /// Guard with the scheduled-activity rule registered
    fn default() -> Self {
        Self::empty().with_rule(ScheduledCriterionActivities)
    }
}
