//! Working sessions and activity reconciliation
//!
//! A session's activity list is always rewritten whole. Before that, the
//! submitted list is diffed against the stored one to find what changed:
//! - linked activities match on the criterion activity they schedule
//! - custom activities match the first unused stored entry with equal text
//! - the first activity whose status moved is the change that gets logged
//!
//! Linked statuses that moved are written through to the criterion
//! activity, so both sides stay in step.

use super::{snapshot, EngagementSync, Lifecycle};
use crate::activity_log::LogEvent;
use crate::compose;
use crate::error::SyncResult;
use crate::gateway::rows::{CriterionActivityRow, SessionActivityRow, SessionRow};
use crate::gateway::{Filter, GatewayExt, Table};
use crate::saga::Saga;
use chrono::Utc;
use pov_model::{
    status_verb, CriterionActivityId, Engagement, EngagementId, LogKind, NewSession,
    SessionActivityInput, SessionActivityKind, SessionId, SessionPatch, SessionStatus,
    StatusToken, ValidationError, WorkStatus, WorkingSession,
};
use pov_store::{Action, CollectionAction};
use uuid::Uuid;

const ADD: Lifecycle = Lifecycle::new(
    "Scheduling working session",
    "Working session scheduled",
    "Failed to schedule working session",
);
const UPDATE: Lifecycle = Lifecycle::new(
    "Updating working session",
    "Working session updated",
    "Failed to update working session",
);
const ACTIVITIES: Lifecycle = Lifecycle::new(
    "Updating session activities",
    "Session activities updated",
    "Failed to update session activities",
);
const STATUS: Lifecycle = Lifecycle::new(
    "Updating working session status",
    "Working session status updated",
    "Failed to update working session status",
);
const DELETE: Lifecycle = Lifecycle::new(
    "Deleting working session",
    "Working session deleted",
    "Failed to delete working session",
);

impl EngagementSync {
    /// Schedule a working session
    ///
    /// Linked activities start with their criterion activity's status.
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `IntegrityViolation` when an activity
    /// is already scheduled elsewhere, `Remote` (after rollback) or
    /// `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?input.engagement_id, title = %input.title))]
    pub async fn add_session(&self, input: NewSession) -> SyncResult<WorkingSession> {
        self.tracked_with(ADD, |s: &WorkingSession| format!("\"{}\" scheduled", s.title), async {
            let begun = self.begin(&input).await?;
            let engagement_id = begun.engagement_id;
            let engagement = self.view(engagement_id).await?;
            let linked = linked_ids(&input.activities);
            for id in &linked {
                linked_status(&engagement, *id)?;
            }
            self.guard.check_schedulable(&engagement, None, linked)?;

            let now = Utc::now();
            let row = SessionRow {
                id: Uuid::nil(),
                engagement_id: engagement_id.as_uuid(),
                title: input.title.trim().to_string(),
                status: SessionStatus::default(),
                scheduled_at: input.scheduled_at,
                duration_minutes: input.duration_minutes,
                notes: input.notes.clone(),
                created_at: now,
                updated_at: now,
            };
            let mut saga = Saga::new("add_session");
            let stored = saga
                .step("failed to add working session", self.gateway.insert_row(&row))
                .await?;
            saga.undo_insert(&self.gateway, Table::WorkingSessions, stored.id);

            let activities = input
                .activities
                .iter()
                .zip(0u32..)
                .map(|(activity, order)| -> Result<SessionActivityRow, ValidationError> {
                    let status = match activity.kind.criterion_activity_id() {
                        Some(id) => linked_status(&engagement, id)?,
                        None => activity.status,
                    };
                    Ok(SessionActivityRow::new(stored.id, order, &activity.kind, status))
                })
                .collect::<Result<Vec<_>, ValidationError>>()?;
            saga.step(
                "failed to add session activities",
                self.gateway.insert_rows(&activities),
            )
            .await?;
            saga.complete();

            let id = SessionId::from(stored.id);
            let session = self
                .confirm("working session", id, compose::session(self.gateway.as_ref(), id))
                .await?;
            self.apply(
                engagement_id,
                Action::WorkingSessions(CollectionAction::Add(session.clone())),
            );
            self.log(
                engagement_id,
                LogEvent::new(
                    LogKind::Session,
                    "Session Scheduled",
                    format!("\"{}\" working session created", session.title),
                )
                .about(id),
            )
            .await?;
            Ok(session)
        })
        .await
    }

    /// Edit a session; a supplied activity list is reconciled
    ///
    /// At most one entry is logged: the first activity status change, or
    /// a plain update when only scalar fields were supplied.
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `NotFound`, `IntegrityViolation`,
    /// `Remote` (after rollback) or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?patch.engagement_id, session = %patch.id))]
    pub async fn update_session(&self, patch: SessionPatch) -> SyncResult<WorkingSession> {
        self.tracked_with(UPDATE, |s: &WorkingSession| format!("\"{}\" updated", s.title), self.write_session(patch))
            .await
    }

    /// Replace a session's activity list
    ///
    /// # Errors
    /// As [`EngagementSync::update_session`]
    #[tracing::instrument(skip(self, activities), fields(count = activities.len()))]
    pub async fn update_session_activities(
        &self,
        engagement_id: EngagementId,
        id: SessionId,
        activities: Vec<SessionActivityInput>,
    ) -> SyncResult<WorkingSession> {
        let mut patch = SessionPatch::new(engagement_id, id);
        patch.activities = Some(activities);
        self.tracked(ACTIVITIES, self.write_session(patch)).await
    }

    /// # Errors
    /// As [`EngagementSync::update_session`]
    #[tracing::instrument(skip(self))]
    pub async fn update_session_status(
        &self,
        engagement_id: EngagementId,
        id: SessionId,
        status: SessionStatus,
    ) -> SyncResult<WorkingSession> {
        let mut patch = SessionPatch::new(engagement_id, id);
        patch.status = Some(status);
        self.tracked(STATUS, self.write_session(patch)).await
    }

    /// Delete a session; its activities cascade and the criterion
    /// activities they scheduled become free again
    ///
    /// # Errors
    /// `Unauthorized`, `NotFound` or `Remote`
    #[tracing::instrument(skip(self))]
    pub async fn delete_session(&self, engagement_id: EngagementId, id: SessionId) -> SyncResult<()> {
        self.tracked(DELETE, async {
            let begun = self.begin_at(engagement_id).await?;
            self.delete_flat::<SessionRow, WorkingSession>(
                begun.engagement_id,
                "working session",
                id.as_uuid(),
                Action::WorkingSessions,
                |row| {
                    LogEvent::new(
                        LogKind::Session,
                        "Session Deleted",
                        format!("\"{}\" working session deleted", row.title),
                    )
                    .about(id)
                },
            )
            .await
        })
        .await
    }

    async fn write_session(&self, patch: SessionPatch) -> SyncResult<WorkingSession> {
        let begun = self.begin(&patch).await?;
        let engagement_id = begun.engagement_id;
        let id = patch.id.as_uuid();
        let previous = self
            .owned_row::<SessionRow>(engagement_id, "working session", id)
            .await?;

        let plan = match &patch.activities {
            Some(incoming) => {
                let engagement = self.view(engagement_id).await?;
                self.guard
                    .check_schedulable(&engagement, Some(patch.id), linked_ids(incoming))?;
                let stored = engagement
                    .working_sessions
                    .iter()
                    .find(|s| s.id == patch.id);
                Some(plan_activities(&engagement, stored, id, incoming)?)
            }
            None => None,
        };

        let mut next = previous.clone();
        if let Some(title) = &patch.title {
            next.title = title.trim().to_string();
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(scheduled_at) = patch.scheduled_at {
            next.scheduled_at = scheduled_at;
        }
        if let Some(duration) = patch.duration_minutes {
            next.duration_minutes = duration;
        }
        if let Some(notes) = &patch.notes {
            next.notes.clone_from(notes);
        }
        next.updated_at = Utc::now();

        let mut saga = Saga::new("update_session");
        saga.step(
            "failed to update working session",
            self.gateway
                .update_rows::<SessionRow, _>(vec![Filter::eq("id", id)], &next),
        )
        .await?;
        saga.restore_row(&self.gateway, Table::WorkingSessions, snapshot(&previous)?);

        if let Some(plan) = &plan {
            for (activity_id, status) in &plan.propagate {
                let row = saga
                    .step(
                        "failed to read criterion activity",
                        self.gateway
                            .fetch_row::<CriterionActivityRow>(activity_id.as_uuid()),
                    )
                    .await?;
                self.write_activity_status(&mut saga, &row, *status).await?;
            }
            self.replace_children(
                &mut saga,
                "failed to replace session activities",
                Filter::eq("session_id", id),
                &plan.rows,
            )
            .await?;
        }
        saga.complete();

        let session = self
            .confirm(
                "working session",
                patch.id,
                compose::session(self.gateway.as_ref(), patch.id),
            )
            .await?;
        self.apply(
            engagement_id,
            Action::WorkingSessions(CollectionAction::Update(session.clone())),
        );
        if let Some(plan) = &plan {
            for (activity_id, status) in &plan.propagate {
                self.apply(
                    engagement_id,
                    Action::SetCriterionActivityStatus {
                        activity_id: *activity_id,
                        status: *status,
                    },
                );
            }
        }

        let event = match plan.and_then(|p| p.change) {
            Some(change) => Some(LogEvent::new(
                LogKind::Session,
                "Session Activity Updated",
                format!(
                    "\"{}\" {} in \"{}\"",
                    change.text,
                    status_verb(change.status.token()),
                    session.title
                ),
            )),
            None if touches_scalars(&patch) => {
                let verb = patch
                    .status
                    .map_or("updated", |status| status_verb(status.token()));
                Some(LogEvent::new(
                    LogKind::Session,
                    "Session Updated",
                    format!("\"{}\" {verb}", session.title),
                ))
            }
            None => None,
        };
        match event {
            Some(event) => self.log(engagement_id, event.about(session.id)).await?,
            None => tracing::debug!(session = %session.id, "no visible change, nothing logged"),
        }
        Ok(session)
    }
}

/// Rows to write for a reconciled activity list
#[derive(Debug, Default)]
struct ActivityPlan {
    rows: Vec<SessionActivityRow>,
    change: Option<ActivityChange>,
    /// Linked statuses to write through to criterion activities
    propagate: Vec<(CriterionActivityId, WorkStatus)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActivityChange {
    text: String,
    status: WorkStatus,
}

/// Diff `incoming` against the stored session activities
fn plan_activities(
    engagement: &Engagement,
    stored: Option<&WorkingSession>,
    session_id: Uuid,
    incoming: &[SessionActivityInput],
) -> Result<ActivityPlan, ValidationError> {
    let stored_activities = stored.map_or(&[][..], |s| s.activities.as_slice());
    let mut used = vec![false; stored_activities.len()];
    let mut plan = ActivityPlan::default();

    for (activity, order) in incoming.iter().zip(0u32..) {
        let (text, baseline) = match &activity.kind {
            SessionActivityKind::Linked {
                criterion_activity_id,
            } => {
                let (_, target) = engagement
                    .criterion_activity(*criterion_activity_id)
                    .ok_or_else(|| unknown_activity(*criterion_activity_id))?;
                let scheduled = stored_activities
                    .iter()
                    .find(|s| s.kind.criterion_activity_id() == Some(*criterion_activity_id))
                    .map(|s| s.status);
                if activity.status != target.status {
                    plan.propagate.push((*criterion_activity_id, activity.status));
                }
                (target.text.clone(), Some(scheduled.unwrap_or(target.status)))
            }
            SessionActivityKind::Custom { text } => {
                let text = text.trim();
                let matched = stored_activities.iter().zip(used.iter_mut()).find(|(s, used)| {
                    !**used
                        && matches!(&s.kind, SessionActivityKind::Custom { text: t } if t.trim() == text)
                });
                let baseline = matched.map(|(s, used)| {
                    *used = true;
                    s.status
                });
                (text.to_string(), baseline)
            }
        };

        if plan.change.is_none() && baseline.is_some_and(|b| b != activity.status) {
            plan.change = Some(ActivityChange {
                text,
                status: activity.status,
            });
        }
        plan.rows.push(SessionActivityRow::new(
            session_id,
            order,
            &activity.kind,
            activity.status,
        ));
    }
    Ok(plan)
}

fn linked_ids(activities: &[SessionActivityInput]) -> Vec<CriterionActivityId> {
    activities
        .iter()
        .filter_map(|a| a.kind.criterion_activity_id())
        .collect()
}

fn linked_status(engagement: &Engagement, id: CriterionActivityId) -> Result<WorkStatus, ValidationError> {
    engagement
        .criterion_activity(id)
        .map(|(_, activity)| activity.status)
        .ok_or_else(|| unknown_activity(id))
}

fn unknown_activity(id: CriterionActivityId) -> ValidationError {
    ValidationError::new(
        "activities",
        format!("activity {id} is not part of this engagement"),
    )
}

fn touches_scalars(patch: &SessionPatch) -> bool {
    patch.title.is_some()
        || patch.status.is_some()
        || patch.scheduled_at.is_some()
        || patch.duration_minutes.is_some()
        || patch.notes.is_some()
}
