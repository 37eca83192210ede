//! Decision criteria and their activities
//!
//! Activity ids are kept across edits because working sessions schedule
//! them by reference. Removing an activity, or the whole criterion, is
//! refused while a session still schedules it.

use super::{read_failure, snapshot, EngagementSync, Lifecycle, StatusPatch};
use crate::activity_log::LogEvent;
use crate::compose;
use crate::error::{SyncError, SyncResult};
use crate::gateway::rows::{
    CriterionActivityRow, CriterionCategoryRow, CriterionRow, SessionActivityRow,
};
use crate::gateway::{Filter, GatewayExt, Order, Query, Table};
use crate::guard::DeleteCandidate;
use crate::saga::Saga;
use chrono::Utc;
use futures::try_join;
use pov_model::{
    status_verb, CriterionActivity, CriterionActivityId, CriterionActivityInput, CriterionId,
    CriterionPatch, CriterionStatus, CriterionUpdate, DecisionCriterion, EngagementId, LogKind,
    NewCriterion, StatusToken, ValidationError, WorkStatus,
};
use pov_store::{Action, CollectionAction};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

const ADD: Lifecycle = Lifecycle::new(
    "Adding decision criterion",
    "Decision criterion added",
    "Failed to add decision criterion",
);
const UPDATE: Lifecycle = Lifecycle::new(
    "Updating decision criterion",
    "Decision criterion updated",
    "Failed to update decision criterion",
);
const STATUS: Lifecycle = Lifecycle::new(
    "Updating decision criterion status",
    "Decision criterion status updated",
    "Failed to update decision criterion status",
);
const ACTIVITY_STATUS: Lifecycle = Lifecycle::new(
    "Updating activity",
    "Activity updated",
    "Failed to update activity",
);
const DELETE: Lifecycle = Lifecycle::new(
    "Deleting decision criterion",
    "Decision criterion deleted",
    "Failed to delete decision criterion",
);

impl EngagementSync {
    /// Add a decision criterion with its categories and ordered activities
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `Remote` (after rollback) or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?input.engagement_id, title = %input.title))]
    pub async fn add_criterion(&self, input: NewCriterion) -> SyncResult<DecisionCriterion> {
        self.tracked_with(ADD, |c: &DecisionCriterion| format!("\"{}\" added", c.title), async {
            let begun = self.begin(&input).await?;
            let engagement_id = begun.engagement_id;
            let now = Utc::now();
            let row = CriterionRow {
                id: Uuid::nil(),
                engagement_id: engagement_id.as_uuid(),
                title: input.title.trim().to_string(),
                success_criteria: input.success_criteria.clone(),
                use_case: input.use_case.clone(),
                status: input.status.unwrap_or_default(),
                created_at: now,
                updated_at: now,
            };

            let mut saga = Saga::new("add_criterion");
            let stored = saga
                .step("failed to add decision criterion", self.gateway.insert_row(&row))
                .await?;
            saga.undo_insert(&self.gateway, Table::DecisionCriteria, stored.id);

            let categories = CriterionCategoryRow::for_criterion(stored.id, &input.categories);
            let activities = activity_rows(
                stored.id,
                input
                    .activities
                    .iter()
                    .map(|text| CriterionActivityInput::new(text.as_str())),
            );
            saga.step("failed to add decision criterion details", async {
                try_join!(
                    self.gateway.insert_rows(&categories),
                    self.gateway.insert_rows(&activities),
                )
            })
            .await?;
            saga.complete();

            let id = CriterionId::from(stored.id);
            let criterion = self
                .confirm("decision criterion", id, compose::criterion(self.gateway.as_ref(), id))
                .await?;
            self.apply(
                engagement_id,
                Action::DecisionCriteria(CollectionAction::Add(criterion.clone())),
            );
            self.log(
                engagement_id,
                LogEvent::new(
                    LogKind::Criteria,
                    "Decision Criterion Added",
                    format!("\"{}\" decision criterion created", criterion.title),
                )
                .about(id),
            )
            .await?;
            Ok(criterion)
        })
        .await
    }

    /// Edit a decision criterion
    ///
    /// A supplied activity list replaces the stored one. Entries carrying
    /// an id keep it; ids that do not belong to the criterion are rejected,
    /// and dropping an activity that a session still schedules is refused
    /// before anything is written.
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `NotFound`, `IntegrityViolation`,
    /// `Remote` (after rollback) or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?patch.engagement_id, criterion = %patch.id))]
    pub async fn update_criterion(&self, patch: CriterionPatch) -> SyncResult<DecisionCriterion> {
        self.tracked_with(UPDATE, |c: &DecisionCriterion| format!("\"{}\" updated", c.title), self.write_criterion(patch))
            .await
    }

    /// Set a decision criterion's status
    ///
    /// # Errors
    /// As [`EngagementSync::update_criterion`]
    #[tracing::instrument(skip(self))]
    pub async fn update_criterion_status(
        &self,
        engagement_id: EngagementId,
        id: CriterionId,
        status: CriterionStatus,
    ) -> SyncResult<DecisionCriterion> {
        let mut patch = CriterionPatch::new(engagement_id, id);
        patch.status = Some(status);
        self.tracked_with(STATUS, |c: &DecisionCriterion| format!("\"{}\" updated", c.title), self.write_criterion(patch))
            .await
    }

    /// Set one criterion activity's status and mirror it onto every session
    /// activity that schedules it
    ///
    /// # Errors
    /// `Unauthorized`, `NotFound`, `Remote` (after rollback) or `Diverged`
    #[tracing::instrument(skip(self))]
    pub async fn update_criterion_activity_status(
        &self,
        engagement_id: EngagementId,
        activity_id: CriterionActivityId,
        status: WorkStatus,
    ) -> SyncResult<CriterionActivity> {
        self.tracked(ACTIVITY_STATUS, async {
            let begun = self.begin_at(engagement_id).await?;
            let row = self
                .gateway
                .fetch_row::<CriterionActivityRow>(activity_id.as_uuid())
                .await
                .map_err(|e| read_failure("criterion activity", activity_id, e))?;
            self.owned_row::<CriterionRow>(begun.engagement_id, "criterion activity", row.criterion_id)
                .await
                .map_err(|e| match e {
                    SyncError::NotFound { .. } => SyncError::not_found("criterion activity", activity_id),
                    other => other,
                })?;

            let mut saga = Saga::new("update_criterion_activity_status");
            self.write_activity_status(&mut saga, &row, status).await?;
            self.mirror_to_sessions(&mut saga, activity_id, status, row.status)
                .await?;
            saga.complete();

            let activity = self
                .confirm(
                    "criterion activity",
                    activity_id,
                    compose::record::<CriterionActivityRow, CriterionActivity>(
                        self.gateway.as_ref(),
                        activity_id,
                    ),
                )
                .await?;
            self.apply(
                begun.engagement_id,
                Action::SetCriterionActivityStatus {
                    activity_id,
                    status,
                },
            );
            self.log(
                begun.engagement_id,
                LogEvent::new(
                    LogKind::Criteria,
                    "Activity Updated",
                    format!("\"{}\" {}", activity.text, status_verb(status.token())),
                )
                .about(activity_id),
            )
            .await?;
            Ok(activity)
        })
        .await
    }

    /// Delete a decision criterion unless a session schedules one of its
    /// activities
    ///
    /// # Errors
    /// `Unauthorized`, `NotFound`, `IntegrityViolation` or `Remote`
    #[tracing::instrument(skip(self))]
    pub async fn delete_criterion(
        &self,
        engagement_id: EngagementId,
        id: CriterionId,
    ) -> SyncResult<()> {
        self.tracked(DELETE, async {
            let begun = self.begin_at(engagement_id).await?;
            let engagement = self.view(begun.engagement_id).await?;
            self.guard
                .check(&engagement, &DeleteCandidate::Criterion(id))?;

            self.delete_flat::<CriterionRow, DecisionCriterion>(
                begun.engagement_id,
                "decision criterion",
                id.as_uuid(),
                Action::DecisionCriteria,
                |row| {
                    LogEvent::new(
                        LogKind::Criteria,
                        "Decision Criterion Deleted",
                        format!("\"{}\" decision criterion deleted", row.title),
                    )
                    .about(id)
                },
            )
            .await
        })
        .await
    }

    async fn write_criterion(&self, patch: CriterionPatch) -> SyncResult<DecisionCriterion> {
        let begun = self.begin(&patch).await?;
        let engagement_id = begun.engagement_id;
        let id = patch.id.as_uuid();
        let previous = self
            .owned_row::<CriterionRow>(engagement_id, "decision criterion", id)
            .await?;

        let existing = match &patch.activities {
            Some(incoming) => Some(self.check_activity_edit(engagement_id, patch.id, incoming).await?),
            None => None,
        };

        let mut next = previous.clone();
        if let Some(title) = &patch.title {
            next.title = title.trim().to_string();
        }
        if let Some(success) = &patch.success_criteria {
            next.success_criteria.clone_from(success);
        }
        if let Some(use_case) = &patch.use_case {
            next.use_case.clone_from(use_case);
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        next.updated_at = Utc::now();

        let mut saga = Saga::new("update_criterion");
        saga.step(
            "failed to update decision criterion",
            self.gateway
                .update_rows::<CriterionRow, _>(vec![Filter::eq("id", id)], &next),
        )
        .await?;
        saga.restore_row(&self.gateway, Table::DecisionCriteria, snapshot(&previous)?);

        if let Some(categories) = &patch.categories {
            self.replace_children(
                &mut saga,
                "failed to replace categories",
                Filter::eq("criterion_id", id),
                &CriterionCategoryRow::for_criterion(id, categories),
            )
            .await?;
        }

        let mut mirrored = Vec::new();
        if let (Some(incoming), Some(existing)) = (&patch.activities, &existing) {
            self.replace_children(
                &mut saga,
                "failed to replace activities",
                Filter::eq("criterion_id", id),
                &activity_rows(id, incoming.iter().cloned()),
            )
            .await?;

            for activity in incoming {
                let Some(activity_id) = activity.id else {
                    continue;
                };
                let changed = existing
                    .iter()
                    .find(|row| row.id == activity_id.as_uuid())
                    .map(|row| row.status)
                    .filter(|before| *before != activity.status);
                if let Some(before) = changed {
                    self.mirror_to_sessions(&mut saga, activity_id, activity.status, before)
                        .await?;
                    mirrored.push((activity_id, activity.status));
                }
            }
        }
        saga.complete();

        let criterion = self
            .confirm(
                "decision criterion",
                patch.id,
                compose::criterion(self.gateway.as_ref(), patch.id),
            )
            .await?;
        let mut update = CriterionUpdate::from(criterion.clone());
        if patch.categories.is_none() {
            update.categories = None;
        }
        if patch.activities.is_none() {
            update.activities = None;
        }
        self.apply(engagement_id, Action::DecisionCriteria(CollectionAction::Update(update)));
        for (activity_id, status) in mirrored {
            self.apply(
                engagement_id,
                Action::SetCriterionActivityStatus {
                    activity_id,
                    status,
                },
            );
        }

        let verb = patch
            .status
            .map_or("updated", |status| status_verb(status.token()));
        self.log(
            engagement_id,
            LogEvent::new(
                LogKind::Criteria,
                "Decision Criterion Updated",
                format!("\"{}\" {verb}", criterion.title),
            )
            .about(criterion.id),
        )
        .await?;
        Ok(criterion)
    }

    /// Validate an activity list edit against the stored activities
    ///
    /// Returns the stored rows.
    async fn check_activity_edit(
        &self,
        engagement_id: EngagementId,
        criterion_id: CriterionId,
        incoming: &[CriterionActivityInput],
    ) -> SyncResult<Vec<CriterionActivityRow>> {
        let existing = self
            .gateway
            .select_rows::<CriterionActivityRow>(
                Query::by("criterion_id", criterion_id).order_by("order_index", Order::Asc),
            )
            .await
            .map_err(|e| SyncError::remote("failed to read activities", e))?;
        let known: HashSet<Uuid> = existing.iter().map(|row| row.id).collect();

        if let Some(unknown) = incoming
            .iter()
            .filter_map(|a| a.id)
            .find(|id| !known.contains(&id.as_uuid()))
        {
            return Err(ValidationError::new(
                "activities",
                format!("activity {unknown} does not belong to this criterion"),
            )
            .into());
        }

        let kept: HashSet<Uuid> = incoming
            .iter()
            .filter_map(|a| a.id.map(Into::into))
            .collect();
        let removed: Vec<CriterionActivityId> = existing
            .iter()
            .filter(|row| !kept.contains(&row.id))
            .map(|row| row.id.into())
            .collect();
        if !removed.is_empty() {
            let engagement = self.view(engagement_id).await?;
            self.guard.check(
                &engagement,
                &DeleteCandidate::CriterionActivities {
                    criterion_id,
                    activity_ids: removed,
                },
            )?;
        }
        Ok(existing)
    }

    /// Write a criterion activity's status, restoring the row on rollback
    pub(super) async fn write_activity_status(
        &self,
        saga: &mut Saga,
        row: &CriterionActivityRow,
        status: WorkStatus,
    ) -> SyncResult<()> {
        saga.step(
            "failed to update activity status",
            self.gateway.update_rows::<CriterionActivityRow, _>(
                vec![Filter::eq("id", row.id)],
                &StatusPatch { status },
            ),
        )
        .await?;
        saga.restore_row(&self.gateway, Table::CriterionActivities, snapshot(row)?);
        Ok(())
    }

    /// Copy a criterion activity's status onto the session activities that
    /// schedule it
    async fn mirror_to_sessions(
        &self,
        saga: &mut Saga,
        activity_id: CriterionActivityId,
        status: WorkStatus,
        previous: WorkStatus,
    ) -> SyncResult<()> {
        let linked = Filter::eq("criterion_activity_id", activity_id);
        let updated = saga
            .step(
                "failed to update scheduled activities",
                self.gateway.update_rows::<SessionActivityRow, _>(
                    vec![linked.clone()],
                    &StatusPatch { status },
                ),
            )
            .await?;
        if updated.is_empty() {
            return Ok(());
        }

        tracing::debug!(%activity_id, sessions = updated.len(), "status mirrored to sessions");
        let gateway = Arc::clone(&self.gateway);
        saga.on_rollback(
            format!("restore scheduled status of {activity_id}"),
            move || async move {
                let patch = StatusPatch { status: previous };
                gateway
                    .update_rows::<SessionActivityRow, _>(vec![linked], &patch)
                    .await
                    .map(|_| ())
            },
        );
        Ok(())
    }
}

/// Activity rows in submission order; entries with an id keep it
fn activity_rows(
    criterion_id: Uuid,
    activities: impl IntoIterator<Item = CriterionActivityInput>,
) -> Vec<CriterionActivityRow> {
    activities
        .into_iter()
        .zip(0u32..)
        .map(|(activity, order_index)| CriterionActivityRow {
            id: activity.id.map_or_else(Uuid::nil, Into::into),
            criterion_id,
            text: activity.text.trim().to_string(),
            order_index,
            status: activity.status,
        })
        .collect()
}
