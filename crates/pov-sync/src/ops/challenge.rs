//! Challenges and the template library

use super::{non_blank, read_failure, snapshot, EngagementSync, Lifecycle};
use crate::activity_log::LogEvent;
use crate::compose;
use crate::error::{SyncError, SyncResult};
use crate::gateway::rows::{ChallengeCategoryRow, ChallengeRow, OutcomeRow, PersonRow, TemplateRow};
use crate::gateway::{Filter, GatewayExt, Query, Table};
use crate::saga::Saga;
use chrono::Utc;
use futures::try_join;
use pov_model::validation::normalize_email;
use pov_model::{
    status_verb, Actor, Challenge, ChallengeFromTemplate, ChallengeId, ChallengePatch,
    ChallengeTemplate, ChallengeUpdate, EngagementId, LogKind, NewChallenge, StatusToken,
    WorkStatus,
};
use pov_store::{Action, CollectionAction};
use uuid::Uuid;

const ADD: Lifecycle = Lifecycle::new(
    "Adding challenge",
    "Challenge added",
    "Failed to add challenge",
);
const FROM_TEMPLATE: Lifecycle = Lifecycle::new(
    "Adding challenge from library",
    "Challenge added from library",
    "Failed to add challenge from library",
);
const TEMPLATES: Lifecycle = Lifecycle::new(
    "Loading challenge library",
    "Challenge library loaded",
    "Failed to load challenge library",
);
const UPDATE: Lifecycle = Lifecycle::new(
    "Updating challenge",
    "Challenge updated",
    "Failed to update challenge",
);
const STATUS: Lifecycle = Lifecycle::new(
    "Updating challenge status",
    "Challenge status updated",
    "Failed to update challenge status",
);
const DELETE: Lifecycle = Lifecycle::new(
    "Deleting challenge",
    "Challenge deleted",
    "Failed to delete challenge",
);

impl EngagementSync {
    /// Add a challenge with its outcomes and categories
    ///
    /// With `to_library` set, a library template is written first and the
    /// engagement copy points at it.
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `Remote` (after rollback) or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?input.engagement_id, title = %input.title))]
    pub async fn add_challenge(&self, input: NewChallenge) -> SyncResult<Challenge> {
        self.tracked_with(ADD, |c: &Challenge| format!("\"{}\" challenge added", c.title), async {
            let begun = self.begin(&input).await?;
            let mut saga = Saga::new("add_challenge");

            let template_id = if input.to_library {
                let created_by = self.directory_entry(&begun.actor).await?;
                let template = TemplateRow {
                    id: Uuid::nil(),
                    title: input.title.trim().to_string(),
                    description: input.description.clone(),
                    business_impact: input.business_impact.clone(),
                    example: input.example.clone(),
                    categories: input.categories.iter().map(|c| c.trim().to_string()).collect(),
                    outcomes: input.outcomes.iter().map(|o| o.trim().to_string()).collect(),
                    created_by,
                    created_at: Utc::now(),
                };
                let stored = saga
                    .step("failed to save challenge to library", self.gateway.insert_row(&template))
                    .await?;
                saga.undo_insert(&self.gateway, Table::ChallengeTemplates, stored.id);
                tracing::debug!(template = %stored.id, "template saved");
                Some(stored.id)
            } else {
                None
            };

            let challenge = self
                .insert_challenge(saga, begun.engagement_id, &input, template_id)
                .await?;
            self.log(
                begun.engagement_id,
                LogEvent::new(
                    LogKind::Challenge,
                    "Challenge Added",
                    format!("\"{}\" challenge created", challenge.title),
                )
                .about(challenge.id),
            )
            .await?;
            Ok(challenge)
        })
        .await
    }

    /// Copy a library template into the engagement
    ///
    /// # Errors
    /// `NotFound` when the template does not exist, otherwise as
    /// [`EngagementSync::add_challenge`]
    #[tracing::instrument(skip_all, fields(engagement = ?input.engagement_id, template = %input.template_id))]
    pub async fn add_challenge_from_template(
        &self,
        input: ChallengeFromTemplate,
    ) -> SyncResult<Challenge> {
        self.tracked_with(FROM_TEMPLATE, |c: &Challenge| format!("\"{}\" added from library", c.title), async {
            let begun = self.begin(&input).await?;
            let template = self
                .gateway
                .fetch_row::<TemplateRow>(input.template_id.as_uuid())
                .await
                .map_err(|e| read_failure("template", input.template_id, e))?;

            let copy = NewChallenge {
                engagement_id: Some(begun.engagement_id),
                title: template.title,
                description: template.description,
                business_impact: template.business_impact,
                example: template.example,
                status: None,
                outcomes: template.outcomes,
                categories: template.categories,
                to_library: false,
            };
            let saga = Saga::new("add_challenge_from_template");
            let challenge = self
                .insert_challenge(saga, begun.engagement_id, &copy, Some(template.id))
                .await?;
            self.log(
                begun.engagement_id,
                LogEvent::new(
                    LogKind::Challenge,
                    "Challenge Added",
                    format!("\"{}\" challenge added from library", challenge.title),
                )
                .about(challenge.id),
            )
            .await?;
            Ok(challenge)
        })
        .await
    }

    /// Library templates ordered by title
    ///
    /// # Errors
    /// `Remote` when the library cannot be read
    #[tracing::instrument(skip(self))]
    pub async fn list_templates(&self) -> SyncResult<Vec<ChallengeTemplate>> {
        self.tracked(TEMPLATES, async {
            compose::templates(self.gateway.as_ref())
                .await
                .map_err(|e| SyncError::remote("failed to load templates", e))
        })
        .await
    }

    /// Edit a challenge; supplied outcome and category lists replace the
    /// stored ones
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `NotFound`, `Remote` (after rollback)
    /// or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?patch.engagement_id, challenge = %patch.id))]
    pub async fn update_challenge(&self, patch: ChallengePatch) -> SyncResult<Challenge> {
        self.tracked_with(UPDATE, |c: &Challenge| format!("\"{}\" updated", c.title), self.write_challenge(patch))
            .await
    }

    /// Set a challenge's status
    ///
    /// # Errors
    /// As [`EngagementSync::update_challenge`]
    #[tracing::instrument(skip(self))]
    pub async fn update_challenge_status(
        &self,
        engagement_id: EngagementId,
        id: ChallengeId,
        status: WorkStatus,
    ) -> SyncResult<Challenge> {
        let mut patch = ChallengePatch::new(engagement_id, id);
        patch.status = Some(status);
        self.tracked_with(STATUS, |c: &Challenge| format!("\"{}\" updated", c.title), self.write_challenge(patch))
            .await
    }

    /// Delete a challenge; outcomes and categories cascade
    ///
    /// # Errors
    /// `Unauthorized`, `NotFound` or `Remote`
    #[tracing::instrument(skip(self))]
    pub async fn delete_challenge(
        &self,
        engagement_id: EngagementId,
        id: ChallengeId,
    ) -> SyncResult<()> {
        self.tracked(DELETE, async {
            let begun = self.begin_at(engagement_id).await?;
            self.delete_flat::<ChallengeRow, Challenge>(
                begun.engagement_id,
                "challenge",
                id.as_uuid(),
                Action::Challenges,
                |row| {
                    LogEvent::new(
                        LogKind::Challenge,
                        "Challenge Deleted",
                        format!("\"{}\" challenge deleted", row.title),
                    )
                    .about(id)
                },
            )
            .await
        })
        .await
    }

    /// Insert the challenge row and its children, confirm and add to the store
    async fn insert_challenge(
        &self,
        mut saga: Saga,
        engagement_id: EngagementId,
        input: &NewChallenge,
        template_id: Option<Uuid>,
    ) -> SyncResult<Challenge> {
        let now = Utc::now();
        let row = ChallengeRow {
            id: Uuid::nil(),
            engagement_id: engagement_id.as_uuid(),
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            business_impact: input.business_impact.clone(),
            example: input.example.clone(),
            status: input.status.unwrap_or_default(),
            template_id,
            created_at: now,
            updated_at: now,
        };
        let stored = saga
            .step("failed to add challenge", self.gateway.insert_row(&row))
            .await?;
        saga.undo_insert(&self.gateway, Table::Challenges, stored.id);

        let outcomes = OutcomeRow::for_challenge(stored.id, &input.outcomes);
        let categories = ChallengeCategoryRow::for_challenge(stored.id, &input.categories);
        saga.step("failed to add challenge details", async {
            try_join!(
                self.gateway.insert_rows(&outcomes),
                self.gateway.insert_rows(&categories),
            )
        })
        .await?;
        saga.complete();

        let id = ChallengeId::from(stored.id);
        let challenge = self
            .confirm("challenge", id, compose::challenge(self.gateway.as_ref(), id))
            .await?;
        self.apply(
            engagement_id,
            Action::Challenges(CollectionAction::Add(challenge.clone())),
        );
        tracing::info!(challenge = %id, outcomes = outcomes.len(), "challenge added");
        Ok(challenge)
    }

    async fn write_challenge(&self, patch: ChallengePatch) -> SyncResult<Challenge> {
        let begun = self.begin(&patch).await?;
        let engagement_id = begun.engagement_id;
        let id = patch.id.as_uuid();
        let previous = self
            .owned_row::<ChallengeRow>(engagement_id, "challenge", id)
            .await?;

        let mut next = previous.clone();
        if let Some(title) = &patch.title {
            next.title = title.trim().to_string();
        }
        if let Some(description) = &patch.description {
            next.description.clone_from(description);
        }
        if let Some(impact) = &patch.business_impact {
            next.business_impact.clone_from(impact);
        }
        if let Some(example) = &patch.example {
            next.example = non_blank(example.as_deref());
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        next.updated_at = Utc::now();

        let mut saga = Saga::new("update_challenge");
        saga.step(
            "failed to update challenge",
            self.gateway
                .update_rows::<ChallengeRow, _>(vec![Filter::eq("id", id)], &next),
        )
        .await?;
        saga.restore_row(&self.gateway, Table::Challenges, snapshot(&previous)?);

        if let Some(outcomes) = &patch.outcomes {
            self.replace_children(
                &mut saga,
                "failed to replace outcomes",
                Filter::eq("challenge_id", id),
                &OutcomeRow::for_challenge(id, outcomes),
            )
            .await?;
        }
        if let Some(categories) = &patch.categories {
            self.replace_children(
                &mut saga,
                "failed to replace categories",
                Filter::eq("challenge_id", id),
                &ChallengeCategoryRow::for_challenge(id, categories),
            )
            .await?;
        }
        saga.complete();

        let challenge = self
            .confirm("challenge", patch.id, compose::challenge(self.gateway.as_ref(), patch.id))
            .await?;
        let mut update = ChallengeUpdate::from(challenge.clone());
        if patch.outcomes.is_none() {
            update.outcomes = None;
        }
        if patch.categories.is_none() {
            update.categories = None;
        }
        self.apply(engagement_id, Action::Challenges(CollectionAction::Update(update)));

        let verb = patch
            .status
            .map_or("updated", |status| status_verb(status.token()));
        self.log(
            engagement_id,
            LogEvent::new(
                LogKind::Challenge,
                "Challenge Updated",
                format!("\"{}\" {verb}", challenge.title),
            )
            .about(challenge.id),
        )
        .await?;
        Ok(challenge)
    }

    /// Directory id of the actor, when they have one
    async fn directory_entry(&self, actor: &Actor) -> SyncResult<Option<Uuid>> {
        let person = self
            .gateway
            .select_row::<PersonRow>(Query::by("email", normalize_email(&actor.email)))
            .await
            .map_err(|e| SyncError::remote("failed to look up author", e))?;
        Ok(person.map(|p| p.id))
    }
}
