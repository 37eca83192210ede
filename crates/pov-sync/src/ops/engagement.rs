//! Aggregate root: create, load, list, edit and delete

use super::{read_failure, EngagementSync, Lifecycle};
use crate::activity_log::LogEvent;
use crate::compose;
use crate::error::{SyncError, SyncResult};
use crate::gateway::rows::{DocumentRow, EngagementRow, PersonRow, TeamMemberRow};
use crate::gateway::{ConflictAction, Filter, GatewayExt, Query, Table};
use crate::identity::resolve_actor;
use crate::saga::Saga;
use chrono::Utc;
use pov_model::validation::normalize_email;
use pov_model::{
    Engagement, EngagementFields, EngagementId, EngagementPatch, EngagementStatus,
    EngagementSummary, LogKind, NewEngagement, StatusToken, Validate,
};
use pov_store::Action;
use uuid::Uuid;

const CREATE: Lifecycle = Lifecycle::new("Creating POV", "POV created", "Failed to create POV");
const LOAD: Lifecycle = Lifecycle::new("Loading POV", "POV loaded", "Failed to load POV");
const LIST: Lifecycle = Lifecycle::new("Loading POVs", "POVs loaded", "Failed to load POVs");
const UPDATE: Lifecycle = Lifecycle::new("Updating POV", "POV updated", "Failed to update POV");
const STATUS: Lifecycle = Lifecycle::new(
    "Updating POV status",
    "POV status updated",
    "Failed to update POV status",
);
const DELETE: Lifecycle = Lifecycle::new("Deleting POV", "POV deleted", "Failed to delete POV");

impl EngagementSync {
    /// Create an engagement owned by the current actor and load it
    ///
    /// The creator joins the team with the configured owner role, and one
    /// STATUS entry titled "POV Created" is logged.
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, or `Remote` after rolling back the
    /// engagement row
    #[tracing::instrument(skip_all, fields(title = %input.title))]
    pub async fn create_engagement(&self, input: NewEngagement) -> SyncResult<Engagement> {
        self.tracked_with(CREATE, |e: &Engagement| format!("\"{}\" POV created", e.title), async {
            let actor = resolve_actor(self.identity.as_ref()).await?;
            input.validate()?;

            let now = Utc::now();
            let row = EngagementRow {
                id: Uuid::nil(),
                title: input.title.trim().to_string(),
                customer_name: input.customer_name.trim().to_string(),
                status: input.status.unwrap_or_default(),
                notes: input.notes.clone(),
                created_by: actor.id.as_uuid(),
                created_at: now,
                updated_at: now,
            };

            let mut saga = Saga::new("create_engagement");
            let stored = saga
                .step("failed to create engagement", self.gateway.insert_row(&row))
                .await?;
            let id = EngagementId::from(stored.id);
            saga.undo_insert(&self.gateway, Table::Engagements, stored.id);
            let _lane = self.queue.enter(id).await;

            let owner = PersonRow {
                id: Uuid::nil(),
                email: normalize_email(&actor.email),
                name: actor.display_name.clone(),
                role: self.config.owner_role.clone(),
                organization: String::new(),
            };
            let (person, _) = saga
                .step(
                    "failed to add engagement owner",
                    self.gateway
                        .upsert_row(&owner, &["email"], ConflictAction::Ignore),
                )
                .await?;
            let member = TeamMemberRow {
                id: Uuid::nil(),
                engagement_id: stored.id,
                person_id: person.id,
                name: actor.display_name.clone(),
                role: self.config.owner_role.clone(),
                organization: person.organization,
                email: person.email,
                created_at: now,
            };
            saga.step(
                "failed to add engagement owner",
                self.gateway.upsert_row(
                    &member,
                    &["engagement_id", "person_id"],
                    ConflictAction::Ignore,
                ),
            )
            .await?;
            saga.complete();

            let engagement = self
                .confirm("engagement", id, compose::engagement(self.gateway.as_ref(), id))
                .await?;
            self.store.dispatch_all([
                Action::UpsertSummary(engagement.summary()),
                Action::LoadRoot(Box::new(engagement.clone())),
            ]);

            self.log(
                id,
                LogEvent::new(
                    LogKind::Status,
                    "POV Created",
                    format!(
                        "\"{}\" POV created for {}",
                        engagement.title, engagement.customer_name
                    ),
                )
                .about(id),
            )
            .await?;

            tracing::info!(%id, "engagement created");
            Ok(self.loaded_or(engagement))
        })
        .await
    }

    /// Load an engagement into the store
    ///
    /// Returns the cached copy without any remote call when `id` is already
    /// the loaded aggregate.
    ///
    /// # Errors
    /// `NotFound` when the engagement does not exist, `Remote` otherwise
    #[tracing::instrument(skip(self))]
    pub async fn load_engagement(&self, id: EngagementId) -> SyncResult<Engagement> {
        if let Some(cached) = self.store.engagement().filter(|e| e.id == id) {
            tracing::debug!("cache hit");
            return Ok(cached);
        }
        self.tracked(LOAD, self.fetch(id)).await
    }

    /// Load an engagement from the backend even when it is cached
    ///
    /// # Errors
    /// `NotFound` when the engagement does not exist, `Remote` otherwise
    #[tracing::instrument(skip(self))]
    pub async fn reload_engagement(&self, id: EngagementId) -> SyncResult<Engagement> {
        self.tracked(LOAD, self.fetch(id)).await
    }

    async fn fetch(&self, id: EngagementId) -> SyncResult<Engagement> {
        self.store.dispatch(Action::SetLoading(true));
        match compose::engagement(self.gateway.as_ref(), id).await {
            Ok(engagement) => {
                self.store
                    .dispatch(Action::LoadRoot(Box::new(engagement.clone())));
                tracing::debug!(
                    challenges = engagement.challenges.len(),
                    sessions = engagement.working_sessions.len(),
                    "engagement loaded"
                );
                Ok(engagement)
            }
            Err(e) => {
                let err = read_failure("engagement", id, e);
                self.store.dispatch_all([
                    Action::SetLoading(false),
                    Action::SetError(Some(err.to_string())),
                ]);
                Err(err)
            }
        }
    }

    /// Refresh the list-view summaries, most recently updated first
    ///
    /// # Errors
    /// `Remote` when the backend cannot be read
    #[tracing::instrument(skip(self))]
    pub async fn list_engagements(&self) -> SyncResult<Vec<EngagementSummary>> {
        self.tracked(LIST, async {
            let summaries = compose::summaries(self.gateway.as_ref(), self.config.summary_limit)
                .await
                .map_err(|e| SyncError::remote("failed to list engagements", e))?;
            self.store.dispatch(Action::SetSummaries(summaries.clone()));
            Ok(summaries)
        })
        .await
    }

    /// Edit root scalar fields
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `NotFound`, `Remote` or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?patch.engagement_id))]
    pub async fn update_engagement(&self, patch: EngagementPatch) -> SyncResult<EngagementFields> {
        self.tracked_with(UPDATE, |f: &EngagementFields| format!("\"{}\" updated", f.title), async {
            let begun = self.begin(&patch).await?;
            let id = begun.engagement_id;
            let fields = self
                .write_root(id, |row| {
                    if let Some(title) = &patch.title {
                        row.title = title.trim().to_string();
                    }
                    if let Some(customer) = &patch.customer_name {
                        row.customer_name = customer.trim().to_string();
                    }
                    if let Some(notes) = &patch.notes {
                        row.notes.clone_from(notes);
                    }
                })
                .await?;

            self.log(
                id,
                LogEvent::new(
                    LogKind::Status,
                    "POV Updated",
                    format!("\"{}\" details updated", fields.title),
                )
                .about(id),
            )
            .await?;
            Ok(fields)
        })
        .await
    }

    /// Move the engagement to another lifecycle status
    ///
    /// # Errors
    /// `Unauthorized`, `NotFound`, `Remote` or `Diverged`
    #[tracing::instrument(skip(self))]
    pub async fn update_engagement_status(
        &self,
        id: EngagementId,
        status: EngagementStatus,
    ) -> SyncResult<EngagementFields> {
        self.tracked(STATUS, async {
            let _begun = self.begin_at(id).await?;
            let mut previous = status;
            let fields = self
                .write_root(id, |row| {
                    previous = row.status;
                    row.status = status;
                })
                .await?;

            self.log(
                id,
                LogEvent::new(
                    LogKind::Status,
                    "Status Changed",
                    format!(
                        "Status changed from {} to {}",
                        previous.label(),
                        status.label()
                    ),
                )
                .about(id),
            )
            .await?;
            Ok(fields)
        })
        .await
    }

    /// Delete the engagement, its documents' blobs and, by cascade, every
    /// owned row
    ///
    /// Blobs are removed first; a blob that cannot be removed aborts the
    /// deletion with the engagement intact.
    ///
    /// # Errors
    /// `Unauthorized`, `NotFound` or `Remote`
    #[tracing::instrument(skip(self))]
    pub async fn delete_engagement(&self, id: EngagementId) -> SyncResult<()> {
        self.tracked(DELETE, async {
            let _begun = self.begin_at(id).await?;
            self.gateway
                .fetch_row::<EngagementRow>(id.as_uuid())
                .await
                .map_err(|e| read_failure("engagement", id, e))?;

            let documents = self
                .gateway
                .select_rows::<DocumentRow>(Query::by("engagement_id", id))
                .await
                .map_err(|e| SyncError::remote("failed to list documents", e))?;
            for document in &documents {
                self.storage
                    .remove(&document.bucket, &document.path)
                    .await
                    .map_err(|e| SyncError::remote("failed to remove document file", e))?;
            }

            self.gateway
                .delete_rows::<EngagementRow>(vec![Filter::eq("id", id)])
                .await
                .map_err(|e| SyncError::remote("failed to delete engagement", e))?;

            self.apply(id, Action::ClearRoot);
            self.store.dispatch(Action::RemoveSummary(id));
            self.queue.forget(id);
            tracing::info!(%id, documents = documents.len(), "engagement deleted");
            Ok(())
        })
        .await
    }

    /// Update the root row, confirm it and replace the loaded root fields
    async fn write_root(
        &self,
        id: EngagementId,
        edit: impl FnOnce(&mut EngagementRow),
    ) -> SyncResult<EngagementFields> {
        let mut row = self
            .gateway
            .fetch_row::<EngagementRow>(id.as_uuid())
            .await
            .map_err(|e| read_failure("engagement", id, e))?;
        edit(&mut row);
        row.updated_at = Utc::now();

        self.gateway
            .update_rows::<EngagementRow, _>(vec![Filter::eq("id", id)], &row)
            .await
            .map_err(|e| SyncError::remote("failed to update engagement", e))?;

        let fields = self
            .confirm(
                "engagement",
                id,
                compose::engagement_fields(self.gateway.as_ref(), id),
            )
            .await?;
        self.apply(id, Action::ReplaceRoot(fields.clone()));
        Ok(fields)
    }

    /// The store's copy of `engagement` when loaded, so callers see log
    /// entries written after the read
    fn loaded_or(&self, engagement: Engagement) -> Engagement {
        self.store
            .engagement()
            .filter(|e| e.id == engagement.id)
            .unwrap_or(engagement)
    }
}
