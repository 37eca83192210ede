//! Activity log writer
//!
//! Appends one audit entry per user-visible change: resolves the actor,
//! inserts the row remotely, then prepends the entry into the store when
//! the engagement is the one loaded.

use crate::config::AuditConfig;
use crate::error::SyncError;
use crate::gateway::rows::ActivityLogRow;
use crate::gateway::{Gateway, GatewayExt};
use crate::identity::{resolve_actor, IdentityProvider};
use chrono::Utc;
use pov_model::{ActivityLogEntry, EngagementId, LogKind};
use pov_store::{Action, AggregateStore, CollectionAction};
use std::sync::Arc;
use uuid::Uuid;

/// What to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub kind: LogKind,
    pub title: String,
    pub description: String,
    pub reference_id: Option<Uuid>,
}

impl LogEvent {
    #[inline]
    #[must_use]
    pub fn new(kind: LogKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            reference_id: None,
        }
    }

    /// Point the entry at the entity that changed
    #[inline]
    #[must_use]
    pub fn about(mut self, id: impl Into<Uuid>) -> Self {
        self.reference_id = Some(id.into());
        self
    }
}

#[derive(Clone)]
pub struct ActivityLogWriter {
    gateway: Arc<dyn Gateway>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<AggregateStore>,
    config: AuditConfig,
}

impl ActivityLogWriter {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn Gateway>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<AggregateStore>,
        config: AuditConfig,
    ) -> Self {
        Self {
            gateway,
            identity,
            store,
            config,
        }
    }

    /// Write one entry
    ///
    /// Returns `Ok(None)` when the write failed and the audit config allows
    /// the triggering operation to succeed anyway.
    ///
    /// # Errors
    /// `Unauthorized` or `Remote` when the entry could not be written and
    /// audit failures are fatal
    #[tracing::instrument(skip(self, event), fields(kind = ?event.kind, title = %event.title))]
    pub async fn record(
        &self,
        engagement_id: EngagementId,
        event: LogEvent,
    ) -> Result<Option<ActivityLogEntry>, SyncError> {
        match self.write(engagement_id, event).await {
            Ok(entry) => Ok(Some(entry)),
            Err(err) if !self.config.fail_operation_on_error => {
                tracing::warn!(error = %err, "activity log entry dropped");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn write(
        &self,
        engagement_id: EngagementId,
        event: LogEvent,
    ) -> Result<ActivityLogEntry, SyncError> {
        let actor = resolve_actor(self.identity.as_ref()).await?;
        let row = ActivityLogRow {
            id: Uuid::nil(),
            engagement_id: engagement_id.as_uuid(),
            kind: event.kind,
            title: event.title,
            description: event.description,
            reference_id: event.reference_id,
            author_id: actor.id.as_uuid(),
            author_email: actor.email,
            author_name: actor.display_name,
            created_at: Utc::now(),
        };
        let stored = self
            .gateway
            .insert_row(&row)
            .await
            .map_err(|e| SyncError::remote("failed to write activity log", e))?;

        let entry = ActivityLogEntry::from(stored);
        self.store.dispatch_to(
            engagement_id,
            Action::ActivityLog(CollectionAction::Add(entry.clone())),
        );
        tracing::debug!(entry = %entry.id, "activity logged");
        Ok(entry)
    }
}

impl std::fmt::Debug for ActivityLogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLogWriter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
