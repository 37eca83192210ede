//! Operation layer
//!
//! [`EngagementSync`] owns the ports and the store handle and exposes one
//! async method per use case. Every mutating method follows the same shape:
//! - resolve the actor (`Unauthorized`) and the engagement id on the
//!   payload (`Validation`), then wait for the engagement's mutation lane
//! - perform the remote writes, registering a compensation after each one
//! - re-read the composed entity (`Diverged` if that fails)
//! - apply one store transition when the engagement is the loaded one
//! - write one activity-log entry
//!
//! The methods live in one submodule per area of the aggregate.

mod challenge;
mod comment;
mod criterion;
mod device;
mod document;
mod engagement;
mod service;
mod session;
mod team;

use crate::activity_log::{ActivityLogWriter, LogEvent};
use crate::compose;
use crate::config::SyncConfig;
use crate::error::{GatewayError, SyncError, SyncResult};
use crate::gateway::{encode, Filter, Gateway, GatewayExt, Record, ScopedRow, TableRow};
use crate::guard::IntegrityGuard;
use crate::identity::{resolve_actor, IdentityProvider};
use crate::notify::Notifier;
use crate::queue::{Lane, MutationQueue};
use crate::saga::Saga;
use crate::storage::BlobStorage;
use pov_model::{Actor, Engagement, EngagementId, EngagementScoped, Validate, WorkStatus};
use pov_store::{Action, AggregateStore, CollectionAction, CollectionItem};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// External collaborators of the operation layer
#[derive(Clone)]
pub struct Ports {
    pub gateway: Arc<dyn Gateway>,
    pub identity: Arc<dyn IdentityProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub storage: Arc<dyn BlobStorage>,
}

impl fmt::Debug for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}

/// Notifier labels for one operation
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lifecycle {
    started: &'static str,
    succeeded: &'static str,
    failed: &'static str,
}

impl Lifecycle {
    pub(crate) const fn new(
        started: &'static str,
        succeeded: &'static str,
        failed: &'static str,
    ) -> Self {
        Self {
            started,
            succeeded,
            failed,
        }
    }
}

/// Context of a mutation that passed the common preconditions
struct Begun {
    actor: Actor,
    engagement_id: EngagementId,
    _lane: Lane,
}

/// Remote-first synchronization of the engagement aggregate
///
/// Owns the ports and shares the [`AggregateStore`] with the presentation
/// layer, which reads from the store and calls the methods here to mutate.
pub struct EngagementSync {
    config: SyncConfig,
    gateway: Arc<dyn Gateway>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
    storage: Arc<dyn BlobStorage>,
    store: Arc<AggregateStore>,
    guard: IntegrityGuard,
    audit: ActivityLogWriter,
    queue: MutationQueue,
}

impl EngagementSync {
    /// Wire the operation layer to its ports and store
    #[must_use]
    pub fn new(config: SyncConfig, ports: Ports, store: Arc<AggregateStore>) -> Self {
        let audit = ActivityLogWriter::new(
            Arc::clone(&ports.gateway),
            Arc::clone(&ports.identity),
            Arc::clone(&store),
            config.audit.clone(),
        );
        Self {
            config,
            gateway: ports.gateway,
            identity: ports.identity,
            notifier: ports.notifier,
            storage: ports.storage,
            store,
            guard: IntegrityGuard::default(),
            audit,
            queue: MutationQueue::new(),
        }
    }

    /// Replace the integrity guard
    #[must_use]
    pub fn with_guard(mut self, guard: IntegrityGuard) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<AggregateStore> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run `op` between the started and succeeded/failed notifications
    async fn tracked<T>(
        &self,
        lifecycle: Lifecycle,
        op: impl Future<Output = SyncResult<T>>,
    ) -> SyncResult<T> {
        self.tracked_with(lifecycle, |_| lifecycle.succeeded.to_string(), op)
            .await
    }

    /// As [`Self::tracked`], with the success label computed from the result
    async fn tracked_with<T>(
        &self,
        lifecycle: Lifecycle,
        succeeded: impl FnOnce(&T) -> String,
        op: impl Future<Output = SyncResult<T>>,
    ) -> SyncResult<T> {
        self.notifier.started(lifecycle.started);
        match op.await {
            Ok(value) => {
                self.notifier.succeeded(&succeeded(&value));
                Ok(value)
            }
            Err(err) => {
                if err.is_user_error() {
                    tracing::info!(error = %err, "{}", lifecycle.failed);
                } else {
                    tracing::error!(error = %err, "{}", lifecycle.failed);
                }
                self.notifier.failed(&err.user_message(lifecycle.failed));
                Err(err)
            }
        }
    }

    /// Common preconditions for a payload-driven mutation
    async fn begin<P>(&self, payload: &P) -> SyncResult<Begun>
    where
        P: Validate + EngagementScoped,
    {
        let actor = resolve_actor(self.identity.as_ref()).await?;
        let engagement_id = payload.require_engagement()?;
        payload.validate()?;
        let lane = self.queue.enter(engagement_id).await;
        Ok(Begun {
            actor,
            engagement_id,
            _lane: lane,
        })
    }

    /// Common preconditions for an id-addressed mutation
    async fn begin_at(&self, engagement_id: EngagementId) -> SyncResult<Begun> {
        let actor = resolve_actor(self.identity.as_ref()).await?;
        let lane = self.queue.enter(engagement_id).await;
        Ok(Begun {
            actor,
            engagement_id,
            _lane: lane,
        })
    }

    /// Dispatch when `engagement_id` is the loaded aggregate
    fn apply(&self, engagement_id: EngagementId, action: Action) {
        self.store.dispatch_to(engagement_id, action);
    }

    async fn log(&self, engagement_id: EngagementId, event: LogEvent) -> SyncResult<()> {
        self.audit.record(engagement_id, event).await.map(|_| ())
    }

    async fn log_deletion(&self, engagement_id: EngagementId, event: LogEvent) -> SyncResult<()> {
        if !self.config.audit.log_deletions {
            return Ok(());
        }
        self.log(engagement_id, event).await
    }

    /// Read back what was just written
    ///
    /// Writes have committed at this point, so a failure is reported as
    /// [`SyncError::Diverged`] and recorded in the store instead of being
    /// rolled back.
    async fn confirm<T>(
        &self,
        entity: &'static str,
        id: impl fmt::Display,
        read: impl Future<Output = Result<T, GatewayError>>,
    ) -> SyncResult<T> {
        match read.await {
            Ok(value) => Ok(value),
            Err(source) => {
                let err = SyncError::Diverged {
                    entity,
                    id: id.to_string(),
                    source,
                };
                tracing::error!(error = %err, "read-your-write failed");
                self.store.dispatch(Action::SetError(Some(err.to_string())));
                Err(err)
            }
        }
    }

    /// The aggregate as the guard should see it: the loaded copy when it is
    /// this engagement, a fresh composed read otherwise
    async fn view(&self, engagement_id: EngagementId) -> SyncResult<Engagement> {
        if let Some(loaded) = self.store.engagement().filter(|e| e.id == engagement_id) {
            return Ok(loaded);
        }
        compose::engagement(self.gateway.as_ref(), engagement_id)
            .await
            .map_err(|e| read_failure("engagement", engagement_id, e))
    }

    /// Row by id, as long as it belongs to `engagement_id`
    async fn owned_row<R: ScopedRow>(
        &self,
        engagement_id: EngagementId,
        entity: &'static str,
        id: Uuid,
    ) -> SyncResult<R> {
        match self.gateway.fetch_row::<R>(id).await {
            Ok(row) if row.engagement_id() == engagement_id.as_uuid() => Ok(row),
            Ok(_) => Err(SyncError::not_found(entity, id)),
            Err(e) => Err(read_failure(entity, id, e)),
        }
    }

    /// Create protocol for a child without nested rows
    async fn insert_flat<R, M>(
        &self,
        engagement_id: EngagementId,
        entity: &'static str,
        row: R,
        wrap: fn(CollectionAction<M>) -> Action,
        event: impl FnOnce(&M) -> LogEvent,
    ) -> SyncResult<M>
    where
        R: TableRow,
        M: CollectionItem + From<R>,
    {
        let stored = self
            .gateway
            .insert_row(&row)
            .await
            .map_err(|e| SyncError::remote(format!("failed to add {entity}"), e))?;
        let id = stored.id();

        let item: M = self
            .confirm(entity, id, compose::record::<R, M>(self.gateway.as_ref(), id))
            .await?;
        self.apply(engagement_id, wrap(CollectionAction::Add(item.clone())));
        self.log(engagement_id, event(&item)).await?;
        Ok(item)
    }

    /// Update protocol for a child without nested rows
    ///
    /// `edit` receives the stored row and changes it in place; the previous
    /// row is written back if the update has to be undone.
    async fn update_flat<R, M>(
        &self,
        engagement_id: EngagementId,
        entity: &'static str,
        id: Uuid,
        edit: impl FnOnce(&mut R),
        wrap: fn(CollectionAction<M>) -> Action,
        event: impl FnOnce(&R, &M) -> LogEvent,
    ) -> SyncResult<M>
    where
        R: ScopedRow,
        M: CollectionItem<Update = M> + From<R>,
    {
        let previous = self.owned_row::<R>(engagement_id, entity, id).await?;
        let mut next = previous.clone();
        edit(&mut next);

        self.gateway
            .update_rows::<R, R>(vec![Filter::eq("id", id)], &next)
            .await
            .map_err(|e| SyncError::remote(format!("failed to update {entity}"), e))?;

        let item: M = self
            .confirm(entity, id, compose::record::<R, M>(self.gateway.as_ref(), id))
            .await?;
        self.apply(engagement_id, wrap(CollectionAction::Update(item.clone())));
        self.log(engagement_id, event(&previous, &item)).await?;
        Ok(item)
    }

    /// Delete protocol for a child without nested rows
    async fn delete_flat<R, M>(
        &self,
        engagement_id: EngagementId,
        entity: &'static str,
        id: Uuid,
        wrap: fn(CollectionAction<M>) -> Action,
        event: impl FnOnce(&R) -> LogEvent,
    ) -> SyncResult<()>
    where
        R: ScopedRow,
        M: CollectionItem,
        M::Id: From<Uuid>,
    {
        let row = self.owned_row::<R>(engagement_id, entity, id).await?;
        self.gateway
            .delete_rows::<R>(vec![Filter::eq("id", id)])
            .await
            .map_err(|e| SyncError::remote(format!("failed to delete {entity}"), e))?;
        self.apply(engagement_id, wrap(CollectionAction::Delete(M::Id::from(id))));
        self.log_deletion(engagement_id, event(&row)).await
    }

    /// Replace every child row under `parent`, restoring the old rows if a
    /// later step fails
    async fn replace_children<R: TableRow>(
        &self,
        saga: &mut Saga,
        context: &str,
        parent: Filter,
        rows: &[R],
    ) -> SyncResult<()> {
        let removed = saga
            .step(context, self.gateway.delete(R::TABLE, vec![parent.clone()]))
            .await?;
        tracing::debug!(table = %R::TABLE, removed = removed.len(), inserted = rows.len(), "replacing children");
        saga.restore_rows(&self.gateway, R::TABLE, vec![parent], removed);
        saga.step(context, self.gateway.insert_rows(rows)).await?;
        Ok(())
    }
}

impl fmt::Debug for EngagementSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngagementSync")
            .field("config", &self.config)
            .field("guard", &self.guard)
            .field("lanes", &self.queue.lane_count())
            .finish_non_exhaustive()
    }
}

/// Map a failed lookup: a missing row is the caller's problem, anything
/// else is remote
fn read_failure(entity: &'static str, id: impl fmt::Display, err: GatewayError) -> SyncError {
    match err {
        GatewayError::NotFound { .. } => SyncError::not_found(entity, id),
        other => SyncError::remote(format!("failed to read {entity}"), other),
    }
}

/// Encode a row before overwriting it, for the compensation
fn snapshot<R: TableRow>(row: &R) -> SyncResult<Record> {
    encode(row).map_err(|e| SyncError::remote("failed to snapshot row", e))
}

/// Trimmed text, or `None` when there is nothing left
fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// Patch that only touches the status column
#[derive(Debug, Clone, Copy, Serialize)]
struct StatusPatch {
    status: WorkStatus,
}
