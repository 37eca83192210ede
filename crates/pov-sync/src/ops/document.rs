//! Uploaded documents
//!
//! The blob is written before the metadata row and removed before it, so a
//! row never points at a missing blob.

use super::{EngagementSync, Lifecycle};
use crate::activity_log::LogEvent;
use crate::compose;
use crate::error::{StorageError, SyncError, SyncResult};
use crate::gateway::rows::DocumentRow;
use crate::gateway::{Filter, GatewayExt};
use crate::saga::Saga;
use chrono::Utc;
use pov_model::{Document, DocumentId, EngagementId, LogKind, NewDocument};
use pov_store::{Action, CollectionAction};
use std::sync::Arc;
use uuid::Uuid;

const UPLOAD: Lifecycle = Lifecycle::new(
    "Uploading document",
    "Document uploaded",
    "Failed to upload document",
);
const DELETE: Lifecycle = Lifecycle::new(
    "Deleting document",
    "Document deleted",
    "Failed to delete document",
);

impl EngagementSync {
    /// Store the file, then its metadata row
    ///
    /// The blob is removed again if the row cannot be written.
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `Remote` (after rollback) or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?input.engagement_id, name = %input.name, bytes = input.bytes.len()))]
    pub async fn upload_document(&self, input: NewDocument) -> SyncResult<Document> {
        self.tracked_with(UPLOAD, |d: &Document| format!("\"{}\" uploaded", d.name), async {
            let begun = self.begin(&input).await?;
            let engagement_id = begun.engagement_id;
            let name = input.name.trim().to_string();
            let bucket = self.config.document_bucket.clone();
            let path = format!("{engagement_id}/{}-{name}", Uuid::new_v4());
            let size_bytes = u64::try_from(input.bytes.len()).unwrap_or(u64::MAX);

            let mut saga = Saga::new("upload_document");
            saga.step(
                "failed to upload document",
                self.storage
                    .put(&bucket, &path, input.bytes, &input.content_type),
            )
            .await?;
            let storage = Arc::clone(&self.storage);
            let (undo_bucket, undo_path) = (bucket.clone(), path.clone());
            saga.on_rollback(format!("remove blob {path}"), move || async move {
                storage.remove(&undo_bucket, &undo_path).await
            });

            let row = DocumentRow {
                id: Uuid::nil(),
                engagement_id: engagement_id.as_uuid(),
                name,
                description: input.description.clone(),
                bucket,
                path,
                content_type: input.content_type.clone(),
                size_bytes,
                author_id: begun.actor.id.as_uuid(),
                author_email: begun.actor.email.clone(),
                created_at: Utc::now(),
            };
            let stored = saga
                .step("failed to save document", self.gateway.insert_row(&row))
                .await?;
            saga.complete();

            let id = DocumentId::from(stored.id);
            let document: Document = self
                .confirm(
                    "document",
                    id,
                    compose::record::<DocumentRow, Document>(self.gateway.as_ref(), id),
                )
                .await?;
            self.apply(
                engagement_id,
                Action::Documents(CollectionAction::Add(document.clone())),
            );
            self.log(
                engagement_id,
                LogEvent::new(
                    LogKind::Document,
                    "Document Uploaded",
                    format!("\"{}\" document uploaded", document.name),
                )
                .about(id),
            )
            .await?;
            Ok(document)
        })
        .await
    }

    /// Remove the file, then its metadata row
    ///
    /// A blob that is already gone does not block the deletion.
    ///
    /// # Errors
    /// `Unauthorized`, `NotFound` or `Remote`
    #[tracing::instrument(skip(self))]
    pub async fn delete_document(&self, engagement_id: EngagementId, id: DocumentId) -> SyncResult<()> {
        self.tracked(DELETE, async {
            let begun = self.begin_at(engagement_id).await?;
            let row = self
                .owned_row::<DocumentRow>(begun.engagement_id, "document", id.as_uuid())
                .await?;

            match self.storage.remove(&row.bucket, &row.path).await {
                Ok(()) => {}
                Err(StorageError::NotFound { .. }) => {
                    tracing::warn!(path = %row.path, "document file already removed");
                }
                Err(e) => return Err(SyncError::remote("failed to remove document file", e)),
            }

            self.gateway
                .delete_rows::<DocumentRow>(vec![Filter::eq("id", id)])
                .await
                .map_err(|e| SyncError::remote("failed to delete document", e))?;
            self.apply(
                begun.engagement_id,
                Action::Documents(CollectionAction::Delete(id)),
            );
            self.log_deletion(
                begun.engagement_id,
                LogEvent::new(
                    LogKind::Document,
                    "Document Deleted",
                    format!("\"{}\" document deleted", row.name),
                )
                .about(id),
            )
            .await
        })
        .await
    }
}
