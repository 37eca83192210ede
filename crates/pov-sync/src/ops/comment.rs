//! Engagement comments

use super::{EngagementSync, Lifecycle};
use crate::activity_log::LogEvent;
use crate::error::SyncResult;
use crate::gateway::rows::CommentRow;
use chrono::Utc;
use pov_model::{Comment, CommentId, CommentPatch, EngagementId, LogKind, NewComment};
use pov_store::Action;
use uuid::Uuid;

const EXCERPT_CHARS: usize = 80;

const ADD: Lifecycle = Lifecycle::new("Adding comment", "Comment added", "Failed to add comment");
const UPDATE: Lifecycle = Lifecycle::new(
    "Updating comment",
    "Comment updated",
    "Failed to update comment",
);
const DELETE: Lifecycle = Lifecycle::new(
    "Deleting comment",
    "Comment deleted",
    "Failed to delete comment",
);

impl EngagementSync {
    /// Post a comment as the current actor
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `Remote` or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?input.engagement_id))]
    pub async fn add_comment(&self, input: NewComment) -> SyncResult<Comment> {
        self.tracked(ADD, async {
            let begun = self.begin(&input).await?;
            let now = Utc::now();
            let row = CommentRow {
                id: Uuid::nil(),
                engagement_id: begun.engagement_id.as_uuid(),
                content: input.content.trim().to_string(),
                author_id: begun.actor.id.as_uuid(),
                author_email: begun.actor.email.clone(),
                created_at: now,
                updated_at: now,
            };
            self.insert_flat(
                begun.engagement_id,
                "comment",
                row,
                Action::Comments,
                |comment: &Comment| {
                    LogEvent::new(
                        LogKind::Comment,
                        "Comment Added",
                        format!("\"{}\" comment created", excerpt(&comment.content)),
                    )
                    .about(comment.id)
                },
            )
            .await
        })
        .await
    }

    /// # Errors
    /// `Unauthorized`, `Validation`, `NotFound`, `Remote` or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?patch.engagement_id, comment = %patch.id))]
    pub async fn update_comment(&self, patch: CommentPatch) -> SyncResult<Comment> {
        self.tracked(UPDATE, async {
            let begun = self.begin(&patch).await?;
            self.update_flat::<CommentRow, Comment>(
                begun.engagement_id,
                "comment",
                patch.id.as_uuid(),
                |row| {
                    row.content = patch.content.trim().to_string();
                    row.updated_at = Utc::now();
                },
                Action::Comments,
                |_, comment| {
                    LogEvent::new(
                        LogKind::Comment,
                        "Comment Updated",
                        format!("\"{}\" updated", excerpt(&comment.content)),
                    )
                    .about(comment.id)
                },
            )
            .await
        })
        .await
    }

    /// # Errors
    /// `Unauthorized`, `NotFound` or `Remote`
    #[tracing::instrument(skip(self))]
    pub async fn delete_comment(&self, engagement_id: EngagementId, id: CommentId) -> SyncResult<()> {
        self.tracked(DELETE, async {
            let begun = self.begin_at(engagement_id).await?;
            self.delete_flat::<CommentRow, Comment>(
                begun.engagement_id,
                "comment",
                id.as_uuid(),
                Action::Comments,
                |row| {
                    LogEvent::new(
                        LogKind::Comment,
                        "Comment Deleted",
                        format!("\"{}\" comment deleted", excerpt(&row.content)),
                    )
                    .about(id)
                },
            )
            .await
        })
        .await
    }
}

/// First line of `content`, cut at a character boundary
fn excerpt(content: &str) -> String {
    let line = content.lines().next().unwrap_or_default().trim();
    match line.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::excerpt;

    #[test]
    fn excerpt_keeps_short_text() {
        assert_eq!(excerpt("  Looks good  "), "Looks good");
        assert_eq!(excerpt("first\nsecond"), "first");
    }

    #[test]
    fn excerpt_cuts_on_char_boundary() {
        let long = "é".repeat(100);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 83);
    }
}
