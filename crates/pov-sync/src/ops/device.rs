//! Device scope rows

use super::{EngagementSync, Lifecycle};
use crate::activity_log::LogEvent;
use crate::error::SyncResult;
use crate::gateway::rows::DeviceScopeRow;
use chrono::Utc;
use pov_model::{
    status_verb, DeviceScope, DeviceScopeId, DeviceScopePatch, EngagementId, LogKind,
    NewDeviceScope, StatusToken, WorkStatus,
};
use pov_store::Action;
use uuid::Uuid;

const ADD: Lifecycle = Lifecycle::new(
    "Adding device scope",
    "Device scope added",
    "Failed to add device scope",
);
const UPDATE: Lifecycle = Lifecycle::new(
    "Updating device scope",
    "Device scope updated",
    "Failed to update device scope",
);
const DELETE: Lifecycle = Lifecycle::new(
    "Deleting device scope",
    "Device scope deleted",
    "Failed to delete device scope",
);

impl EngagementSync {
    /// # Errors
    /// `Unauthorized`, `Validation`, `Remote` or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?input.engagement_id, device = %input.device_type))]
    pub async fn add_device_scope(&self, input: NewDeviceScope) -> SyncResult<DeviceScope> {
        self.tracked_with(ADD, |d: &DeviceScope| format!("\"{}\" device scope added", d.device_type), async {
            let begun = self.begin(&input).await?;
            let now = Utc::now();
            let row = DeviceScopeRow {
                id: Uuid::nil(),
                engagement_id: begun.engagement_id.as_uuid(),
                device_type: input.device_type.trim().to_string(),
                category: input.category.trim().to_string(),
                count: input.count,
                priority: input.priority,
                notes: input.notes.clone(),
                status: input.status.unwrap_or_default(),
                from_onboarding_template: input.from_onboarding_template,
                created_at: now,
                updated_at: now,
            };
            self.insert_flat(
                begun.engagement_id,
                "device scope",
                row,
                Action::DeviceScopes,
                |scope: &DeviceScope| {
                    LogEvent::new(
                        LogKind::Device,
                        "Device Scope Added",
                        format!("\"{}\" device scope created", scope.device_type),
                    )
                    .about(scope.id)
                },
            )
            .await
        })
        .await
    }

    /// # Errors
    /// `Unauthorized`, `Validation`, `NotFound`, `Remote` or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?patch.engagement_id, device = %patch.id))]
    pub async fn update_device_scope(&self, patch: DeviceScopePatch) -> SyncResult<DeviceScope> {
        self.tracked_with(UPDATE, |d: &DeviceScope| format!("\"{}\" updated", d.device_type), async {
            let begun = self.begin(&patch).await?;
            let verb = patch
                .status
                .map_or("updated", |status| status_verb(status.token()));
            self.update_flat::<DeviceScopeRow, DeviceScope>(
                begun.engagement_id,
                "device scope",
                patch.id.as_uuid(),
                |row| {
                    if let Some(device_type) = &patch.device_type {
                        row.device_type = device_type.trim().to_string();
                    }
                    if let Some(category) = &patch.category {
                        row.category = category.trim().to_string();
                    }
                    if let Some(count) = patch.count {
                        row.count = count;
                    }
                    if let Some(priority) = patch.priority {
                        row.priority = priority;
                    }
                    if let Some(notes) = &patch.notes {
                        row.notes.clone_from(notes);
                    }
                    if let Some(status) = patch.status {
                        row.status = status;
                    }
                    row.updated_at = Utc::now();
                },
                Action::DeviceScopes,
                |_, scope| {
                    LogEvent::new(
                        LogKind::Device,
                        "Device Scope Updated",
                        format!("\"{}\" {verb}", scope.device_type),
                    )
                    .about(scope.id)
                },
            )
            .await
        })
        .await
    }

    /// Set a device scope's status
    ///
    /// # Errors
    /// As [`EngagementSync::update_device_scope`]
    pub async fn update_device_scope_status(
        &self,
        engagement_id: EngagementId,
        id: DeviceScopeId,
        status: WorkStatus,
    ) -> SyncResult<DeviceScope> {
        self.update_device_scope(DeviceScopePatch {
            engagement_id: Some(engagement_id),
            id,
            device_type: None,
            category: None,
            count: None,
            priority: None,
            notes: None,
            status: Some(status),
        })
        .await
    }

    /// # Errors
    /// `Unauthorized`, `NotFound` or `Remote`
    #[tracing::instrument(skip(self))]
    pub async fn delete_device_scope(
        &self,
        engagement_id: EngagementId,
        id: DeviceScopeId,
    ) -> SyncResult<()> {
        self.tracked(DELETE, async {
            let begun = self.begin_at(engagement_id).await?;
            self.delete_flat::<DeviceScopeRow, DeviceScope>(
                begun.engagement_id,
                "device scope",
                id.as_uuid(),
                Action::DeviceScopes,
                |row| {
                    LogEvent::new(
                        LogKind::Device,
                        "Device Scope Deleted",
                        format!("\"{}\" device scope deleted", row.device_type),
                    )
                    .about(id)
                },
            )
            .await
        })
        .await
    }
}
