//! Business services in scope

use super::{non_blank, EngagementSync, Lifecycle};
use crate::activity_log::LogEvent;
use crate::error::SyncResult;
use crate::gateway::rows::BusinessServiceRow;
use chrono::Utc;
use pov_model::{
    status_verb, BusinessService, BusinessServiceId, BusinessServicePatch, EngagementId, LogKind,
    NewBusinessService, StatusToken, WorkStatus,
};
use pov_store::Action;
use uuid::Uuid;

const ADD: Lifecycle = Lifecycle::new(
    "Adding business service",
    "Business service added",
    "Failed to add business service",
);
const UPDATE: Lifecycle = Lifecycle::new(
    "Updating business service",
    "Business service updated",
    "Failed to update business service",
);
const DELETE: Lifecycle = Lifecycle::new(
    "Deleting business service",
    "Business service deleted",
    "Failed to delete business service",
);

impl EngagementSync {
    /// # Errors
    /// `Unauthorized`, `Validation`, `Remote` or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?input.engagement_id, service = %input.name))]
    pub async fn add_business_service(
        &self,
        input: NewBusinessService,
    ) -> SyncResult<BusinessService> {
        self.tracked_with(ADD, |s: &BusinessService| format!("\"{}\" business service added", s.name), async {
            let begun = self.begin(&input).await?;
            let now = Utc::now();
            let row = BusinessServiceRow {
                id: Uuid::nil(),
                engagement_id: begun.engagement_id.as_uuid(),
                name: input.name.trim().to_string(),
                description: input.description.clone(),
                criticality: input.criticality,
                owner: non_blank(input.owner.as_deref()),
                notes: input.notes.clone(),
                status: input.status.unwrap_or_default(),
                created_at: now,
                updated_at: now,
            };
            self.insert_flat(
                begun.engagement_id,
                "business service",
                row,
                Action::BusinessServices,
                |service: &BusinessService| {
                    LogEvent::new(
                        LogKind::Service,
                        "Business Service Added",
                        format!("\"{}\" business service created", service.name),
                    )
                    .about(service.id)
                },
            )
            .await
        })
        .await
    }

    /// # Errors
    /// `Unauthorized`, `Validation`, `NotFound`, `Remote` or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?patch.engagement_id, service = %patch.id))]
    pub async fn update_business_service(
        &self,
        patch: BusinessServicePatch,
    ) -> SyncResult<BusinessService> {
        self.tracked_with(UPDATE, |s: &BusinessService| format!("\"{}\" updated", s.name), async {
            let begun = self.begin(&patch).await?;
            let verb = patch
                .status
                .map_or("updated", |status| status_verb(status.token()));
            self.update_flat::<BusinessServiceRow, BusinessService>(
                begun.engagement_id,
                "business service",
                patch.id.as_uuid(),
                |row| {
                    if let Some(name) = &patch.name {
                        row.name = name.trim().to_string();
                    }
                    if let Some(description) = &patch.description {
                        row.description.clone_from(description);
                    }
                    if let Some(criticality) = patch.criticality {
                        row.criticality = criticality;
                    }
                    if let Some(owner) = &patch.owner {
                        row.owner = non_blank(owner.as_deref());
                    }
                    if let Some(notes) = &patch.notes {
                        row.notes.clone_from(notes);
                    }
                    if let Some(status) = patch.status {
                        row.status = status;
                    }
                    row.updated_at = Utc::now();
                },
                Action::BusinessServices,
                |_, service| {
                    LogEvent::new(
                        LogKind::Service,
                        "Business Service Updated",
                        format!("\"{}\" {verb}", service.name),
                    )
                    .about(service.id)
                },
            )
            .await
        })
        .await
    }

    /// Set a business service's status
    ///
    /// # Errors
    /// As [`EngagementSync::update_business_service`]
    pub async fn update_business_service_status(
        &self,
        engagement_id: EngagementId,
        id: BusinessServiceId,
        status: WorkStatus,
    ) -> SyncResult<BusinessService> {
        self.update_business_service(BusinessServicePatch {
            engagement_id: Some(engagement_id),
            id,
            name: None,
            description: None,
            criticality: None,
            owner: None,
            notes: None,
            status: Some(status),
        })
        .await
    }

    /// # Errors
    /// `Unauthorized`, `NotFound` or `Remote`
    #[tracing::instrument(skip(self))]
    pub async fn delete_business_service(
        &self,
        engagement_id: EngagementId,
        id: BusinessServiceId,
    ) -> SyncResult<()> {
        self.tracked(DELETE, async {
            let begun = self.begin_at(engagement_id).await?;
            self.delete_flat::<BusinessServiceRow, BusinessService>(
                begun.engagement_id,
                "business service",
                id.as_uuid(),
                Action::BusinessServices,
                |row| {
                    LogEvent::new(
                        LogKind::Service,
                        "Business Service Deleted",
                        format!("\"{}\" business service deleted", row.name),
                    )
                    .about(id)
                },
            )
            .await
        })
        .await
    }
}
