//! Engagement team
//!
//! People live in a global directory keyed by email. Joining a team is an
//! association row that snapshots the person's details, so adding someone
//! twice is a no-op.

use super::{EngagementSync, Lifecycle};
use crate::activity_log::LogEvent;
use crate::compose;
use crate::error::SyncResult;
use crate::gateway::rows::{PersonRow, TeamMemberRow};
use crate::gateway::{ConflictAction, GatewayExt, Table};
use crate::saga::Saga;
use chrono::Utc;
use pov_model::validation::normalize_email;
use pov_model::{EngagementId, LogKind, NewTeamMember, TeamMember, TeamMemberId, TeamMemberPatch};
use pov_store::{Action, CollectionAction};
use uuid::Uuid;

const ADD: Lifecycle = Lifecycle::new(
    "Adding team member",
    "Team member added",
    "Failed to add team member",
);
const UPDATE: Lifecycle = Lifecycle::new(
    "Updating team member",
    "Team member updated",
    "Failed to update team member",
);
const REMOVE: Lifecycle = Lifecycle::new(
    "Removing team member",
    "Team member removed",
    "Failed to remove team member",
);

impl EngagementSync {
    /// Add a person to the team, creating their directory entry if needed
    ///
    /// When the person is already on the team the existing association is
    /// returned and nothing is logged.
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `Remote` (after rollback) or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?input.engagement_id))]
    pub async fn add_team_member(&self, input: NewTeamMember) -> SyncResult<TeamMember> {
        self.tracked_with(ADD, |m: &TeamMember| format!("\"{}\" added to the team", m.name), async {
            let begun = self.begin(&input).await?;
            let engagement_id = begun.engagement_id;
            let name = input.name.trim().to_string();
            let role = input.role.trim().to_string();
            let organization = input.organization.trim().to_string();

            let person = PersonRow {
                id: Uuid::nil(),
                email: normalize_email(&input.email),
                name: name.clone(),
                role: role.clone(),
                organization: organization.clone(),
            };
            let mut saga = Saga::new("add_team_member");
            let (person, person_created) = saga
                .step(
                    "failed to add person",
                    self.gateway
                        .upsert_row(&person, &["email"], ConflictAction::Ignore),
                )
                .await?;
            if person_created {
                saga.undo_insert(&self.gateway, Table::People, person.id);
            }

            let member = TeamMemberRow {
                id: Uuid::nil(),
                engagement_id: engagement_id.as_uuid(),
                person_id: person.id,
                name,
                role,
                organization,
                email: person.email.clone(),
                created_at: Utc::now(),
            };
            let (stored, joined) = saga
                .step(
                    "failed to add team member",
                    self.gateway.upsert_row(
                        &member,
                        &["engagement_id", "person_id"],
                        ConflictAction::Ignore,
                    ),
                )
                .await?;
            saga.complete();

            let member: TeamMember = self
                .confirm(
                    "team member",
                    stored.id,
                    compose::record::<TeamMemberRow, TeamMember>(self.gateway.as_ref(), stored.id),
                )
                .await?;

            if !joined {
                let listed = self.store.read(|state| {
                    state
                        .engagement
                        .as_ref()
                        .is_some_and(|e| e.team_members.iter().any(|m| m.id == member.id))
                });
                if !listed {
                    self.apply(
                        engagement_id,
                        Action::TeamMembers(CollectionAction::Add(member.clone())),
                    );
                }
                tracing::debug!(member = %member.id, "already on the team");
                return Ok(member);
            }

            self.apply(
                engagement_id,
                Action::TeamMembers(CollectionAction::Add(member.clone())),
            );
            let description = if member.role.is_empty() {
                format!("\"{}\" added to the team", member.name)
            } else {
                format!("\"{}\" added to the team as {}", member.name, member.role)
            };
            self.log(
                engagement_id,
                LogEvent::new(LogKind::Team, "Team Member Added", description).about(member.id),
            )
            .await?;
            Ok(member)
        })
        .await
    }

    /// Edit a member's snapshot; the directory entry is left alone
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `NotFound`, `Remote` or `Diverged`
    #[tracing::instrument(skip_all, fields(engagement = ?patch.engagement_id, member = %patch.id))]
    pub async fn update_team_member(&self, patch: TeamMemberPatch) -> SyncResult<TeamMember> {
        self.tracked_with(UPDATE, |m: &TeamMember| format!("\"{}\" updated", m.name), async {
            let begun = self.begin(&patch).await?;
            self.update_flat::<TeamMemberRow, TeamMember>(
                begun.engagement_id,
                "team member",
                patch.id.as_uuid(),
                |row| {
                    if let Some(name) = &patch.name {
                        row.name = name.trim().to_string();
                    }
                    if let Some(role) = &patch.role {
                        row.role = role.trim().to_string();
                    }
                    if let Some(organization) = &patch.organization {
                        row.organization = organization.trim().to_string();
                    }
                },
                Action::TeamMembers,
                |_, member| {
                    LogEvent::new(
                        LogKind::Team,
                        "Team Member Updated",
                        format!("\"{}\" details updated", member.name),
                    )
                    .about(member.id)
                },
            )
            .await
        })
        .await
    }

    /// Remove a member from the team; their directory entry stays
    ///
    /// # Errors
    /// `Unauthorized`, `NotFound` or `Remote`
    #[tracing::instrument(skip(self))]
    pub async fn remove_team_member(
        &self,
        engagement_id: EngagementId,
        id: TeamMemberId,
    ) -> SyncResult<()> {
        self.tracked(REMOVE, async {
            let begun = self.begin_at(engagement_id).await?;
            self.delete_flat::<TeamMemberRow, TeamMember>(
                begun.engagement_id,
                "team member",
                id.as_uuid(),
                Action::TeamMembers,
                |row| {
                    LogEvent::new(
                        LogKind::Team,
                        "Team Member Removed",
                        format!("\"{}\" removed from the team", row.name),
                    )
                    .about(id)
                },
            )
            .await
        })
        .await
    }
}
