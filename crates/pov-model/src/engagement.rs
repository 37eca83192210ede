//! Engagement aggregate root, activity log and list summary

use crate::challenge::Challenge;
use crate::criterion::{CriterionActivity, DecisionCriterion};
use crate::ids::{ActorId, CriterionActivityId, EngagementId, LogEntryId};
use crate::records::{BusinessService, Comment, DeviceScope, Document, TeamMember};
use crate::session::{SessionActivity, SessionActivityKind, WorkingSession};
use crate::status::{CriterionStatus, EngagementStatus, SessionStatus, WorkStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of whoever performs an operation, as supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub email: String,
    pub display_name: String,
}

impl Actor {
    #[inline]
    #[must_use]
    pub fn new(id: ActorId, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            display_name: display_name.into(),
        }
    }
}

/// Activity log category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    Status,
    Challenge,
    Team,
    Session,
    Criteria,
    Comment,
    Document,
    Device,
    Service,
}

/// Append-only audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: LogEntryId,
    pub engagement_id: EngagementId,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub title: String,
    pub description: String,
    /// Entity the entry describes
    pub reference_id: Option<Uuid>,
    pub author_id: ActorId,
    pub author_email: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// Root scalar fields, without owned collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementFields {
    pub id: EngagementId,
    pub title: String,
    pub customer_name: String,
    pub status: EngagementStatus,
    pub notes: String,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The engagement aggregate: root fields plus every owned collection
///
/// Collections default to empty when absent from the serialized form, so
/// consumers never need to distinguish "missing" from "empty".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub id: EngagementId,
    pub title: String,
    pub customer_name: String,
    pub status: EngagementStatus,
    pub notes: String,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    #[serde(default)]
    pub decision_criteria: Vec<DecisionCriterion>,
    #[serde(default)]
    pub team_members: Vec<TeamMember>,
    #[serde(default)]
    pub device_scopes: Vec<DeviceScope>,
    #[serde(default)]
    pub working_sessions: Vec<WorkingSession>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub activity_log: Vec<ActivityLogEntry>,
    #[serde(default)]
    pub business_services: Vec<BusinessService>,
}

impl Engagement {
    /// Empty aggregate around root fields
    #[must_use]
    pub fn from_fields(fields: EngagementFields) -> Self {
        Self {
            id: fields.id,
            title: fields.title,
            customer_name: fields.customer_name,
            status: fields.status,
            notes: fields.notes,
            created_by: fields.created_by,
            created_at: fields.created_at,
            updated_at: fields.updated_at,
            challenges: Vec::new(),
            decision_criteria: Vec::new(),
            team_members: Vec::new(),
            device_scopes: Vec::new(),
            working_sessions: Vec::new(),
            comments: Vec::new(),
            documents: Vec::new(),
            activity_log: Vec::new(),
            business_services: Vec::new(),
        }
    }

    /// Root scalar fields
    #[must_use]
    pub fn fields(&self) -> EngagementFields {
        EngagementFields {
            id: self.id,
            title: self.title.clone(),
            customer_name: self.customer_name.clone(),
            status: self.status,
            notes: self.notes.clone(),
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Overwrite root scalar fields, keeping collections
    pub fn set_fields(&mut self, fields: EngagementFields) {
        self.title = fields.title;
        self.customer_name = fields.customer_name;
        self.status = fields.status;
        self.notes = fields.notes;
        self.created_by = fields.created_by;
        self.created_at = fields.created_at;
        self.updated_at = fields.updated_at;
    }

    /// Put every ordered collection in canonical order
    ///
    /// Outcomes and activities by index, session activities by display
    /// order, activity log newest first.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for challenge in &mut self.challenges {
            challenge.sort_outcomes();
        }
        for criterion in &mut self.decision_criteria {
            criterion.sort_activities();
        }
        for session in &mut self.working_sessions {
            session.sort_activities();
        }
        self.activity_log
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self
    }

    /// Locate a criterion activity anywhere in the aggregate
    #[must_use]
    pub fn criterion_activity(
        &self,
        id: CriterionActivityId,
    ) -> Option<(&DecisionCriterion, &CriterionActivity)> {
        self.decision_criteria
            .iter()
            .find_map(|c| c.activity(id).map(|a| (c, a)))
    }

    /// Display text of a session activity; linked activities resolve by lookup
    #[must_use]
    pub fn activity_text<'a>(&'a self, activity: &'a SessionActivity) -> Option<&'a str> {
        match &activity.kind {
            SessionActivityKind::Custom { text } => Some(text.as_str()),
            SessionActivityKind::Linked {
                criterion_activity_id,
            } => self
                .criterion_activity(*criterion_activity_id)
                .map(|(_, a)| a.text.as_str()),
        }
    }

    /// Sessions scheduling the given criterion activity
    pub fn sessions_linking(
        &self,
        id: CriterionActivityId,
    ) -> impl Iterator<Item = &WorkingSession> + '_ {
        self.working_sessions
            .iter()
            .filter(move |s| s.linked_ids().any(|linked| linked == id))
    }

    /// List-view summary derived from the current tree
    #[must_use]
    pub fn summary(&self) -> EngagementSummary {
        EngagementSummary {
            id: self.id,
            title: self.title.clone(),
            customer_name: self.customer_name.clone(),
            status: self.status,
            challenge_count: self.challenges.len(),
            open_challenge_count: self
                .challenges
                .iter()
                .filter(|c| c.status != WorkStatus::Completed)
                .count(),
            criteria_count: self.decision_criteria.len(),
            criteria_met_count: self
                .decision_criteria
                .iter()
                .filter(|c| c.status == CriterionStatus::Met)
                .count(),
            team_size: self.team_members.len(),
            scheduled_session_count: self
                .working_sessions
                .iter()
                .filter(|s| s.status == SessionStatus::Scheduled)
                .count(),
            updated_at: self.updated_at,
        }
    }
}

/// Row shown in engagement list views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub id: EngagementId,
    pub title: String,
    pub customer_name: String,
    pub status: EngagementStatus,
    #[serde(default)]
    pub challenge_count: usize,
    #[serde(default)]
    pub open_challenge_count: usize,
    #[serde(default)]
    pub criteria_count: usize,
    #[serde(default)]
    pub criteria_met_count: usize,
    #[serde(default)]
    pub team_size: usize,
    #[serde(default)]
    pub scheduled_session_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl EngagementSummary {
    /// Summary with zero counts, for rows read without their children
    #[must_use]
    pub fn from_fields(fields: &EngagementFields) -> Self {
        Self {
            id: fields.id,
            title: fields.title.clone(),
            customer_name: fields.customer_name.clone(),
            status: fields.status,
            challenge_count: 0,
            open_challenge_count: 0,
            criteria_count: 0,
            criteria_met_count: 0,
            team_size: 0,
            scheduled_session_count: 0,
            updated_at: fields.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{CriterionId, SessionActivityId, SessionId};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn fields() -> EngagementFields {
        let now = Utc::now();
        EngagementFields {
            id: EngagementId::new(),
            title: "Acme POV".into(),
            customer_name: "Acme Corp".into(),
            status: EngagementStatus::Planning,
            notes: String::new(),
            created_by: ActorId::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn log_kinds_use_wire_tags() {
        let tags: Vec<String> = [
            LogKind::Status,
            LogKind::Challenge,
            LogKind::Team,
            LogKind::Session,
            LogKind::Criteria,
            LogKind::Comment,
            LogKind::Document,
            LogKind::Device,
            LogKind::Service,
        ]
        .iter()
        .map(|k| serde_json::to_string(k).unwrap())
        .collect();
        assert_eq!(
            tags,
            [
                "\"STATUS\"",
                "\"CHALLENGE\"",
                "\"TEAM\"",
                "\"SESSION\"",
                "\"CRITERIA\"",
                "\"COMMENT\"",
                "\"DOCUMENT\"",
                "\"DEVICE\"",
                "\"SERVICE\"",
            ]
        );
    }

    #[test]
    fn missing_collections_deserialize_empty() {
        let f = fields();
        let value = serde_json::to_value(&f).unwrap();
        let engagement: Engagement = serde_json::from_value(value).unwrap();
        assert!(engagement.challenges.is_empty());
        assert!(engagement.activity_log.is_empty());
        assert!(engagement.business_services.is_empty());
        assert_eq!(engagement.fields(), f);
    }

    #[test]
    fn normalized_orders_log_newest_first() {
        let mut engagement = Engagement::from_fields(fields());
        let base = Utc::now();
        for offset in [0, 2, 1] {
            engagement.activity_log.push(ActivityLogEntry {
                id: LogEntryId::new(),
                engagement_id: engagement.id,
                kind: LogKind::Status,
                title: format!("entry {offset}"),
                description: String::new(),
                reference_id: None,
                author_id: ActorId::new(),
                author_email: "a@b.c".into(),
                author_name: "A".into(),
                created_at: base + Duration::seconds(offset),
            });
        }

        let engagement = engagement.normalized();
        let titles: Vec<_> = engagement
            .activity_log
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(titles, vec!["entry 2", "entry 1", "entry 0"]);
    }

    #[test]
    fn linked_activity_text_resolves_by_lookup() {
        let mut engagement = Engagement::from_fields(fields());
        let criterion_id = CriterionId::new();
        let activity_id = CriterionActivityId::new();
        let now = Utc::now();
        engagement.decision_criteria.push(DecisionCriterion {
            id: criterion_id,
            engagement_id: engagement.id,
            title: "Detect lateral movement".into(),
            success_criteria: String::new(),
            use_case: String::new(),
            status: CriterionStatus::Pending,
            categories: Default::default(),
            activities: vec![CriterionActivity {
                id: activity_id,
                criterion_id,
                text: "Run attack simulation".into(),
                order_index: 0,
                status: WorkStatus::Open,
            }],
            created_at: now,
            updated_at: now,
        });

        let session_activity = SessionActivity {
            id: SessionActivityId::new(),
            session_id: SessionId::new(),
            display_order: 0,
            status: WorkStatus::Open,
            kind: SessionActivityKind::Linked {
                criterion_activity_id: activity_id,
            },
        };

        assert_eq!(
            engagement.activity_text(&session_activity),
            Some("Run attack simulation")
        );
    }
}
