//! Backend row shapes
//!
//! One struct per table. Ids are raw UUIDs; a nil id is omitted on insert
//! so the backend generates one. Conversions into the aggregate model live
//! next to each row.

use super::{ScopedRow, Table, TableRow};
use crate::error::GatewayError;
use chrono::{DateTime, Utc};
use pov_model::{
    ActivityLogEntry, BusinessService, Challenge, ChallengeTemplate, Comment, CriterionActivity,
    CriterionStatus, DecisionCriterion, DeviceScope, Document, EngagementFields,
    EngagementStatus, LogKind, Outcome, Person, Priority, SessionActivity, SessionActivityKind,
    SessionStatus, TeamMember, WorkStatus, WorkingSession,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

macro_rules! table_row {
    ($($row:ty => $table:ident),+ $(,)?) => {
        $(
            impl TableRow for $row {
                const TABLE: Table = Table::$table;

                fn id(&self) -> Uuid {
                    self.id
                }
            }
        )+
    };
}

macro_rules! scoped_row {
    ($($row:ty),+ $(,)?) => {
        $(
            impl ScopedRow for $row {
                fn engagement_id(&self) -> Uuid {
                    self.engagement_id
                }
            }
        )+
    };
}

table_row!(
    EngagementRow => Engagements,
    ChallengeRow => Challenges,
    OutcomeRow => ChallengeOutcomes,
    ChallengeCategoryRow => ChallengeCategories,
    TemplateRow => ChallengeTemplates,
    CriterionRow => DecisionCriteria,
    CriterionCategoryRow => CriterionCategories,
    CriterionActivityRow => CriterionActivities,
    PersonRow => People,
    TeamMemberRow => TeamMembers,
    DeviceScopeRow => DeviceScopes,
    BusinessServiceRow => BusinessServices,
    SessionRow => WorkingSessions,
    SessionActivityRow => SessionActivities,
    CommentRow => Comments,
    DocumentRow => Documents,
    ActivityLogRow => ActivityLog,
);

scoped_row!(
    ChallengeRow,
    CriterionRow,
    TeamMemberRow,
    DeviceScopeRow,
    BusinessServiceRow,
    SessionRow,
    CommentRow,
    DocumentRow,
    ActivityLogRow,
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub title: String,
    pub customer_name: String,
    pub status: EngagementStatus,
    pub notes: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EngagementRow> for EngagementFields {
    fn from(row: EngagementRow) -> Self {
        Self {
            id: row.id.into(),
            title: row.title,
            customer_name: row.customer_name,
            status: row.status,
            notes: row.notes,
            created_by: row.created_by.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&EngagementFields> for EngagementRow {
    fn from(fields: &EngagementFields) -> Self {
        Self {
            id: fields.id.into(),
            title: fields.title.clone(),
            customer_name: fields.customer_name.clone(),
            status: fields.status,
            notes: fields.notes.clone(),
            created_by: fields.created_by.into(),
            created_at: fields.created_at,
            updated_at: fields.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub engagement_id: Uuid,
    pub title: String,
    pub description: String,
    pub business_impact: String,
    pub example: Option<String>,
    pub status: WorkStatus,
    pub template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChallengeRow {
    /// Join the parent row with its outcome and category rows
    #[must_use]
    pub fn assemble(
        self,
        outcomes: Vec<OutcomeRow>,
        categories: Vec<ChallengeCategoryRow>,
    ) -> Challenge {
        let mut challenge = Challenge {
            id: self.id.into(),
            engagement_id: self.engagement_id.into(),
            title: self.title,
            description: self.description,
            business_impact: self.business_impact,
            example: self.example,
            status: self.status,
            outcomes: outcomes
                .into_iter()
                .map(|o| Outcome::new(o.text, o.order_index))
                .collect(),
            categories: categories.into_iter().map(|c| c.category).collect(),
            template_id: self.template_id.map(Into::into),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        challenge.sort_outcomes();
        challenge
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub challenge_id: Uuid,
    pub text: String,
    pub order_index: u32,
}

impl OutcomeRow {
    /// Rows for an ordered list of outcome texts
    pub fn for_challenge<'a>(
        challenge_id: Uuid,
        texts: impl IntoIterator<Item = &'a String>,
    ) -> Vec<Self> {
        texts
            .into_iter()
            .zip(0u32..)
            .map(|(text, order_index)| Self {
                id: Uuid::nil(),
                challenge_id,
                text: text.trim().to_string(),
                order_index,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeCategoryRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub challenge_id: Uuid,
    pub category: String,
}

impl ChallengeCategoryRow {
    /// Junction rows for a set of category names
    pub fn for_challenge<'a>(
        challenge_id: Uuid,
        categories: impl IntoIterator<Item = &'a String>,
    ) -> Vec<Self> {
        dedup(categories)
            .into_iter()
            .map(|category| Self {
                id: Uuid::nil(),
                challenge_id,
                category,
            })
            .collect()
    }
}

/// Library template; outcomes and categories are stored inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub business_impact: String,
    pub example: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub outcomes: Vec<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<TemplateRow> for ChallengeTemplate {
    fn from(row: TemplateRow) -> Self {
        Self {
            id: row.id.into(),
            title: row.title,
            description: row.description,
            business_impact: row.business_impact,
            example: row.example,
            categories: row.categories.into_iter().collect(),
            outcomes: Outcome::from_texts(row.outcomes),
            created_by: row.created_by.map(Into::into),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub engagement_id: Uuid,
    pub title: String,
    pub success_criteria: String,
    pub use_case: String,
    pub status: CriterionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CriterionRow {
    /// Join the parent row with its category and activity rows
    #[must_use]
    pub fn assemble(
        self,
        categories: Vec<CriterionCategoryRow>,
        activities: Vec<CriterionActivityRow>,
    ) -> DecisionCriterion {
        let mut criterion = DecisionCriterion {
            id: self.id.into(),
            engagement_id: self.engagement_id.into(),
            title: self.title,
            success_criteria: self.success_criteria,
            use_case: self.use_case,
            status: self.status,
            categories: categories.into_iter().map(|c| c.category).collect(),
            activities: activities.into_iter().map(Into::into).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        criterion.sort_activities();
        criterion
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionCategoryRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub criterion_id: Uuid,
    pub category: String,
}

impl CriterionCategoryRow {
    pub fn for_criterion<'a>(
        criterion_id: Uuid,
        categories: impl IntoIterator<Item = &'a String>,
    ) -> Vec<Self> {
        dedup(categories)
            .into_iter()
            .map(|category| Self {
                id: Uuid::nil(),
                criterion_id,
                category,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionActivityRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub criterion_id: Uuid,
    pub text: String,
    pub order_index: u32,
    pub status: WorkStatus,
}

impl From<CriterionActivityRow> for CriterionActivity {
    fn from(row: CriterionActivityRow) -> Self {
        Self {
            id: row.id.into(),
            criterion_id: row.criterion_id.into(),
            text: row.text,
            order_index: row.order_index,
            status: row.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub organization: String,
}

impl From<PersonRow> for Person {
    fn from(row: PersonRow) -> Self {
        Self {
            id: row.id.into(),
            email: row.email,
            name: row.name,
            role: row.role,
            organization: row.organization,
        }
    }
}

/// Association between an engagement and a person, with a snapshot of
/// the person's details taken when they joined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMemberRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub engagement_id: Uuid,
    pub person_id: Uuid,
    pub name: String,
    pub role: String,
    pub organization: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<TeamMemberRow> for TeamMember {
    fn from(row: TeamMemberRow) -> Self {
        Self {
            id: row.id.into(),
            engagement_id: row.engagement_id.into(),
            person_id: row.person_id.into(),
            name: row.name,
            role: row.role,
            organization: row.organization,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceScopeRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub engagement_id: Uuid,
    pub device_type: String,
    pub category: String,
    pub count: u32,
    pub priority: Priority,
    pub notes: String,
    pub status: WorkStatus,
    #[serde(default)]
    pub from_onboarding_template: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DeviceScopeRow> for DeviceScope {
    fn from(row: DeviceScopeRow) -> Self {
        Self {
            id: row.id.into(),
            engagement_id: row.engagement_id.into(),
            device_type: row.device_type,
            category: row.category,
            count: row.count,
            priority: row.priority,
            notes: row.notes,
            status: row.status,
            from_onboarding_template: row.from_onboarding_template,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessServiceRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub engagement_id: Uuid,
    pub name: String,
    pub description: String,
    pub criticality: Priority,
    pub owner: Option<String>,
    pub notes: String,
    pub status: WorkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BusinessServiceRow> for BusinessService {
    fn from(row: BusinessServiceRow) -> Self {
        Self {
            id: row.id.into(),
            engagement_id: row.engagement_id.into(),
            name: row.name,
            description: row.description,
            criticality: row.criticality,
            owner: row.owner,
            notes: row.notes,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub engagement_id: Uuid,
    pub title: String,
    pub status: SessionStatus,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRow {
    /// Join the session row with its activity rows
    ///
    /// # Errors
    /// When an activity row is neither linked nor custom
    pub fn assemble(
        self,
        activities: Vec<SessionActivityRow>,
    ) -> Result<WorkingSession, GatewayError> {
        let mut session = WorkingSession {
            id: self.id.into(),
            engagement_id: self.engagement_id.into(),
            title: self.title,
            status: self.status,
            scheduled_at: self.scheduled_at,
            duration_minutes: self.duration_minutes,
            notes: self.notes,
            activities: activities
                .into_iter()
                .map(SessionActivityRow::into_activity)
                .collect::<Result<_, _>>()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        session.sort_activities();
        Ok(session)
    }
}

/// Session activity; exactly one of `criterion_activity_id` or `text` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionActivityRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub session_id: Uuid,
    pub display_order: u32,
    pub status: WorkStatus,
    pub criterion_activity_id: Option<Uuid>,
    pub text: Option<String>,
}

impl SessionActivityRow {
    #[must_use]
    pub fn new(session_id: Uuid, display_order: u32, kind: &SessionActivityKind, status: WorkStatus) -> Self {
        let (criterion_activity_id, text) = match kind {
            SessionActivityKind::Linked {
                criterion_activity_id,
            } => (Some(criterion_activity_id.as_uuid()), None),
            SessionActivityKind::Custom { text } => (None, Some(text.trim().to_string())),
        };
        Self {
            id: Uuid::nil(),
            session_id,
            display_order,
            status,
            criterion_activity_id,
            text,
        }
    }

    /// Convert into the model, rejecting rows with an ambiguous kind
    ///
    /// # Errors
    /// [`GatewayError::Serialization`] when both or neither column is set
    pub fn into_activity(self) -> Result<SessionActivity, GatewayError> {
        let kind = match (self.criterion_activity_id, self.text) {
            (Some(id), None) => SessionActivityKind::Linked {
                criterion_activity_id: id.into(),
            },
            (None, Some(text)) => SessionActivityKind::Custom { text },
            _ => {
                return Err(GatewayError::Serialization {
                    table: Table::SessionActivities,
                    message: format!("activity {} must be either linked or custom", self.id),
                })
            }
        };
        Ok(SessionActivity {
            id: self.id.into(),
            session_id: self.session_id.into(),
            display_order: self.display_order,
            status: self.status,
            kind,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub engagement_id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub author_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id.into(),
            engagement_id: row.engagement_id.into(),
            content: row.content,
            author_id: row.author_id.into(),
            author_email: row.author_email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub engagement_id: Uuid,
    pub name: String,
    pub description: String,
    pub bucket: String,
    pub path: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub author_id: Uuid,
    pub author_email: String,
    pub created_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id.into(),
            engagement_id: row.engagement_id.into(),
            name: row.name,
            description: row.description,
            bucket: row.bucket,
            path: row.path,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            author_id: row.author_id.into(),
            author_email: row.author_email,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogRow {
    #[serde(default = "Uuid::nil", skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    pub engagement_id: Uuid,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub title: String,
    pub description: String,
    pub reference_id: Option<Uuid>,
    pub author_id: Uuid,
    pub author_email: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityLogRow> for ActivityLogEntry {
    fn from(row: ActivityLogRow) -> Self {
        Self {
            id: row.id.into(),
            engagement_id: row.engagement_id.into(),
            kind: row.kind,
            title: row.title,
            description: row.description,
            reference_id: row.reference_id,
            author_id: row.author_id.into(),
            author_email: row.author_email,
            author_name: row.author_name,
            created_at: row.created_at,
        }
    }
}

/// Trimmed, de-duplicated names in first-seen order
fn dedup<'a>(names: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ext::{decode, encode};

    #[test]
    fn nil_ids_are_omitted_on_insert() {
        let row = OutcomeRow {
            id: Uuid::nil(),
            challenge_id: Uuid::new_v4(),
            text: "Faster triage".into(),
            order_index: 0,
        };
        let record = encode(&row).unwrap();
        assert!(!record.contains_key("id"));

        let back: OutcomeRow = decode(record).unwrap();
        assert!(back.id.is_nil());
    }

    #[test]
    fn category_rows_are_deduplicated() {
        let names = vec!["ops".to_string(), " ops ".to_string(), "security".to_string()];
        let rows = ChallengeCategoryRow::for_challenge(Uuid::new_v4(), &names);
        let categories: Vec<_> = rows.into_iter().map(|r| r.category).collect();
        assert_eq!(categories, vec!["ops", "security"]);
    }

    #[test]
    fn ambiguous_session_activity_is_rejected() {
        let row = SessionActivityRow {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            display_order: 0,
            status: WorkStatus::Open,
            criterion_activity_id: None,
            text: None,
        };
        assert!(matches!(
            row.into_activity(),
            Err(GatewayError::Serialization { .. })
        ));
    }

    #[test]
    fn outcome_rows_follow_submission_order() {
        let texts = vec!["b".to_string(), "a".to_string()];
        let rows = OutcomeRow::for_challenge(Uuid::new_v4(), &texts);
        assert_eq!(rows[0].text, "b");
        assert_eq!(rows[0].order_index, 0);
        assert_eq!(rows[1].order_index, 1);
    }
}
