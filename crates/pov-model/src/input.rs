//! Operation payloads submitted by the presentation layer
//!
//! Engagement-scoped payloads carry `engagement_id` as an `Option` because
//! they are deserialized from forms; a missing relation is reported as a
//! validation failure rather than a deserialization error.

use crate::ids::{
    BusinessServiceId, ChallengeId, CommentId, CriterionActivityId, CriterionId, DeviceScopeId,
    EngagementId, SessionId, TeamMemberId, TemplateId,
};
use crate::session::SessionActivityKind;
use crate::status::{CriterionStatus, EngagementStatus, Priority, SessionStatus, WorkStatus};
use crate::validation::{
    optional_text, require_email, require_text, EngagementScoped, Validate, ValidationError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Keep "absent" and "null" apart for clearable fields: absent is `None`,
/// `null` is `Some(None)`
fn clearable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

macro_rules! engagement_scoped {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl EngagementScoped for $ty {
                fn engagement_id(&self) -> Option<EngagementId> {
                    self.engagement_id
                }
            }
        )+
    };
}

/// New engagement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEngagement {
    pub title: String,
    pub customer_name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: Option<EngagementStatus>,
}

impl Validate for NewEngagement {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        require_text("customer_name", &self.customer_name)
    }
}

/// Root scalar edit; absent fields are kept
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementPatch {
    pub engagement_id: Option<EngagementId>,
    pub title: Option<String>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
}

impl Validate for EngagementPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("title", self.title.as_ref())?;
        optional_text("customer_name", self.customer_name.as_ref())
    }
}

/// New challenge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewChallenge {
    pub engagement_id: Option<EngagementId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub business_impact: String,
    pub example: Option<String>,
    pub status: Option<WorkStatus>,
    /// Outcome texts in display order
    #[serde(default)]
    pub outcomes: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Also publish the challenge as a library template
    #[serde(default)]
    pub to_library: bool,
}

impl Validate for NewChallenge {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        validate_texts("outcomes", &self.outcomes)?;
        validate_texts("categories", &self.categories)
    }
}

/// Instantiate a library template into an engagement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeFromTemplate {
    pub engagement_id: Option<EngagementId>,
    pub template_id: TemplateId,
}

impl Validate for ChallengeFromTemplate {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Challenge edit; `Some` collections are replaced wholesale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengePatch {
    pub engagement_id: Option<EngagementId>,
    pub id: ChallengeId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub business_impact: Option<String>,
    /// `Some(None)` clears the example
    #[serde(default, deserialize_with = "clearable")]
    pub example: Option<Option<String>>,
    pub status: Option<WorkStatus>,
    pub outcomes: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
}

impl ChallengePatch {
    #[must_use]
    pub fn new(engagement_id: EngagementId, id: ChallengeId) -> Self {
        Self {
            engagement_id: Some(engagement_id),
            id,
            title: None,
            description: None,
            business_impact: None,
            example: None,
            status: None,
            outcomes: None,
            categories: None,
        }
    }
}

impl Validate for ChallengePatch {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("title", self.title.as_ref())?;
        if let Some(outcomes) = &self.outcomes {
            validate_texts("outcomes", outcomes)?;
        }
        if let Some(categories) = &self.categories {
            validate_texts("categories", categories)?;
        }
        Ok(())
    }
}

/// New decision criterion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCriterion {
    pub engagement_id: Option<EngagementId>,
    pub title: String,
    #[serde(default)]
    pub success_criteria: String,
    #[serde(default)]
    pub use_case: String,
    pub status: Option<CriterionStatus>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Activity texts in display order
    #[serde(default)]
    pub activities: Vec<String>,
}

impl Validate for NewCriterion {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        validate_texts("categories", &self.categories)?;
        validate_texts("activities", &self.activities)
    }
}

/// Criterion activity in an edit; existing ids are kept so schedules survive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionActivityInput {
    pub id: Option<CriterionActivityId>,
    pub text: String,
    #[serde(default)]
    pub status: WorkStatus,
}

impl CriterionActivityInput {
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            status: WorkStatus::Open,
        }
    }

    #[inline]
    #[must_use]
    pub fn existing(id: CriterionActivityId, text: impl Into<String>, status: WorkStatus) -> Self {
        Self {
            id: Some(id),
            text: text.into(),
            status,
        }
    }
}

/// Decision criterion edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionPatch {
    pub engagement_id: Option<EngagementId>,
    pub id: CriterionId,
    pub title: Option<String>,
    pub success_criteria: Option<String>,
    pub use_case: Option<String>,
    pub status: Option<CriterionStatus>,
    pub categories: Option<Vec<String>>,
    pub activities: Option<Vec<CriterionActivityInput>>,
}

impl CriterionPatch {
    #[must_use]
    pub fn new(engagement_id: EngagementId, id: CriterionId) -> Self {
        Self {
            engagement_id: Some(engagement_id),
            id,
            title: None,
            success_criteria: None,
            use_case: None,
            status: None,
            categories: None,
            activities: None,
        }
    }
}

impl Validate for CriterionPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("title", self.title.as_ref())?;
        if let Some(categories) = &self.categories {
            validate_texts("categories", categories)?;
        }
        if let Some(activities) = &self.activities {
            for activity in activities {
                require_text("activities", &activity.text)?;
            }
            let mut seen = std::collections::HashSet::new();
            if activities
                .iter()
                .filter_map(|a| a.id)
                .any(|id| !seen.insert(id))
            {
                return Err(ValidationError::new("activities", "duplicate activity id"));
            }
        }
        Ok(())
    }
}

/// Person to add to the engagement team
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTeamMember {
    pub engagement_id: Option<EngagementId>,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub organization: String,
}

impl Validate for NewTeamMember {
    fn validate(&self) -> Result<(), ValidationError> {
        require_email("email", &self.email)?;
        require_text("name", &self.name)
    }
}

/// Team association snapshot edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberPatch {
    pub engagement_id: Option<EngagementId>,
    pub id: TeamMemberId,
    pub name: Option<String>,
    pub role: Option<String>,
    pub organization: Option<String>,
}

impl Validate for TeamMemberPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("name", self.name.as_ref())
    }
}

/// New device scope row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDeviceScope {
    pub engagement_id: Option<EngagementId>,
    pub device_type: String,
    #[serde(default)]
    pub category: String,
    pub count: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub notes: String,
    pub status: Option<WorkStatus>,
    #[serde(default)]
    pub from_onboarding_template: bool,
}

impl Validate for NewDeviceScope {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("device_type", &self.device_type)?;
        if self.count == 0 {
            return Err(ValidationError::new("count", "must be at least 1"));
        }
        Ok(())
    }
}

/// Device scope edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceScopePatch {
    pub engagement_id: Option<EngagementId>,
    pub id: DeviceScopeId,
    pub device_type: Option<String>,
    pub category: Option<String>,
    pub count: Option<u32>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    pub status: Option<WorkStatus>,
}

impl Validate for DeviceScopePatch {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("device_type", self.device_type.as_ref())?;
        if self.count == Some(0) {
            return Err(ValidationError::new("count", "must be at least 1"));
        }
        Ok(())
    }
}

/// New business service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBusinessService {
    pub engagement_id: Option<EngagementId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub criticality: Priority,
    pub owner: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub status: Option<WorkStatus>,
}

impl Validate for NewBusinessService {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)
    }
}

/// Business service edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessServicePatch {
    pub engagement_id: Option<EngagementId>,
    pub id: BusinessServiceId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub criticality: Option<Priority>,
    /// `Some(None)` or a blank owner clears it
    #[serde(default, deserialize_with = "clearable")]
    pub owner: Option<Option<String>>,
    pub notes: Option<String>,
    pub status: Option<WorkStatus>,
}

impl Validate for BusinessServicePatch {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("name", self.name.as_ref())
    }
}

/// Session activity as submitted, in the order it should be displayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionActivityInput {
    #[serde(flatten)]
    pub kind: SessionActivityKind,
    #[serde(default)]
    pub status: WorkStatus,
}

impl SessionActivityInput {
    #[inline]
    #[must_use]
    pub fn linked(criterion_activity_id: CriterionActivityId, status: WorkStatus) -> Self {
        Self {
            kind: SessionActivityKind::Linked {
                criterion_activity_id,
            },
            status,
        }
    }

    #[inline]
    #[must_use]
    pub fn custom(text: impl Into<String>, status: WorkStatus) -> Self {
        Self {
            kind: SessionActivityKind::Custom { text: text.into() },
            status,
        }
    }
}

/// New working session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub engagement_id: Option<EngagementId>,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub activities: Vec<SessionActivityInput>,
}

impl Validate for NewSession {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if self.duration_minutes == 0 {
            return Err(ValidationError::new("duration_minutes", "must be positive"));
        }
        validate_session_activities(&self.activities)
    }
}

/// Working session edit; `activities` triggers reconciliation when present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPatch {
    pub engagement_id: Option<EngagementId>,
    pub id: SessionId,
    pub title: Option<String>,
    pub status: Option<SessionStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    pub notes: Option<String>,
    pub activities: Option<Vec<SessionActivityInput>>,
}

impl SessionPatch {
    #[must_use]
    pub fn new(engagement_id: EngagementId, id: SessionId) -> Self {
        Self {
            engagement_id: Some(engagement_id),
            id,
            title: None,
            status: None,
            scheduled_at: None,
            duration_minutes: None,
            notes: None,
            activities: None,
        }
    }
}

impl Validate for SessionPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("title", self.title.as_ref())?;
        if self.duration_minutes == Some(0) {
            return Err(ValidationError::new("duration_minutes", "must be positive"));
        }
        match &self.activities {
            Some(activities) => validate_session_activities(activities),
            None => Ok(()),
        }
    }
}

/// New comment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComment {
    pub engagement_id: Option<EngagementId>,
    pub content: String,
}

impl Validate for NewComment {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("content", &self.content)
    }
}

/// Comment edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentPatch {
    pub engagement_id: Option<EngagementId>,
    pub id: CommentId,
    pub content: String,
}

impl Validate for CommentPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("content", &self.content)
    }
}

/// Document upload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    pub engagement_id: Option<EngagementId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub content_type: String,
    #[serde(default)]
    pub bytes: Vec<u8>,
}

impl Validate for NewDocument {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("content_type", &self.content_type)?;
        if self.name.contains('/') {
            return Err(ValidationError::new("name", "must not contain '/'"));
        }
        Ok(())
    }
}

engagement_scoped!(
    EngagementPatch,
    NewChallenge,
    ChallengeFromTemplate,
    ChallengePatch,
    NewCriterion,
    CriterionPatch,
    NewTeamMember,
    TeamMemberPatch,
    NewDeviceScope,
    DeviceScopePatch,
    NewBusinessService,
    BusinessServicePatch,
    NewSession,
    SessionPatch,
    NewComment,
    CommentPatch,
    NewDocument,
);

fn validate_texts(field: &'static str, texts: &[String]) -> Result<(), ValidationError> {
    texts.iter().try_for_each(|t| require_text(field, t))
}

fn validate_session_activities(activities: &[SessionActivityInput]) -> Result<(), ValidationError> {
    let mut linked = std::collections::HashSet::new();
    for activity in activities {
        match &activity.kind {
            SessionActivityKind::Custom { text } => require_text("activities", text)?,
            SessionActivityKind::Linked {
                criterion_activity_id,
            } => {
                if !linked.insert(*criterion_activity_id) {
                    return Err(ValidationError::new(
                        "activities",
                        "a criterion activity can only be scheduled once",
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_engagement_is_validation_failure() {
        let input = NewChallenge {
            title: "Alert fatigue".into(),
            ..Default::default()
        };
        assert!(input.validate().is_ok());
        assert_eq!(
            input.require_engagement().unwrap_err(),
            ValidationError::missing_engagement()
        );
    }

    #[test]
    fn engagement_id_absent_from_json_deserializes_as_none() {
        let input: NewComment = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert!(input.engagement_id.is_none());
    }

    #[test]
    fn clearable_fields_tell_absent_from_null() {
        let id = ChallengeId::new();
        let absent: ChallengePatch =
            serde_json::from_value(serde_json::json!({ "id": id })).unwrap();
        assert_eq!(absent.example, None);

        let cleared: ChallengePatch =
            serde_json::from_value(serde_json::json!({ "id": id, "example": null })).unwrap();
        assert_eq!(cleared.example, Some(None));

        let set: ChallengePatch =
            serde_json::from_value(serde_json::json!({ "id": id, "example": "SIEM outage" }))
                .unwrap();
        assert_eq!(set.example, Some(Some("SIEM outage".to_string())));
    }

    #[test]
    fn duplicate_linked_activity_rejected() {
        let target = CriterionActivityId::new();
        let session = NewSession {
            engagement_id: Some(EngagementId::new()),
            title: "Kickoff".into(),
            scheduled_at: Utc::now(),
            duration_minutes: 60,
            notes: String::new(),
            activities: vec![
                SessionActivityInput::linked(target, WorkStatus::Open),
                SessionActivityInput::linked(target, WorkStatus::Completed),
            ],
        };
        let err = session.validate().unwrap_err();
        assert_eq!(err.field, "activities");
    }

    #[test]
    fn zero_device_count_rejected() {
        let scope = NewDeviceScope {
            engagement_id: Some(EngagementId::new()),
            device_type: "Laptop".into(),
            count: 0,
            ..Default::default()
        };
        assert_eq!(scope.validate().unwrap_err().field, "count");
    }

    #[test]
    fn criterion_patch_rejects_duplicate_activity_ids() {
        let id = CriterionActivityId::new();
        let mut patch = CriterionPatch::new(EngagementId::new(), CriterionId::new());
        patch.activities = Some(vec![
            CriterionActivityInput::existing(id, "a", WorkStatus::Open),
            CriterionActivityInput::existing(id, "b", WorkStatus::Open),
        ]);
        assert!(patch.validate().is_err());
    }

    #[test]
    fn document_name_must_be_a_single_segment() {
        let doc = NewDocument {
            engagement_id: Some(EngagementId::new()),
            name: "../etc/passwd".into(),
            content_type: "text/plain".into(),
            ..Default::default()
        };
        assert!(doc.validate().is_err());
    }
}
