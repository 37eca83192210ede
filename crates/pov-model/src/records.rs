//! Flat child records: team members, device scopes, business services,
//! comments and documents

use crate::ids::{
    ActorId, BusinessServiceId, CommentId, DeviceScopeId, DocumentId, EngagementId, PersonId,
    TeamMemberId,
};
use crate::status::{Priority, WorkStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global person directory entry, deduplicated by email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub email: String,
    pub name: String,
    pub role: String,
    pub organization: String,
}

/// Association between a person and an engagement
///
/// Name, role, organization and email are a snapshot taken when the person
/// joined; editing the association does not touch the directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: TeamMemberId,
    pub engagement_id: EngagementId,
    pub person_id: PersonId,
    pub name: String,
    pub role: String,
    pub organization: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Device class in scope for the engagement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceScope {
    pub id: DeviceScopeId,
    pub engagement_id: EngagementId,
    pub device_type: String,
    pub category: String,
    pub count: u32,
    pub priority: Priority,
    pub notes: String,
    pub status: WorkStatus,
    /// Seeded from an onboarding template rather than entered by hand
    #[serde(default)]
    pub from_onboarding_template: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Business service the customer wants covered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessService {
    pub id: BusinessServiceId,
    pub engagement_id: EngagementId,
    pub name: String,
    pub description: String,
    pub criticality: Priority,
    pub owner: Option<String>,
    pub notes: String,
    pub status: WorkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Discussion comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub engagement_id: EngagementId,
    pub content: String,
    pub author_id: ActorId,
    pub author_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Uploaded document; the blob lives in external storage at `bucket/path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub engagement_id: EngagementId,
    pub name: String,
    pub description: String,
    pub bucket: String,
    pub path: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub author_id: ActorId,
    pub author_email: String,
    pub created_at: DateTime<Utc>,
}
