//! Store action vocabulary
//!
//! A closed sum type: every transition the store can make is a variant, and
//! the reducer matches exhaustively. There is no fallthrough for unknown
//! actions.

use crate::item::CollectionItem;
use pov_model::{
    ActivityLogEntry, BusinessService, Challenge, Comment, CriterionActivityId, DecisionCriterion,
    DeviceScope, Document, Engagement, EngagementFields, EngagementId, EngagementSummary,
    TeamMember, WorkStatus, WorkingSession,
};

/// Transition on one owned collection
#[derive(Debug, Clone)]
pub enum CollectionAction<T: CollectionItem> {
    /// Replace the whole collection
    Set(Vec<T>),
    /// Append (or prepend, for the activity log) one item
    Add(T),
    /// Merge into the sibling with the matching id
    Update(T::Update),
    /// Remove the item with this id
    Delete(T::Id),
}

impl<T: CollectionItem> CollectionAction<T> {
    /// Verb for tracing
    #[inline]
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Set(_) => "set",
            Self::Add(_) => "add",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// Every state transition the aggregate store supports
#[derive(Debug, Clone)]
pub enum Action {
    /// Install a freshly loaded aggregate
    LoadRoot(Box<Engagement>),
    /// Replace root scalar fields, keeping collections
    ReplaceRoot(EngagementFields),
    /// Drop the loaded aggregate
    ClearRoot,

    Challenges(CollectionAction<Challenge>),
    DecisionCriteria(CollectionAction<DecisionCriterion>),
    TeamMembers(CollectionAction<TeamMember>),
    DeviceScopes(CollectionAction<DeviceScope>),
    WorkingSessions(CollectionAction<WorkingSession>),
    Comments(CollectionAction<Comment>),
    Documents(CollectionAction<Document>),
    ActivityLog(CollectionAction<ActivityLogEntry>),
    BusinessServices(CollectionAction<BusinessService>),

    /// Set a criterion activity's status and mirror it onto linked session activities
    SetCriterionActivityStatus {
        activity_id: CriterionActivityId,
        status: WorkStatus,
    },

    /// Replace the list-view summaries
    SetSummaries(Vec<EngagementSummary>),
    /// Insert or replace one summary row
    UpsertSummary(EngagementSummary),
    /// Remove one summary row
    RemoveSummary(EngagementId),

    SetLoading(bool),
    SetError(Option<String>),
}

impl Action {
    /// Collection or concern the action targets, for tracing
    #[must_use]
    pub fn target(&self) -> &'static str {
        match self {
            Self::LoadRoot(_) | Self::ReplaceRoot(_) | Self::ClearRoot => "root",
            Self::Challenges(_) => "challenges",
            Self::DecisionCriteria(_) | Self::SetCriterionActivityStatus { .. } => {
                "decision_criteria"
            }
            Self::TeamMembers(_) => "team_members",
            Self::DeviceScopes(_) => "device_scopes",
            Self::WorkingSessions(_) => "working_sessions",
            Self::Comments(_) => "comments",
            Self::Documents(_) => "documents",
            Self::ActivityLog(_) => "activity_log",
            Self::BusinessServices(_) => "business_services",
            Self::SetSummaries(_) | Self::UpsertSummary(_) | Self::RemoveSummary(_) => "summaries",
            Self::SetLoading(_) => "loading",
            Self::SetError(_) => "error",
        }
    }

    /// Verb for tracing
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::LoadRoot(_) => "load",
            Self::ReplaceRoot(_) => "replace",
            Self::ClearRoot => "clear",
            Self::Challenges(a) => a.verb(),
            Self::DecisionCriteria(a) => a.verb(),
            Self::TeamMembers(a) => a.verb(),
            Self::DeviceScopes(a) => a.verb(),
            Self::WorkingSessions(a) => a.verb(),
            Self::Comments(a) => a.verb(),
            Self::Documents(a) => a.verb(),
            Self::ActivityLog(a) => a.verb(),
            Self::BusinessServices(a) => a.verb(),
            Self::SetCriterionActivityStatus { .. } => "set_activity_status",
            Self::SetSummaries(_) | Self::SetLoading(_) | Self::SetError(_) => "set",
            Self::UpsertSummary(_) => "upsert",
            Self::RemoveSummary(_) => "remove",
        }
    }
}
