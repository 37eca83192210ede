//! Working sessions and their scheduled activities

use crate::ids::{CriterionActivityId, EngagementId, SessionActivityId, SessionId};
use crate::status::{SessionStatus, WorkStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a session activity refers to
///
/// The two variants are mutually exclusive. A linked activity shares status
/// with the criterion activity it references and stores no text of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionActivityKind {
    /// Scheduled decision-criterion activity
    Linked {
        criterion_activity_id: CriterionActivityId,
    },
    /// Free-standing item with literal text
    Custom { text: String },
}

impl SessionActivityKind {
    /// Referenced criterion activity, if linked
    #[inline]
    #[must_use]
    pub fn criterion_activity_id(&self) -> Option<CriterionActivityId> {
        match self {
            Self::Linked {
                criterion_activity_id,
            } => Some(*criterion_activity_id),
            Self::Custom { .. } => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked { .. })
    }
}

/// Activity scheduled within a working session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionActivity {
    pub id: SessionActivityId,
    pub session_id: SessionId,
    pub display_order: u32,
    pub status: WorkStatus,
    #[serde(flatten)]
    pub kind: SessionActivityKind,
}

/// Scheduled working session with the customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingSession {
    pub id: SessionId,
    pub engagement_id: EngagementId,
    pub title: String,
    pub status: SessionStatus,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub notes: String,
    #[serde(default)]
    pub activities: Vec<SessionActivity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkingSession {
    /// Sort activities by `display_order`
    pub fn sort_activities(&mut self) {
        self.activities.sort_by_key(|a| a.display_order);
    }

    /// Criterion activities referenced from this session
    pub fn linked_ids(&self) -> impl Iterator<Item = CriterionActivityId> + '_ {
        self.activities
            .iter()
            .filter_map(|a| a.kind.criterion_activity_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_kind_is_flattened_and_tagged() {
        let target = CriterionActivityId::new();
        let activity = SessionActivity {
            id: SessionActivityId::new(),
            session_id: SessionId::new(),
            display_order: 0,
            status: WorkStatus::Open,
            kind: SessionActivityKind::Linked {
                criterion_activity_id: target,
            },
        };

        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["kind"], "linked");
        assert_eq!(value["criterion_activity_id"], target.to_string());

        let custom: SessionActivity = serde_json::from_value(serde_json::json!({
            "id": SessionActivityId::new(),
            "session_id": SessionId::new(),
            "display_order": 1,
            "status": "IN_PROGRESS",
            "kind": "custom",
            "text": "Review dashboards"
        }))
        .unwrap();
        assert_eq!(
            custom.kind,
            SessionActivityKind::Custom {
                text: "Review dashboards".into()
            }
        );
        assert!(custom.kind.criterion_activity_id().is_none());
    }
}
