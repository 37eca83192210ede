//! Decision criteria and their activities

use crate::ids::{CriterionActivityId, CriterionId, EngagementId};
use crate::status::{CriterionStatus, WorkStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ordered activity under a decision criterion
///
/// The id is load-bearing: a working session may schedule the activity by
/// reference, and at most one session activity per engagement may do so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionActivity {
    pub id: CriterionActivityId,
    pub criterion_id: CriterionId,
    pub text: String,
    pub order_index: u32,
    pub status: WorkStatus,
}

/// Success criterion for the engagement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionCriterion {
    pub id: CriterionId,
    pub engagement_id: EngagementId,
    pub title: String,
    pub success_criteria: String,
    pub use_case: String,
    pub status: CriterionStatus,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub activities: Vec<CriterionActivity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DecisionCriterion {
    /// Sort activities by `order_index`
    pub fn sort_activities(&mut self) {
        self.activities.sort_by_key(|a| a.order_index);
    }

    /// Find an owned activity
    #[must_use]
    pub fn activity(&self, id: CriterionActivityId) -> Option<&CriterionActivity> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// Ids of all owned activities
    pub fn activity_ids(&self) -> impl Iterator<Item = CriterionActivityId> + '_ {
        self.activities.iter().map(|a| a.id)
    }
}

/// Store update for a decision criterion; nested collections merge only if present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionUpdate {
    pub id: CriterionId,
    pub title: String,
    pub success_criteria: String,
    pub use_case: String,
    pub status: CriterionStatus,
    pub updated_at: DateTime<Utc>,
    pub categories: Option<BTreeSet<String>>,
    pub activities: Option<Vec<CriterionActivity>>,
}

impl CriterionUpdate {
    /// Drop nested collections, keeping only scalar fields
    #[inline]
    #[must_use]
    pub fn scalars_only(mut self) -> Self {
        self.categories = None;
        self.activities = None;
        self
    }
}

impl From<DecisionCriterion> for CriterionUpdate {
    fn from(c: DecisionCriterion) -> Self {
        Self {
            id: c.id,
            title: c.title,
            success_criteria: c.success_criteria,
            use_case: c.use_case,
            status: c.status,
            updated_at: c.updated_at,
            categories: Some(c.categories),
            activities: Some(c.activities),
        }
    }
}
