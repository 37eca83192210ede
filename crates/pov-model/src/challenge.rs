//! Challenges and library templates

use crate::ids::{ChallengeId, EngagementId, PersonId, TemplateId};
use crate::status::WorkStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ordered free-text outcome of a challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub text: String,
    pub order_index: u32,
}

impl Outcome {
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>, order_index: u32) -> Self {
        Self {
            text: text.into(),
            order_index,
        }
    }

    /// Build outcomes from texts, indexed by position
    #[must_use]
    pub fn from_texts<I, S>(texts: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Self::new(text, u32::try_from(i).unwrap_or(u32::MAX)))
            .collect()
    }
}

/// Business challenge the engagement is meant to address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub engagement_id: EngagementId,
    pub title: String,
    pub description: String,
    pub business_impact: String,
    pub example: Option<String>,
    pub status: WorkStatus,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    pub template_id: Option<TemplateId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Challenge {
    /// Sort outcomes by `order_index`
    pub fn sort_outcomes(&mut self) {
        self.outcomes.sort_by_key(|o| o.order_index);
    }
}

/// Store update for a challenge
///
/// Scalars are always replaced. Nested collections are only replaced when
/// present, so a partial update never wipes outcomes or categories it did
/// not carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeUpdate {
    pub id: ChallengeId,
    pub title: String,
    pub description: String,
    pub business_impact: String,
    pub example: Option<String>,
    pub status: WorkStatus,
    pub template_id: Option<TemplateId>,
    pub updated_at: DateTime<Utc>,
    pub outcomes: Option<Vec<Outcome>>,
    pub categories: Option<BTreeSet<String>>,
}

impl ChallengeUpdate {
    /// Drop nested collections, keeping only scalar fields
    #[inline]
    #[must_use]
    pub fn scalars_only(mut self) -> Self {
        self.outcomes = None;
        self.categories = None;
        self
    }
}

impl From<Challenge> for ChallengeUpdate {
    fn from(c: Challenge) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            business_impact: c.business_impact,
            example: c.example,
            status: c.status,
            template_id: c.template_id,
            updated_at: c.updated_at,
            outcomes: Some(c.outcomes),
            categories: Some(c.categories),
        }
    }
}

/// Globally shared, immutable library template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeTemplate {
    pub id: TemplateId,
    pub title: String,
    pub description: String,
    pub business_impact: String,
    pub example: Option<String>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
    pub created_by: Option<PersonId>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_from_texts_are_indexed() {
        let outcomes = Outcome::from_texts(["a", "b", "c"]);
        let idx: Vec<u32> = outcomes.iter().map(|o| o.order_index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
        assert_eq!(outcomes[1].text, "b");
    }

    #[test]
    fn scalars_only_drops_nested() {
        let now = Utc::now();
        let challenge = Challenge {
            id: ChallengeId::new(),
            engagement_id: EngagementId::new(),
            title: "Slow onboarding".into(),
            description: String::new(),
            business_impact: String::new(),
            example: None,
            status: WorkStatus::Open,
            outcomes: Outcome::from_texts(["faster"]),
            categories: BTreeSet::from(["ops".to_string()]),
            template_id: None,
            created_at: now,
            updated_at: now,
        };

        let update = ChallengeUpdate::from(challenge).scalars_only();
        assert!(update.outcomes.is_none());
        assert!(update.categories.is_none());
    }
}
