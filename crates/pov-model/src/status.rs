//! Status vocabularies
//!
//! Each status serializes as the upper-case token the remote store keeps in
//! its text columns. [`status_verb`] maps a token to the phrase used in
//! activity-log descriptions.

use serde::{Deserialize, Serialize};

/// Engagement lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngagementStatus {
    /// Scoping, not started
    #[default]
    Planning,
    /// Engagement running
    InProgress,
    /// Finished
    Completed,
    /// Abandoned
    Cancelled,
}

/// Status shared by challenges, criterion activities, session activities,
/// device scopes and business services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkStatus {
    /// Not started
    #[default]
    Open,
    /// Being worked on
    InProgress,
    /// Done
    Completed,
}

/// Decision criterion evaluation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriterionStatus {
    /// Not evaluated yet
    #[default]
    Pending,
    /// Evaluation running
    InProgress,
    /// Criterion satisfied
    Met,
    /// Criterion not satisfied
    NotMet,
}

/// Working session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Planned
    #[default]
    Scheduled,
    /// Held
    Completed,
    /// Called off
    Cancelled,
}

/// Priority for device scopes and business-service criticality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Must be covered
    High,
    /// Should be covered
    #[default]
    Medium,
    /// Nice to have
    Low,
}

/// Upper-case token for a status, matching its serialized form
pub trait StatusToken: Copy {
    /// Token as stored remotely
    fn token(self) -> &'static str;

    /// Human label ("In Progress")
    fn label(self) -> &'static str;
}

impl StatusToken for EngagementStatus {
    fn token(self) -> &'static str {
        match self {
            Self::Planning => "PLANNING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Planning => "Planning",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl StatusToken for WorkStatus {
    fn token(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

impl StatusToken for CriterionStatus {
    fn token(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Met => "MET",
            Self::NotMet => "NOT_MET",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Met => "Met",
            Self::NotMet => "Not Met",
        }
    }
}

impl StatusToken for SessionStatus {
    fn token(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Verb phrase for a status transition, used in activity-log descriptions
#[must_use]
pub fn status_verb(token: &str) -> &'static str {
    match token {
        "COMPLETED" => "marked as complete",
        "IN_PROGRESS" => "marked as in progress",
        "OPEN" => "reset to open",
        _ => "updated",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_table() {
        assert_eq!(status_verb(WorkStatus::Completed.token()), "marked as complete");
        assert_eq!(status_verb(WorkStatus::InProgress.token()), "marked as in progress");
        assert_eq!(status_verb(WorkStatus::Open.token()), "reset to open");
        assert_eq!(status_verb(CriterionStatus::Met.token()), "updated");
    }

    #[test]
    fn token_matches_serialized_form() {
        let json = serde_json::to_string(&CriterionStatus::NotMet).unwrap();
        assert_eq!(json, format!("\"{}\"", CriterionStatus::NotMet.token()));

        let json = serde_json::to_string(&EngagementStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn priority_orders_high_first() {
        let mut p = vec![Priority::Low, Priority::High, Priority::Medium];
        p.sort();
        assert_eq!(p, vec![Priority::High, Priority::Medium, Priority::Low]);
    }
}
