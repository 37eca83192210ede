//! Pure state transitions
//!
//! [`apply`] never performs I/O and never fails. Actions that address an
//! absent root or an unknown id leave the state untouched.

use crate::action::{Action, CollectionAction};
use crate::item::CollectionItem;
use pov_model::{CriterionActivityId, Engagement, EngagementSummary, WorkStatus};

/// Store state: at most one loaded aggregate plus list-view summaries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub engagement: Option<Engagement>,
    pub summaries: Vec<EngagementSummary>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Apply one action, producing the next state
#[must_use]
pub fn apply(mut state: StoreState, action: Action) -> StoreState {
    match action {
        Action::LoadRoot(engagement) => {
            state.engagement = Some(engagement.normalized());
            state.loading = false;
            state.error = None;
        }
        Action::ReplaceRoot(fields) => {
            if let Some(root) = state.engagement.as_mut().filter(|e| e.id == fields.id) {
                root.set_fields(fields);
            }
        }
        Action::ClearRoot => state.engagement = None,

        Action::Challenges(a) => on_root(&mut state, |e| apply_collection(&mut e.challenges, a)),
        Action::DecisionCriteria(a) => {
            on_root(&mut state, |e| apply_collection(&mut e.decision_criteria, a));
        }
        Action::TeamMembers(a) => on_root(&mut state, |e| apply_collection(&mut e.team_members, a)),
        Action::DeviceScopes(a) => {
            on_root(&mut state, |e| apply_collection(&mut e.device_scopes, a));
        }
        Action::WorkingSessions(a) => {
            on_root(&mut state, |e| apply_collection(&mut e.working_sessions, a));
        }
        Action::Comments(a) => on_root(&mut state, |e| apply_collection(&mut e.comments, a)),
        Action::Documents(a) => on_root(&mut state, |e| apply_collection(&mut e.documents, a)),
        Action::ActivityLog(a) => on_root(&mut state, |e| apply_collection(&mut e.activity_log, a)),
        Action::BusinessServices(a) => {
            on_root(&mut state, |e| apply_collection(&mut e.business_services, a));
        }

        Action::SetCriterionActivityStatus {
            activity_id,
            status,
        } => on_root(&mut state, |e| set_activity_status(e, activity_id, status)),

        Action::SetSummaries(summaries) => state.summaries = summaries,
        Action::UpsertSummary(summary) => {
            match state.summaries.iter_mut().find(|s| s.id == summary.id) {
                Some(slot) => *slot = summary,
                None => state.summaries.push(summary),
            }
        }
        Action::RemoveSummary(id) => state.summaries.retain(|s| s.id != id),

        Action::SetLoading(loading) => state.loading = loading,
        Action::SetError(error) => state.error = error,
    }

    refresh_summary(&mut state);
    state
}

fn on_root(state: &mut StoreState, f: impl FnOnce(&mut Engagement)) {
    if let Some(root) = state.engagement.as_mut() {
        f(root);
    }
}

fn apply_collection<T: CollectionItem>(items: &mut Vec<T>, action: CollectionAction<T>) {
    match action {
        CollectionAction::Set(next) => *items = next,
        CollectionAction::Add(item) => {
            if T::PREPEND {
                items.insert(0, item);
            } else {
                items.push(item);
            }
        }
        CollectionAction::Update(update) => {
            let id = T::update_id(&update);
            if let Some(slot) = items.iter_mut().find(|i| i.id() == id) {
                slot.apply_update(update);
            }
        }
        CollectionAction::Delete(id) => items.retain(|i| i.id() != id),
    }
}

fn set_activity_status(root: &mut Engagement, id: CriterionActivityId, status: WorkStatus) {
    for activity in root
        .decision_criteria
        .iter_mut()
        .flat_map(|c| c.activities.iter_mut())
        .filter(|a| a.id == id)
    {
        activity.status = status;
    }

    for activity in root
        .working_sessions
        .iter_mut()
        .flat_map(|s| s.activities.iter_mut())
        .filter(|a| a.kind.criterion_activity_id() == Some(id))
    {
        activity.status = status;
    }
}

/// Keep the loaded engagement's list row in step with the tree
fn refresh_summary(state: &mut StoreState) {
    let Some(root) = state.engagement.as_ref() else {
        return;
    };
    if let Some(slot) = state.summaries.iter_mut().find(|s| s.id == root.id) {
        *slot = root.summary();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pov_model::{
        ActorId, Challenge, ChallengeId, ChallengeUpdate, Comment, CommentId, CriterionActivity,
        CriterionId, DecisionCriterion, EngagementFields, EngagementId, EngagementStatus,
        Outcome, SessionActivity, SessionActivityId, SessionActivityKind, SessionId,
        SessionStatus, WorkingSession,
    };
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn engagement() -> Engagement {
        let now = Utc::now();
        Engagement::from_fields(EngagementFields {
            id: EngagementId::new(),
            title: "Acme POV".into(),
            customer_name: "Acme Corp".into(),
            status: EngagementStatus::Planning,
            notes: String::new(),
            created_by: ActorId::new(),
            created_at: now,
            updated_at: now,
        })
    }

    fn challenge(engagement_id: EngagementId, title: &str) -> Challenge {
        let now = Utc::now();
        Challenge {
            id: ChallengeId::new(),
            engagement_id,
            title: title.into(),
            description: String::new(),
            business_impact: String::new(),
            example: None,
            status: WorkStatus::Open,
            outcomes: Outcome::from_texts(["first", "second"]),
            categories: BTreeSet::from(["security".to_string()]),
            template_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn loaded(engagement: Engagement) -> StoreState {
        apply(
            StoreState::default(),
            Action::LoadRoot(Box::new(engagement)),
        )
    }

    #[test]
    fn collection_actions_without_root_are_noops() {
        let state = StoreState::default();
        let next = apply(
            state.clone(),
            Action::Challenges(CollectionAction::Add(challenge(EngagementId::new(), "x"))),
        );
        assert_eq!(next, state);
    }

    #[test]
    fn load_root_clears_loading_and_error() {
        let mut state = StoreState::default();
        state = apply(state, Action::SetLoading(true));
        state = apply(state, Action::SetError(Some("boom".into())));
        state = apply(state, Action::LoadRoot(Box::new(engagement())));
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert!(state.engagement.is_some());
    }

    #[test]
    fn add_appends_preserving_siblings() {
        let root = engagement();
        let id = root.id;
        let mut state = loaded(root);
        let a = challenge(id, "a");
        let b = challenge(id, "b");
        state = apply(state, Action::Challenges(CollectionAction::Add(a.clone())));
        state = apply(state, Action::Challenges(CollectionAction::Add(b.clone())));

        let titles: Vec<_> = state
            .engagement
            .unwrap()
            .challenges
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[test]
    fn partial_update_keeps_nested_collections() {
        let root = engagement();
        let id = root.id;
        let original = challenge(id, "before");
        let mut state = loaded(root);
        state = apply(
            state,
            Action::Challenges(CollectionAction::Add(original.clone())),
        );

        let mut renamed = original.clone();
        renamed.title = "after".into();
        renamed.status = WorkStatus::Completed;
        state = apply(
            state,
            Action::Challenges(CollectionAction::Update(
                ChallengeUpdate::from(renamed).scalars_only(),
            )),
        );

        let stored = &state.engagement.unwrap().challenges[0];
        assert_eq!(stored.title, "after");
        assert_eq!(stored.status, WorkStatus::Completed);
        assert_eq!(stored.outcomes, original.outcomes);
        assert_eq!(stored.categories, original.categories);
    }

    #[test]
    fn full_update_replaces_nested_collections() {
        let root = engagement();
        let id = root.id;
        let original = challenge(id, "c");
        let mut state = loaded(root);
        state = apply(
            state,
            Action::Challenges(CollectionAction::Add(original.clone())),
        );

        let mut edited = original;
        edited.outcomes = vec![Outcome::new("z", 1), Outcome::new("y", 0)];
        edited.categories = BTreeSet::new();
        state = apply(
            state,
            Action::Challenges(CollectionAction::Update(edited.into())),
        );

        let stored = &state.engagement.unwrap().challenges[0];
        let texts: Vec<_> = stored.outcomes.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["y", "z"]);
        assert!(stored.categories.is_empty());
    }

    #[test]
    fn update_unknown_id_leaves_siblings() {
        let root = engagement();
        let id = root.id;
        let mut state = loaded(root);
        state = apply(
            state,
            Action::Challenges(CollectionAction::Add(challenge(id, "kept"))),
        );
        let before = state.clone();
        state = apply(
            state,
            Action::Challenges(CollectionAction::Update(challenge(id, "ghost").into())),
        );
        assert_eq!(state, before);
    }

    #[test]
    fn delete_filters_by_id() {
        let root = engagement();
        let id = root.id;
        let keep = challenge(id, "keep");
        let drop = challenge(id, "drop");
        let mut state = loaded(root);
        state = apply(state, Action::Challenges(CollectionAction::Add(keep.clone())));
        state = apply(state, Action::Challenges(CollectionAction::Add(drop.clone())));
        state = apply(state, Action::Challenges(CollectionAction::Delete(drop.id)));

        let remaining: Vec<_> = state
            .engagement
            .unwrap()
            .challenges
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(remaining, vec![keep.id]);
    }

    #[test]
    fn activity_log_add_prepends() {
        use pov_model::{ActivityLogEntry, LogEntryId, LogKind};

        let root = engagement();
        let id = root.id;
        let mut state = loaded(root);
        for title in ["older", "newer"] {
            state = apply(
                state,
                Action::ActivityLog(CollectionAction::Add(ActivityLogEntry {
                    id: LogEntryId::new(),
                    engagement_id: id,
                    kind: LogKind::Comment,
                    title: title.into(),
                    description: String::new(),
                    reference_id: None,
                    author_id: ActorId::new(),
                    author_email: "a@example.com".into(),
                    author_name: "A".into(),
                    created_at: Utc::now(),
                })),
            );
        }

        let log = state.engagement.unwrap().activity_log;
        assert_eq!(log[0].title, "newer");
        assert_eq!(log[1].title, "older");
    }

    #[test]
    fn criterion_activity_status_mirrors_onto_sessions() {
        let mut root = engagement();
        let now = Utc::now();
        let criterion_id = CriterionId::new();
        let activity_id = CriterionActivityId::new();
        root.decision_criteria.push(DecisionCriterion {
            id: criterion_id,
            engagement_id: root.id,
            title: "Visibility".into(),
            success_criteria: String::new(),
            use_case: String::new(),
            status: pov_model::CriterionStatus::Pending,
            categories: BTreeSet::new(),
            activities: vec![CriterionActivity {
                id: activity_id,
                criterion_id,
                text: "Inventory assets".into(),
                order_index: 0,
                status: WorkStatus::Open,
            }],
            created_at: now,
            updated_at: now,
        });
        let session_id = SessionId::new();
        root.working_sessions.push(WorkingSession {
            id: session_id,
            engagement_id: root.id,
            title: "Day 1".into(),
            status: SessionStatus::Scheduled,
            scheduled_at: now,
            duration_minutes: 60,
            notes: String::new(),
            activities: vec![SessionActivity {
                id: SessionActivityId::new(),
                session_id,
                display_order: 0,
                status: WorkStatus::Open,
                kind: SessionActivityKind::Linked {
                    criterion_activity_id: activity_id,
                },
            }],
            created_at: now,
            updated_at: now,
        });

        let state = apply(
            loaded(root),
            Action::SetCriterionActivityStatus {
                activity_id,
                status: WorkStatus::Completed,
            },
        );
        let root = state.engagement.unwrap();
        assert_eq!(
            root.decision_criteria[0].activities[0].status,
            WorkStatus::Completed
        );
        assert_eq!(
            root.working_sessions[0].activities[0].status,
            WorkStatus::Completed
        );
    }

    #[test]
    fn summary_follows_root_changes() {
        let root = engagement();
        let id = root.id;
        let mut state = apply(
            StoreState::default(),
            Action::SetSummaries(vec![root.summary()]),
        );
        state = apply(state, Action::LoadRoot(Box::new(root)));
        state = apply(
            state,
            Action::Challenges(CollectionAction::Add(challenge(id, "x"))),
        );
        assert_eq!(state.summaries[0].challenge_count, 1);
        assert_eq!(state.summaries[0].open_challenge_count, 1);

        state = apply(state, Action::RemoveSummary(id));
        assert!(state.summaries.is_empty());
    }

    #[test]
    fn replace_root_keeps_collections() {
        let root = engagement();
        let id = root.id;
        let mut state = loaded(root);
        state = apply(
            state,
            Action::Comments(CollectionAction::Add(Comment {
                id: CommentId::new(),
                engagement_id: id,
                content: "hello".into(),
                author_id: ActorId::new(),
                author_email: "a@example.com".into(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })),
        );

        let mut fields = state.engagement.as_ref().unwrap().fields();
        fields.status = EngagementStatus::InProgress;
        state = apply(state, Action::ReplaceRoot(fields));

        let root = state.engagement.unwrap();
        assert_eq!(root.status, EngagementStatus::InProgress);
        assert_eq!(root.comments.len(), 1);
    }
}
