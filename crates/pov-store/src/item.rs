//! Collection item contract
//!
//! Every owned collection of the aggregate is addressed the same way: items
//! carry an id, and an update payload names the item it targets.

use pov_model::{
    ActivityLogEntry, BusinessService, BusinessServiceId, Challenge, ChallengeId, ChallengeUpdate,
    Comment, CommentId, CriterionId, CriterionUpdate, DecisionCriterion, DeviceScope,
    DeviceScopeId, Document, DocumentId, LogEntryId, SessionId, TeamMember, TeamMemberId,
    WorkingSession,
};
use std::fmt::Debug;

/// Item of an owned collection
pub trait CollectionItem: Clone + Debug {
    /// Identifier used by update and delete
    type Id: Copy + Eq + Debug;

    /// Payload accepted by update
    type Update: Clone + Debug;

    /// New items go to the front instead of the back
    const PREPEND: bool = false;

    /// Item id
    fn id(&self) -> Self::Id;

    /// Id targeted by an update payload
    fn update_id(update: &Self::Update) -> Self::Id;

    /// Merge an update into the item
    fn apply_update(&mut self, update: Self::Update);
}

macro_rules! replace_on_update {
    ($($ty:ty => $id:ty),+ $(,)?) => {
        $(
            impl CollectionItem for $ty {
                type Id = $id;
                type Update = $ty;

                fn id(&self) -> Self::Id {
                    self.id
                }

                fn update_id(update: &Self::Update) -> Self::Id {
                    update.id
                }

                fn apply_update(&mut self, update: Self::Update) {
                    *self = update;
                }
            }
        )+
    };
}

replace_on_update!(
    TeamMember => TeamMemberId,
    DeviceScope => DeviceScopeId,
    BusinessService => BusinessServiceId,
    Comment => CommentId,
    Document => DocumentId,
);

impl CollectionItem for WorkingSession {
    type Id = SessionId;
    type Update = WorkingSession;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn update_id(update: &Self::Update) -> Self::Id {
        update.id
    }

    fn apply_update(&mut self, update: Self::Update) {
        *self = update;
        self.sort_activities();
    }
}

impl CollectionItem for ActivityLogEntry {
    type Id = LogEntryId;
    type Update = ActivityLogEntry;

    const PREPEND: bool = true;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn update_id(update: &Self::Update) -> Self::Id {
        update.id
    }

    fn apply_update(&mut self, update: Self::Update) {
        *self = update;
    }
}

impl CollectionItem for Challenge {
    type Id = ChallengeId;
    type Update = ChallengeUpdate;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn update_id(update: &Self::Update) -> Self::Id {
        update.id
    }

    fn apply_update(&mut self, update: Self::Update) {
        self.title = update.title;
        self.description = update.description;
        self.business_impact = update.business_impact;
        self.example = update.example;
        self.status = update.status;
        self.template_id = update.template_id;
        self.updated_at = update.updated_at;
        if let Some(outcomes) = update.outcomes {
            self.outcomes = outcomes;
            self.sort_outcomes();
        }
        if let Some(categories) = update.categories {
            self.categories = categories;
        }
    }
}

impl CollectionItem for DecisionCriterion {
    type Id = CriterionId;
    type Update = CriterionUpdate;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn update_id(update: &Self::Update) -> Self::Id {
        update.id
    }

    fn apply_update(&mut self, update: Self::Update) {
        self.title = update.title;
        self.success_criteria = update.success_criteria;
        self.use_case = update.use_case;
        self.status = update.status;
        self.updated_at = update.updated_at;
        if let Some(categories) = update.categories {
            self.categories = categories;
        }
        if let Some(activities) = update.activities {
            self.activities = activities;
            self.sort_activities();
        }
    }
}
