//! Shared store handle
//!
//! Wraps [`StoreState`] behind a lock, applies one action at a time and
//! publishes a revision counter so views know when to re-render. The handle
//! is constructed explicitly and shared by `Arc`.

use crate::action::Action;
use crate::reducer::{self, StoreState};
use parking_lot::RwLock;
use pov_model::{Engagement, EngagementId, EngagementSummary};
use tokio::sync::watch;

/// Single-aggregate store
#[derive(Debug)]
pub struct AggregateStore {
    state: RwLock<StoreState>,
    revision: watch::Sender<u64>,
}

impl AggregateStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(StoreState::default()),
            revision,
        }
    }

    /// Apply an action and return the new revision
    pub fn dispatch(&self, action: Action) -> u64 {
        let target = action.target();
        let verb = action.verb();

        {
            let mut guard = self.state.write();
            let current = std::mem::take(&mut *guard);
            *guard = reducer::apply(current, action);
        }

        self.publish(target, verb)
    }

    /// Apply an action only while `id` is the loaded aggregate
    ///
    /// The check and the transition happen under one write lock, so a
    /// concurrent load of another aggregate cannot receive the action.
    /// Returns `None` when the action was skipped.
    pub fn dispatch_to(&self, id: EngagementId, action: Action) -> Option<u64> {
        let target = action.target();
        let verb = action.verb();

        {
            let mut guard = self.state.write();
            if guard.engagement.as_ref().map(|e| e.id) != Some(id) {
                tracing::trace!(target_collection = target, verb, %id, "not loaded, skipped");
                return None;
            }
            let current = std::mem::take(&mut *guard);
            *guard = reducer::apply(current, action);
        }

        Some(self.publish(target, verb))
    }

    fn publish(&self, target: &'static str, verb: &'static str) -> u64 {
        let mut revision = 0;
        self.revision.send_modify(|r| {
            *r += 1;
            revision = *r;
        });
        tracing::trace!(target_collection = target, verb, revision, "store transition");
        revision
    }

    /// Apply several actions in order
    pub fn dispatch_all(&self, actions: impl IntoIterator<Item = Action>) -> u64 {
        actions
            .into_iter()
            .fold(self.revision(), |_, action| self.dispatch(action))
    }

    /// Read the state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state.read())
    }

    /// Clone of the full state
    #[must_use]
    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }

    /// Clone of the loaded aggregate
    #[must_use]
    pub fn engagement(&self) -> Option<Engagement> {
        self.state.read().engagement.clone()
    }

    /// Id of the loaded aggregate
    #[must_use]
    pub fn loaded_id(&self) -> Option<EngagementId> {
        self.state.read().engagement.as_ref().map(|e| e.id)
    }

    /// Clone of the list-view summaries
    #[must_use]
    pub fn summaries(&self) -> Vec<EngagementSummary> {
        self.state.read().summaries.clone()
    }

    /// Current revision
    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver notified after every transition
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl Default for AggregateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pov_model::{ActorId, EngagementFields, EngagementStatus};

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

    #[test]
    fn dispatch_advances_revision() {
        let store = AggregateStore::new();
        assert_eq!(store.revision(), 0);
        assert_eq!(store.dispatch(Action::SetLoading(true)), 1);
        assert_eq!(store.dispatch(Action::SetLoading(false)), 2);
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn loaded_id_tracks_root() {
        let store = AggregateStore::new();
        let root = engagement();
        let id = root.id;
        store.dispatch(Action::LoadRoot(Box::new(root)));
        assert_eq!(store.loaded_id(), Some(id));
        store.dispatch(Action::ClearRoot);
        assert_eq!(store.loaded_id(), None);
    }

    #[test]
    fn dispatch_to_skips_other_aggregates() {
        let store = AggregateStore::new();
        let root = engagement();
        let id = root.id;
        store.dispatch(Action::LoadRoot(Box::new(root)));

        assert!(store
            .dispatch_to(EngagementId::new(), Action::SetLoading(true))
            .is_none());
        assert!(!store.read(|s| s.loading));
        assert_eq!(store.dispatch_to(id, Action::SetLoading(true)), Some(2));
        assert!(store.read(|s| s.loading));
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let store = AggregateStore::new();
        let mut rx = store.subscribe();

        store.dispatch(Action::SetError(Some("offline".into())));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
        assert_eq!(store.read(|s| s.error.clone()), Some("offline".to_string()));
    }
}
