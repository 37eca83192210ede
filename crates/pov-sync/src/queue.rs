//! Per-aggregate mutation queue
//!
//! Operations on the same engagement run one at a time in arrival order;
//! operations on different engagements never wait on each other.

use dashmap::DashMap;
use pov_model::EngagementId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held for the duration of one mutating operation
pub type Lane = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct MutationQueue {
    lanes: DashMap<EngagementId, Arc<Mutex<()>>>,
}

impl MutationQueue {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the engagement's lane; tokio's mutex hands it out FIFO
    pub async fn enter(&self, id: EngagementId) -> Lane {
        let lane = self.lanes.entry(id).or_default().clone();
        lane.lock_owned().await
    }

    /// Drop the lane of a deleted engagement
    pub fn forget(&self, id: EngagementId) {
        self.lanes.remove(&id);
    }

    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_engagement_is_serialised() {
        let queue = Arc::new(MutationQueue::new());
        let id = EngagementId::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let first = queue.enter(id).await;
        let waiter = {
            let queue = queue.clone();
            let order = order.clone();
            tokio::spawn(async move {
                let _lane = queue.enter(id).await;
                order.lock().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().push("first");
        drop(first);
        waiter.await.unwrap();

        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn different_engagements_do_not_contend() {
        let queue = MutationQueue::new();
        let _a = queue.enter(EngagementId::new()).await;
        let b = tokio::time::timeout(Duration::from_millis(50), queue.enter(EngagementId::new())).await;
        assert!(b.is_ok());
        assert_eq!(queue.lane_count(), 2);
    }
}
