//! POV Sync - remote-first operation layer for the engagement aggregate
//!
//! Every mutation is written to the backend first and only then applied to
//! the shared [`AggregateStore`](pov_store::AggregateStore):
//! - [`EngagementSync`]: one async method per use case
//! - [`gateway`]: row-level backend port plus an in-memory adapter
//! - [`saga`]: compensating rollback for multi-step writes
//! - [`guard`]: referential integrity checks the backend cannot enforce
//! - [`activity_log`]: one audit entry per user-visible change
//! - [`queue`]: per-aggregate serialisation of mutations
//!
//! # Example
//!
//! ```rust,no_run
//! use pov_sync::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), SyncError> {
//! let actor = Actor::new(ActorId::new(), "sam@example.com", "Sam Lee");
//! let ports = Ports {
//!     gateway: Arc::new(MemoryGateway::new()),
//!     identity: Arc::new(StaticIdentity::new(actor)),
//!     notifier: Arc::new(TracingNotifier),
//!     storage: Arc::new(MemoryBlobStorage::new()),
//! };
//! let sync = EngagementSync::new(SyncConfig::new(), ports, Arc::new(AggregateStore::new()));
//!
//! let engagement = sync
//!     .create_engagement(NewEngagement {
//!         title: "Acme POV".into(),
//!         customer_name: "Acme Corp".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! assert_eq!(engagement.team_members.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod activity_log;
pub mod compose;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod identity;
pub mod notify;
pub mod queue;
pub mod saga;
pub mod storage;

mod ops;

pub use activity_log::{ActivityLogWriter, LogEvent};
pub use config::{AuditConfig, SyncConfig};
pub use error::{
    ConfigError, GatewayError, IdentityError, RemoteError, StorageError, SyncError, SyncResult,
};
pub use gateway::{ConflictAction, Filter, Gateway, GatewayExt, MemoryGateway, Query, Table};
pub use guard::{DeleteCandidate, Dependent, IntegrityGuard, IntegrityRule, ScheduledCriterionActivities};
pub use identity::{IdentityProvider, StaticIdentity};
pub use notify::{Notifier, NullNotifier, TracingNotifier};
pub use ops::{EngagementSync, Ports};
pub use queue::MutationQueue;
pub use saga::Saga;
pub use storage::{BlobStorage, MemoryBlobStorage};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for wiring and driving the operation layer
    pub use crate::{
        EngagementSync, IdentityProvider, MemoryBlobStorage, MemoryGateway, Notifier, Ports,
        StaticIdentity, SyncConfig, SyncError, SyncResult, TracingNotifier,
    };
    pub use pov_model::{Actor, ActorId, EngagementId, NewEngagement};
    pub use pov_store::AggregateStore;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
