//! POV Model - engagement aggregate entities
//!
//! Defines the shape of the engagement aggregate and everything submitted
//! against it:
//! - Typed identifiers for every entity
//! - Status vocabularies and the status-to-verb table used by the audit log
//! - The aggregate root and its owned child records
//! - Operation payloads with field-level validation
//!
//! # Example
//!
//! ```rust
//! use pov_model::{EngagementScoped, NewChallenge, Validate};
//!
//! let input = NewChallenge {
//!     title: "Alert fatigue".into(),
//!     outcomes: vec!["Fewer false positives".into()],
//!     ..Default::default()
//! };
//! assert!(input.validate().is_ok());
//! assert!(input.require_engagement().is_err());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod challenge;
pub mod criterion;
pub mod engagement;
pub mod ids;
pub mod input;
pub mod records;
pub mod session;
pub mod status;
pub mod validation;

pub use challenge::{Challenge, ChallengeTemplate, ChallengeUpdate, Outcome};
pub use criterion::{CriterionActivity, CriterionUpdate, DecisionCriterion};
pub use engagement::{
    ActivityLogEntry, Actor, Engagement, EngagementFields, EngagementSummary, LogKind,
};
pub use ids::{
    ActorId, BusinessServiceId, ChallengeId, CommentId, CriterionActivityId, CriterionId,
    DeviceScopeId, DocumentId, EngagementId, LogEntryId, PersonId, SessionActivityId, SessionId,
    TeamMemberId, TemplateId,
};
pub use input::{
    BusinessServicePatch, ChallengeFromTemplate, ChallengePatch, CommentPatch,
    CriterionActivityInput, CriterionPatch, DeviceScopePatch, EngagementPatch, NewBusinessService,
    NewChallenge, NewComment, NewCriterion, NewDeviceScope, NewDocument, NewEngagement,
    NewSession, NewTeamMember, SessionActivityInput, SessionPatch, TeamMemberPatch,
};
pub use records::{BusinessService, Comment, DeviceScope, Document, Person, TeamMember};
pub use session::{SessionActivity, SessionActivityKind, WorkingSession};
pub use status::{
    status_verb, CriterionStatus, EngagementStatus, Priority, SessionStatus, StatusToken,
    WorkStatus,
};
pub use validation::{EngagementScoped, Validate, ValidationError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
