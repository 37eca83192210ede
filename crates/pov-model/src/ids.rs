//! Typed identifiers
//!
//! Every entity gets its own UUID newtype so an outcome id can never be passed
//! where a challenge id is expected. All ids serialize transparently as the
//! underlying UUID string.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Underlying UUID
            #[inline]
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Engagement (aggregate root) identifier
    EngagementId
);
define_id!(
    /// Challenge identifier
    ChallengeId
);
define_id!(
    /// Library challenge template identifier
    TemplateId
);
define_id!(
    /// Decision criterion identifier
    CriterionId
);
define_id!(
    /// Decision criterion activity identifier; referenced by session activities
    CriterionActivityId
);
define_id!(
    /// Global person directory identifier
    PersonId
);
define_id!(
    /// Team member association identifier
    TeamMemberId
);
define_id!(
    /// Device scope row identifier
    DeviceScopeId
);
define_id!(
    /// Business service identifier
    BusinessServiceId
);
define_id!(
    /// Working session identifier
    SessionId
);
define_id!(
    /// Session activity row identifier (regenerated whenever the list is rewritten)
    SessionActivityId
);
define_id!(
    /// Comment identifier
    CommentId
);
define_id!(
    /// Document identifier
    DocumentId
);
define_id!(
    /// Activity log entry identifier
    LogEntryId
);
define_id!(
    /// Actor identifier supplied by the identity provider
    ActorId
);
