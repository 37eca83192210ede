//! Identity provider port

use crate::error::{IdentityError, SyncError};
use async_trait::async_trait;
use parking_lot::RwLock;
use pov_model::Actor;

/// Supplies the actor performing operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current actor, or `None` when signed out
    async fn current_actor(&self) -> Result<Option<Actor>, IdentityError>;
}

/// Resolve the actor, mapping absence and provider errors to `Unauthorized`
///
/// # Errors
/// [`SyncError::Unauthorized`] when no actor is available
pub async fn resolve_actor(identity: &dyn IdentityProvider) -> Result<Actor, SyncError> {
    match identity.current_actor().await {
        Ok(Some(actor)) => Ok(actor),
        Ok(None) => Err(SyncError::Unauthorized("no signed-in user".into())),
        Err(e) => {
            tracing::warn!(error = %e, "identity lookup failed");
            Err(SyncError::Unauthorized(e.to_string()))
        }
    }
}

/// Fixed identity, switchable at runtime
#[derive(Debug, Default)]
pub struct StaticIdentity {
    actor: RwLock<Option<Actor>>,
}

impl StaticIdentity {
    #[inline]
    #[must_use]
    pub fn new(actor: Actor) -> Self {
        Self {
            actor: RwLock::new(Some(actor)),
        }
    }

    /// Identity with nobody signed in
    #[inline]
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, actor: Actor) {
        *self.actor.write() = Some(actor);
    }

    pub fn sign_out(&self) {
        *self.actor.write() = None;
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_actor(&self) -> Result<Option<Actor>, IdentityError> {
        Ok(self.actor.read().clone())
    }
}
