//! Identity provider contract.
//!
//! Authentication happens outside core; the engine only asks who the
//! current participant is when tagging votes and cascade deletes.

use crate::model::UserId;

/// Supplies the current participant's stable id.
pub trait IdentityProvider: Send + Sync {
    /// Returns `None` when no participant is authenticated.
    fn current_user_id(&self) -> Option<UserId>;
}

/// Identity fixed at construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity {
    user_id: Option<UserId>,
}

impl StaticIdentity {
    pub fn authenticated(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<UserId> {
        self.user_id.clone()
    }
}
