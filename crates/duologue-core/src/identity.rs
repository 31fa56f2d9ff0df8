//! Identity provider port.
//!
//! Credential handling and sign-in live outside Duologue. The core only reads
//! the stable id of whoever is signed in.

use duologue_types::user::UserId;

/// Source of the current user's stable id.
pub trait IdentityProvider {
    /// `None` when nobody is signed in.
    fn current_user_id(&self) -> Option<UserId>;
}

/// Identity fixed at construction (CLI `--as`, tests, server-side sessions).
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<UserId>);

impl StaticIdentity {
    pub fn signed_in(user_id: UserId) -> Self {
        Self(Some(user_id))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<UserId> {
        self.0.clone()
    }
}
