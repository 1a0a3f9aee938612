//! The authentication collaborator.

use std::sync::RwLock;

use stitchline_core::UserId;

/// Source of the signed-in user.
///
/// A session started without a user mirrors events but has no memberships.
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// An [`AuthProvider`] whose user is set directly.
#[derive(Debug, Default)]
pub struct StaticAuth {
    user: RwLock<Option<UserId>>,
}

impl StaticAuth {
    /// No one signed in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: impl Into<UserId>) -> Self {
        Self {
            user: RwLock::new(Some(user.into())),
        }
    }

    pub fn sign_in(&self, user: impl Into<UserId>) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = Some(user.into());
    }

    pub fn sign_out(&self) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_auth_tracks_sign_in() {
        let auth = StaticAuth::anonymous();
        assert_eq!(auth.current_user(), None);
        auth.sign_in("u1");
        assert_eq!(auth.current_user(), Some(UserId::new("u1")));
        auth.sign_out();
        assert_eq!(auth.current_user(), None);
    }
}
