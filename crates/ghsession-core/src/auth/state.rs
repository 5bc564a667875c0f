use crate::models::User;

/// Snapshot published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_signing_in: bool,
    /// Set once the stored session has been read
    pub restored: bool,
}

impl AuthState {
    /// State before the stored session has been read
    pub fn initializing() -> Self {
        Self {
            user: None,
            is_signing_in: true,
            restored: false,
        }
    }

    pub fn phase(&self) -> AuthPhase {
        if !self.restored {
            AuthPhase::Initializing
        } else if self.is_signing_in {
            AuthPhase::SigningIn
        } else if self.user.is_some() {
            AuthPhase::SignedIn
        } else {
            AuthPhase::SignedOut
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initializing()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Initializing,
    SigningIn,
    SignedIn,
    SignedOut,
}

impl AuthPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthPhase::Initializing => "initializing",
            AuthPhase::SigningIn => "signing in",
            AuthPhase::SignedIn => "signed in",
            AuthPhase::SignedOut => "signed out",
        }
    }
}

impl std::fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
