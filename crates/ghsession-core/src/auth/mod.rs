//! Authentication state for the signed-in GitHub user.
//!
//! This module provides:
//! - `AuthProvider`: sign-in, sign-out and session restore
//! - `AuthState` / `AuthPhase`: what subscribers observe
//!
//! A session is a user plus its bearer token. Both are persisted together
//! and restored once when the provider is mounted.

pub mod error;
pub mod provider;
pub mod state;

pub use error::AuthError;
pub use provider::{AuthProvider, SignInOutcome};
pub use state::{AuthPhase, AuthState};
