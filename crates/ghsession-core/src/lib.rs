//! ghsession core - GitHub OAuth sign-in and session state.
//!
//! The crate is organized around [`auth::AuthProvider`], which drives the
//! authorization code flow, persists the resulting session through a
//! [`storage::KeyValueStore`] and publishes `(user, is_signing_in)` to any
//! number of subscribers.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod oauth;
pub mod storage;

pub use api::{ApiClient, ApiError, CodeExchange};
pub use auth::{AuthError, AuthPhase, AuthProvider, AuthState, SignInOutcome};
pub use config::{Config, StorageBackend};
pub use models::{AuthResponse, User};
