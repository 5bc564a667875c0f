//! Data models exchanged with the authentication backend.
//!
//! - `User`: the GitHub identity returned by the backend and persisted locally
//! - `AuthResponse`: the body of a successful `POST /authenticate`

pub mod user;

pub use user::{AuthResponse, User};
