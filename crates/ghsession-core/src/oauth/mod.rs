//! Interactive OAuth authorization.
//!
//! This module provides:
//! - `AuthorizationRequest`: builds the GitHub authorize URL
//! - `AuthorizationFlow`: the host capability that shows the URL to the user
//!   and reports how the redirect came back
//! - `LoopbackAuthorization`: a flow that opens the system browser and
//!   receives the redirect on a local listener

pub mod flow;
pub mod loopback;

pub use flow::{
    AuthorizationError, AuthorizationFlow, AuthorizationKind, AuthorizationOutcome,
    AuthorizationParams, AuthorizationRequest, ACCESS_DENIED, GITHUB_AUTHORIZE_URL,
};
pub use loopback::LoopbackAuthorization;
