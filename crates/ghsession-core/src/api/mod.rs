//! REST client for the session backend.
//!
//! This module provides the `ApiClient` used to exchange an OAuth
//! authorization code for a backend token and to issue authenticated
//! requests on behalf of the signed-in user.
//!
//! Credentials are request-scoped: a client carries its own bearer token
//! and there is no process-wide default header.

pub mod client;
pub mod error;

pub use client::{ApiClient, CodeExchange};
pub use error::ApiError;
