//! The auth provider: owns the in-memory session and keeps it in step with
//! durable storage.
//!
//! State transitions:
//!
//! ```text
//! Initializing --restore--> SignedOut | SignedIn
//! SignedOut --sign_in--> SigningIn --> SignedIn | SignedOut
//! SignedIn --sign_out--> SignedOut
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, CodeExchange};
use crate::config::Config;
use crate::models::{AuthResponse, User};
use crate::oauth::{AuthorizationFlow, AuthorizationKind, AuthorizationRequest};
use crate::storage::{KeyValueStore, TOKEN_STORAGE_KEY, USER_STORAGE_KEY};

use super::{AuthError, AuthState};

/// Result of a sign-in attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    SignedIn(User),
    /// The user cancelled, declined, or the flow reported an error. Nothing changed.
    NotGranted {
        kind: AuthorizationKind,
        error: Option<String>,
    },
    /// Another sign-in is still running
    AlreadyInProgress,
}

/// Clears `is_signing_in` when dropped, including when the owning future is cancelled.
struct SigningInGuard<'a> {
    state: &'a watch::Sender<AuthState>,
    marks_restored: bool,
}

impl<'a> SigningInGuard<'a> {
    fn sign_in(state: &'a watch::Sender<AuthState>) -> Self {
        state.send_modify(|s| s.is_signing_in = true);
        Self {
            state,
            marks_restored: false,
        }
    }

    fn restore(state: &'a watch::Sender<AuthState>) -> Self {
        Self {
            state,
            marks_restored: true,
        }
    }
}

impl Drop for SigningInGuard<'_> {
    fn drop(&mut self) {
        let marks_restored = self.marks_restored;
        self.state.send_modify(|s| {
            s.is_signing_in = false;
            if marks_restored {
                s.restored = true;
            }
        });
    }
}

pub struct AuthProvider {
    client_id: String,
    scope: String,
    api: ApiClient,
    exchange: Arc<dyn CodeExchange>,
    store: Box<dyn KeyValueStore>,
    flow: Box<dyn AuthorizationFlow>,
    state: watch::Sender<AuthState>,
    // Bearer token handed to `api()` consumers
    credential: RwLock<Option<String>>,
    sign_in_lock: Mutex<()>,
    restore_started: AtomicBool,
}

impl AuthProvider {
    pub fn new(
        client_id: impl Into<String>,
        scope: impl Into<String>,
        api: ApiClient,
        store: impl KeyValueStore + 'static,
        flow: impl AuthorizationFlow + 'static,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::initializing());
        Self {
            client_id: client_id.into(),
            scope: scope.into(),
            exchange: Arc::new(api.without_token()),
            api,
            store: Box::new(store),
            flow: Box::new(flow),
            state,
            credential: RwLock::new(None),
            sign_in_lock: Mutex::new(()),
            restore_started: AtomicBool::new(false),
        }
    }

    /// Provider for the configured client id, scope and backend
    pub fn from_config(
        config: &Config,
        store: impl KeyValueStore + 'static,
        flow: impl AuthorizationFlow + 'static,
    ) -> Result<Self> {
        let api = ApiClient::new(&config.api_base_url, config.request_timeout())?;
        Ok(Self::new(&config.client_id, &config.scope, api, store, flow))
    }

    /// Exchange codes somewhere other than the backend's `/authenticate`
    pub fn with_exchange(mut self, exchange: impl CodeExchange + 'static) -> Self {
        self.exchange = Arc::new(exchange);
        self
    }

    /// Read the stored session once. Later calls return the current user
    /// without touching storage.
    pub async fn restore(&self) -> Result<Option<User>, AuthError> {
        if self.restore_started.swap(true, Ordering::SeqCst) {
            debug!("Session already restored");
            return Ok(self.user());
        }
        let _guard = SigningInGuard::restore(&self.state);
        self.load_session().await
    }

    async fn load_session(&self) -> Result<Option<User>, AuthError> {
        let stored_user = self.store.get_item(USER_STORAGE_KEY).await?;
        let stored_token = self.store.get_item(TOKEN_STORAGE_KEY).await?;

        let (Some(user_json), Some(token)) = (
            stored_user.filter(|s| !s.is_empty()),
            stored_token.filter(|s| !s.is_empty()),
        ) else {
            debug!("No stored session");
            return Ok(None);
        };

        let user: User = match serde_json::from_str(&user_json) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Stored user is unreadable, starting signed out");
                return Ok(None);
            }
        };

        *self.credential.write().await = Some(token);
        self.state.send_modify(|s| s.user = Some(user.clone()));
        info!(login = %user.login, "Session restored");
        Ok(Some(user))
    }

    /// Run the authorization code flow and persist the resulting session.
    ///
    /// Failures are logged and returned; whatever was already applied stays
    /// applied. `is_signing_in` is cleared on every exit.
    pub async fn sign_in(&self) -> Result<SignInOutcome, AuthError> {
        let Ok(_lock) = self.sign_in_lock.try_lock() else {
            warn!("Sign-in already in progress");
            return Ok(SignInOutcome::AlreadyInProgress);
        };
        let _guard = SigningInGuard::sign_in(&self.state);

        let result = self.authorize_and_exchange().await;
        if let Err(ref e) = result {
            error!(error = %e, "Sign-in failed");
        }
        result
    }

    async fn authorize_and_exchange(&self) -> Result<SignInOutcome, AuthError> {
        let request = AuthorizationRequest::new(&self.client_id, &self.scope)
            .with_redirect_uri(self.flow.redirect_uri());
        info!(client_id = %self.client_id, scope = %self.scope, "Starting GitHub authorization");

        let outcome = self.flow.authorize(&request.authorize_url()).await?;
        if !outcome.is_granted() {
            info!(kind = %outcome.kind, error = ?outcome.params.error, "Authorization not granted");
            return Ok(SignInOutcome::NotGranted {
                kind: outcome.kind,
                error: outcome.params.error,
            });
        }

        let code = outcome.params.code.ok_or(AuthError::MissingCode)?;
        let AuthResponse { token, user } = self.exchange.authenticate(&code).await?;
        // A token without a profile would restore as signed out; keep nothing
        let user = user.ok_or(AuthError::MissingUser)?;

        *self.credential.write().await = Some(token.clone());

        let user_json = serde_json::to_string(&user)?;
        self.store
            .multi_set(&[(USER_STORAGE_KEY, &user_json), (TOKEN_STORAGE_KEY, &token)])
            .await?;

        self.state.send_modify(|s| s.user = Some(user.clone()));
        info!(login = %user.login, "Signed in");
        Ok(SignInOutcome::SignedIn(user))
    }

    /// Forget the session in memory and in storage. Storage errors are returned
    /// after the in-memory session is already gone.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.state.send_modify(|s| s.user = None);
        *self.credential.write().await = None;
        self.store
            .multi_remove(&[USER_STORAGE_KEY, TOKEN_STORAGE_KEY])
            .await?;
        info!("Signed out");
        Ok(())
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_signing_in(&self) -> bool {
        self.state.borrow().is_signing_in
    }

    pub fn phase(&self) -> super::AuthPhase {
        self.state.borrow().phase()
    }

    pub async fn token(&self) -> Option<String> {
        self.credential.read().await.clone()
    }

    /// Client carrying the current session's credential
    pub async fn api(&self) -> ApiClient {
        match self.credential.read().await.as_deref() {
            Some(token) => self.api.with_token(token),
            None => self.api.without_token(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
