use async_trait::async_trait;
use thiserror::Error;

/// GitHub's OAuth authorization endpoint
pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";

/// Error value GitHub sends back when the user declines the authorization
pub const ACCESS_DENIED: &str = "access_denied";

#[derive(Error, Debug)]
pub enum AuthorizationError {
    #[error("Failed to listen for the OAuth redirect on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OAuth redirect connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authorization flow failed: {0}")]
    Flow(String),
}

/// Parameters of an authorization code request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub scope: String,
    pub redirect_uri: Option<String>,
}

impl AuthorizationRequest {
    pub fn new(client_id: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            scope: scope.into(),
            redirect_uri: None,
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: Option<String>) -> Self {
        self.redirect_uri = redirect_uri;
        self
    }

    /// Build the URL the user is sent to
    pub fn authorize_url(&self) -> String {
        let mut url = format!(
            "{}?client_id={}&scope={}",
            GITHUB_AUTHORIZE_URL,
            encode_query_value(&self.client_id),
            encode_query_value(&self.scope)
        );
        if let Some(ref redirect_uri) = self.redirect_uri {
            url.push_str("&redirect_uri=");
            url.push_str(&url::form_urlencoded::byte_serialize(redirect_uri.as_bytes()).collect::<String>());
        }
        url
    }
}

/// ':' is legal inside a query component and GitHub scopes are written `read:user`.
fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace("%3A", ":")
}

/// How an interactive authorization session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationKind {
    /// The redirect came back (it may still carry an `error`)
    Success,
    /// The provider redirected with an error
    Error,
    /// The user cancelled
    Cancel,
    /// The session was closed without a redirect (timeout, window closed)
    Dismiss,
}

impl AuthorizationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationKind::Success => "success",
            AuthorizationKind::Error => "error",
            AuthorizationKind::Cancel => "cancel",
            AuthorizationKind::Dismiss => "dismiss",
        }
    }
}

impl std::fmt::Display for AuthorizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters of the redirect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationOutcome {
    pub kind: AuthorizationKind,
    pub params: AuthorizationParams,
}

impl AuthorizationOutcome {
    pub fn success(code: impl Into<String>) -> Self {
        Self {
            kind: AuthorizationKind::Success,
            params: AuthorizationParams {
                code: Some(code.into()),
                error: None,
            },
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            kind: AuthorizationKind::Error,
            params: AuthorizationParams {
                code: None,
                error: Some(error.into()),
            },
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: AuthorizationKind::Cancel,
            params: AuthorizationParams::default(),
        }
    }

    pub fn dismissed() -> Self {
        Self {
            kind: AuthorizationKind::Dismiss,
            params: AuthorizationParams::default(),
        }
    }

    /// The code may be exchanged: the session succeeded and the user did not decline
    pub fn is_granted(&self) -> bool {
        self.kind == AuthorizationKind::Success && self.params.error.as_deref() != Some(ACCESS_DENIED)
    }
}

/// Host capability that presents the authorize URL and waits for the redirect.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    /// Redirect URI to register with the request, when the flow needs a specific one
    fn redirect_uri(&self) -> Option<String> {
        None
    }

    async fn authorize(&self, authorize_url: &str) -> Result<AuthorizationOutcome, AuthorizationError>;
}
