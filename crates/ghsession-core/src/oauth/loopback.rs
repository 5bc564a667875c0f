//! Browser authorization with a loopback redirect.
//!
//! The flow opens the authorize URL in the system browser and listens on
//! `127.0.0.1:<port>` for GitHub's redirect to `/callback`. The first
//! callback request decides the outcome; anything else gets a 404 and the
//! listener keeps waiting until the timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use super::flow::{
    AuthorizationError, AuthorizationFlow, AuthorizationKind, AuthorizationOutcome, AuthorizationParams,
};

/// Default port for the redirect listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 8765;

/// How long to wait for the user to finish in the browser.
pub const DEFAULT_AUTHORIZATION_TIMEOUT_SECS: u64 = 120;

const CALLBACK_PATH: &str = "/callback";

/// A connection that has not sent its request by then is closed.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

type Announcer = Box<dyn Fn(&str) + Send + Sync>;

/// Taken by the first connection that carries a callback.
type OutcomeSender = Arc<Mutex<Option<oneshot::Sender<AuthorizationOutcome>>>>;

pub struct LoopbackAuthorization {
    port: u16,
    timeout: Duration,
    open_browser: bool,
    announcer: Option<Announcer>,
}

impl LoopbackAuthorization {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            open_browser: true,
            announcer: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_CALLBACK_PORT,
            Duration::from_secs(DEFAULT_AUTHORIZATION_TIMEOUT_SECS),
        )
    }

    /// Skip launching the browser; the announcer (if any) still sees the URL
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    /// Called with the authorize URL before waiting, so the user can open it by hand
    pub fn with_announcer(mut self, announcer: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.announcer = Some(Box::new(announcer));
        self
    }

    pub fn callback_url(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.port, CALLBACK_PATH)
    }

    async fn wait_for_callback(&self, listener: TcpListener) -> Result<AuthorizationOutcome, AuthorizationError> {
        let (tx, rx) = oneshot::channel::<AuthorizationOutcome>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        tokio::select! {
            outcome = rx => outcome
                .map_err(|_| AuthorizationError::Flow("redirect listener stopped".to_string())),
            result = accept_connections(listener, tx) => result,
        }
    }
}

/// Serve every connection on its own task so a slow or idle client cannot
/// hold up the redirect. Returns only when accepting fails.
async fn accept_connections(listener: TcpListener, tx: OutcomeSender) -> Result<AuthorizationOutcome, AuthorizationError> {
    loop {
        let (socket, peer) = listener.accept().await?;
        debug!(%peer, "OAuth redirect connection");
        tokio::spawn(serve_connection(socket, peer, tx.clone()));
    }
}

async fn serve_connection(mut socket: TcpStream, peer: SocketAddr, tx: OutcomeSender) {
    match tokio::time::timeout(CONNECTION_TIMEOUT, handle_connection(&mut socket)).await {
        Ok(Ok(Some(outcome))) => {
            if let Some(tx) = tx.lock().await.take() {
                let _ = tx.send(outcome);
            }
        }
        Ok(Ok(None)) => {}
        Ok(Err(e)) => warn!(%peer, error = %e, "Error handling OAuth redirect connection"),
        Err(_) => debug!(%peer, "Closed idle OAuth redirect connection"),
    }
}

#[async_trait]
impl AuthorizationFlow for LoopbackAuthorization {
    fn redirect_uri(&self) -> Option<String> {
        Some(self.callback_url())
    }

    async fn authorize(&self, authorize_url: &str) -> Result<AuthorizationOutcome, AuthorizationError> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| AuthorizationError::Bind { addr: addr.clone(), source })?;
        info!(port = self.port, "Waiting for OAuth redirect");

        if let Some(ref announce) = self.announcer {
            announce(authorize_url);
        }
        if self.open_browser && webbrowser::open(authorize_url).is_err() {
            warn!("Failed to open browser for authorization");
        }

        match tokio::time::timeout(self.timeout, self.wait_for_callback(listener)).await {
            Ok(result) => result,
            Err(_) => {
                info!(timeout_secs = self.timeout.as_secs(), "Authorization timed out");
                Ok(AuthorizationOutcome::dismissed())
            }
        }
    }
}

/// Read one HTTP request. Returns the outcome for a callback request, `None`
/// for anything else.
async fn handle_connection(socket: &mut TcpStream) -> Result<Option<AuthorizationOutcome>, AuthorizationError> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "Received request");

    // Drain the headers so closing the socket does not reset the connection
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    // GET /callback?code=... HTTP/1.1
    let Some(rest) = request_line.strip_prefix("GET ") else {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(None);
    };
    let target = rest.split_whitespace().next().unwrap_or("");

    let Some(outcome) = parse_callback(target) else {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(None);
    };

    let page = match outcome.kind {
        AuthorizationKind::Success => success_page(),
        _ => error_page(outcome.params.error.as_deref().unwrap_or("missing authorization code")),
    };
    send_response(&mut writer, 200, "OK", &page).await?;
    Ok(Some(outcome))
}

/// Map a request target on the callback path to an outcome.
fn parse_callback(target: &str) -> Option<AuthorizationOutcome> {
    let url = url::Url::parse(&format!("http://127.0.0.1{}", target)).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut params = AuthorizationParams::default();
    for (key, value) in url.query_pairs() {
        match &*key {
            "code" if !value.is_empty() => params.code = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => {}
        }
    }

    let kind = if params.error.is_some() || params.code.is_none() {
        AuthorizationKind::Error
    } else {
        AuthorizationKind::Success
    };
    Some(AuthorizationOutcome { kind, params })
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> Result<(), AuthorizationError> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Signed in</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Signed in with GitHub</h1>
<p>You can close this window and return to the terminal.</p>
</body>
</html>"#
        .to_string()
}

fn error_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign-in failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Sign-in failed</h1>
<p>Error: {}</p>
<p>You can close this window and try again.</p>
</body>
</html>"#,
        escape_html(error)
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    async fn connect(port: u16) -> TcpStream {
        // The listener is bound inside authorize(); retry until it is up
        loop {
            match TcpStream::connect(("127.0.0.1", port)).await {
                Ok(stream) => return stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    }

    async fn send_get(port: u16, target: &str) -> String {
        let mut stream = connect(port).await;
        let request = format!("GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n", target);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_callback_url() {
        let flow = LoopbackAuthorization::with_defaults();
        assert_eq!(flow.callback_url(), "http://127.0.0.1:8765/callback");
        assert_eq!(flow.redirect_uri().as_deref(), Some("http://127.0.0.1:8765/callback"));
    }

    #[test]
    fn test_parse_callback() {
        let outcome = parse_callback("/callback?code=abc%20def").unwrap();
        assert_eq!(outcome, AuthorizationOutcome::success("abc def"));

        let outcome = parse_callback("/callback?error=access_denied&error_description=The+user+denied").unwrap();
        assert_eq!(outcome.kind, AuthorizationKind::Error);
        assert_eq!(outcome.params.error.as_deref(), Some("access_denied"));
        assert!(!outcome.is_granted());

        let outcome = parse_callback("/callback").unwrap();
        assert_eq!(outcome.kind, AuthorizationKind::Error);
        assert!(outcome.params.code.is_none());

        assert!(parse_callback("/favicon.ico").is_none());
        assert!(parse_callback("/callbackx?code=abc").is_none());
    }

    #[test]
    fn test_error_page_escapes() {
        let page = error_page("<script>alert(1)</script>");
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }

    #[tokio::test]
    async fn test_authorize_receives_code() {
        let port = free_port();
        let flow = LoopbackAuthorization::new(port, Duration::from_secs(5)).without_browser();

        let browser = tokio::spawn(async move {
            let not_found = send_get(port, "/favicon.ico").await;
            assert!(not_found.starts_with("HTTP/1.1 404"));
            send_get(port, "/callback?code=abc123").await
        });

        let outcome = flow.authorize("https://github.com/login/oauth/authorize").await.unwrap();
        assert_eq!(outcome, AuthorizationOutcome::success("abc123"));

        let page = browser.await.unwrap();
        assert!(page.starts_with("HTTP/1.1 200 OK"));
        assert!(page.contains("Signed in with GitHub"));
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_callback() {
        let port = free_port();
        let flow = LoopbackAuthorization::new(port, Duration::from_secs(5)).without_browser();

        let browser = tokio::spawn(async move {
            // Opened first and never sends a request, like a browser preconnect
            let idle = connect(port).await;
            let page = send_get(port, "/callback?code=abc").await;
            drop(idle);
            page
        });

        let outcome = flow.authorize("https://github.com/login/oauth/authorize").await.unwrap();
        assert_eq!(outcome, AuthorizationOutcome::success("abc"));
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_authorize_announces_url() {
        let port = free_port();
        let (tx, rx) = std::sync::mpsc::channel();
        let flow = LoopbackAuthorization::new(port, Duration::from_secs(5))
            .without_browser()
            .with_announcer(move |url| {
                let _ = tx.send(url.to_string());
            });

        let browser = tokio::spawn(async move { send_get(port, "/callback?error=access_denied").await });

        let outcome = flow.authorize("https://example.test/authorize").await.unwrap();
        assert_eq!(outcome, AuthorizationOutcome::error("access_denied"));
        assert_eq!(rx.recv().unwrap(), "https://example.test/authorize");
        assert!(browser.await.unwrap().contains("access_denied"));
    }

    #[tokio::test]
    async fn test_authorize_times_out_as_dismiss() {
        let flow = LoopbackAuthorization::new(free_port(), Duration::from_millis(50)).without_browser();
        let outcome = flow.authorize("https://example.test/authorize").await.unwrap();
        assert_eq!(outcome, AuthorizationOutcome::dismissed());
    }

    #[tokio::test]
    async fn test_authorize_reports_busy_port() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let flow = LoopbackAuthorization::new(port, Duration::from_secs(1)).without_browser();
        let err = flow.authorize("https://example.test/authorize").await.unwrap_err();
        assert!(matches!(err, AuthorizationError::Bind { .. }));
    }
}
