//! ghsession - sign in with GitHub from the terminal and keep the session.
//!
//! The session is restored on every start; `login` runs the browser
//! authorization flow and `logout` forgets the stored session.

use std::io;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ghsession_core::oauth::LoopbackAuthorization;
use ghsession_core::{AuthPhase, AuthProvider, Config, SignInOutcome};

const USAGE: &str = "\
Usage: ghsession <command>

Commands:
  login        Sign in with GitHub in the browser
  logout       Forget the stored session
  status       Show who is signed in
  token        Print the session's bearer token
  get <path>   Authenticated GET against the backend, prints JSON
";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprint!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        print!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    let flow = LoopbackAuthorization::new(config.callback_port, config.authorization_timeout())
        .with_announcer(|url| {
            eprintln!("Opening GitHub in your browser. If it does not open, visit:\n\n    {}\n", url);
        });
    let provider = AuthProvider::from_config(&config, config.open_storage()?, flow)?;
    provider
        .restore()
        .await
        .context("Failed to restore the stored session")?;
    info!(phase = %provider.phase(), "Session loaded");

    match command {
        "login" => login(&provider).await,
        "logout" => logout(&provider).await,
        "status" => {
            status(&provider);
            Ok(())
        }
        "token" => token(&provider).await,
        "get" => {
            let path = args.get(1).context("get requires a path, e.g. `ghsession get /profile`")?;
            get(&provider, path).await
        }
        other => {
            eprint!("{}", USAGE);
            bail!("Unknown command: {}", other)
        }
    }
}

async fn login(provider: &AuthProvider) -> Result<()> {
    if let Some(user) = provider.user() {
        println!("Already signed in as {} ({}).", user.login, user.display_name());
        return Ok(());
    }

    match provider.sign_in().await.context("Sign-in failed")? {
        SignInOutcome::SignedIn(user) => {
            println!("Signed in as {} ({}).", user.login, user.display_name());
        }
        SignInOutcome::NotGranted { kind, error } => match error {
            Some(error) => println!("Sign-in did not complete ({}: {}).", kind, error),
            None => println!("Sign-in did not complete ({}).", kind),
        },
        SignInOutcome::AlreadyInProgress => println!("A sign-in is already in progress."),
    }
    Ok(())
}

async fn logout(provider: &AuthProvider) -> Result<()> {
    let was = provider.user();
    provider.sign_out().await.context("Failed to remove the stored session")?;
    match was {
        Some(user) => println!("Signed out {}.", user.login),
        None => println!("Not signed in."),
    }
    Ok(())
}

fn status(provider: &AuthProvider) {
    match (provider.phase(), provider.user()) {
        (AuthPhase::SignedIn, Some(user)) => {
            println!("Signed in as {} ({})", user.login, user.display_name());
            println!("  id:     {}", user.id);
            println!("  avatar: {}", user.avatar_url);
        }
        (phase, _) => println!("{}", capitalize(phase.as_str())),
    }
}

async fn token(provider: &AuthProvider) -> Result<()> {
    match provider.token().await {
        Some(token) => {
            println!("{}", token);
            Ok(())
        }
        None => bail!("Not signed in. Run `ghsession login` first."),
    }
}

async fn get(provider: &AuthProvider, path: &str) -> Result<()> {
    let api = provider.api().await;
    if !api.is_authenticated() {
        bail!("Not signed in. Run `ghsession login` first.");
    }
    let value: serde_json::Value = api
        .get(path)
        .await
        .with_context(|| format!("GET {} failed", path))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
