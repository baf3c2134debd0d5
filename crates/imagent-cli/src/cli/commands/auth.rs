//! Account command handlers (signup, login, logout, status).

use anyhow::Result;
use imagent_core::api::{self, AuthClient};
use imagent_core::config::Config;
use imagent_core::session::SessionStore;

fn build_client(config: &Config) -> Result<AuthClient> {
    let base_url = api::resolve_base_url(config.base_url.as_deref())?;
    Ok(AuthClient::with_request_timeout(
        base_url,
        config.request_timeout(),
    ))
}

pub async fn login(config: &Config, email: &str, password: &str) -> Result<()> {
    let client = build_client(config)?;
    let outcome = client.login(email, password).await?;

    let mut session = SessionStore::open_default()?;
    session.login(outcome.token)?;

    if let Some(message) = outcome.message {
        tracing::debug!(%message, "login response");
    }
    println!("Logged in as {email}.");
    Ok(())
}

pub async fn signup(
    config: &Config,
    email: &str,
    password: &str,
    code: Option<&str>,
    captcha_token: Option<&str>,
) -> Result<()> {
    let client = build_client(config)?;

    let Some(code) = code else {
        // First phase: CAPTCHA (when provided), then ask for a code.
        if let Some(token) = captcha_token {
            let message = client.verify_captcha(email, token).await?;
            tracing::debug!(%message, "captcha response");
        }
        let message = client.send_verification_code(email).await?;
        println!("{message}");
        println!("Re-run signup with --code <CODE> once it arrives.");
        return Ok(());
    };

    let outcome = client.register(email, password, code).await?;
    let mut session = SessionStore::open_default()?;
    session.login(outcome.token)?;

    println!("Account created; logged in as {email}.");
    Ok(())
}

pub async fn send_code(config: &Config, email: &str) -> Result<()> {
    let client = build_client(config)?;
    let message = client.send_verification_code(email).await?;
    println!("{message}");
    Ok(())
}

pub fn logout() -> Result<()> {
    let mut session = SessionStore::open_default()?;
    if !session.is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }

    session.logout()?;
    println!("Logged out.");
    Ok(())
}

pub fn status() -> Result<()> {
    let session = SessionStore::open_default()?;
    if session.is_authenticated() {
        println!("Logged in.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}
