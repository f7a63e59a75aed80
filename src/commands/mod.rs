//! Command handlers for the oidc-session CLI
//!
//! Each handler performs one session operation and returns the text to print
//! on stdout. Diagnostics go through `tracing` (stderr), so stdout stays
//! clean enough to capture, e.g. `TOKEN=$(oidc-session token)`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use url::Url;

use crate::config::Config;
use crate::error::{Result, SessionError};
use crate::session::discovery::ProviderEndpoints;
use crate::session::SessionManager;

/// Builds the session manager for a CLI invocation.
///
/// Resolves the provider endpoints (running discovery when enabled) and
/// opens the configured storage backend.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built, discovery fails, or
/// the storage backend cannot be opened.
pub async fn build_session(config: &Config) -> Result<SessionManager> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.session.http_timeout_seconds))
        .build()
        .map_err(SessionError::Http)?;
    let endpoints = ProviderEndpoints::resolve(&http, &config.oidc).await?;
    SessionManager::builder(config, endpoints)
        .http(Arc::new(http))
        .build()
}

/// `login`: starts the flow and explains how to finish it.
pub fn login(session: &SessionManager, redirect_path: Option<&str>) -> Result<String> {
    let url = session.login(redirect_path)?;
    tracing::debug!(host = ?url.host_str(), "Authorization URL issued");
    Ok("After signing in, copy the address your browser was redirected to and run:\n  \
        oidc-session callback --url '<redirected URL>'"
        .to_string())
}

/// `callback`: completes the flow from a redirect URL or a code/state pair.
///
/// # Errors
///
/// Propagates every callback failure; the user has to run `login` again.
pub async fn callback(
    session: &SessionManager,
    url: Option<&str>,
    code: Option<&str>,
    state: Option<&str>,
) -> Result<String> {
    let redirect = match (url, code) {
        (Some(url), _) => {
            let url = Url::parse(url).with_context(|| format!("Invalid callback URL: {}", url))?;
            session.handle_callback_url(&url).await?
        }
        (None, Some(code)) => {
            session
                .handle_callback(code, state.unwrap_or_default())
                .await?
        }
        (None, None) => {
            return Err(SessionError::MissingAuthorizationCode.into());
        }
    };

    let mut out = String::from("Signed in.");
    if let Some(path) = redirect {
        out.push_str(&format!("\nContinue at: {}", path));
    }
    Ok(out)
}

/// `token`: prints a usable access token, refreshing it when due.
///
/// # Errors
///
/// Fails when there is no session or it could not be refreshed.
pub async fn token(session: &SessionManager) -> Result<String> {
    session
        .get_access_token()
        .await
        .context("Not signed in. Run `oidc-session login` first.")
}

/// `status`: session state and expiry, without touching the network.
pub fn status(session: &SessionManager) -> Result<String> {
    let mut out = format!(
        "state: {}\nauthenticated: {}",
        session.session_state(),
        session.is_authenticated()
    );
    if let Some(expires_at) = session.expires_at() {
        let formatted = DateTime::<Utc>::from_timestamp_millis(expires_at)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| expires_at.to_string());
        out.push_str(&format!("\nexpires_at: {}", formatted));
    }
    if let Some(path) = session.redirect_path() {
        out.push_str(&format!("\nredirect_path: {}", path));
    }
    Ok(out)
}

/// `whoami`: the unverified identity claims as JSON.
pub fn whoami(session: &SessionManager) -> Result<String> {
    match session.get_user_info() {
        Some(claims) => Ok(serde_json::to_string_pretty(&claims)?),
        None => Err(anyhow::anyhow!("No identity token stored.")),
    }
}

/// `logout`: ends the session and reports where the browser was sent.
pub fn logout(session: &SessionManager) -> Result<String> {
    let location = session.logout()?;
    Ok(format!("Signed out. Logout location: {}", location))
}

/// `redirect-path`: shows or clears the remembered post-login path.
pub fn redirect_path(session: &SessionManager, clear: bool) -> Result<String> {
    if clear {
        session.clear_redirect_path()?;
        return Ok("Redirect path cleared.".to_string());
    }
    Ok(session
        .redirect_path()
        .unwrap_or_else(|| "(none)".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::platform::RecordingNavigator;
    use crate::storage::MemoryStore;
    use crate::test_utils::{test_config, test_endpoints};

    fn session() -> SessionManager {
        let config = test_config("https://auth.example.com");
        SessionManager::builder(&config, test_endpoints(&config))
            .storage(Arc::new(MemoryStore::new()))
            .navigator(Arc::new(RecordingNavigator::new()))
            .build()
            .expect("build session")
    }

    #[tokio::test]
    async fn test_token_without_session_fails() {
        let res = token(&session()).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_callback_without_code_fails() {
        let res = callback(&session(), None, None, None).await;
        let err = res.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::MissingAuthorizationCode)
        ));
    }

    #[tokio::test]
    async fn test_callback_with_invalid_url_fails() {
        let res = callback(&session(), Some("not a url"), None, None).await;
        assert!(res.is_err());
    }

    #[test]
    fn test_status_when_signed_out() {
        let out = status(&session()).unwrap();
        assert!(out.contains("state: unauthenticated"));
        assert!(out.contains("authenticated: false"));
        assert!(!out.contains("expires_at"));
    }

    #[test]
    fn test_login_then_redirect_path() {
        let s = session();
        login(&s, Some("/links")).unwrap();
        assert_eq!(redirect_path(&s, false).unwrap(), "/links");
        assert!(status(&s).unwrap().contains("state: authenticating"));
        redirect_path(&s, true).unwrap();
        assert_eq!(redirect_path(&s, false).unwrap(), "(none)");
    }

    #[test]
    fn test_whoami_without_id_token_fails() {
        assert!(whoami(&session()).is_err());
    }

    #[test]
    fn test_logout_without_session_goes_to_root() {
        let out = logout(&session()).unwrap();
        assert!(out.ends_with("Logout location: /"));
    }
}
