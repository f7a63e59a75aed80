//! Provider endpoint resolution
//!
//! Endpoints come either from the configured paths appended to the
//! authority, or from the provider's OpenID discovery document at
//! `{authority}/.well-known/openid-configuration`.

use serde::Deserialize;
use url::Url;

use crate::config::OidcConfig;
use crate::error::{Result, SessionError};

/// The three endpoints the session manager talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub end_session_endpoint: Url,
}

/// Subset of the OpenID Provider Metadata document.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

impl ProviderEndpoints {
    /// Builds endpoints from `authority` and the configured paths.
    ///
    /// # Examples
    ///
    /// ```
    /// use oidc_session::config::OidcConfig;
    /// use oidc_session::session::discovery::ProviderEndpoints;
    ///
    /// let oidc = OidcConfig {
    ///     authority: "https://auth.example.com".to_string(),
    ///     authorize_path: "/oauth/v2/authorize".to_string(),
    ///     ..OidcConfig::default()
    /// };
    /// let endpoints = ProviderEndpoints::from_paths(&oidc).unwrap();
    /// assert_eq!(
    ///     endpoints.authorization_endpoint.as_str(),
    ///     "https://auth.example.com/oauth/v2/authorize"
    /// );
    /// assert_eq!(endpoints.token_endpoint.path(), "/token");
    /// ```
    pub fn from_paths(oidc: &OidcConfig) -> Result<Self> {
        Ok(Self {
            authorization_endpoint: oidc.endpoint(&oidc.authorize_path)?,
            token_endpoint: oidc.endpoint(&oidc.token_path)?,
            end_session_endpoint: oidc.endpoint(&oidc.end_session_path)?,
        })
    }

    /// Uses discovery when `oidc.discovery` is set, configured paths otherwise.
    pub async fn resolve(http: &reqwest::Client, oidc: &OidcConfig) -> Result<Self> {
        if oidc.discovery {
            discover(http, oidc).await
        } else {
            Self::from_paths(oidc)
        }
    }
}

/// Fetches and validates the discovery document.
///
/// The document's `issuer` must equal the configured authority (ignoring a
/// trailing slash). A provider that omits `end_session_endpoint` falls back
/// to the configured end-session path.
///
/// # Errors
///
/// Returns `SessionError::Discovery` when the document cannot be fetched,
/// parsed, or fails validation.
pub async fn discover(http: &reqwest::Client, oidc: &OidcConfig) -> Result<ProviderEndpoints> {
    let url = oidc.endpoint("/.well-known/openid-configuration")?;
    tracing::debug!(url = %url, "Fetching OpenID provider metadata");

    let resp = http.get(url.clone()).send().await.map_err(|e| {
        SessionError::Discovery(format!("failed to fetch {}: {}", url, e))
    })?;

    if !resp.status().is_success() {
        return Err(SessionError::Discovery(format!(
            "{} returned HTTP {}",
            url,
            resp.status()
        ))
        .into());
    }

    let metadata: ProviderMetadata = resp.json().await.map_err(|e| {
        SessionError::Discovery(format!("failed to parse discovery document: {}", e))
    })?;

    if metadata.issuer.trim_end_matches('/') != oidc.authority.trim_end_matches('/') {
        return Err(SessionError::Discovery(format!(
            "issuer mismatch: expected '{}', got '{}'",
            oidc.authority, metadata.issuer
        ))
        .into());
    }

    if !metadata.code_challenge_methods_supported.is_empty()
        && !metadata
            .code_challenge_methods_supported
            .iter()
            .any(|m| m == "S256")
    {
        return Err(SessionError::Discovery(
            "provider does not support PKCE with S256".to_string(),
        )
        .into());
    }

    let parse = |field: &str, value: &str| -> Result<Url> {
        Url::parse(value).map_err(|e| {
            SessionError::Discovery(format!("invalid {} '{}': {}", field, value, e)).into()
        })
    };

    let end_session_endpoint = match metadata.end_session_endpoint.as_deref() {
        Some(value) => parse("end_session_endpoint", value)?,
        None => {
            tracing::warn!("Provider metadata has no end_session_endpoint; using configured path");
            oidc.endpoint(&oidc.end_session_path)?
        }
    };

    let endpoints = ProviderEndpoints {
        authorization_endpoint: parse("authorization_endpoint", &metadata.authorization_endpoint)?,
        token_endpoint: parse("token_endpoint", &metadata.token_endpoint)?,
        end_session_endpoint,
    };
    tracing::info!(
        token_endpoint = %endpoints.token_endpoint,
        "Resolved provider endpoints via discovery"
    );
    Ok(endpoints)
}
