//! Token endpoint client
//!
//! Talks to the provider's token endpoint for the two grants a public
//! PKCE client uses: `authorization_code` and `refresh_token`. Both send an
//! `application/x-www-form-urlencoded` body and never retry.

use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::error::{Result, SessionError};

/// Successful token endpoint response (RFC 6749 section 5.1).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Which grant a request used, for error mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

/// Client for a single provider's token endpoint.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use oidc_session::session::token_client::TokenClient;
/// use url::Url;
///
/// # async fn example() -> oidc_session::error::Result<()> {
/// let client = TokenClient::new(
///     Arc::new(reqwest::Client::new()),
///     Url::parse("https://idp.example.com/oauth/v2/token")?,
///     "client-123",
///     "https://app.example.com/auth/callback",
/// );
/// let tokens = client.exchange_code("abc123", "verifier").await?;
/// println!("expires in {}s", tokens.expires_in);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: Arc<reqwest::Client>,
    token_endpoint: Url,
    client_id: String,
    redirect_uri: String,
}

impl TokenClient {
    pub fn new(
        http: Arc<reqwest::Client>,
        token_endpoint: Url,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_endpoint,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    /// Exchanges an authorization code and its PKCE verifier for tokens.
    ///
    /// # Arguments
    ///
    /// * `code` - Authorization code from the callback
    /// * `verifier` - PKCE verifier persisted at login
    ///
    /// # Errors
    ///
    /// - `SessionError::TokenExchange` when the endpoint answers non-2xx
    /// - `SessionError::InvalidTokenResponse` when the body is not a token response
    /// - `SessionError::Http` on transport failure
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ];
        self.post(Grant::AuthorizationCode, &params).await
    }

    /// Obtains fresh tokens with a refresh token.
    ///
    /// # Errors
    ///
    /// - `SessionError::TokenRefresh` when the endpoint answers non-2xx
    /// - `SessionError::InvalidTokenResponse` when the body is not a token response
    /// - `SessionError::Http` on transport failure
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        self.post(Grant::RefreshToken, &params).await
    }

    async fn post(&self, grant: Grant, params: &[(&str, &str)]) -> Result<TokenResponse> {
        tracing::debug!(endpoint = %self.token_endpoint, ?grant, "Calling token endpoint");

        let resp = self
            .http
            .post(self.token_endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(params)
            .send()
            .await
            .map_err(SessionError::Http)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let status = status.as_u16();
            return Err(match grant {
                Grant::AuthorizationCode => SessionError::TokenExchange { status, body },
                Grant::RefreshToken => SessionError::TokenRefresh { status, body },
            }
            .into());
        }

        let body = resp.text().await.map_err(SessionError::Http)?;
        let tokens: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SessionError::InvalidTokenResponse(e.to_string()))?;
        Ok(tokens)
    }
}
