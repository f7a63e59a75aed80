//! Session manager: the login state machine
//!
//! [`SessionManager`] ties the pieces together. It starts logins, completes
//! callbacks, hands out access tokens (refreshing them shortly before they
//! expire), reports whether the user is signed in, and ends sessions.
//!
//! # States
//!
//! ```text
//!                    login()                 handle_callback()
//! Unauthenticated ─────────────▶ Authenticating ─────────────▶ Authenticated
//!        ▲                                                      │      ▲
//!        │           logout() / refresh failure                 │      │
//!        └──────────────────────────────────────────────────────┘      │
//!                                                  get_access_token()  │
//!                                         Authenticated ─▶ Refreshing ─┘
//! ```
//!
//! `Refreshing` is transient and never persisted; everything else is derived
//! from storage, so a fresh process picks up where the previous one stopped.
//!
//! # Concurrency
//!
//! Concurrent [`SessionManager::get_access_token`] calls near expiry share a
//! single refresh request. The pending refresh lives in a slot as a
//! [`Shared`] future; callers clone the handle and await it. The manager
//! also keeps a session epoch, bumped whenever a session ends or a new one
//! begins. A refresh only commits its result if the epoch it started under
//! is still current, so a slow refresh cannot resurrect a session the user
//! already left.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use url::Url;

use crate::config::Config;
use crate::error::{Result, SessionError};
use crate::session::authorize::{end_session_url, AuthorizationRequest};
use crate::session::claims::{decode_unverified, UnverifiedClaims};
use crate::session::discovery::ProviderEndpoints;
use crate::session::pkce;
use crate::session::platform::{
    BrowserNavigator, Clock, Navigator, OsRandom, RandomSource, SystemClock,
};
use crate::session::token_client::TokenClient;
use crate::session::token_store::{AuthState, TokenStore};
use crate::storage::{self, KeyValueStore};

type RefreshFlight = Shared<BoxFuture<'static, Option<String>>>;

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable tokens and no login in progress
    Unauthenticated,
    /// `login()` ran; waiting for the provider to redirect back
    Authenticating,
    /// Tokens are stored (possibly due for a refresh)
    Authenticated,
    /// A token refresh is in flight in this process
    Refreshing,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
        };
        f.write_str(label)
    }
}

struct Inner {
    client_id: String,
    redirect_uri: String,
    post_logout_redirect_uri: String,
    scope: String,
    app_root: String,
    leeway_ms: i64,
    endpoints: ProviderEndpoints,
    token_client: TokenClient,
    store: TokenStore,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    navigator: Arc<dyn Navigator>,
    // Held while reading or changing the epoch together with a store write.
    epoch: Mutex<u64>,
    in_flight: Mutex<Option<RefreshFlight>>,
}

/// Client-side OIDC session. Cheap to clone; clones share all state.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use oidc_session::config::Config;
/// use oidc_session::session::discovery::ProviderEndpoints;
/// use oidc_session::session::SessionManager;
/// use oidc_session::storage::MemoryStore;
///
/// # async fn example() -> oidc_session::error::Result<()> {
/// let mut config = Config::default();
/// config.oidc.authority = "https://auth.example.com".to_string();
/// config.oidc.client_id = "client-123".to_string();
///
/// let endpoints = ProviderEndpoints::from_paths(&config.oidc)?;
/// let session = SessionManager::builder(&config, endpoints)
///     .storage(Arc::new(MemoryStore::new()))
///     .build()?;
///
/// if let Some(token) = session.get_access_token().await {
///     println!("Bearer {}", token);
/// } else {
///     session.login(Some("/dashboard"))?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("client_id", &self.inner.client_id)
            .field("endpoints", &self.inner.endpoints)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

/// Outcome of an attempt to end the current session.
enum Cleared {
    /// The session was removed; carries its id token, if any
    Session { id_token: Option<String> },
    /// A newer session replaced the one the caller knew about
    Superseded,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`SessionManager`] from configuration plus injected seams.
///
/// Anything not supplied falls back to the production implementation:
/// a `reqwest` client with the configured timeout, the configured storage
/// backend, the system clock, the OS RNG and the terminal navigator.
pub struct SessionManagerBuilder {
    config: Config,
    endpoints: ProviderEndpoints,
    http: Option<Arc<reqwest::Client>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    random: Option<Arc<dyn RandomSource>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl SessionManagerBuilder {
    pub fn http(mut self, http: Arc<reqwest::Client>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Builds the manager.
    ///
    /// # Errors
    ///
    /// Fails when the default HTTP client or storage backend cannot be
    /// created.
    pub fn build(self) -> Result<SessionManager> {
        let http = match self.http {
            Some(http) => http,
            None => Arc::new(
                reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(
                        self.config.session.http_timeout_seconds,
                    ))
                    .build()
                    .map_err(SessionError::Http)?,
            ),
        };
        let storage = match self.storage {
            Some(storage) => storage,
            None => storage::open_backend(&self.config.storage)?,
        };

        let oidc = self.config.oidc;
        let token_client = TokenClient::new(
            http,
            self.endpoints.token_endpoint.clone(),
            oidc.client_id.clone(),
            oidc.redirect_uri.clone(),
        );
        let leeway_ms =
            i64::try_from(self.config.session.refresh_leeway_seconds.saturating_mul(1000))
                .unwrap_or(i64::MAX);

        let inner = Inner {
            client_id: oidc.client_id,
            redirect_uri: oidc.redirect_uri,
            post_logout_redirect_uri: oidc.post_logout_redirect_uri,
            scope: oidc.scope,
            app_root: self.config.session.app_root,
            leeway_ms,
            endpoints: self.endpoints,
            token_client,
            store: TokenStore::new(storage, self.config.storage.namespace),
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>),
            random: self
                .random
                .unwrap_or_else(|| Arc::new(OsRandom) as Arc<dyn RandomSource>),
            navigator: self
                .navigator
                .unwrap_or_else(|| Arc::new(BrowserNavigator) as Arc<dyn Navigator>),
            epoch: Mutex::new(0),
            in_flight: Mutex::new(None),
        };

        Ok(SessionManager {
            inner: Arc::new(inner),
        })
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

impl SessionManager {
    /// Starts a builder for `config` talking to `endpoints`.
    pub fn builder(config: &Config, endpoints: ProviderEndpoints) -> SessionManagerBuilder {
        SessionManagerBuilder {
            config: config.clone(),
            endpoints,
            http: None,
            storage: None,
            clock: None,
            random: None,
            navigator: None,
        }
    }

    /// Endpoints this manager talks to.
    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.inner.endpoints
    }

    /// Begins a login.
    ///
    /// Remembers `redirect_path` (when given), generates and persists a
    /// fresh PKCE verifier and `state`, then navigates to the provider's
    /// authorization URL.
    ///
    /// # Returns
    ///
    /// The authorization URL that was navigated to
    ///
    /// # Errors
    ///
    /// Fails when the entropy source or the storage backend fails. Nothing
    /// is navigated to in that case.
    pub fn login(&self, redirect_path: Option<&str>) -> Result<Url> {
        let inner = &self.inner;

        if let Some(path) = redirect_path {
            inner.store.save_redirect_path(path)?;
        }

        let pair = pkce::generate(inner.random.as_ref())?;
        let request = AuthorizationRequest::build(
            &inner.endpoints.authorization_endpoint,
            &inner.client_id,
            &inner.redirect_uri,
            &inner.scope,
            &pair.challenge,
            inner.random.as_ref(),
        )?;

        inner.store.save_verifier(&pair.verifier)?;
        inner.store.save_pending_state(&request.state)?;

        tracing::info!(
            endpoint = %inner.endpoints.authorization_endpoint,
            "Starting login"
        );
        inner.navigator.navigate(request.url.as_str());
        Ok(request.url)
    }

    /// Completes a login with the `code` and `state` from the redirect.
    ///
    /// # Returns
    ///
    /// The redirect path remembered by `login()`, now consumed
    ///
    /// # Errors
    ///
    /// - `SessionError::MissingPkceVerifier` if no login is pending
    /// - `SessionError::StateMismatch` if `state` is not the one issued
    /// - `SessionError::TokenExchange` if the provider rejects the code
    ///
    /// The first two leave storage untouched. A failed exchange keeps the
    /// verifier so the pending login stays visible; the user must restart.
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<Option<String>> {
        let inner = &self.inner;

        let verifier = inner
            .store
            .verifier()
            .ok_or(SessionError::MissingPkceVerifier)?;

        if inner.store.pending_state().as_deref() != Some(state) {
            tracing::warn!("Callback state does not match the pending login");
            return Err(SessionError::StateMismatch.into());
        }

        let tokens = inner
            .token_client
            .exchange_code(code, &verifier)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Authorization code exchange failed"))?;

        let auth = AuthState::from_response(&tokens, inner.clock.now_ms(), None);
        {
            let mut epoch = lock(&inner.epoch);
            inner.store.save(&auth)?;
            *epoch += 1;
        }
        inner.store.clear_pkce()?;
        let redirect = inner.store.take_redirect_path()?;

        tracing::info!(
            has_refresh_token = auth.refresh_token.is_some(),
            has_id_token = auth.id_token.is_some(),
            "Login completed"
        );
        Ok(redirect)
    }

    /// Completes a login from the full redirect URL.
    ///
    /// # Errors
    ///
    /// - `SessionError::AuthorizationDenied` when the URL carries `error`
    /// - `SessionError::MissingAuthorizationCode` when it carries no `code`
    /// - anything [`SessionManager::handle_callback`] returns
    pub async fn handle_callback_url(&self, url: &Url) -> Result<Option<String>> {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(SessionError::AuthorizationDenied { error, description }.into());
        }
        let code = code.ok_or(SessionError::MissingAuthorizationCode)?;

        self.handle_callback(&code, state.as_deref().unwrap_or_default())
            .await
    }

    /// Returns an access token that is good for at least the refresh leeway.
    ///
    /// Tokens far from expiry are returned straight from storage. Tokens
    /// near or past expiry are refreshed when a refresh token exists;
    /// concurrent callers share one refresh. A failed refresh ends the
    /// session.
    ///
    /// Returns `None` when there is no session, when it cannot be refreshed,
    /// or when the refresh fails.
    pub async fn get_access_token(&self) -> Option<String> {
        let inner = &self.inner;

        let state = inner.store.load()?;
        if state.remaining_ms(inner.clock.now_ms()) > inner.leeway_ms {
            tracing::debug!("Access token still fresh");
            return Some(state.access_token);
        }
        if state.refresh_token.is_none() {
            tracing::debug!("Access token due for refresh but no refresh token stored");
            return None;
        }

        let flight = {
            let mut slot = lock(&inner.in_flight);
            match slot.clone() {
                Some(flight) => {
                    tracing::debug!("Joining in-flight token refresh");
                    flight
                }
                None => {
                    // Read before the store: a logout after this point bumps it.
                    let started_epoch = *lock(&inner.epoch);
                    // Another caller may have finished a refresh since we read.
                    let current = inner.store.load()?;
                    if current.remaining_ms(inner.clock.now_ms()) > inner.leeway_ms {
                        return Some(current.access_token);
                    }
                    let refresh_token = current.refresh_token?;
                    let flight = self.start_refresh(refresh_token, started_epoch);
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Spawns the refresh so it completes and empties the slot even when
    /// every caller awaiting it is dropped.
    fn start_refresh(&self, refresh_token: String, started_epoch: u64) -> RefreshFlight {
        let manager = self.clone();
        let slot_owner = self.clone();
        let task = tokio::spawn(async move {
            let outcome = manager.run_refresh(refresh_token, started_epoch).await;
            *lock(&manager.inner.in_flight) = None;
            outcome
        });
        async move {
            task.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Token refresh task failed");
                *lock(&slot_owner.inner.in_flight) = None;
                None
            })
        }
        .boxed()
        .shared()
    }

    async fn run_refresh(&self, refresh_token: String, started_epoch: u64) -> Option<String> {
        let inner = &self.inner;
        tracing::info!("Refreshing access token");

        match inner.token_client.refresh(&refresh_token).await {
            Ok(tokens) => {
                let state =
                    AuthState::from_response(&tokens, inner.clock.now_ms(), Some(refresh_token));
                let epoch = lock(&inner.epoch);
                if *epoch != started_epoch {
                    tracing::info!("Session changed during refresh; discarding refreshed tokens");
                    return None;
                }
                if let Err(e) = inner.store.save(&state) {
                    tracing::warn!(error = %e, "Failed to persist refreshed tokens");
                }
                drop(epoch);
                tracing::info!("Access token refreshed");
                Some(state.access_token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed; ending session");
                match self.clear_session(Some(started_epoch)) {
                    Ok(Cleared::Session { id_token }) => {
                        self.navigate_after_logout(id_token);
                    }
                    Ok(Cleared::Superseded) => {
                        tracing::debug!("Session already replaced; not logging out");
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to clear session"),
                }
                None
            }
        }
    }

    /// True iff stored tokens exist and have not expired. Never refreshes.
    pub fn is_authenticated(&self) -> bool {
        let now = self.inner.clock.now_ms();
        self.inner
            .store
            .load()
            .is_some_and(|state| state.is_valid_at(now))
    }

    /// Current position in the login state machine.
    pub fn session_state(&self) -> SessionState {
        let inner = &self.inner;
        if lock(&inner.in_flight).is_some() {
            return SessionState::Refreshing;
        }

        let now = inner.clock.now_ms();
        let usable = inner
            .store
            .load()
            .is_some_and(|state| state.is_valid_at(now) || state.refresh_token.is_some());
        if usable {
            SessionState::Authenticated
        } else if inner.store.verifier().is_some() {
            SessionState::Authenticating
        } else {
            SessionState::Unauthenticated
        }
    }

    /// Unix-millisecond expiry of the stored access token.
    pub fn expires_at(&self) -> Option<i64> {
        self.inner.store.load().map(|state| state.expires_at)
    }

    /// Ends the session.
    ///
    /// Clears the stored tokens and redirect path, then navigates to the
    /// provider's end-session endpoint (with `id_token_hint`) when an id
    /// token was stored, otherwise to the application root.
    ///
    /// # Returns
    ///
    /// The location navigated to
    ///
    /// # Errors
    ///
    /// Fails if the storage backend cannot remove the session.
    pub fn logout(&self) -> Result<String> {
        let id_token = match self.clear_session(None)? {
            Cleared::Session { id_token } => id_token,
            Cleared::Superseded => None,
        };
        Ok(self.navigate_after_logout(id_token))
    }

    fn clear_session(&self, expected_epoch: Option<u64>) -> Result<Cleared> {
        let inner = &self.inner;
        let mut epoch = lock(&inner.epoch);
        if expected_epoch.is_some_and(|expected| expected != *epoch) {
            return Ok(Cleared::Superseded);
        }

        let id_token = inner.store.load().and_then(|state| state.id_token);
        inner.store.clear()?;
        inner.store.clear_redirect_path()?;
        *epoch += 1;
        Ok(Cleared::Session { id_token })
    }

    fn navigate_after_logout(&self, id_token: Option<String>) -> String {
        let inner = &self.inner;
        let location = match id_token {
            Some(id_token) => end_session_url(
                &inner.endpoints.end_session_endpoint,
                &id_token,
                &inner.post_logout_redirect_uri,
            )
            .to_string(),
            None => inner.app_root.clone(),
        };
        tracing::info!("Logged out");
        inner.navigator.navigate(&location);
        location
    }

    /// Identity claims of the signed-in user, decoded WITHOUT verification.
    ///
    /// For display only. `None` when there is no id token or it is malformed.
    pub fn get_user_info(&self) -> Option<UnverifiedClaims> {
        let state = self.inner.store.load()?;
        decode_unverified(state.id_token.as_deref()?)
    }

    /// Path remembered by `login()` that has not been consumed yet.
    pub fn redirect_path(&self) -> Option<String> {
        self.inner.store.redirect_path()
    }

    pub fn clear_redirect_path(&self) -> Result<()> {
        self.inner.store.clear_redirect_path()
    }
}
