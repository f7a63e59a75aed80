//! Persisted session state
//!
//! [`TokenStore`] is a namespaced accessor over a [`KeyValueStore`] backend.
//! It owns four keys, each holding a JSON value:
//!
//! | key                       | value                   |
//! |---------------------------|-------------------------|
//! | `{namespace}_auth_state`    | [`AuthState`] object    |
//! | `{namespace}_pkce_verifier` | PKCE verifier string    |
//! | `{namespace}_pkce_state`    | pending `state` string  |
//! | `{namespace}_redirect_path` | post-login path string  |
//!
//! Reads never fail: a corrupt value or a backend read error is logged and
//! treated as absent, which the session manager interprets as "logged out".

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::session::token_client::TokenResponse;
use crate::storage::KeyValueStore;

const AUTH_STATE: &str = "auth_state";
const PKCE_VERIFIER: &str = "pkce_verifier";
const PKCE_STATE: &str = "pkce_state";
const REDIRECT_PATH: &str = "redirect_path";

// ---------------------------------------------------------------------------
// AuthState
// ---------------------------------------------------------------------------

/// Tokens of the current session.
///
/// `expires_at` is fixed when the tokens arrive (`now_ms + expires_in * 1000`)
/// and never recomputed, so checking validity is a plain comparison.
///
/// # Examples
///
/// ```
/// use oidc_session::session::token_store::AuthState;
///
/// let state = AuthState {
///     access_token: "T1".to_string(),
///     refresh_token: Some("R1".to_string()),
///     id_token: None,
///     expires_at: 1_000_000,
/// };
///
/// assert!(state.is_valid_at(999_999));
/// assert!(!state.is_valid_at(1_000_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Unix milliseconds.
    pub expires_at: i64,
}

impl AuthState {
    /// Builds the state for a token response received at `now_ms`.
    ///
    /// When the response carries no refresh token, `prior_refresh_token`
    /// is kept so a refresh never loses the ability to refresh again.
    pub fn from_response(
        response: &TokenResponse,
        now_ms: i64,
        prior_refresh_token: Option<String>,
    ) -> Self {
        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone().or(prior_refresh_token),
            id_token: response.id_token.clone(),
            expires_at: now_ms.saturating_add(response.expires_in.saturating_mul(1000)),
        }
    }

    /// True while `expires_at` is strictly in the future.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.expires_at > now_ms
    }

    /// Milliseconds left until expiry (negative once expired).
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        self.expires_at.saturating_sub(now_ms)
    }
}

// ---------------------------------------------------------------------------
// TokenStore
// ---------------------------------------------------------------------------

/// Namespaced JSON accessor for session keys.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Creates a store writing `{namespace}_*` keys into `backend`.
    pub fn new(backend: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// Fully namespaced key for `name`.
    pub fn key(&self, name: &str) -> String {
        format!("{}_{}", self.namespace, name)
    }

    /// Persists `state`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn save(&self, state: &AuthState) -> Result<()> {
        self.put(AUTH_STATE, state)
    }

    /// Loads the current state, or `None` when absent or unreadable.
    pub fn load(&self) -> Option<AuthState> {
        self.fetch(AUTH_STATE)
    }

    /// Removes the current state.
    pub fn clear(&self) -> Result<()> {
        self.drop_key(AUTH_STATE)
    }

    pub fn save_verifier(&self, verifier: &str) -> Result<()> {
        self.put(PKCE_VERIFIER, verifier)
    }

    pub fn verifier(&self) -> Option<String> {
        self.fetch(PKCE_VERIFIER)
    }

    pub fn save_pending_state(&self, state: &str) -> Result<()> {
        self.put(PKCE_STATE, state)
    }

    pub fn pending_state(&self) -> Option<String> {
        self.fetch(PKCE_STATE)
    }

    /// Removes the verifier and the pending `state` together.
    pub fn clear_pkce(&self) -> Result<()> {
        self.drop_key(PKCE_VERIFIER)?;
        self.drop_key(PKCE_STATE)
    }

    pub fn save_redirect_path(&self, path: &str) -> Result<()> {
        self.put(REDIRECT_PATH, path)
    }

    pub fn redirect_path(&self) -> Option<String> {
        self.fetch(REDIRECT_PATH)
    }

    pub fn clear_redirect_path(&self) -> Result<()> {
        self.drop_key(REDIRECT_PATH)
    }

    /// Returns the redirect path and removes it.
    pub fn take_redirect_path(&self) -> Result<Option<String>> {
        let path = self.redirect_path();
        if path.is_some() {
            self.clear_redirect_path()?;
        }
        Ok(path)
    }

    fn put<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let key = self.key(name);
        let json = serde_json::to_string(value)?;
        self.backend
            .set(&key, &json)
            .map_err(|e| SessionError::Storage(format!("failed to write '{}': {:#}", key, e)))?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let key = self.key(name);
        let raw = match self.backend.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Session storage read failed; treating as absent");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                let corruption = SessionError::StorageCorruption {
                    key,
                    reason: e.to_string(),
                };
                tracing::warn!("{}", corruption);
                None
            }
        }
    }

    fn drop_key(&self, name: &str) -> Result<()> {
        let key = self.key(name);
        self.backend
            .remove(&key)
            .map_err(|e| SessionError::Storage(format!("failed to remove '{}': {:#}", key, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (TokenStore, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        (TokenStore::new(backend.clone(), "refract"), backend)
    }

    fn sample_state() -> AuthState {
        AuthState {
            access_token: "T1".to_string(),
            refresh_token: Some("R1".to_string()),
            id_token: Some("h.p.s".to_string()),
            expires_at: 1_700_000_000_000,
        }
    }

    fn response(refresh: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "T2".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            refresh_token: refresh.map(str::to_string),
            id_token: None,
            scope: None,
        }
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let (store, _) = store();
        store.save(&sample_state()).unwrap();
        assert_eq!(store.load(), Some(sample_state()));
    }

    #[test]
    fn test_remaining_ms_saturates_at_extreme_expiry() {
        let mut state = sample_state();
        state.expires_at = i64::MIN;
        assert_eq!(state.remaining_ms(1_700_000_000_000), i64::MIN);
        assert!(!state.is_valid_at(1_700_000_000_000));

        state.expires_at = i64::MAX;
        assert_eq!(state.remaining_ms(-1), i64::MAX);
    }

    #[test]
    fn test_clear_then_load_is_none() {
        let (store, backend) = store();
        store.save(&sample_state()).unwrap();
        store.clear().unwrap();
        assert_eq!(store.load(), None);
        assert!(backend.snapshot().is_empty());
    }

    #[test]
    fn test_values_are_stored_as_json_under_namespaced_keys() {
        let (store, backend) = store();
        store.save_verifier("abc").unwrap();
        store.save_redirect_path("/dashboard").unwrap();
        store.save(&sample_state()).unwrap();

        let snap = backend.snapshot();
        assert_eq!(snap["refract_pkce_verifier"], "\"abc\"");
        assert_eq!(snap["refract_redirect_path"], "\"/dashboard\"");
        let raw: serde_json::Value = serde_json::from_str(&snap["refract_auth_state"]).unwrap();
        assert_eq!(raw["access_token"], "T1");
        assert_eq!(raw["expires_at"], 1_700_000_000_000_i64);
    }

    #[test]
    fn test_corrupt_state_loads_as_none() {
        let (store, backend) = store();
        backend.set("refract_auth_state", "{not json").unwrap();
        assert_eq!(store.load(), None);

        backend
            .set("refract_auth_state", r#"{"refresh_token":"R"}"#)
            .unwrap();
        assert_eq!(store.load(), None, "missing access_token is corrupt");
    }

    #[test]
    fn test_unquoted_verifier_is_corrupt() {
        let (store, backend) = store();
        backend.set("refract_pkce_verifier", "abc").unwrap();
        assert_eq!(store.verifier(), None);
    }

    #[test]
    fn test_clear_pkce_removes_verifier_and_state() {
        let (store, backend) = store();
        store.save_verifier("v").unwrap();
        store.save_pending_state("s").unwrap();
        store.save_redirect_path("/keep").unwrap();

        store.clear_pkce().unwrap();

        assert_eq!(store.verifier(), None);
        assert_eq!(store.pending_state(), None);
        assert_eq!(backend.snapshot().len(), 1);
    }

    #[test]
    fn test_take_redirect_path_consumes() {
        let (store, _) = store();
        assert_eq!(store.take_redirect_path().unwrap(), None);
        store.save_redirect_path("/settings").unwrap();
        assert_eq!(
            store.take_redirect_path().unwrap().as_deref(),
            Some("/settings")
        );
        assert_eq!(store.redirect_path(), None);
    }

    #[test]
    fn test_namespace_isolation() {
        let backend = Arc::new(MemoryStore::new());
        let a = TokenStore::new(backend.clone(), "a");
        let b = TokenStore::new(backend, "b");
        a.save(&sample_state()).unwrap();
        assert!(b.load().is_none());
    }

    #[test]
    fn test_from_response_computes_deadline() {
        let state = AuthState::from_response(&response(Some("R2")), 1_000, None);
        assert_eq!(state.expires_at, 1_000 + 3_600_000);
        assert_eq!(state.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn test_from_response_keeps_prior_refresh_token() {
        let state = AuthState::from_response(&response(None), 0, Some("R1".to_string()));
        assert_eq!(state.refresh_token.as_deref(), Some("R1"));

        let rotated = AuthState::from_response(&response(Some("R2")), 0, Some("R1".to_string()));
        assert_eq!(rotated.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn test_validity_boundary() {
        let state = sample_state();
        assert!(state.is_valid_at(state.expires_at - 1));
        assert!(!state.is_valid_at(state.expires_at));
        assert_eq!(state.remaining_ms(state.expires_at - 500), 500);
    }
}
