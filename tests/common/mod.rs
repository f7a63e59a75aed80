use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use tempfile::TempDir;
use url::Url;

use oidc_session::config::Config;
use oidc_session::session::discovery::ProviderEndpoints;
use oidc_session::session::platform::{Clock, ManualClock, RecordingNavigator};
use oidc_session::session::SessionManager;
use oidc_session::storage::{KeyValueStore, MemoryStore};

/// Fixed starting point for the manual clock (2023-11-14T22:13:20Z).
#[allow(dead_code)]
pub const T0_MS: i64 = 1_700_000_000_000;

/// A session manager wired to in-memory fakes.
#[allow(dead_code)]
pub struct TestSession {
    pub session: SessionManager,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub navigator: Arc<RecordingNavigator>,
}

#[allow(dead_code)]
impl TestSession {
    /// Parsed JSON stored under `{namespace}_{name}`.
    pub fn stored(&self, name: &str) -> Option<serde_json::Value> {
        self.store
            .get(&format!("refract_{}", name))
            .expect("memory store read")
            .map(|raw| serde_json::from_str(&raw).expect("stored value is JSON"))
    }

    /// Writes an auth state expiring `expires_in_ms` from the current clock.
    pub fn seed_auth_state(&self, access: &str, refresh: Option<&str>, expires_in_ms: i64) {
        let mut state = serde_json::json!({
            "access_token": access,
            "expires_at": self.clock.now_ms() + expires_in_ms,
        });
        if let Some(refresh) = refresh {
            state["refresh_token"] = serde_json::json!(refresh);
        }
        self.store
            .set("refract_auth_state", &state.to_string())
            .expect("memory store write");
    }

    /// The `state` parameter of the last authorization URL navigated to.
    pub fn last_authorization_state(&self) -> String {
        let last = self.navigator.last().expect("a navigation happened");
        query_param(&Url::parse(&last).expect("absolute URL"), "state")
            .expect("authorization URL carries state")
    }
}

#[allow(dead_code)]
pub fn test_config(authority: &str) -> Config {
    let mut config = Config::default();
    config.oidc.authority = authority.to_string();
    config.oidc.client_id = "client-123".to_string();
    config
}

/// Session manager whose endpoints all live on `authority` (a wiremock URI).
#[allow(dead_code)]
pub fn session_for(authority: &str) -> TestSession {
    let config = test_config(authority);
    let endpoints = ProviderEndpoints::from_paths(&config.oidc).expect("valid authority");

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(T0_MS));
    let navigator = Arc::new(RecordingNavigator::new());
    let session = SessionManager::builder(&config, endpoints)
        .http(Arc::new(reqwest::Client::new()))
        .storage(store.clone())
        .clock(clock.clone())
        .navigator(navigator.clone())
        .build()
        .expect("build session manager");

    TestSession {
        session,
        store,
        clock,
        navigator,
    }
}

#[allow(dead_code)]
pub fn token_body(access: &str, refresh: Option<&str>, expires_in: i64) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::json!(refresh);
    }
    body
}

/// Unsigned JWT with `payload` as claims.
#[allow(dead_code)]
pub fn make_id_token(payload: &str) -> String {
    format!(
        "{}.{}.fake-signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload.as_bytes())
    )
}

#[allow(dead_code)]
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Decoded `application/x-www-form-urlencoded` request body.
#[allow(dead_code)]
pub fn form_fields(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

#[allow(dead_code)]
pub fn form_field(body: &[u8], name: &str) -> Option<String> {
    form_fields(body)
        .into_iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
