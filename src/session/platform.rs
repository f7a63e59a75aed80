//! Injected platform seams: wall clock, entropy, and navigation
//!
//! The session manager never reads the system clock, the RNG, or drives a
//! browser directly. Each concern is a small trait so tests (and embedders
//! such as a desktop shell or a WASM host) can substitute their own.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use rand::TryRngCore as _;

use crate::error::{Result, SessionError};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current time as Unix milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests and simulations.
///
/// # Examples
///
/// ```
/// use oidc_session::session::platform::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance_secs(60);
/// assert_eq!(clock.now_ms(), 61_000);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `now_ms`.
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
        }
    }

    /// Moves the clock to an absolute instant.
    pub fn set_ms(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Moves the clock forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs` seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance_ms(secs.saturating_mul(1000));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// RandomSource
// ---------------------------------------------------------------------------

/// Cryptographically secure byte source.
///
/// Failure means the platform has no usable entropy; callers treat it as
/// fatal and never retry.
pub trait RandomSource: Send + Sync {
    /// Fills `buf` entirely with random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating system RNG (`getrandom` under the hood).
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        rand::rngs::OsRng
            .try_fill_bytes(buf)
            .map_err(|e| SessionError::Entropy(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Performs a full-page navigation to `location`.
///
/// In a browser host this sets `window.location`; in the CLI it prints the
/// URL and asks the desktop to open it.
pub trait Navigator: Send + Sync {
    /// Navigates away to `location` (an absolute URL or an app-relative path).
    fn navigate(&self, location: &str);
}

/// Navigator for terminal use: prints the location to stderr and attempts to
/// open absolute URLs in the default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn navigate(&self, location: &str) {
        eprintln!("Open the following URL in your browser:\n{}", location);
        if location.starts_with("http://") || location.starts_with("https://") {
            try_open_browser(location);
        }
    }
}

/// Errors are ignored; the user can copy the URL from stderr.
fn try_open_browser(url: &str) {
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("open").arg(url).spawn();
    }
    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("xdg-open").arg(url).spawn();
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        let _ = url;
    }
}

/// Navigator that only remembers where it was sent.
///
/// Used by headless embedders and by tests that assert on redirects.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All locations navigated to, oldest first.
    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// The most recent location, if any.
    pub fn last(&self) -> Option<String> {
        self.visited().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, location: &str) {
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(location.to_string());
        }
    }
}
