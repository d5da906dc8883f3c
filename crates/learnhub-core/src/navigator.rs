//! The browsing context the session manager runs in.
//!
//! Login leaves the application for the provider's consent page and comes
//! back with parameters on the application's own URL. `Navigator` is the
//! seam for those two moves, so the manager can be hosted by a webview, a
//! terminal, or a test harness.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use url::Url;

pub trait Navigator: Send + Sync {
    /// The location the application was loaded at.
    fn current_url(&self) -> Url;

    /// Leave the application for `to`. Adds a history entry.
    fn redirect(&self, to: &Url);

    /// Rewrite the visible address in place. Must not add a history entry.
    fn replace_url(&self, to: &Url);
}

#[derive(Debug)]
struct Location {
    current: Url,
    redirects: Vec<Url>,
    history_len: usize,
}

/// In-process navigator that records every move.
///
/// Used by hosts without a real address bar (the CLI) and by tests.
#[derive(Debug)]
pub struct StaticNavigator {
    location: Mutex<Location>,
}

impl StaticNavigator {
    pub fn new(current: Url) -> Self {
        Self {
            location: Mutex::new(Location {
                current,
                redirects: Vec::new(),
                history_len: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Location> {
        self.location
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every redirect target, oldest first.
    pub fn redirects(&self) -> Vec<Url> {
        self.lock().redirects.clone()
    }

    pub fn last_redirect(&self) -> Option<Url> {
        self.lock().redirects.last().cloned()
    }

    /// Number of history entries, starting at 1 for the initial load.
    pub fn history_len(&self) -> usize {
        self.lock().history_len
    }
}

impl Navigator for StaticNavigator {
    fn current_url(&self) -> Url {
        self.lock().current.clone()
    }

    fn redirect(&self, to: &Url) {
        debug!(url = %to, "Redirecting");
        let mut location = self.lock();
        location.current = to.clone();
        location.redirects.push(to.clone());
        location.history_len += 1;
    }

    fn replace_url(&self, to: &Url) {
        debug!(url = %to, "Replacing current URL");
        self.lock().current = to.clone();
    }
}
