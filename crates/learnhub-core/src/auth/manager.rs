//! The session manager: sole owner of the signed-in user's session.
//!
//! One instance is built at start-up and shared with the UI layer, which
//! reads snapshots or subscribes to changes. All writes to the session
//! entries of the client store go through here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::IdentityClient;
use crate::models::{Session, UserProfile};
use crate::navigator::Navigator;
use crate::store::ClientStore;

use super::callback::{strip_callback_params, PendingCompletion};
use super::{AuthError, AuthState, AuthView, SessionStore};

pub struct SessionManager {
    client: IdentityClient,
    sessions: SessionStore,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<AuthState>,
    initialized: AtomicBool,
    accept_direct_grant: bool,
}

/// Holds the loading flag; releases it when dropped.
struct BusyGuard<'a> {
    state: &'a watch::Sender<AuthState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.loading = false);
    }
}

impl SessionManager {
    pub fn new(
        client: IdentityClient,
        store: Arc<dyn ClientStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            client,
            sessions: SessionStore::new(store),
            navigator,
            state,
            initialized: AtomicBool::new(false),
            accept_direct_grant: true,
        }
    }

    /// Whether tokens handed over directly on the redirect URL are trusted.
    /// When disabled, only server-side code exchange can sign a user in.
    #[must_use]
    pub fn with_direct_grant(mut self, accept: bool) -> Self {
        self.accept_direct_grant = accept;
        self
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn view(&self) -> AuthView {
        self.state.borrow().view()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user().cloned()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token().map(str::to_string)
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restore the persisted session, then finish any sign-in handshake the
    /// current URL carries. Runs once; later calls do nothing.
    pub async fn initialize(&self) -> Result<(), AuthError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            warn!("Session manager already initialized");
            return Ok(());
        }

        // Published before any network call, so a valid stored session is
        // visible to the UI from the first render.
        self.restore();

        let current = self.navigator.current_url();
        let Some(pending) = PendingCompletion::from_url(&current) else {
            return Ok(());
        };

        info!(kind = pending.kind(), "Completing sign-in from redirect");
        self.navigator.replace_url(&strip_callback_params(&current));

        match pending {
            PendingCompletion::Error(message) => Err(self.fail(AuthError::Provider(message))),
            PendingCompletion::DirectGrant(session) => self.accept_grant(session),
            PendingCompletion::Code(code) => self.complete_login(&code).await.map(|_| ()),
        }
    }

    /// Ask the provider for its consent page and send the browser there.
    pub async fn login(&self) -> Result<(), AuthError> {
        let _busy = self.begin()?;

        let auth_url = self
            .client
            .authorization_url()
            .await
            .map_err(|e| self.fail(e.into()))?;

        info!(host = auth_url.host_str().unwrap_or_default(), "Redirecting to identity provider");
        self.navigator.redirect(&auth_url);
        Ok(())
    }

    /// Exchange an authorization code for a session and sign in with it.
    /// On failure the previous session, if any, stays as it was.
    pub async fn complete_login(&self, code: &str) -> Result<UserProfile, AuthError> {
        let _busy = self.begin()?;

        let session = self
            .client
            .exchange_code(code)
            .await
            .map_err(|e| self.fail(e.into()))?;

        let user = session.user.clone();
        self.activate(session);
        Ok(user)
    }

    /// Re-read the profile behind the current token.
    ///
    /// Does nothing when signed out. Any failure means the token can no
    /// longer be trusted, so the session is dropped as well.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let Some(token) = self.access_token() else {
            debug!("Refresh skipped, no active session");
            return Ok(());
        };
        let _busy = self.begin()?;

        match self.client.fetch_user(&token).await {
            Ok(user) => {
                // The store is only written while the session is still the
                // one the profile was fetched for; logout may have run meanwhile.
                let updated = self.state.send_if_modified(|s| {
                    let Some(session) = s.session.as_mut().filter(|c| c.access_token == token)
                    else {
                        return false;
                    };
                    if let Err(e) = self.sessions.save_user(&user) {
                        warn!(error = %e, "Failed to save refreshed profile");
                    }
                    session.user = user;
                    true
                });
                if updated {
                    debug!("Profile refreshed");
                } else {
                    debug!("Session ended during refresh, profile discarded");
                }
                Ok(())
            }
            Err(e) => {
                if e.is_auth_rejection() {
                    info!("Provider rejected the access token");
                } else {
                    warn!(error = %e, "Profile refresh failed, discarding session");
                }
                let err = AuthError::invalid_session(e);
                self.drop_session();
                Err(self.fail(err))
            }
        }
    }

    /// Sign out. Always succeeds; repeated calls are harmless.
    pub fn logout(&self) {
        self.drop_session();
        self.clear_error();
        info!("Signed out");
    }

    /// Shut the manager down. Subscribers observe a closed channel.
    pub fn teardown(self) {
        debug!(
            subscribers = self.state.receiver_count(),
            "Session manager torn down"
        );
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn restore(&self) {
        match self.sessions.load() {
            Ok(Some(session)) => {
                debug!(user_id = %session.user.id, "Restored stored session");
                self.state.send_modify(|s| s.session = Some(session));
            }
            Ok(None) => debug!("No stored session"),
            Err(e) => warn!(error = %e, "Failed to load stored session"),
        }
    }

    fn accept_grant(&self, session: Session) -> Result<(), AuthError> {
        if !self.accept_direct_grant {
            warn!("Ignoring tokens passed on the redirect URL");
            return Err(self.fail(AuthError::Provider(
                "Sign-in response was not accepted. Please sign in again.".to_string(),
            )));
        }
        self.activate(session);
        Ok(())
    }

    /// Persist and publish a new session.
    fn activate(&self, session: Session) {
        if let Err(e) = self.sessions.save(&session) {
            warn!(error = %e, "Failed to save session");
        }
        info!(user_id = %session.user.id, "Signed in");
        self.state.send_modify(|s| {
            s.session = Some(session);
            s.error = None;
        });
    }

    /// Clear the store and the published session under the state lock, so a
    /// refresh finishing concurrently cannot write the profile back.
    fn drop_session(&self) {
        self.state.send_if_modified(|s| {
            if let Err(e) = self.sessions.clear() {
                warn!(error = %e, "Failed to clear stored session");
            }
            s.session.take().is_some()
        });
    }

    /// Take the loading flag, or report that someone else holds it.
    fn begin(&self) -> Result<BusyGuard<'_>, AuthError> {
        let acquired = self.state.send_if_modified(|s| {
            if s.loading {
                return false;
            }
            s.loading = true;
            s.error = None;
            true
        });
        if acquired {
            Ok(BusyGuard { state: &self.state })
        } else {
            debug!("Rejected request while another is in flight");
            Err(AuthError::Busy)
        }
    }

    /// Record `err` for the UI and hand it back to the caller.
    fn fail(&self, err: AuthError) -> AuthError {
        error!(error = %err, "Authentication failed");
        let message = err.user_message();
        self.state.send_modify(|s| s.error = Some(message));
        err
    }
}
