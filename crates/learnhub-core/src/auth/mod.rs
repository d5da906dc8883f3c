//! Authentication module for the Learning Hub login gate.
//!
//! This module provides:
//! - `SessionManager`: owns the session lifecycle (login, redirect
//!   completion, refresh, logout) and publishes `AuthState` to the UI
//! - `SessionStore`: typed persistence of the session in a client store
//! - `PendingCompletion`: the sign-in handshake found on a landing URL
//!
//! Sessions survive restarts through the client store and are dropped as
//! soon as the provider rejects their token.

pub mod callback;
pub mod error;
pub mod manager;
pub mod session;
pub mod state;

pub use callback::{strip_callback_params, PendingCompletion};
pub use error::AuthError;
pub use manager::SessionManager;
pub use session::SessionStore;
pub use state::{AuthState, AuthView};
