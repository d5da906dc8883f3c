//! Core library for the Learning Hub client.
//!
//! The dashboard and feature pages live behind a Google sign-in gate. This
//! crate implements that gate: a session manager that talks to the Learning
//! Hub identity provider, keeps the session in a persistent client store,
//! and tells the UI layer whether someone is signed in.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigator;
pub mod store;

pub use api::{ApiError, IdentityClient};
pub use auth::{AuthError, AuthState, AuthView, PendingCompletion, SessionManager};
pub use config::{Config, StoreKind};
pub use models::{Session, UserProfile};
pub use navigator::{Navigator, StaticNavigator};
pub use store::{ClientStore, FileStore, KeyringStore, MemoryStore};
