//! REST client module for the Learning Hub identity provider.
//!
//! The provider exposes three routes: one that hands out the Google
//! authorization URL, one that exchanges an authorization code for tokens
//! and a profile, and one that returns the profile behind an access token.

pub mod client;
pub mod error;

pub use client::{IdentityClient, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
