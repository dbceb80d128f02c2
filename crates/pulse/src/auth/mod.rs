//! Access tokens for upstream calls.
//!
//! A sync target authenticates either through a GitHub App installation
//! (short-lived tokens served by [`TokenCache`]) or through a static OAuth
//! token. [`TokenProvider::resolve`] picks one, installation first.

mod cache;
mod credentials;
mod error;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cache::{
    CachedToken, DEFAULT_EXPIRY_BUFFER_SECS, InstallationId, InstallationStatus,
    InstallationStore, TokenCache, TokenFetcher,
};
pub use credentials::{AuthSource, Credentials, TokenProvider};
pub use error::{DeactivationReason, TokenError};
