use std::sync::Arc;

use super::{InstallationId, TokenCache, TokenError};

/// Credentials configured for one sync target.
#[derive(Clone, Default)]
pub struct Credentials {
    pub installation_id: Option<InstallationId>,
    pub oauth_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("installation_id", &self.installation_id)
            .field("oauth_token", &self.oauth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The token source a target resolved to.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthSource {
    /// Short-lived installation token served by a [`TokenCache`].
    Installation(InstallationId),
    /// Static OAuth token, assumed valid.
    OAuth(String),
}

impl std::fmt::Debug for AuthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installation(id) => f.debug_tuple("Installation").field(id).finish(),
            Self::OAuth(_) => f.debug_tuple("OAuth").field(&"<redacted>").finish(),
        }
    }
}

/// Hands out bearer tokens for one resolved [`AuthSource`].
///
/// Cloning is cheap; clones share the underlying cache.
#[derive(Clone, Debug)]
pub struct TokenProvider {
    source: AuthSource,
    cache: Option<Arc<TokenCache>>,
}

impl TokenProvider {
    pub fn oauth(token: impl Into<String>) -> Self {
        Self {
            source: AuthSource::OAuth(token.into()),
            cache: None,
        }
    }

    pub fn installation(installation: InstallationId, cache: Arc<TokenCache>) -> Self {
        Self {
            source: AuthSource::Installation(installation),
            cache: Some(cache),
        }
    }

    /// Resolve credentials: the installation path when an installation id and
    /// a token cache are both available, otherwise the OAuth token.
    pub fn resolve(
        credentials: &Credentials,
        cache: Option<Arc<TokenCache>>,
    ) -> Result<Self, TokenError> {
        match (credentials.installation_id, cache, &credentials.oauth_token) {
            (Some(id), Some(cache), _) => Ok(Self::installation(id, cache)),
            (_, _, Some(token)) if !token.is_empty() => Ok(Self::oauth(token.clone())),
            _ => Err(TokenError::NoCredentials),
        }
    }

    pub fn source(&self) -> &AuthSource {
        &self.source
    }

    /// Current bearer token.
    pub async fn token(&self) -> Result<String, TokenError> {
        match (&self.source, &self.cache) {
            (AuthSource::Installation(id), Some(cache)) => cache.get_token(*id).await,
            (AuthSource::OAuth(token), _) => Ok(token.clone()),
            (AuthSource::Installation(_), None) => Err(TokenError::NoCredentials),
        }
    }
}
