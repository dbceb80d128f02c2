//! GitHub App authentication: JWT signing, installation token minting and
//! installation status lookups.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::auth::{
    CachedToken, InstallationId, InstallationStatus, InstallationStore, TokenError, TokenFetcher,
};
use crate::clock::{Clock, SystemClock};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

use super::request::USER_AGENT;

/// GitHub rejects app JWTs valid for longer than ten minutes.
const JWT_LIFETIME_SECS: i64 = 540;
/// Backdated to tolerate clock drift.
const JWT_BACKDATE_SECS: i64 = 60;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

pub(crate) fn app_claims(app_id: u64, now: DateTime<Utc>) -> AppClaims {
    let now = now.timestamp();
    AppClaims {
        iat: now - JWT_BACKDATE_SECS,
        exp: now + JWT_LIFETIME_SECS,
        iss: app_id.to_string(),
    }
}

/// A GitHub App id and its RSA private key.
pub struct AppCredentials {
    app_id: u64,
    key: EncodingKey,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl AppCredentials {
    pub fn from_pem(app_id: u64, pem: &[u8]) -> Result<Self, TokenError> {
        let key =
            EncodingKey::from_rsa_pem(pem).map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        Ok(Self { app_id, key })
    }

    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    /// Sign a short-lived RS256 JWT identifying the app.
    pub fn jwt(&self, now: DateTime<Utc>) -> Result<String, TokenError> {
        jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &app_claims(self.app_id, now),
            &self.key,
        )
        .map_err(|e| TokenError::InvalidKey(e.to_string()))
    }
}

#[derive(Clone)]
struct AppHttp {
    http: Arc<dyn HttpTransport>,
    api_url: String,
    credentials: Arc<AppCredentials>,
    clock: Arc<dyn Clock>,
}

impl AppHttp {
    fn new(
        http: Arc<dyn HttpTransport>,
        api_url: impl Into<String>,
        credentials: Arc<AppCredentials>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            credentials,
            clock: Arc::new(SystemClock),
        }
    }

    fn sign(&self, request: HttpRequest) -> Result<HttpRequest, TokenError> {
        let jwt = self.credentials.jwt(self.clock.now())?;
        Ok(request
            .bearer(&jwt)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json"))
    }
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

pub(crate) fn parse_access_token_response(resp: &HttpResponse) -> Result<CachedToken, TokenError> {
    if !resp.is_success() {
        return Err(TokenError::Refresh(format!(
            "GitHub answered {} when minting an installation token",
            resp.status
        )));
    }
    let body: AccessTokenResponse = resp
        .json()
        .map_err(|_| TokenError::Refresh("unexpected access token payload".to_string()))?;
    Ok(CachedToken::new(body.token, body.expires_at))
}

#[derive(Deserialize)]
struct InstallationResponse {
    #[serde(default)]
    suspended_at: Option<DateTime<Utc>>,
}

pub(crate) fn parse_installation_status(
    resp: &HttpResponse,
) -> Result<InstallationStatus, TokenError> {
    match resp.status {
        404 => Ok(InstallationStatus::Removed),
        status if !resp.is_success() => Err(TokenError::Store(format!(
            "GitHub answered {status} for an installation lookup"
        ))),
        _ => {
            let body: InstallationResponse = resp.json().map_err(|_| {
                TokenError::Store("unexpected installation payload".to_string())
            })?;
            Ok(match body.suspended_at {
                Some(suspended_at) => InstallationStatus::Suspended { suspended_at },
                None => InstallationStatus::Active,
            })
        }
    }
}

/// Mints installation tokens through `POST /app/installations/{id}/access_tokens`.
#[derive(Clone)]
pub struct AppTokenFetcher {
    inner: AppHttp,
}

impl AppTokenFetcher {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        api_url: impl Into<String>,
        credentials: Arc<AppCredentials>,
    ) -> Self {
        Self {
            inner: AppHttp::new(http, api_url, credentials),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.inner.clock = clock;
        self
    }
}

#[async_trait]
impl TokenFetcher for AppTokenFetcher {
    async fn fetch(&self, installation: InstallationId) -> Result<CachedToken, TokenError> {
        let url = format!(
            "{}/app/installations/{installation}/access_tokens",
            self.inner.api_url
        );
        let request = HttpRequest::post_json(url, &serde_json::json!({}))
            .map_err(|e| TokenError::Refresh(e.to_string()))?;
        let resp = self
            .inner
            .http
            .send(self.inner.sign(request)?)
            .await
            .map_err(|e| TokenError::Refresh(e.to_string()))?;
        parse_access_token_response(&resp)
    }
}

/// Reads installation status through `GET /app/installations/{id}`.
#[derive(Clone)]
pub struct AppInstallationStore {
    inner: AppHttp,
}

impl AppInstallationStore {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        api_url: impl Into<String>,
        credentials: Arc<AppCredentials>,
    ) -> Self {
        Self {
            inner: AppHttp::new(http, api_url, credentials),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.inner.clock = clock;
        self
    }
}

#[async_trait]
impl InstallationStore for AppInstallationStore {
    async fn status(&self, installation: InstallationId) -> Result<InstallationStatus, TokenError> {
        let url = format!("{}/app/installations/{installation}", self.inner.api_url);
        let resp = self
            .inner
            .http
            .send(self.inner.sign(HttpRequest::get(url))?)
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;
        parse_installation_status(&resp)
    }
}
