//! Per-platform bearer-token acquisition and caching.
//!
//! One [`CredentialManager`] is constructed per process and shared by every
//! connector. Tokens live in memory only; the cache mutex is held across a
//! refresh so concurrent callers for the same platform single-flight instead
//! of issuing redundant grant requests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;

use repwatch_core::Platform;

use crate::error::IngestError;
use crate::transport::{check_response, read_json, retry_with_backoff, RetryPolicy};

/// Safety margin subtracted from a token's lifetime so we refresh before
/// the platform starts rejecting it.
const EXPIRY_MARGIN_SECS: i64 = 60;

const DEFAULT_TOKEN_TTL_SECS: u64 = 3_600;

/// A cached bearer token. Never persisted to durable storage.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

/// OAuth token endpoint response shared by all grant flows.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

impl TokenResponse {
    fn into_cached(self) -> CachedToken {
        let ttl = self.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        CachedToken {
            value: self.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(i64::try_from(ttl).unwrap_or(0)),
        }
    }
}

/// A platform-specific OAuth2 grant flow.
///
/// New platforms add a grant implementation, not new call sites: the
/// manager is the only caller.
#[async_trait]
pub trait TokenGrant: Send + Sync {
    fn platform(&self) -> Platform;

    /// Performs the grant flow and returns a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] on transport failure, a rejected grant, or a
    /// malformed token response.
    async fn acquire(
        &self,
        http: &reqwest::Client,
        policy: &RetryPolicy,
    ) -> Result<CachedToken, IngestError>;
}

/// `grant_type=client_credentials` with basic auth (microblog platform).
pub struct ClientCredentialsGrant {
    pub platform: Platform,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[async_trait]
impl TokenGrant for ClientCredentialsGrant {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn acquire(
        &self,
        http: &reqwest::Client,
        policy: &RetryPolicy,
    ) -> Result<CachedToken, IngestError> {
        let platform = self.platform;
        let response = retry_with_backoff(policy, true, || {
            let req = http
                .post(&self.token_url)
                .basic_auth(&self.client_id, Some(&self.client_secret))
                .form(&[("grant_type", "client_credentials")]);
            async move {
                let resp = req.send().await?;
                check_response(platform, "client_credentials token exchange", resp)
            }
        })
        .await?;
        let token: TokenResponse = read_json("client_credentials token body", response).await?;
        Ok(token.into_cached())
    }
}

/// `grant_type=password` with basic auth (forum platform, script-app style).
pub struct PasswordGrant {
    pub platform: Platform,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

#[async_trait]
impl TokenGrant for PasswordGrant {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn acquire(
        &self,
        http: &reqwest::Client,
        policy: &RetryPolicy,
    ) -> Result<CachedToken, IngestError> {
        let platform = self.platform;
        let response = retry_with_backoff(policy, true, || {
            let req = http
                .post(&self.token_url)
                .header(reqwest::header::USER_AGENT, &self.user_agent)
                .basic_auth(&self.client_id, Some(&self.client_secret))
                .form(&[
                    ("grant_type", "password"),
                    ("username", self.username.as_str()),
                    ("password", self.password.as_str()),
                ]);
            async move {
                let resp = req.send().await?;
                check_response(platform, "password token exchange", resp)
            }
        })
        .await?;
        let token: TokenResponse = read_json("password token body", response).await?;
        Ok(token.into_cached())
    }
}

/// `grant_type=refresh_token` (video platform).
pub struct RefreshTokenGrant {
    pub platform: Platform,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[async_trait]
impl TokenGrant for RefreshTokenGrant {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn acquire(
        &self,
        http: &reqwest::Client,
        policy: &RetryPolicy,
    ) -> Result<CachedToken, IngestError> {
        let platform = self.platform;
        let response = retry_with_backoff(policy, true, || {
            let req = http.post(&self.token_url).form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
            ]);
            async move {
                let resp = req.send().await?;
                check_response(platform, "refresh token exchange", resp)
            }
        })
        .await?;
        let token: TokenResponse = read_json("refresh token body", response).await?;
        Ok(token.into_cached())
    }
}

/// Process-wide token cache keyed by platform.
pub struct CredentialManager {
    http: reqwest::Client,
    policy: RetryPolicy,
    grants: HashMap<Platform, Arc<dyn TokenGrant>>,
    cache: tokio::sync::Mutex<HashMap<Platform, CachedToken>>,
}

impl CredentialManager {
    #[must_use]
    pub fn new(http: reqwest::Client, policy: RetryPolicy) -> Self {
        Self {
            http,
            policy,
            grants: HashMap::new(),
            cache: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&mut self, grant: Arc<dyn TokenGrant>) {
        self.grants.insert(grant.platform(), grant);
    }

    /// Returns a valid bearer token for the platform, acquiring one through
    /// the registered grant if the cache is empty or expired.
    ///
    /// The cache lock is held across the grant call: concurrent callers for
    /// the same expired token wait for one refresh instead of stampeding
    /// the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::NoGrant`] if the platform was never registered,
    /// or any error from the grant flow.
    pub async fn get_token(&self, platform: Platform) -> Result<String, IngestError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.get(&platform) {
            if !token.is_expired(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let grant = self
            .grants
            .get(&platform)
            .ok_or(IngestError::NoGrant(platform))?;
        tracing::debug!(platform = %platform, "acquiring bearer token");
        let token = grant.acquire(&self.http, &self.policy).await?;
        let value = token.value.clone();
        cache.insert(platform, token);
        Ok(value)
    }

    /// Drops the cached token so the next [`Self::get_token`] re-acquires.
    pub async fn invalidate(&self, platform: Platform) {
        self.cache.lock().await.remove(&platform);
    }

    /// Runs a token-consuming operation, re-acquiring the token once on an
    /// auth rejection.
    ///
    /// A second consecutive [`IngestError::Auth`] is returned as terminal;
    /// there is no third acquisition, preventing credential-refresh loops.
    ///
    /// # Errors
    ///
    /// Propagates token-acquisition errors and the operation's own errors.
    pub async fn with_auth_retry<T, F, Fut>(
        &self,
        platform: Platform,
        operation: F,
    ) -> Result<T, IngestError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, IngestError>>,
    {
        let token = self.get_token(platform).await?;
        match operation(token).await {
            Err(IngestError::Auth { .. }) => {
                tracing::info!(platform = %platform, "token rejected, re-acquiring once");
                self.invalidate(platform).await;
                let token = self.get_token(platform).await?;
                operation(token).await
            }
            other => other,
        }
    }
}
