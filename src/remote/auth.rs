//! Credential provider seam
//!
//! The identity provider is a collaborator, not part of the framework:
//! anything that can mint a bearer token plugs in behind [`TokenProvider`].
//! [`Credentials`] adds expiry-buffered caching on top so hot lifecycle
//! paths do not mint a token per request.

use super::http::RemoteError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the provider can't report expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Source of bearer tokens for the management API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, RemoteError>;
}

/// Fixed token, for tests and pre-minted service credentials.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, RemoteError> {
        Ok(self.0.clone())
    }
}

/// Token read from an environment variable on every mint.
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub const DEFAULT_VAR: &'static str = "STRATA_API_TOKEN";

    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

#[async_trait]
impl TokenProvider for EnvToken {
    async fn token(&self) -> Result<String, RemoteError> {
        std::env::var(&self.var).map_err(|_| {
            RemoteError::Credential(format!("environment variable {} is not set", self.var))
        })
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Credentials holder with token caching
#[derive(Clone)]
pub struct Credentials {
    provider: Arc<dyn TokenProvider>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl Credentials {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self) -> Result<String, RemoteError> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = self.provider.token().await?;
        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        Ok(token)
    }

    /// Drop the cached token and mint a fresh one.
    pub async fn refresh(&self) -> Result<String, RemoteError> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }
        self.get_token().await
    }
}
