//! App Check JWKS (JSON Web Key Set) fetching and caching.
//!
//! The key set is held in a single process-wide [`JwksCache`]. Readers take a
//! fast path while the cached entry is fresh; once it expires, refreshes are
//! serialized behind one lock so a burst of concurrent requests issues exactly
//! one network fetch and everyone else reuses its result.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use reqwest::header::CACHE_CONTROL;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::auth::error::{SecurityError, SecurityErrorCode};
use crate::types::KeyId;

/// Well-known App Check key set endpoint.
pub const APP_CHECK_JWKS_URL: &str = "https://firebaseappcheck.googleapis.com/v1/jwks";

/// TTL used when the response carries no usable `Cache-Control: max-age`.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Longest a fetched key set is trusted, whatever `max-age` says.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on a single key set fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// RSA public keys indexed by key id. Immutable once built.
#[derive(Clone, Default)]
pub struct SigningKeys {
    keys: HashMap<KeyId, DecodingKey>,
}

impl SigningKeys {
    /// Build the key map from a parsed JWK Set, keeping RSA keys that carry a `kid`.
    pub fn from_jwk_set(jwk_set: &JwkSet) -> Self {
        let mut keys = HashMap::new();

        for jwk in &jwk_set.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                debug!("Skipping JWK without kid");
                continue;
            };

            let AlgorithmParameters::RSA(rsa) = &jwk.algorithm else {
                debug!("Skipping non-RSA key: {}", kid);
                continue;
            };

            match DecodingKey::from_rsa_components(&rsa.n, &rsa.e) {
                Ok(key) => {
                    keys.insert(KeyId::new(kid), key);
                }
                Err(e) => warn!("Failed to parse JWK {}: {}", kid, e),
            }
        }

        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys.keys()).finish()
    }
}

/// One successful key set download and how long it may be cached.
#[derive(Debug, Clone)]
pub struct FetchedJwks {
    pub keys: SigningKeys,
    pub ttl: Duration,
}

/// Source of the App Check key set.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch(&self) -> Result<FetchedJwks, JwksError>;
}

/// Fetches the key set over HTTPS with a bounded timeout.
pub struct HttpJwksFetcher {
    url: String,
    client: reqwest::Client,
}

impl HttpJwksFetcher {
    pub fn new(url: impl Into<String>) -> Result<Self, JwksError> {
        let client = reqwest::Client::builder()
            .connect_timeout(FETCH_TIMEOUT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| JwksError::Client(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self) -> Result<FetchedJwks, JwksError> {
        debug!("Fetching App Check JWKS from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JwksError::Status(response.status().as_u16()));
        }

        let ttl = parse_cache_max_age(
            response
                .headers()
                .get(CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
        );

        let body = response
            .bytes()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?;
        let jwk_set: JwkSet =
            serde_json::from_slice(&body).map_err(|e| JwksError::Parse(e.to_string()))?;

        Ok(FetchedJwks {
            keys: SigningKeys::from_jwk_set(&jwk_set),
            ttl,
        })
    }
}

/// Read `max-age` (seconds) from a `Cache-Control` value.
///
/// Falls back to [`DEFAULT_CACHE_TTL`] when the header is missing, has no
/// `max-age` directive, or the value is not a non-negative integer. Values
/// above [`MAX_CACHE_TTL`] are capped.
pub fn parse_cache_max_age(cache_control: Option<&str>) -> Duration {
    let Some(cache_control) = cache_control else {
        return DEFAULT_CACHE_TTL;
    };

    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|directive| {
            let (name, value) = directive.split_once('=')?;
            if !name.trim().eq_ignore_ascii_case("max-age") {
                return None;
            }
            value.trim().parse::<u64>().ok()
        })
        .map(|seconds| Duration::from_secs(seconds).min(MAX_CACHE_TTL))
        .unwrap_or(DEFAULT_CACHE_TTL)
}

/// Cached key set with its absolute expiry.
struct CachedJwkSet {
    keys: Arc<SigningKeys>,
    expires_at: Instant,
}

impl CachedJwkSet {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-wide, time-bounded cache of the App Check key set.
pub struct JwksCache {
    fetcher: Arc<dyn JwksFetcher>,
    current: RwLock<Option<Arc<CachedJwkSet>>>,
    /// Held for the whole re-check + fetch + store sequence.
    refresh_lock: Mutex<()>,
}

impl JwksCache {
    pub fn new(fetcher: Arc<dyn JwksFetcher>) -> Self {
        Self {
            fetcher,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Cache backed by the HTTPS fetcher for `url`.
    pub fn for_url(url: impl Into<String>) -> Result<Self, JwksError> {
        Ok(Self::new(Arc::new(HttpJwksFetcher::new(url)?)))
    }

    /// Return a fresh key set, fetching it if the cache is empty or expired.
    ///
    /// A failed fetch leaves the cache untouched, so the next call retries.
    /// Dropping the returned future mid-fetch has the same effect.
    pub async fn resolve(&self) -> Result<Arc<SigningKeys>, SecurityError> {
        if let Some(keys) = self.fresh_keys().await {
            return Ok(keys);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(keys) = self.fresh_keys().await {
            debug!("JWKS refreshed by a concurrent caller");
            return Ok(keys);
        }

        let fetched = self.fetcher.fetch().await.map_err(|e| {
            warn!("App Check JWKS fetch failed: {}", e);
            SecurityError::from(e)
        })?;

        let ttl = fetched.ttl.min(MAX_CACHE_TTL);
        if fetched.keys.is_empty() {
            warn!("App Check JWKS response contained no usable RSA keys");
        }
        let keys = Arc::new(fetched.keys);
        let entry = Arc::new(CachedJwkSet {
            keys: keys.clone(),
            expires_at: Instant::now() + ttl,
        });
        *self.current.write().await = Some(entry);

        debug!(
            "Cached {} App Check keys for {}s",
            keys.len(),
            ttl.as_secs()
        );
        Ok(keys)
    }

    async fn fresh_keys(&self) -> Option<Arc<SigningKeys>> {
        let current = self.current.read().await;
        current
            .as_ref()
            .filter(|entry| entry.is_fresh(Instant::now()))
            .map(|entry| entry.keys.clone())
    }

    /// Expiry of the cached entry, if one has ever been stored.
    pub async fn expires_at(&self) -> Option<Instant> {
        self.current.read().await.as_ref().map(|e| e.expires_at)
    }

    /// Whether a non-expired key set is currently cached.
    pub async fn is_cached(&self) -> bool {
        self.fresh_keys().await.is_some()
    }
}

/// Errors that can occur while fetching the key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwksError {
    /// HTTP client could not be built.
    Client(String),
    /// Network failure or timeout.
    Fetch(String),
    /// Endpoint answered with a non-success status.
    Status(u16),
    /// Body was not a JWK Set.
    Parse(String),
}

impl fmt::Display for JwksError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(msg) => write!(f, "Failed to build JWKS client: {}", msg),
            Self::Fetch(msg) => write!(f, "Failed to fetch JWKS: {}", msg),
            Self::Status(status) => write!(f, "HTTP {} from JWKS endpoint", status),
            Self::Parse(msg) => write!(f, "Failed to parse JWKS: {}", msg),
        }
    }
}

impl std::error::Error for JwksError {}

impl From<JwksError> for SecurityError {
    fn from(err: JwksError) -> Self {
        let message = match err {
            JwksError::Parse(_) => "App Check public keys response is invalid",
            _ => "Could not fetch App Check public keys",
        };
        SecurityError::forbidden(SecurityErrorCode::SecurityUnavailable, message)
    }
}
