//! Shared fixtures for auth unit tests: a fixed RSA keypair, a static key
//! fetcher, and helpers to mint App Check tokens.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;

use crate::auth::jwks::{FetchedJwks, JwksCache, JwksError, JwksFetcher, SigningKeys};
use crate::types::ProjectNumber;

// 2048-bit RSA keypair used only by tests.
const TEST_RSA_PRIVATE_KEY_PEM: &str = include_str!("../../tests/fixtures/app_check_test_key.pem");
const TEST_PUBLIC_JWK: &str = include_str!("../../tests/fixtures/app_check_test_jwk.json");

pub const TEST_KEY_ID: &str = "app-check-test-key";
pub const TEST_PROJECT_NUMBER: &str = "123456789";

pub fn project_number() -> ProjectNumber {
    ProjectNumber::new(TEST_PROJECT_NUMBER)
}

/// Claim set for minted test tokens. `None` fields are omitted.
#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl TestClaims {
    pub fn valid() -> Self {
        let number = project_number();
        let now = chrono::Utc::now().timestamp();
        Self {
            iss: Some(number.app_check_issuer()),
            aud: Some(serde_json::json!([
                number.app_check_audience(),
                "projects/my-project-id",
            ])),
            sub: Some("1:123456789:android:abc".to_string()),
            iat: Some(now - 60),
            exp: Some(now + 3600),
        }
    }
}

fn encoding_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(TEST_RSA_PRIVATE_KEY_PEM.as_bytes()).expect("test RSA key")
}

/// Sign `claims` with the test key under `kid`.
pub fn mint(claims: &TestClaims, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &encoding_key()).expect("sign test token")
}

/// Sign `claims` with HS256 so the header algorithm is wrong.
pub fn mint_hs256(claims: &TestClaims) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KEY_ID.to_string());
    encode(&header, claims, &EncodingKey::from_secret(b"not-an-rsa-key")).expect("sign test token")
}

pub fn test_jwk_set() -> JwkSet {
    let mut jwk: serde_json::Value = serde_json::from_str(TEST_PUBLIC_JWK).expect("test JWK");
    jwk["kid"] = serde_json::json!(TEST_KEY_ID);
    serde_json::from_value(serde_json::json!({ "keys": [jwk] })).expect("test JWK set")
}

/// Fetcher that always serves the test key set, or always fails.
pub struct StaticFetcher {
    pub fail: bool,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn serving() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JwksFetcher for StaticFetcher {
    async fn fetch(&self) -> Result<FetchedJwks, JwksError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(JwksError::Status(500));
        }
        Ok(FetchedJwks {
            keys: SigningKeys::from_jwk_set(&test_jwk_set()),
            ttl: Duration::from_secs(3600),
        })
    }
}

pub fn serving_cache() -> Arc<JwksCache> {
    Arc::new(JwksCache::new(Arc::new(StaticFetcher::serving())))
}
