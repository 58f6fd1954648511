//! Shared fixtures for integration tests: a wiremock key-set endpoint and
//! helpers that mint App Check tokens with a fixed RSA key.

#![allow(dead_code)]

use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// 2048-bit RSA keypair used only by tests.
const TEST_RSA_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/app_check_test_key.pem");
const TEST_PUBLIC_JWK: &str = include_str!("../fixtures/app_check_test_jwk.json");

pub const TEST_KEY_ID: &str = "integration-key";
pub const PROJECT_NUMBER: &str = "987654321";
pub const JWKS_PATH: &str = "/v1/jwks";

pub fn jwks_body() -> Value {
    let mut jwk: Value = serde_json::from_str(TEST_PUBLIC_JWK).expect("test JWK");
    jwk["kid"] = json!(TEST_KEY_ID);
    json!({ "keys": [jwk] })
}

/// Key set response with an optional `Cache-Control` header and delay.
pub fn jwks_response(cache_control: Option<&str>, delay: Option<Duration>) -> ResponseTemplate {
    let mut template = ResponseTemplate::new(200).set_body_json(jwks_body());
    if let Some(value) = cache_control {
        template = template.insert_header("Cache-Control", value);
    }
    if let Some(delay) = delay {
        template = template.set_delay(delay);
    }
    template
}

/// Mount a key-set endpoint that must be hit exactly `expected` times.
pub async fn mount_jwks(server: &MockServer, response: ResponseTemplate, expected: u64) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(response)
        .expect(expected)
        .mount(server)
        .await;
}

pub fn jwks_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), JWKS_PATH)
}

#[derive(Debug, Clone, Serialize)]
pub struct AppCheckClaims {
    pub iss: String,
    pub aud: Vec<String>,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl AppCheckClaims {
    pub fn valid() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            iss: format!("https://firebaseappcheck.googleapis.com/{}", PROJECT_NUMBER),
            aud: vec![
                format!("projects/{}", PROJECT_NUMBER),
                "projects/demo-project".to_string(),
            ],
            sub: "1:987654321:web:abcdef".to_string(),
            iat: now - 30,
            exp: now + 3600,
        }
    }

    pub fn expired() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            iat: now - 7200,
            exp: now - 3600,
            ..Self::valid()
        }
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }
}

pub fn mint(claims: &AppCheckClaims, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(TEST_RSA_PRIVATE_KEY_PEM.as_bytes()).expect("test RSA key");
    encode(&header, claims, &key).expect("sign test token")
}
