//! App Check (attestation) token verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//! parse, algorithm, key id, key set, key lookup, signature, then claims.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::auth::error::SecurityError;
use crate::auth::jwks::JwksCache;
use crate::types::ProjectNumber;

/// Verifies attestation tokens. Success means the token is currently valid,
/// correctly signed, and issued for the configured project.
#[async_trait]
pub trait AppCheckTokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<(), SecurityError>;
}

/// Claims carried by an App Check token.
#[derive(Debug, Clone, Deserialize)]
pub struct AttestationClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// `aud` may be a single string or an array.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(aud)) => vec![aud],
        Some(OneOrMany::Many(aud)) => aud,
    })
}

/// RS256 App Check verifier backed by the shared key set cache.
pub struct AppCheckVerifier {
    issuer: String,
    audience: String,
    jwks: Arc<JwksCache>,
}

impl AppCheckVerifier {
    pub fn new(project_number: &ProjectNumber, jwks: Arc<JwksCache>) -> Self {
        Self {
            issuer: project_number.app_check_issuer(),
            audience: project_number.app_check_audience(),
            jwks,
        }
    }

    /// Validate time, issuer, audience and subject claims against `now` (Unix seconds).
    pub fn validate_claims(
        &self,
        claims: &AttestationClaims,
        now: i64,
    ) -> Result<(), SecurityError> {
        match claims.exp {
            Some(exp) if exp > now => {}
            _ => return Err(SecurityError::invalid_app_check("App Check token is expired")),
        }

        if claims.iat.is_some_and(|iat| iat > now) {
            return Err(SecurityError::invalid_app_check(
                "App Check token issue time is in the future",
            ));
        }

        if claims.iss.as_deref() != Some(self.issuer.as_str()) {
            return Err(SecurityError::invalid_app_check(
                "App Check token issuer is invalid",
            ));
        }

        if !claims.aud.iter().any(|aud| aud == &self.audience) {
            return Err(SecurityError::invalid_app_check(
                "App Check token audience is invalid",
            ));
        }

        if claims.sub.as_deref().is_none_or(|sub| sub.trim().is_empty()) {
            return Err(SecurityError::invalid_app_check(
                "App Check token subject is missing",
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl AppCheckTokenVerifier for AppCheckVerifier {
    async fn verify(&self, token: &str) -> Result<(), SecurityError> {
        // Structure only; nothing embedded in the token is trusted here.
        let unverified = jsonwebtoken::dangerous::insecure_decode::<AttestationClaims>(token)
            .map_err(|e| {
                debug!("App Check token failed to parse: {}", e);
                SecurityError::invalid_app_check("App Check token is not a valid JWT")
            })?;
        let header = unverified.header;

        if header.alg != Algorithm::RS256 {
            return Err(SecurityError::invalid_app_check(
                "App Check token must use RS256",
            ));
        }

        let kid = header
            .kid
            .as_deref()
            .filter(|kid| !kid.trim().is_empty())
            .ok_or_else(|| SecurityError::invalid_app_check("App Check token is missing key id"))?;

        let keys = self.jwks.resolve().await?;
        let key = keys
            .get(kid)
            .ok_or_else(|| SecurityError::invalid_app_check("No matching App Check public key"))?;

        let claims = verify_signature(token, key)?;
        self.validate_claims(&claims, chrono::Utc::now().timestamp())
    }
}

/// Check the RS256 signature and return the now-trusted claims.
///
/// Claim checks are switched off here; they run afterwards in a fixed order.
fn verify_signature(token: &str, key: &DecodingKey) -> Result<AttestationClaims, SecurityError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<AttestationClaims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("App Check signature check failed: {}", e);
            SecurityError::invalid_app_check("App Check token signature is invalid")
        })
}
