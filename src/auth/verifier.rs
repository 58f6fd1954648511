//! Request security orchestration.
//!
//! [`RequestSecurityVerifier`] decides, per request, whether the presented
//! credentials are enough. The mode is fixed at construction:
//!
//! | Mode     | neither token | exactly one   | both                 |
//! |----------|---------------|---------------|----------------------|
//! | disabled | `None`        | `None`        | `None`               |
//! | optional | `None`        | unauthorized  | identity, then App Check |
//! | required | unauthorized  | unauthorized  | identity, then App Check |

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::auth::app_check::{AppCheckTokenVerifier, AppCheckVerifier};
use crate::auth::bearer::extract_bearer_token;
use crate::auth::context::VerifiedRequestContext;
use crate::auth::error::{SecurityError, SecurityErrorCode};
use crate::auth::identity::{IdTokenVerifier, IdentityToolkitVerifier};
use crate::auth::jwks::JwksCache;
use crate::auth::mode::SecurityMode;
use crate::config::SecurityConfig;

/// Header carrying the App Check token.
pub const APP_CHECK_HEADER: &str = "X-Firebase-AppCheck";

const MISSING_BOTH: &str = "Missing Authorization bearer token and X-Firebase-AppCheck header";
const MISSING_ONE: &str = "Both Authorization bearer token and X-Firebase-AppCheck header are required";
const INVALID_ID_TOKEN: &str = "Invalid Firebase ID token";

/// Either a full bypass or an enforcing verifier, chosen once at startup.
pub enum RequestSecurityVerifier {
    /// Never inspects headers.
    Bypass,
    Enforcing(EnforcingVerifier),
}

/// Checks both tokens according to an `Optional` or `Required` mode.
pub struct EnforcingVerifier {
    mode: SecurityMode,
    identity: Arc<dyn IdTokenVerifier>,
    app_check: Arc<dyn AppCheckTokenVerifier>,
}

impl RequestSecurityVerifier {
    /// Build an enforcing verifier from explicit collaborators.
    ///
    /// `SecurityMode::Disabled` yields [`RequestSecurityVerifier::Bypass`]
    /// and the collaborators are dropped unused.
    pub fn enforcing(
        mode: SecurityMode,
        identity: Arc<dyn IdTokenVerifier>,
        app_check: Arc<dyn AppCheckTokenVerifier>,
    ) -> Self {
        if mode == SecurityMode::Disabled {
            return Self::Bypass;
        }
        Self::Enforcing(EnforcingVerifier {
            mode,
            identity,
            app_check,
        })
    }

    /// Build the verifier for `config`.
    ///
    /// When the trust material cannot be set up, `required` mode fails and
    /// every other mode falls back to [`RequestSecurityVerifier::Bypass`].
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        if config.mode == SecurityMode::Disabled {
            warn!("Chat request security is disabled.");
            return Ok(Self::Bypass);
        }

        match build_enforcing(config) {
            Ok(verifier) => {
                info!(
                    "Chat request security enabled (mode: {}, project: {})",
                    config.mode,
                    config.project_id.as_deref().unwrap_or("<unset>")
                );
                Ok(Self::Enforcing(verifier))
            }
            Err(e) if config.mode == SecurityMode::Required => Err(e),
            Err(e) => {
                warn!(
                    "Chat request security could not be initialized, requests will NOT be verified: {:#}",
                    e
                );
                Ok(Self::Bypass)
            }
        }
    }

    /// The effective mode. `Bypass` reports `Disabled`.
    pub fn mode(&self) -> SecurityMode {
        match self {
            Self::Bypass => SecurityMode::Disabled,
            Self::Enforcing(v) => v.mode,
        }
    }

    /// Check the raw `Authorization` and App Check header values.
    ///
    /// `Ok(None)` means the request may proceed anonymously.
    pub async fn verify(
        &self,
        authorization: Option<&str>,
        app_check: Option<&str>,
    ) -> Result<Option<VerifiedRequestContext>, SecurityError> {
        match self {
            Self::Bypass => Ok(None),
            Self::Enforcing(v) => v.verify(authorization, app_check).await,
        }
    }
}

impl EnforcingVerifier {
    async fn verify(
        &self,
        authorization: Option<&str>,
        app_check: Option<&str>,
    ) -> Result<Option<VerifiedRequestContext>, SecurityError> {
        let id_token = extract_bearer_token(authorization);
        let app_check_token = app_check.map(str::trim).filter(|t| !t.is_empty());

        let (id_token, app_check_token) = match (id_token, app_check_token) {
            (Some(id), Some(ac)) => (id, ac),
            (None, None) if self.mode == SecurityMode::Optional => return Ok(None),
            (None, None) => {
                return Err(SecurityError::unauthorized(
                    SecurityErrorCode::MissingCredentials,
                    MISSING_BOTH,
                ));
            }
            _ => {
                return Err(SecurityError::unauthorized(
                    SecurityErrorCode::MissingCredentials,
                    MISSING_ONE,
                ));
            }
        };

        let uid = self.identity.verify(id_token).await.map_err(|e| {
            debug!("ID token rejected: {:#}", e);
            SecurityError::unauthorized(SecurityErrorCode::InvalidIdToken, INVALID_ID_TOKEN)
        })?;

        self.app_check.verify(app_check_token).await.inspect_err(|e| {
            debug!("App Check token rejected for {}: {}", uid, e);
        })?;

        Ok(Some(VerifiedRequestContext::new(uid)))
    }
}

fn build_enforcing(config: &SecurityConfig) -> Result<EnforcingVerifier> {
    let Some(api_key) = config.web_api_key.as_deref() else {
        bail!(
            "CHAT_SECURITY_MODE={} but Firebase identity initialization failed: FIREBASE_WEB_API_KEY is not set.",
            config.mode
        );
    };
    let identity = IdentityToolkitVerifier::new(api_key).with_context(|| {
        format!(
            "CHAT_SECURITY_MODE={} but Firebase identity initialization failed.",
            config.mode
        )
    })?;

    let Some(project_number) = config.project_number.as_ref() else {
        bail!(
            "CHAT_SECURITY_MODE={} requires FIREBASE_PROJECT_NUMBER for App Check verification.",
            config.mode
        );
    };
    let jwks = JwksCache::for_url(config.jwks_url.clone())
        .context("failed to initialize App Check key fetcher")?;
    let app_check = AppCheckVerifier::new(project_number, Arc::new(jwks));

    Ok(EnforcingVerifier {
        mode: config.mode,
        identity: Arc::new(identity),
        app_check: Arc::new(app_check),
    })
}
