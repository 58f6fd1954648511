//! Request security for the chat API.
//!
//! Every request may carry two independent proofs:
//!
//! - **Identity**: `Authorization: Bearer <ID token>`, checked by the identity
//!   provider and resolved to a [`Uid`](crate::types::Uid)
//! - **Attestation**: `X-Firebase-AppCheck: <App Check token>`, an RS256 JWT
//!   verified locally against the provider's published key set
//!
//! [`RequestSecurityVerifier`] combines them according to the configured
//! [`SecurityMode`] and returns a [`VerifiedRequestContext`], `None` for an
//! allowed anonymous request, or a classified [`SecurityError`].
//!
//! ## Usage
//!
//! ```ignore
//! let verifier = RequestSecurityVerifier::from_config(&SecurityConfig::from_env())?;
//! let context = verifier.verify(authorization, app_check).await?;
//! ```

pub mod app_check;
mod bearer;
mod context;
mod error;
pub mod identity;
pub mod jwks;
mod mode;
mod verifier;

#[cfg(test)]
mod test_support;

pub use app_check::{AppCheckTokenVerifier, AppCheckVerifier};
pub use bearer::extract_bearer_token;
pub use context::VerifiedRequestContext;
pub use error::{SecurityError, SecurityErrorCode, SecurityErrorKind};
pub use identity::{IdTokenVerifier, IdentityToolkitVerifier};
pub use jwks::{HttpJwksFetcher, JwksCache, JwksError, JwksFetcher};
pub use mode::SecurityMode;
pub use verifier::{APP_CHECK_HEADER, EnforcingVerifier, RequestSecurityVerifier};
