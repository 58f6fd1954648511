//! Classified request security failures.
//!
//! Every failure is either `Unauthorized` (the caller must prove who the user
//! is) or `Forbidden` (the client or the verification infrastructure is not
//! trusted), and carries a short machine-readable code.

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Two-tier failure category surfaced to the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityErrorKind {
    /// Missing or invalid proof of user identity.
    Unauthorized,
    /// Missing, invalid, or unverifiable proof of client legitimacy.
    Forbidden,
}

/// Machine-readable failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityErrorCode {
    MissingCredentials,
    InvalidIdToken,
    InvalidAppCheck,
    SecurityUnavailable,
}

impl SecurityErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidIdToken => "invalid_id_token",
            Self::InvalidAppCheck => "invalid_app_check",
            Self::SecurityUnavailable => "security_unavailable",
        }
    }
}

impl fmt::Display for SecurityErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified verification failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityError {
    kind: SecurityErrorKind,
    code: SecurityErrorCode,
    message: String,
}

impl SecurityError {
    pub fn unauthorized(code: SecurityErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: SecurityErrorKind::Unauthorized,
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: SecurityErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: SecurityErrorKind::Forbidden,
            code,
            message: message.into(),
        }
    }

    /// Shorthand for the most common attestation failure.
    pub(crate) fn invalid_app_check(message: impl Into<String>) -> Self {
        Self::forbidden(SecurityErrorCode::InvalidAppCheck, message)
    }

    pub fn kind(&self) -> SecurityErrorKind {
        self.kind
    }

    pub fn code(&self) -> SecurityErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            SecurityErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            SecurityErrorKind::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for SecurityError {}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}
