//! Enforcement mode resolution.

use std::fmt;

/// How strictly inbound requests are checked. Resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    /// Both tokens must be present and valid.
    Required,
    /// Anonymous requests pass; any presented credentials must be complete and valid.
    Optional,
    /// No checks at all. Local development only.
    Disabled,
}

impl SecurityMode {
    /// Resolve the mode from an explicit override and the managed-deployment signal.
    ///
    /// A recognized override (`required`, `optional`, `disabled`, any case)
    /// wins. Anything else falls back to `Required` on managed deployments
    /// and `Optional` elsewhere.
    pub fn resolve(raw: Option<&str>, managed_deployment: bool) -> Self {
        let fallback = if managed_deployment {
            Self::Required
        } else {
            Self::Optional
        };

        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("required") => Self::Required,
            Some("optional") => Self::Optional,
            Some("disabled") => Self::Disabled,
            _ => fallback,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
