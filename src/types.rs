//! NewType wrappers for identifiers that flow through request verification.
//!
//! These types keep a verified user id from being confused with a raw token
//! subject, a project number, or a signing key id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// User id returned by the identity provider for a verified ID token.
    ///
    /// Only ever constructed from a successful identity verification, so
    /// holding one means the caller is a signed-in user.
    Uid
);

newtype_string!(
    /// Numeric project identifier used to build the expected App Check
    /// issuer and audience.
    ProjectNumber
);

newtype_string!(
    /// Key id (`kid`) selecting a public key from the App Check key set.
    KeyId
);

impl ProjectNumber {
    /// Issuer every App Check token for this project must carry.
    pub fn app_check_issuer(&self) -> String {
        format!("https://firebaseappcheck.googleapis.com/{}", self.0)
    }

    /// Audience entry every App Check token for this project must contain.
    pub fn app_check_audience(&self) -> String {
        format!("projects/{}", self.0)
    }
}
