//! Request-scoped result of a successful security check.

use serde::Serialize;

use crate::types::Uid;

/// Proof that a request carried a valid identity token and a valid
/// attestation token. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedRequestContext {
    uid: Uid,
}

impl VerifiedRequestContext {
    pub fn new(uid: Uid) -> Self {
        Self { uid }
    }

    /// The signed-in user the identity token belongs to.
    pub fn uid(&self) -> &Uid {
        &self.uid
    }
}
