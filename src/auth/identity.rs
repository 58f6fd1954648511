//! Identity (ID token) verification boundary.
//!
//! The identity provider owns ID token verification. This module only calls
//! it and turns its answer into a [`Uid`] or a failure.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::types::Uid;

/// Account lookup endpoint of the identity provider.
pub const IDENTITY_TOOLKIT_LOOKUP_URL: &str =
    "https://identitytoolkit.googleapis.com/v1/accounts:lookup";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Verifies an ID token and returns the signed-in user's id.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Uid>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    #[serde(rename = "localId")]
    local_id: String,
    #[serde(default)]
    disabled: bool,
}

/// Delegates ID token checks to the provider's account lookup endpoint.
///
/// The provider rejects tokens that are malformed, expired, or revoked; a
/// successful lookup yields the account the token belongs to.
pub struct IdentityToolkitVerifier {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl IdentityToolkitVerifier {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("identity provider API key is empty");
        }

        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .context("failed to build identity provider HTTP client")?;

        Ok(Self {
            endpoint: IDENTITY_TOOLKIT_LOOKUP_URL.to_string(),
            api_key,
            client,
        })
    }

    /// Point lookups at a different endpoint (emulators, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl IdTokenVerifier for IdentityToolkitVerifier {
    async fn verify(&self, token: &str) -> Result<Uid> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "idToken": token }))
            .send()
            .await
            .context("identity provider unreachable")?;

        let status = response.status();
        if !status.is_success() {
            debug!("Identity lookup rejected token with HTTP {}", status);
            bail!("identity provider returned HTTP {}", status);
        }

        let body: LookupResponse = response
            .json()
            .await
            .context("identity provider returned an invalid body")?;

        let user = body
            .users
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no account for ID token"))?;

        if user.disabled {
            bail!("account {} is disabled", user.local_id);
        }
        if user.local_id.trim().is_empty() {
            bail!("account has an empty id");
        }

        Ok(Uid::new(user.local_id))
    }
}
