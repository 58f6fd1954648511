//! Upstream reply generation.
//!
//! Two backends implement [`ChatService`]: the Genkit flow (default) and a
//! direct Gemini `generateContent` call.

mod gemini;
mod genkit;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::Uid;

pub use gemini::{DEFAULT_GEMINI_MODEL, GeminiChatService};
pub use genkit::GenkitChatService;

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upstream error bodies are truncated to this many characters in messages.
pub(crate) const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResult {
    pub reply: String,
    pub model: String,
}

/// Produces a reply for one chat message.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn generate_reply(
        &self,
        message: &str,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<ChatResult, ChatError>;
}

/// User id sent upstream. A verified uid overrides the client-supplied one.
pub fn effective_user_id<'a>(verified: Option<&'a Uid>, claimed: Option<&'a str>) -> Option<&'a str> {
    verified.map(Uid::as_str).or(claimed)
}

pub(crate) fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

/// Failure to produce a reply. `upstream` names the service in messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Server-side credential for the upstream is not configured.
    MissingApiKey(&'static str),
    NotConfigured(&'static str),
    Unreachable { upstream: &'static str, detail: String },
    Status { upstream: &'static str, status: u16, body: String },
    InvalidBody { upstream: &'static str },
    EmptyReply { upstream: &'static str },
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::MissingApiKey(var) => write!(f, "Missing {} on server", var),
            ChatError::NotConfigured(var) => write!(f, "Missing {} on server", var),
            ChatError::Unreachable { upstream, detail } => {
                write!(f, "Could not reach {}: {}", upstream, detail)
            }
            ChatError::Status {
                upstream,
                status,
                body,
            } => write!(f, "{} returned HTTP {}: {}", upstream, status, body),
            ChatError::InvalidBody { upstream } => write!(f, "{} returned invalid JSON", upstream),
            ChatError::EmptyReply { upstream } => write!(f, "{} returned empty reply", upstream),
        }
    }
}

impl std::error::Error for ChatError {}
