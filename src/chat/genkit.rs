//! Genkit chat flow client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatError, ChatResult, ChatService, ERROR_BODY_LIMIT, http_client};

const UPSTREAM: &str = "Genkit service";
const DEFAULT_MODEL: &str = "genkit";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlowRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct FlowResponse {
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

/// Calls the Genkit chat flow at `{base_url}/chat`.
pub struct GenkitChatService {
    base_url: String,
    client: reqwest::Client,
}

impl GenkitChatService {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChatError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ChatError::NotConfigured("GENKIT_BASE_URL"));
        }

        let client = http_client().map_err(|e| ChatError::Unreachable {
            upstream: UPSTREAM,
            detail: e.to_string(),
        })?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatService for GenkitChatService {
    async fn generate_reply(
        &self,
        message: &str,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<ChatResult, ChatError> {
        let url = format!("{}/chat", self.base_url);
        debug!("Calling chat flow at {}", url);

        let unreachable = |e: reqwest::Error| ChatError::Unreachable {
            upstream: UPSTREAM,
            detail: e.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&FlowRequest {
                message,
                user_id,
                session_id,
            })
            .send()
            .await
            .map_err(unreachable)?;

        let status = response.status();
        let body = response.text().await.map_err(unreachable)?;

        if !status.is_success() {
            return Err(ChatError::Status {
                upstream: UPSTREAM,
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        parse_flow_response(&body)
    }
}

fn parse_flow_response(body: &str) -> Result<ChatResult, ChatError> {
    let parsed: FlowResponse =
        serde_json::from_str(body).map_err(|_| ChatError::InvalidBody { upstream: UPSTREAM })?;

    let reply = parsed.reply.as_deref().map(str::trim).unwrap_or_default();
    if reply.is_empty() {
        return Err(ChatError::EmptyReply { upstream: UPSTREAM });
    }

    let model = parsed
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MODEL);

    Ok(ChatResult {
        reply: reply.to_string(),
        model: model.to_string(),
    })
}
