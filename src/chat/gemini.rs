//! Direct Gemini `generateContent` client.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{ChatError, ChatResult, ChatService, ERROR_BODY_LIMIT, http_client};

const UPSTREAM: &str = "Gemini API";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Calls `{endpoint}/models/{model}:generateContent` with an API key.
///
/// The key is checked per request, so a server without `GEMINI_API_KEY`
/// still starts and answers chat requests with `missing_api_key`.
pub struct GeminiChatService {
    api_key: Option<String>,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl GeminiChatService {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Result<Self, ChatError> {
        let model = model.into().trim().to_string();
        let client = http_client().map_err(|e| ChatError::Unreachable {
            upstream: UPSTREAM,
            detail: e.to_string(),
        })?;

        Ok(Self {
            api_key: api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            model: if model.is_empty() {
                DEFAULT_GEMINI_MODEL.to_string()
            } else {
                model
            },
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client,
        })
    }

    /// Override the API base, e.g. to point at a local mock.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatService for GeminiChatService {
    async fn generate_reply(
        &self,
        message: &str,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<ChatResult, ChatError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ChatError::MissingApiKey("GEMINI_API_KEY"))?;

        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        debug!("Calling Gemini model {}", self.model);

        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(message, user_id, session_id) }] }]
        });

        let unreachable = |e: reqwest::Error| ChatError::Unreachable {
            upstream: UPSTREAM,
            detail: e.without_url().to_string(),
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(unreachable)?;

        let status = response.status();
        let text = response.text().await.map_err(unreachable)?;

        if !status.is_success() {
            return Err(ChatError::Status {
                upstream: UPSTREAM,
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let reply = extract_reply(&text).ok_or(ChatError::EmptyReply { upstream: UPSTREAM })?;

        Ok(ChatResult {
            reply,
            model: self.model.clone(),
        })
    }
}

fn build_prompt(message: &str, user_id: Option<&str>, session_id: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(user_id) = user_id.filter(|u| !u.trim().is_empty()) {
        prompt.push_str(&format!("UserId: {}\n", user_id));
    }
    if let Some(session_id) = session_id.filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!("SessionId: {}\n", session_id));
    }
    prompt.push_str("You are a concise and helpful AI assistant.\n");
    prompt.push_str(&format!("User message: {}", message.trim()));
    prompt
}

/// First candidate whose text parts, joined by newlines, are non-blank.
fn extract_reply(body: &str) -> Option<String> {
    let root: Value = serde_json::from_str(body).ok()?;

    root.get("candidates")?
        .as_array()?
        .iter()
        .filter_map(|candidate| candidate.get("content")?.get("parts")?.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text")?.as_str())
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .find(|text| !text.is_empty())
}
