// REST API for the chat server

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use serde_json::{Map, Value};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::auth::{APP_CHECK_HEADER, RequestSecurityVerifier, SecurityError};
use crate::chat::{ChatError, ChatService, effective_user_id};

/// Longest accepted chat message, in characters, after trimming.
pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<RequestSecurityVerifier>,
    pub chat: Arc<dyn ChatService>,
}

pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(greeting))
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(allowed_origins)),
        )
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Skipping CORS origin that is not a valid header value: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-firebase-appcheck"),
        ])
        .allow_origin(AllowOrigin::list(origins))
}

async fn greeting() -> &'static str {
    concat!("Chatbot server ", env!("CARGO_PKG_VERSION"))
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "server"
    }))
}

/// A validated `/chat` request body.
#[derive(Debug, PartialEq, Eq)]
struct ChatRequest {
    message: String,
    user_id: Option<String>,
    session_id: Option<String>,
}

fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, ApiError> {
    let root: Map<String, Value> = serde_json::from_slice(body)
        .map_err(|_| ApiError::BadRequest("Body must be valid JSON".to_string()))?;

    let message = root
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Field 'message' is required".to_string()))?;

    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Field 'message' must be <= {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let optional = |key: &str| root.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(ChatRequest {
        message: message.to_string(),
        user_id: optional("userId"),
        session_id: optional("sessionId"),
    })
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let verified = state
        .verifier
        .verify(header_str(header::AUTHORIZATION.as_str()), header_str(APP_CHECK_HEADER))
        .await?;

    let request = parse_chat_request(&body)?;
    let user_id = effective_user_id(
        verified.as_ref().map(|ctx| ctx.uid()),
        request.user_id.as_deref(),
    );

    let result = state
        .chat
        .generate_reply(&request.message, user_id, request.session_id.as_deref())
        .await?;

    let mut payload = Map::new();
    payload.insert("reply".to_string(), Value::String(result.reply));
    payload.insert("model".to_string(), Value::String(result.model));
    if let Some(session_id) = request.session_id {
        payload.insert("sessionId".to_string(), Value::String(session_id));
    }
    if let Some(user_id) = user_id {
        payload.insert("userId".to_string(), Value::String(user_id.to_string()));
    }

    Ok(Json(Value::Object(payload)))
}

#[derive(Debug)]
pub enum ApiError {
    Security(SecurityError),
    BadRequest(String),
    Upstream(ChatError),
}

impl From<SecurityError> for ApiError {
    fn from(e: SecurityError) -> Self {
        ApiError::Security(e)
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        ApiError::Upstream(e)
    }
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let body = serde_json::json!({
        "error": {
            "code": code,
            "message": message,
        }
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Security(e) => e.into_response(),
            ApiError::BadRequest(message) => {
                error_body(StatusCode::BAD_REQUEST, "bad_request", message)
            }
            ApiError::Upstream(e @ ChatError::MissingApiKey(_)) => {
                error!("Chat upstream unavailable: {}", e);
                error_body(StatusCode::SERVICE_UNAVAILABLE, "missing_api_key", e.to_string())
            }
            ApiError::Upstream(e) => {
                error!("Chat upstream failed: {}", e);
                error_body(StatusCode::BAD_GATEWAY, "upstream_failure", e.to_string())
            }
        }
    }
}
