// Core modules
pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod types;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{
    RequestSecurityVerifier, SecurityError, SecurityErrorCode, SecurityErrorKind, SecurityMode,
    VerifiedRequestContext,
};
pub use chat::{ChatError, ChatResult, ChatService, GeminiChatService, GenkitChatService};
pub use config::{ChatBackend, SecurityConfig, ServerConfig};

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;

/// Build the full HTTP application from configuration.
///
/// Fails when `required` security cannot be set up, so the process never
/// serves traffic unverified in that mode.
pub fn create_app(security: &SecurityConfig, server: &ServerConfig) -> Result<Router> {
    let verifier = RequestSecurityVerifier::from_config(security)?;
    let chat: Arc<dyn ChatService> = match server.chat_backend {
        ChatBackend::Genkit => Arc::new(
            GenkitChatService::new(server.genkit_base_url.clone())
                .context("failed to initialize chat service")?,
        ),
        ChatBackend::Gemini => {
            if server.gemini_api_key.is_none() {
                tracing::warn!("GEMINI_API_KEY is not set; chat requests will fail");
            }
            Arc::new(
                GeminiChatService::new(server.gemini_api_key.clone(), server.gemini_model.clone())
                    .context("failed to initialize chat service")?,
            )
        }
    };

    let state = AppState {
        verifier: Arc::new(verifier),
        chat,
    };

    Ok(create_router(state, &server.allowed_origins))
}
