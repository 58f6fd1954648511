//! Environment-driven configuration, read once at startup.

use std::env;

use tracing::warn;
use url::Url;

use crate::auth::SecurityMode;
use crate::auth::jwks::APP_CHECK_JWKS_URL;
use crate::chat::DEFAULT_GEMINI_MODEL;
use crate::types::ProjectNumber;

pub const DEFAULT_GENKIT_BASE_URL: &str = "http://127.0.0.1:3400";

/// Which upstream produces chat replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatBackend {
    #[default]
    Genkit,
    Gemini,
}

impl ChatBackend {
    /// Parse `CHAT_BACKEND`. Unknown values fall back to Genkit.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("genkit") => ChatBackend::Genkit,
            Some("gemini") => ChatBackend::Gemini,
            Some(other) => {
                warn!("Unknown CHAT_BACKEND '{}', using genkit", other);
                ChatBackend::Genkit
            }
        }
    }
}

/// Origins allowed when `CHAT_CORS_ALLOWED_ORIGINS` is unset or empty.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
    "http://localhost:8080",
    "http://localhost:3000",
    "http://127.0.0.1:8080",
    "http://127.0.0.1:3000",
];

/// Settings for the request security verifier.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub mode: SecurityMode,
    pub project_id: Option<String>,
    pub project_number: Option<ProjectNumber>,
    /// Credential for the identity provider's account lookup.
    pub web_api_key: Option<String>,
    pub jwks_url: String,
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let managed_deployment = non_blank("K_SERVICE").is_some();
        let mode = SecurityMode::resolve(lookup("CHAT_SECURITY_MODE").as_deref(), managed_deployment);

        Self {
            mode,
            project_id: non_blank("FIREBASE_PROJECT_ID"),
            project_number: non_blank("FIREBASE_PROJECT_NUMBER")
                .map(|n| ProjectNumber::new(n.trim())),
            web_api_key: non_blank("FIREBASE_WEB_API_KEY"),
            jwks_url: non_blank("APP_CHECK_JWKS_URL")
                .unwrap_or_else(|| APP_CHECK_JWKS_URL.to_string()),
        }
    }
}

/// Settings for the HTTP surface and the upstream chat service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub chat_backend: ChatBackend,
    pub genkit_base_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let genkit_base_url = lookup("GENKIT_BASE_URL")
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_GENKIT_BASE_URL.to_string());

        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            chat_backend: ChatBackend::parse(lookup("CHAT_BACKEND").as_deref()),
            genkit_base_url,
            gemini_api_key: non_blank("GEMINI_API_KEY").map(|k| k.trim().to_string()),
            gemini_model: non_blank("GEMINI_MODEL")
                .map(|m| m.trim().to_string())
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            allowed_origins: parse_allowed_origins(
                lookup("CHAT_CORS_ALLOWED_ORIGINS").as_deref().unwrap_or(""),
            ),
        }
    }
}

/// Parse a comma-separated origin list into `scheme://host[:port]` strings.
///
/// Entries without a scheme or host are dropped. An empty result falls back
/// to [`DEFAULT_ALLOWED_ORIGINS`].
pub fn parse_allowed_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match Url::parse(entry) {
            Ok(url) if url.has_host() => Some(url.origin().ascii_serialization()),
            _ => {
                warn!("Ignoring invalid CORS origin: {}", entry);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect()
    } else {
        origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_security_config_defaults() {
        let config = SecurityConfig::from_lookup(lookup(&[]));
        assert_eq!(config.mode, SecurityMode::Optional);
        assert!(config.project_number.is_none());
        assert!(config.web_api_key.is_none());
        assert_eq!(config.jwks_url, APP_CHECK_JWKS_URL);
    }

    #[test]
    fn test_managed_deployment_defaults_to_required() {
        let config = SecurityConfig::from_lookup(lookup(&[("K_SERVICE", "chat-server")]));
        assert_eq!(config.mode, SecurityMode::Required);

        let config = SecurityConfig::from_lookup(lookup(&[("K_SERVICE", "  ")]));
        assert_eq!(config.mode, SecurityMode::Optional);
    }

    #[test]
    fn test_security_config_reads_project() {
        let config = SecurityConfig::from_lookup(lookup(&[
            ("CHAT_SECURITY_MODE", "disabled"),
            ("K_SERVICE", "chat-server"),
            ("FIREBASE_PROJECT_ID", "demo-project"),
            ("FIREBASE_PROJECT_NUMBER", " 42 "),
            ("FIREBASE_WEB_API_KEY", "key"),
            ("APP_CHECK_JWKS_URL", "http://localhost:9000/jwks"),
        ]));
        assert_eq!(config.mode, SecurityMode::Disabled);
        assert_eq!(config.project_id.as_deref(), Some("demo-project"));
        assert_eq!(config.project_number, Some(ProjectNumber::new("42")));
        assert_eq!(config.web_api_key.as_deref(), Some("key"));
        assert_eq!(config.jwks_url, "http://localhost:9000/jwks");
    }

    #[test]
    fn test_server_config() {
        let config = ServerConfig::from_lookup(lookup(&[("GENKIT_BASE_URL", "http://genkit:3400/")]));
        assert_eq!(config.genkit_base_url, "http://genkit:3400");
        assert_eq!(config.allowed_origins.len(), DEFAULT_ALLOWED_ORIGINS.len());

        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.genkit_base_url, DEFAULT_GENKIT_BASE_URL);
        assert_eq!(config.chat_backend, ChatBackend::Genkit);
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn test_gemini_backend_config() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("CHAT_BACKEND", " Gemini "),
            ("GEMINI_API_KEY", " secret "),
            ("GEMINI_MODEL", "gemini-1.5-pro"),
        ]));
        assert_eq!(config.chat_backend, ChatBackend::Gemini);
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.gemini_model, "gemini-1.5-pro");

        let config = ServerConfig::from_lookup(lookup(&[
            ("CHAT_BACKEND", "gemini"),
            ("GEMINI_API_KEY", "  "),
        ]));
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_unknown_chat_backend_falls_back() {
        assert_eq!(ChatBackend::parse(Some("openai")), ChatBackend::Genkit);
        assert_eq!(ChatBackend::parse(None), ChatBackend::Genkit);
    }

    #[test]
    fn test_parse_allowed_origins() {
        let origins = parse_allowed_origins("https://chat.example.com, http://localhost:5173/ ,,not a url");
        assert_eq!(
            origins,
            vec![
                "https://chat.example.com".to_string(),
                "http://localhost:5173".to_string()
            ]
        );
    }

    #[test]
    fn test_parse_allowed_origins_falls_back() {
        let origins = parse_allowed_origins(" , ");
        assert_eq!(origins[0], "http://localhost:8080");
        assert_eq!(origins.len(), 4);
    }
}
