//! Model client construction and credential resolution.

use super::provider::Provider;
use crate::error::{AppError, Result};

/// Standard `OpenAI` API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// An HTTP client bound to one OpenAI-compatible endpoint and credential.
#[derive(Clone)]
pub struct ModelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    provider: Provider,
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keep the key out of logs.
        f.debug_struct("ModelClient")
            .field("base_url", &self.base_url)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl ModelClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn chat_url(&self) -> String {
        self.provider.build_chat_url(&self.base_url)
    }

    pub(crate) fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.post(url).bearer_auth(&self.api_key)
    }
}

/// Build a client for `url`, or for the standard `OpenAI` endpoint when `url`
/// is `None`. Both use `api_key` as a bearer token.
pub fn build_client(url: Option<&str>, api_key: impl Into<String>) -> ModelClient {
    let base_url = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(OPENAI_BASE_URL)
        .trim_end_matches('/')
        .to_string();

    ModelClient {
        http: reqwest::Client::new(),
        provider: Provider::detect_from_url(&base_url),
        base_url,
        api_key: api_key.into(),
    }
}

/// Resolve a configured API key against the process environment.
pub fn resolve_api_key(raw: &str) -> Result<String> {
    resolve_api_key_with(raw, |name| std::env::var(name).ok())
}

/// Resolve a configured API key using `lookup` for environment access.
///
/// An entirely upper-case value (at least one cased character, none lower
/// case) names an environment variable; anything else is the key itself.
pub fn resolve_api_key_with<F>(raw: &str, lookup: F) -> Result<String>
where
    F: FnOnce(&str) -> Option<String>,
{
    if !is_upper(raw) {
        return Ok(raw.to_string());
    }

    lookup(raw)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::MissingCredential {
            var: raw.to_string(),
        })
}

fn is_upper(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_case_key_reads_environment() {
        let key = resolve_api_key_with("OPENAI_API_KEY", |name| {
            assert_eq!(name, "OPENAI_API_KEY");
            Some("sk-from-env".to_string())
        })
        .unwrap();
        assert_eq!(key, "sk-from-env");
    }

    #[test]
    fn unset_variable_is_missing_credential() {
        let err = resolve_api_key_with("SOME_UNSET_KEY", |_| None).unwrap_err();
        assert!(matches!(err, AppError::MissingCredential { ref var } if var == "SOME_UNSET_KEY"));
    }

    #[test]
    fn empty_variable_is_missing_credential() {
        let err = resolve_api_key_with("EMPTY_KEY", |_| Some(String::new())).unwrap_err();
        assert!(matches!(err, AppError::MissingCredential { .. }));
    }

    #[test]
    fn non_upper_case_key_is_literal() {
        for raw in ["sk-abc123", "ollama", "lm-studio", "12345", "", "Mixed_Case"] {
            let key = resolve_api_key_with(raw, |_| panic!("lookup must not run for {raw:?}")).unwrap();
            assert_eq!(key, raw);
        }
    }

    #[test]
    fn default_endpoint_is_openai() {
        let client = build_client(None, "sk-test");
        assert_eq!(client.base_url(), OPENAI_BASE_URL);
        assert_eq!(client.provider(), &Provider::OpenAI);
        assert_eq!(client.chat_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn custom_endpoint_is_used() {
        let client = build_client(Some("http://localhost:11434/v1/"), "ollama");
        assert_eq!(client.base_url(), "http://localhost:11434/v1");
        assert_eq!(client.provider(), &Provider::Ollama);
        assert_eq!(client.chat_url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn debug_output_hides_key() {
        let client = build_client(None, "sk-secret");
        assert!(!format!("{client:?}").contains("sk-secret"));
    }
}
