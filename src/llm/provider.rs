//! Provider detection for OpenAI-compatible endpoints.
//!
//! Every supported backend speaks the Chat Completions protocol; the
//! provider only affects how the endpoint is described in logs and how the
//! chat URL is formed.

use std::fmt;

/// Supported LLM providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Together AI (together.ai, together.xyz)
    TogetherAI,
    /// Groq (groq.com)
    Groq,
    /// Local Ollama server (default port 11434)
    Ollama,
    /// Local LM Studio server (default port 1234)
    LmStudio,
    /// Generic OpenAI-compatible provider
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mcp_agent_chat::llm::Provider;
    ///
    /// let provider = Provider::detect_from_url("https://api.openai.com/v1");
    /// assert_eq!(provider, Provider::OpenAI);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();
        let port = url::Url::parse(&lower).ok().and_then(|u| u.port());

        if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("together.ai") || lower.contains("together.xyz") {
            Self::TogetherAI
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else if lower.contains("ollama") || port == Some(11434) {
            Self::Ollama
        } else if lower.contains("lmstudio") || port == Some(1234) {
            Self::LmStudio
        } else {
            Self::Generic
        }
    }

    /// Build the chat completions URL for this provider.
    ///
    /// The base URL already carries the API version segment (`/v1`), as
    /// OpenAI-compatible clients expect.
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenAI => "openai",
            Self::OpenRouter => "openrouter",
            Self::TogetherAI => "together",
            Self::Groq => "groq",
            Self::Ollama => "ollama",
            Self::LmStudio => "lmstudio",
            Self::Generic => "generic",
        };
        f.write_str(name)
    }
}
