use std::env;
use std::time::Duration;

/// Connection settings for the hosted generation API.
///
/// Defaults to the public Generative Language endpoint and models; the
/// environment helpers read the `DECKFORGE_*` overrides.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL of the REST API, without a trailing slash.
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Model used for structured text generation.
    pub text_model: String,
    /// Model used for image generation.
    pub image_model: String,
    /// Upper bound on a single backend call, tool round-trips included.
    pub timeout: Duration,
}

impl BackendConfig {
    pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
    pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";
    pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-fast-generate-001";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub const API_KEY_ENV: &str = "DECKFORGE_API_KEY";
    pub const FALLBACK_API_KEY_ENV: &str = "GEMINI_API_KEY";
    pub const BASE_URL_ENV: &str = "DECKFORGE_BASE_URL";

    /// Build a config with defaults for everything except the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            api_key: api_key.into(),
            text_model: Self::DEFAULT_TEXT_MODEL.to_owned(),
            image_model: Self::DEFAULT_IMAGE_MODEL.to_owned(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// API key from `DECKFORGE_API_KEY`, falling back to `GEMINI_API_KEY`.
    /// Empty values count as unset.
    pub fn api_key_from_env() -> Option<String> {
        [Self::API_KEY_ENV, Self::FALLBACK_API_KEY_ENV]
            .into_iter()
            .filter_map(|name| env::var(name).ok())
            .find(|v| !v.trim().is_empty())
    }

    /// Endpoint override from `DECKFORGE_BASE_URL`.
    pub fn base_url_from_env() -> Option<String> {
        env::var(Self::BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// The key stays out of logs.
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Per-request bounds applied by the orchestrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Most recent FAQ turns kept in the prompt; older ones are dropped.
    pub max_faq_history: usize,
    /// Tool invocations allowed per generation request.
    pub max_tool_calls: usize,
    /// Longest accepted document, in characters.
    pub max_document_chars: usize,
}

impl Limits {
    pub const DEFAULT_MAX_FAQ_HISTORY: usize = 10;
    pub const DEFAULT_MAX_TOOL_CALLS: usize = 3;
    pub const DEFAULT_MAX_DOCUMENT_CHARS: usize = 200_000;
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_faq_history: Self::DEFAULT_MAX_FAQ_HISTORY,
            max_tool_calls: Self::DEFAULT_MAX_TOOL_CALLS,
            max_document_chars: Self::DEFAULT_MAX_DOCUMENT_CHARS,
        }
    }
}
