use crate::errors::{Result, TutorError};

pub const GEMINI_HOST: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for the Gemini provider. The API key is the single opaque
/// credential the core depends on; its absence fails construction, before
/// any question is processed.
#[derive(Debug, Clone)]
pub struct GeminiProviderConfig {
    pub host: String,
    pub api_key: String,
}

impl GeminiProviderConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TutorError::Config(
                "An API key is required to initialize the Gemini provider".to_string(),
            ));
        }
        Ok(GeminiProviderConfig {
            host: GEMINI_HOST.to_string(),
            api_key,
        })
    }

    /// Read the API key from the `GOOGLE_API_KEY` environment variable,
    /// loading a `.env` file if one is present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| TutorError::Config("GOOGLE_API_KEY is not set".to_string()))?;
        GeminiProviderConfig::new(api_key)
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }
}
