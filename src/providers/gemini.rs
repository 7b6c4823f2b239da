use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::base::Provider;
use super::configs::GeminiProviderConfig;
use crate::errors::{Result, TutorError};

/// A prepared endpoint for one model. Building these is cheap here, but the
/// cache mirrors the upstream service contract: one handle per
/// (credential, model) pair, created once and never invalidated.
#[derive(Debug, Clone)]
struct ModelHandle {
    url: String,
}

pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
    handles: Mutex<HashMap<String, ModelHandle>>,
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            config,
            handles: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_env() -> Result<Self> {
        GeminiProvider::new(GeminiProviderConfig::from_env()?)
    }

    /// Get or create the handle for `model`. The cache is append-only and
    /// keyed by credential and model name, so concurrent callers can only
    /// race to insert the same value.
    fn handle_for(&self, model: &str) -> ModelHandle {
        let cache_key = format!("{}-{}", self.config.api_key, model);
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles
            .entry(cache_key)
            .or_insert_with(|| ModelHandle {
                url: format!(
                    "{}/v1beta/models/{}:generateContent?key={}",
                    self.config.host.trim_end_matches('/'),
                    model,
                    self.config.api_key
                ),
            })
            .clone()
    }

    async fn post(&self, url: &str, payload: Value) -> Result<Value> {
        let response = self.client.post(url).json(&payload).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status => Err(TutorError::Gateway(format!(
                "Gemini request failed with status {status}"
            ))),
        }
    }

    /// Pull the candidate text out of a generateContent response.
    fn extract_text(data: &Value) -> Result<String> {
        let parts = data
            .pointer("/candidates/0/content/parts")
            .and_then(|v| v.as_array())
            .ok_or_else(|| TutorError::Gateway("No candidate content in response".to_string()))?;

        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect();

        if text.is_empty() {
            return Err(TutorError::Gateway(
                "Candidate contained no text parts".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let handle = self.handle_for(model);
        let payload = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        let response = self.post(&handle.url, payload).await?;

        if let Some(error) = response.get("error") {
            return Err(TutorError::Gateway(format!("Gemini API error: {error}")));
        }

        Self::extract_text(&response)
    }
}
