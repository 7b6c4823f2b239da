//! Uniform access to the text-generation capability.
//!
//! Every component that needs the model goes through [`LlmGateway`]; no one
//! else talks to a provider directly. The gateway owns the structured-output
//! repair/retry loop and the fail-open moderation check.

use indoc::{formatdoc, indoc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::errors::{Result, TutorError};
use crate::providers::base::Provider;
use crate::providers::configs::GEMINI_DEFAULT_MODEL;

const RAW_JSON_INSTRUCTION: &str = indoc! {"
    IMPORTANT: You MUST respond with a valid JSON object WITHOUT ANY markdown
    formatting or code blocks. DO NOT include ``` or any other text before or
    after the JSON object. The response should be a plain JSON object that can
    be directly parsed.
"};

lazy_static! {
    static ref FENCED_JSON: Regex =
        Regex::new(r"(?s)```(?:json|javascript)?\s*(.*?)\s*```").unwrap();
    static ref STRAY_FENCE: Regex = Regex::new(r"```(?:json|javascript)?\s*").unwrap();
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([\]}])").unwrap();
    static ref EMBEDDED_OBJECT: Regex = Regex::new(r"(?s)(\{.*\})").unwrap();
    static ref EMBEDDED_ARRAY: Regex = Regex::new(r"(?s)(\[.*\])").unwrap();
}

pub struct LlmGateway {
    provider: Box<dyn Provider>,
}

impl LlmGateway {
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Generate free text with the given model, or the default model when
    /// none is named. The gateway never retries; callers decide policy.
    pub async fn generate_text(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let model = model.unwrap_or(GEMINI_DEFAULT_MODEL);
        self.provider.generate(model, prompt).await
    }

    /// Generate output shaped like `T`. The raw response is stripped of
    /// code fences, surrounding prose, and trailing commas before parsing.
    /// On a parse failure with retries left, the same prompt is reissued
    /// with an explicit raw-JSON instruction appended; once retries are
    /// exhausted the last raw text is surfaced for diagnostics.
    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        model: Option<&str>,
        retries: u32,
    ) -> Result<T> {
        let mut prompt = prompt.to_string();
        let mut retries = retries;

        loop {
            let raw = self.generate_text(&prompt, model).await?;
            let cleaned = clean_json_response(&raw);

            match serde_json::from_str::<T>(&cleaned) {
                Ok(value) => return Ok(value),
                Err(e) if retries > 0 => {
                    warn!(error = %e, "structured output parse failed, retrying with raw-JSON instruction");
                    prompt.push_str("\n\n");
                    prompt.push_str(RAW_JSON_INSTRUCTION);
                    retries -= 1;
                }
                Err(_) => return Err(TutorError::StructuredParse { raw }),
            }
        }
    }

    /// Best-effort safety classification. Any internal failure defaults to
    /// "safe" rather than blocking the turn.
    pub async fn moderate(&self, text: &str) -> bool {
        let prompt = formatdoc! {"
            Please analyze the following text and determine if it contains any
            harmful, offensive, illegal, or inappropriate content. Return ONLY
            \"true\" if it contains such content, or \"false\" if it is safe and
            appropriate.

            Text: {text}
        "};

        match self.generate_text(&prompt, None).await {
            Ok(verdict) => verdict.trim().eq_ignore_ascii_case("true"),
            Err(e) => {
                warn!(error = %e, "moderation check failed, defaulting to safe");
                false
            }
        }
    }
}

/// Strip markdown fences and other non-JSON artifacts from a model response.
fn clean_json_response(text: &str) -> String {
    let mut text = if let Some(caps) = FENCED_JSON.captures(text) {
        caps[1].trim().to_string()
    } else {
        STRAY_FENCE.replace_all(text, "").trim().to_string()
    };

    text = TRAILING_COMMA.replace_all(&text, "$1").to_string();

    // The model sometimes wraps the object in prose; pull out the first
    // JSON-looking value if the response does not already start with one.
    if !text.starts_with('{') && !text.starts_with('[') {
        if let Some(caps) = EMBEDDED_OBJECT.captures(&text) {
            text = caps[1].to_string();
        } else if let Some(caps) = EMBEDDED_ARRAY.captures(&text) {
            text = caps[1].to_string();
        }
    }

    text
}
