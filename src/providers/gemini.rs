//! Google Gemini over the Generative Language REST API.
//!
//! Gemini has no system role in this call shape, so the JSON-only instruction
//! is prepended to the user prompt instead. JSON mode is also requested via
//! `responseMimeType`.

use super::{build_http_client, send_json, GenerationSettings};
use crate::error::LlmError;
use crate::pipeline::llm::LlmProvider;
use crate::prompts::JSON_ONLY_PREAMBLE;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

const NAME: &str = "gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

/// Gemini `generateContent` client.
pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    settings: GenerationSettings,
}

impl GeminiProvider {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        settings: GenerationSettings,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client(NAME, settings.timeout)?,
            endpoint: format!(
                "{}/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            api_key,
            model,
            settings,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = request_body(prompt, &self.settings);
        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending to Gemini");

        let request = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let raw = send_json(NAME, self.settings.timeout, request).await?;
        response_text(&raw)
    }
}

impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>> {
        Box::pin(self.generate(prompt))
    }
}

fn request_body(prompt: &str, settings: &GenerationSettings) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            role: Some("user".into()),
            parts: vec![Part {
                text: format!("{JSON_ONLY_PREAMBLE}\n\n{prompt}"),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_output_tokens: settings.max_tokens,
            response_mime_type: "application/json",
        },
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(raw: &str) -> Result<String, LlmError> {
    let parsed: GenerateResponse =
        serde_json::from_str(raw).map_err(|e| LlmError::InvalidJson {
            provider: NAME.to_string(),
            detail: format!("unexpected response envelope: {e}"),
            raw: raw.to_string(),
        })?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse {
            provider: NAME.to_string(),
        });
    }
    Ok(text)
}
