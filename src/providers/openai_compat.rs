//! OpenAI-compatible chat completions (Groq, OpenAI).

use super::{build_http_client, send_json, GenerationSettings};
use crate::error::LlmError;
use crate::pipeline::llm::LlmProvider;
use crate::prompts::ANALYST_SYSTEM_PROMPT;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
    top_p: f32,
    max_completion_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    settings: GenerationSettings,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: &str,
        base_url: &str,
        api_key: String,
        model: String,
        settings: GenerationSettings,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            name: name.to_string(),
            client: build_http_client(name, settings.timeout)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model,
            settings,
        })
    }

    async fn chat(&self, prompt: &str) -> Result<String, LlmError> {
        let body = request_body(&self.model, prompt, &self.settings);
        debug!(provider = %self.name, model = %self.model, prompt_chars = prompt.len(), "Sending chat completion");

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body);
        let raw = send_json(&self.name, self.settings.timeout, request).await?;
        response_text(&self.name, &raw)
    }
}

impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>> {
        Box::pin(self.chat(prompt))
    }
}

fn request_body<'a>(model: &'a str, prompt: &'a str, settings: &GenerationSettings) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: ANALYST_SYSTEM_PROMPT,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
        response_format: ResponseFormat {
            kind: "json_object",
        },
        temperature: settings.temperature,
        top_p: settings.top_p,
        max_completion_tokens: settings.max_tokens,
        stream: false,
    }
}

fn response_text(provider: &str, raw: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse = serde_json::from_str(raw).map_err(|e| LlmError::InvalidJson {
        provider: provider.to_string(),
        detail: format!("unexpected response envelope: {e}"),
        raw: raw.to_string(),
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| LlmError::EmptyResponse {
            provider: provider.to_string(),
        })
}
