//! Text-generation API client
//!
//! Speaks the OpenAI chat completions format:
//!
//! ```text
//! POST {base_url}/chat/completions
//! {"model":"gpt-4o-mini","messages":[{"role":"user","content":"..."}],"temperature":0.1,"max_tokens":300}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use triage_core::{Error, Result};

use crate::config::ModelConfig;

/// One generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask for a JSON object response
    pub json_output: bool,
}

/// External text-generation API
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider tag (e.g. "openai")
    fn provider(&self) -> &str;

    /// Whether credentials are configured
    fn has_credentials(&self) -> bool;

    /// Generate a completion for the prompt
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Client for OpenAI-compatible chat completions endpoints
pub struct OpenAiCompatibleGenerator {
    client: reqwest::Client,
    provider: String,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleGenerator {
    /// Create a client from model settings
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            provider: config.provider.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
        })
    }

    fn request_body<'a>(&'a self, request: &'a GenerationRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_output
                .then_some(ResponseFormat { kind: "json_object" }),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::config(format!("no API key configured for {}", self.provider)))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| Error::transport(format!("{} request failed: {}", self.provider, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("{} response read failed: {}", self.provider, e)))?;

        if !status.is_success() {
            return Err(Error::transport(format!(
                "{} returned {}: {}",
                self.provider,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        debug!("{} returned {} bytes", self.provider, body.len());
        extract_content(&body)
    }
}

/// Pull the first choice's message content out of a completions response
pub fn extract_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::unparsable(format!("invalid completions response: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| Error::unparsable("completions response has no content"))
}

// =============================================================================
// Chat completions wire structures
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
