use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::GatewayError;
use crate::project_config::GatewayConfig;
use crate::prompts::RenderedPrompt;

// LLM Provider enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Any endpoint speaking the OpenAI chat completions format (OpenRouter, local gateways)
    #[default]
    OpenAiCompatible,
    Anthropic,
}

impl LlmProvider {
    fn label(&self) -> &'static str {
        match self {
            LlmProvider::OpenAiCompatible => "OpenAI-compatible gateway",
            LlmProvider::Anthropic => "Anthropic",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::OpenAiCompatible => OPENROUTER_API_URL,
            LlmProvider::Anthropic => ANTHROPIC_API_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAiCompatible => DEFAULT_OPENROUTER_MODEL,
            LlmProvider::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        }
    }
}

// OpenRouter API configuration
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.5-flash";

// Anthropic API configuration
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Sends a rendered prompt to a hosted model and returns its raw text
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, GatewayError>;
}

// Struct to hold the chat completions response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

// Struct to hold the Anthropic response
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

fn first_choice_content(response: ChatCompletionResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
}

fn first_text_block(response: AnthropicResponse) -> Option<String> {
    response
        .content
        .into_iter()
        .find(|block| block.content_type == "text")
        .and_then(|block| block.text)
}

/// reqwest-backed gateway for the configured provider
pub struct HttpGateway {
    provider: LlmProvider,
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let api_key = env::var(&config.api_key_env)
            .map_err(|_| GatewayError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GatewayConfig, api_key: impl Into<String>) -> Result<Self, GatewayError> {
        let provider = config.provider;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport {
                provider: provider.label().to_string(),
                message: e.to_string(),
            })?;

        let gateway = Self {
            provider,
            client,
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| provider.default_endpoint().to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            api_key: api_key.into(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };
        info!(
            "LLM gateway ready: {} at {} using {}",
            provider.label(),
            gateway.endpoint,
            gateway.model
        );
        Ok(gateway)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn openai_payload(&self, prompt: &RenderedPrompt) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature
        })
    }

    fn anthropic_payload(&self, prompt: &RenderedPrompt) -> Value {
        // Anthropic takes the system prompt as a top-level field
        json!({
            "model": self.model,
            "system": prompt.system,
            "messages": [
                { "role": "user", "content": prompt.user }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature
        })
    }

    async fn send_openai_compatible(&self, prompt: &RenderedPrompt) -> Result<String, GatewayError> {
        let request = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.openai_payload(prompt));

        let body: ChatCompletionResponse = self.send(request).await?;
        first_choice_content(body).ok_or_else(|| GatewayError::EmptyResponse(self.provider.label().to_string()))
    }

    async fn send_anthropic(&self, prompt: &RenderedPrompt) -> Result<String, GatewayError> {
        let request = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&self.anthropic_payload(prompt));

        let body: AnthropicResponse = self.send(request).await?;
        first_text_block(body).ok_or_else(|| GatewayError::EmptyResponse(self.provider.label().to_string()))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let provider = self.provider.label().to_string();

        let response = request.send().await.map_err(|e| GatewayError::Transport {
            provider: provider.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                provider,
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| GatewayError::Decode {
            provider,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl LlmGateway for HttpGateway {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, GatewayError> {
        debug!(
            "Sending template {} to {} ({} chars)",
            prompt.template_id,
            self.provider.label(),
            prompt.system.len() + prompt.user.len()
        );
        match self.provider {
            LlmProvider::OpenAiCompatible => self.send_openai_compatible(prompt).await,
            LlmProvider::Anthropic => self.send_anthropic(prompt).await,
        }
    }
}
