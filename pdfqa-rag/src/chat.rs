//! Answer generator for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Groq serves this API, so [`ChatCompletionGenerator::groq`] is the default
//! language model for the service.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;
use crate::openai::{ErrorResponse, OPENAI_API_BASE};

/// Groq's OpenAI-compatible API base URL.
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// The default Groq model.
pub const DEFAULT_GROQ_MODEL: &str = "llama3-8b-8192";

/// An [`AnswerGenerator`] that sends the prompt as a single user message.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::chat::ChatCompletionGenerator;
///
/// let generator = ChatCompletionGenerator::groq(std::env::var("GROQ_API_KEY")?)?;
/// let answer = generator.generate(&prompt).await?;
/// ```
pub struct ChatCompletionGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

impl ChatCompletionGenerator {
    /// Create a generator for `model` served at `base_url`.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("language model API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: None,
        })
    }

    /// Create a generator for Groq using [`DEFAULT_GROQ_MODEL`].
    pub fn groq(api_key: impl Into<String>) -> Result<Self> {
        Self::new(api_key, GROQ_API_BASE, DEFAULT_GROQ_MODEL)
    }

    /// Create a generator for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::new(api_key, OPENAI_API_BASE, model)
    }

    /// Override the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn generation_error(&self, message: String) -> RagError {
        RagError::Generation { generator: self.model.clone(), message }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AnswerGenerator for ChatCompletionGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "requesting chat completion");

        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "chat request failed");
                self.generation_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(model = %self.model, %status, "chat API error");
            return Err(self.generation_error(format!("API returned {status}: {detail}")));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse chat response");
            self.generation_error(format!("failed to parse response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| self.generation_error("response contained no answer".into()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groq_defaults() {
        let generator = ChatCompletionGenerator::groq("gsk_test").unwrap();
        assert_eq!(generator.name(), DEFAULT_GROQ_MODEL);
        assert_eq!(generator.endpoint(), "https://api.groq.com/openai/v1/chat/completions");
    }

    #[test]
    fn empty_key_is_a_config_error() {
        assert!(matches!(ChatCompletionGenerator::groq(""), Err(RagError::Config(_))));
    }

    #[test]
    fn request_serializes_single_user_message() {
        let body = ChatRequest {
            model: "m",
            messages: [ChatMessage { role: "user", content: "hi" }],
            temperature: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert!(json.get("temperature").is_none());
    }
}
