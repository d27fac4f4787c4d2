use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{AISettings, ChatMessage};

/// Anything that turns a conversation into the next assistant message.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

// ─── OpenAI-compatible chat completions types ───

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatRecvMessage,
}

#[derive(Deserialize)]
struct ChatRecvMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// Chat completions client for the NVIDIA integrate API or any endpoint
/// speaking the same protocol. Requests carry no client-side timeout.
pub struct NvidiaClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl NvidiaClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    pub fn from_settings(ai: &AISettings, api_key: &str) -> Self {
        let mut client = Self::new(&ai.base_url, api_key, &ai.model);
        client.temperature = ai.temperature;
        client.max_tokens = ai.max_tokens;
        client
    }
}

#[async_trait]
impl LanguageModel for NvidiaClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!("API returned error {}: {}", status, body)));
        }

        let body_text = response.text().await?;
        let chat_response: ChatResponse = serde_json::from_str(&body_text)
            .map_err(|e| AppError::Llm(format!("Failed to parse API response: {}", e)))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("Empty AI response".to_string()))?;

        // Reasoning models sometimes leave `content` empty.
        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .or(choice.message.reasoning_content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(AppError::Llm("Empty AI response".to_string()));
        }
        Ok(content.trim().to_string())
    }
}
