use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::{require_key, transport_error, Provider};
use crate::cli::ProviderKind;
use crate::errors::{CourseError, Result};
use crate::wire::{Completion, GenerationOptions, Message, Role};

/// Any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIProvider {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
    timeout: Duration,
}

impl OpenAIProvider {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Self {
        Self { api_key, base_url, model, client: Client::new(), timeout }
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Serialize, Debug)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat APIs take one string per message, so parts are joined with newlines.
pub(crate) fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| ChatMessage {
            role: match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: m.joined(),
        })
        .collect()
}

pub(crate) fn json_format(opts: &GenerationOptions) -> Option<serde_json::Value> {
    opts.json.then(|| json!({ "type": "json_object" }))
}

pub(crate) fn parse_chat_response(provider: ProviderKind, text: &str) -> Result<Completion> {
    let parsed: ChatResponse = serde_json::from_str(text).map_err(|e| {
        CourseError::provider(provider.as_str(), None, format!("unreadable response body: {e}"))
    })?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    Ok(Completion::new(content))
}

/// POST a chat request and hand back the first choice's text.
pub(crate) async fn send_chat(
    provider: ProviderKind,
    client: &Client,
    url: &str,
    api_key: &str,
    timeout: Duration,
    body: &ChatRequest<'_>,
) -> Result<Completion> {
    tracing::debug!(provider = %provider, url, "POST chat completion");
    let resp = client
        .post(url)
        .bearer_auth(api_key)
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let status = resp.status();
    let text = resp.text().await.map_err(|e| transport_error(provider, e))?;
    tracing::debug!(provider = %provider, %status, body = %text, "raw chat response");

    if !status.is_success() {
        return Err(CourseError::provider(provider.as_str(), Some(status.as_u16()), text));
    }
    parse_chat_response(provider, &text)
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    async fn generate_content(
        &self,
        messages: &[Message],
        opts: &GenerationOptions,
    ) -> Result<Completion> {
        let key = require_key(&self.api_key, "AI_API_KEY")?;
        let body = ChatRequest {
            model: &self.model,
            messages: to_chat_messages(messages),
            temperature: opts.temperature,
            top_p: opts.top_p,
            max_tokens: opts.max_tokens,
            max_completion_tokens: None,
            response_format: json_format(opts),
        };
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        send_chat(self.kind(), &self.client, &url, key, self.timeout, &body).await
    }
}
