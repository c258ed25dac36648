use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::openai::{json_format, send_chat, to_chat_messages, ChatRequest};
use super::{require_key, Provider};
use crate::cli::ProviderKind;
use crate::errors::Result;
use crate::wire::{Completion, GenerationOptions, Message};

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

pub struct GroqProvider {
    api_key: String,
    model: String,
    client: Client,
    timeout: Duration,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self { api_key, model, client: Client::new(), timeout }
    }

    fn request<'a>(&'a self, messages: &[Message], opts: &GenerationOptions) -> ChatRequest<'a> {
        // Groq names the output cap `max_completion_tokens`.
        ChatRequest {
            model: &self.model,
            messages: to_chat_messages(messages),
            temperature: opts.temperature,
            top_p: opts.top_p,
            max_tokens: None,
            max_completion_tokens: opts.max_tokens,
            response_format: json_format(opts),
        }
    }
}

#[async_trait]
impl Provider for GroqProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Groq
    }

    async fn generate_content(
        &self,
        messages: &[Message],
        opts: &GenerationOptions,
    ) -> Result<Completion> {
        let key = require_key(&self.api_key, "GROQ_API_KEY")?;
        let body = self.request(messages, opts);
        send_chat(self.kind(), &self.client, GROQ_CHAT_URL, key, self.timeout, &body).await
    }
}
