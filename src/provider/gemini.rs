use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{require_key, transport_error, Provider};
use crate::cli::ProviderKind;
use crate::errors::{CourseError, Result};
use crate::wire::{Completion, GenerationOptions, Message, Role};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    api_key: String,
    model: String,
    client: Client,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self { api_key, model, client: Client::new(), timeout }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize, Debug)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// System messages move into `systemInstruction`; assistant turns are `model`.
/// Gemini keeps parts separate, so nothing is joined here.
fn build_request<'a>(messages: &'a [Message], opts: &GenerationOptions) -> GenerateRequest<'a> {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();
    for m in messages {
        let parts = m.parts.iter().map(|t| Part { text: t.as_str() });
        match m.role {
            Role::System => system_parts.extend(parts),
            Role::User => contents.push(Content { role: Some("user"), parts: parts.collect() }),
            Role::Assistant => contents.push(Content { role: Some("model"), parts: parts.collect() }),
        }
    }
    GenerateRequest {
        contents,
        system_instruction: (!system_parts.is_empty())
            .then(|| Content { role: None, parts: system_parts }),
        generation_config: GenerationConfig {
            temperature: opts.temperature,
            top_p: opts.top_p,
            max_output_tokens: opts.max_tokens,
            response_mime_type: opts.json.then_some("application/json"),
        },
    }
}

fn parse_response(text: &str) -> Result<Completion> {
    let parsed: GenerateResponse = serde_json::from_str(text)
        .map_err(|e| CourseError::provider("gemini", None, format!("unreadable response body: {e}")))?;
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| CourseError::provider("gemini", None, "response has no candidates"))?;
    let out = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default();
    Ok(Completion::new(out))
}

#[async_trait]
impl Provider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate_content(
        &self,
        messages: &[Message],
        opts: &GenerationOptions,
    ) -> Result<Completion> {
        let key = require_key(&self.api_key, "GEMINI_API_KEY")?;
        let url = format!("{}/models/{}:generateContent", GEMINI_API_BASE, self.model);
        let body = build_request(messages, opts);

        tracing::debug!(provider = "gemini", %url, "POST generateContent");
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.kind(), e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| transport_error(self.kind(), e))?;
        tracing::debug!(provider = "gemini", %status, body = %text, "raw generateContent response");

        if !status.is_success() {
            return Err(CourseError::provider("gemini", Some(status.as_u16()), text));
        }
        parse_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_instruction() {
        let msgs = vec![
            Message::system("validate this"),
            Message::user("I want to learn binary search trees"),
            Message { role: Role::Assistant, parts: vec!["{}".into()] },
        ];
        let req = build_request(&msgs, &GenerationOptions::deterministic());
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["systemInstruction"]["parts"][0]["text"], "validate this");
        assert!(v["systemInstruction"].get("role").is_none());
        assert_eq!(v["contents"].as_array().unwrap().len(), 2);
        assert_eq!(v["contents"][0]["role"], "user");
        assert_eq!(v["contents"][1]["role"], "model");
        assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(v["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn concatenates_candidate_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#;
        assert_eq!(parse_response(body).unwrap().text(), "{\"a\":1}");
    }

    #[test]
    fn no_candidates_is_a_provider_error() {
        let err = parse_response(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, CourseError::Provider { .. }));
    }
}
