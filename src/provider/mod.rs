use async_trait::async_trait;
use std::sync::Arc;

use crate::cli::ProviderKind;
use crate::config::Config;
use crate::errors::{CourseError, Result};
use crate::wire::{Completion, GenerationOptions, Message};

pub mod gemini;
pub mod groq;
pub mod openai;

/// Uniform chat-completion capability over every LLM vendor. Adapters never
/// retry; vendor failures come back as `CourseError::Provider`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Selects the prompt set in the registry.
    fn kind(&self) -> ProviderKind;

    async fn generate_content(
        &self,
        messages: &[Message],
        opts: &GenerationOptions,
    ) -> Result<Completion>;
}

pub type DynProvider = Arc<dyn Provider>;

pub fn make_provider(cfg: &Config) -> DynProvider {
    let kind = cfg.provider;
    let model = cfg.model_for(kind);
    let timeout = cfg.http_timeout();
    match kind {
        ProviderKind::Gemini => Arc::new(gemini::GeminiProvider::new(
            env_key("GEMINI_API_KEY"),
            model,
            timeout,
        )),
        ProviderKind::Groq => Arc::new(groq::GroqProvider::new(env_key("GROQ_API_KEY"), model, timeout)),
        ProviderKind::OpenAI => Arc::new(openai::OpenAIProvider::new(
            env_key("AI_API_KEY"),
            cfg.openai_base_url.clone(),
            model,
            timeout,
        )),
    }
}

fn env_key(var: &str) -> String {
    std::env::var(var).unwrap_or_default()
}

pub(crate) fn require_key<'a>(key: &'a str, var: &str) -> Result<&'a str> {
    if key.trim().is_empty() {
        return Err(CourseError::Configuration(format!("{var} env var is not set")));
    }
    Ok(key)
}

pub(crate) fn transport_error(provider: ProviderKind, e: reqwest::Error) -> CourseError {
    CourseError::provider(provider.as_str(), e.status().map(|s| s.as_u16()), e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_switches_on_configured_kind() {
        for kind in [ProviderKind::Gemini, ProviderKind::Groq, ProviderKind::OpenAI] {
            let cfg = Config { provider: kind, ..Config::default() };
            assert_eq!(make_provider(&cfg).kind(), kind);
        }
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let err = require_key("  ", "GROQ_API_KEY").unwrap_err();
        assert!(matches!(err, CourseError::Configuration(_)));
    }
}
