use crate::errors::{CourseError, Result};
use crate::extract::parse_json;
use crate::log::Transcript;
use crate::prompt::PromptType;
use crate::retry::with_retry;
use crate::wire::{CourseMetadata, GenerationOptions, Intent, Message};

use super::Llm;

/// Catalogue metadata for the classified topic. The intent object is sent
/// as JSON in the user turn; a blank title counts as a parse failure and is
/// retried like one.
pub async fn generate_metadata(llm: &Llm, intent: &Intent, transcript: &Transcript) -> Result<CourseMetadata> {
    let messages = [
        Message::system(llm.prompt(PromptType::Metadata, None)?),
        Message::user(serde_json::to_string(intent)?),
    ];
    let opts = GenerationOptions { json: true, ..GenerationOptions::default() };
    let (messages, opts) = (&messages, &opts);
    with_retry(llm.retry, "metadata", move || async move {
        let raw = llm.complete("metadata", messages, opts, transcript).await?;
        let meta = parse_json::<CourseMetadata>(&raw)?;
        if meta.title.trim().is_empty() {
            return Err(CourseError::Parse("metadata has an empty title".into()));
        }
        Ok(meta)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{llm, ScriptedProvider};
    use crate::wire::IntentCategory;

    fn intent() -> Intent {
        Intent {
            intent_category: IntentCategory::ToolFramework,
            primary_topic: "Docker".into(),
            reasoning: String::new(),
        }
    }

    #[tokio::test]
    async fn sends_intent_json_and_normalises_fields() {
        let p = ScriptedProvider::new([
            r#"{"title": "Docker Essentials", "description": "Containers.", "targetAudience": "developers", "estimatedDuration": 5, "tags": ["docker"]}"#,
        ]);
        let meta = generate_metadata(&llm(p.clone()), &intent(), &Transcript::disabled()).await.unwrap();
        assert_eq!(meta.target_audience, vec!["developers"]);
        assert_eq!(meta.estimated_duration, "5 hours");
        assert!(meta.prerequisites.is_empty());

        let sent: serde_json::Value = serde_json::from_str(&p.last_messages().unwrap()[1].joined()).unwrap();
        assert_eq!(sent["intentCategory"], "Tool/Framework");
        assert_eq!(sent["primaryTopic"], "Docker");
    }

    #[tokio::test]
    async fn blank_title_is_retried() {
        let p = ScriptedProvider::new([
            r#"{"title": " ", "description": "x"}"#,
            r#"{"title": "Docker Essentials", "description": "x"}"#,
        ]);
        let meta = generate_metadata(&llm(p.clone()), &intent(), &Transcript::disabled()).await.unwrap();
        assert_eq!(meta.title, "Docker Essentials");
        assert_eq!(p.calls(), 2);
    }
}
