use crate::errors::Result;
use crate::extract::parse_json;
use crate::log::Transcript;
use crate::prompt::PromptType;
use crate::retry::with_retry;
use crate::wire::{GenerationOptions, Intent, Message};

use super::Llm;

/// Classify a validated query. Transport and parse failures are retried
/// under the shared policy.
pub async fn classify_intent(llm: &Llm, query: &str, transcript: &Transcript) -> Result<Intent> {
    let messages = [Message::system(llm.prompt(PromptType::Intent, None)?), Message::user(query)];
    let opts = GenerationOptions { json: true, ..GenerationOptions::default() };
    let (messages, opts) = (&messages, &opts);
    with_retry(llm.retry, "intent", move || async move {
        let raw = llm.complete("intent", messages, opts, transcript).await?;
        parse_json::<Intent>(&raw)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CourseError;
    use crate::testing::{llm, ScriptedProvider};
    use crate::wire::IntentCategory;

    #[tokio::test]
    async fn retries_until_output_parses() {
        let p = ScriptedProvider::new([
            "I think this is concept mastery",
            r#"{"intentCategory": "Exam Prep", "primaryTopic": "AWS SAA"}"#,
        ]);
        let intent = classify_intent(&llm(p.clone()), "pass the AWS SAA exam", &Transcript::disabled())
            .await
            .unwrap();
        assert_eq!(intent.intent_category, IntentCategory::ExamPrep);
        assert_eq!(intent.primary_topic, "AWS SAA");
        assert_eq!(p.calls(), 2);
    }

    #[tokio::test]
    async fn unknown_category_exhausts_retries() {
        let bad = r#"{"intentCategory": "Hobby", "primaryTopic": "knitting"}"#;
        let p = ScriptedProvider::new([bad, bad, bad]);
        let err = classify_intent(&llm(p.clone()), "learn knitting", &Transcript::disabled()).await.unwrap_err();
        assert!(matches!(err, CourseError::Parse(_)));
        assert_eq!(p.calls(), 3);
    }
}
