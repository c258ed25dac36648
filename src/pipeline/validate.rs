use crate::errors::{CourseError, Result};
use crate::extract::parse_json;
use crate::log::Transcript;
use crate::prompt::PromptType;
use crate::wire::{GenerationOptions, Message, ValidationVerdict};

use super::Llm;

const UNREADABLE_VERDICT: &str = "The request could not be validated; please rephrase it.";
const NO_REASON: &str = "The request is not a valid learning topic.";

/// Ask the model whether `query` is a safe, specific learning request.
///
/// Runs once with deterministic sampling. Output that does not parse as a
/// verdict counts as a rejection; a provider failure is returned as is.
pub async fn validate_query(llm: &Llm, query: &str, transcript: &Transcript) -> Result<ValidationVerdict> {
    let messages = [Message::system(llm.prompt(PromptType::Security, None)?), Message::user(query)];
    let raw = llm
        .complete("validate", &messages, &GenerationOptions::deterministic(), transcript)
        .await?;
    match parse_json::<ValidationVerdict>(&raw) {
        Ok(v) => Ok(v),
        Err(e) => {
            tracing::warn!(error = %e, "unreadable validation verdict, rejecting");
            Ok(ValidationVerdict { is_valid: false, reasons: vec![UNREADABLE_VERDICT.into()] })
        }
    }
}

/// Turn a negative verdict into `Rejected`, keeping the model's reasons verbatim.
pub fn ensure_valid(verdict: ValidationVerdict) -> Result<()> {
    if verdict.is_valid {
        return Ok(());
    }
    let mut reasons: Vec<String> =
        verdict.reasons.into_iter().filter(|r| !r.trim().is_empty()).collect();
    if reasons.is_empty() {
        reasons.push(NO_REASON.into());
    }
    tracing::info!(?reasons, "query rejected");
    Err(CourseError::Rejected { reasons })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{llm, ScriptedProvider};

    #[tokio::test]
    async fn accepts_fenced_positive_verdict() {
        let p = ScriptedProvider::new(["```json\n{\"isValid\": true, \"reasons\": []}\n```"]);
        let v = validate_query(&llm(p.clone()), "learn graph theory", &Transcript::disabled()).await.unwrap();
        assert!(v.is_valid);
        assert!(ensure_valid(v).is_ok());

        let sent = p.last_messages().unwrap();
        assert_eq!(sent[1].joined(), "learn graph theory");
        assert_eq!(p.last_options().unwrap().temperature, 0.0);
    }

    #[tokio::test]
    async fn fails_closed_on_garbage() {
        let p = ScriptedProvider::new(["Sure, that looks fine to me!"]);
        let v = validate_query(&llm(p), "learn graph theory", &Transcript::disabled()).await.unwrap();
        assert!(!v.is_valid);
        assert!(matches!(ensure_valid(v), Err(CourseError::Rejected { .. })));
    }

    #[tokio::test]
    async fn verdict_missing_a_field_is_a_rejection() {
        let p = ScriptedProvider::new(["{\"isValid\": true}"]);
        let v = validate_query(&llm(p), "learn graph theory", &Transcript::disabled()).await.unwrap();
        assert!(!v.is_valid);
    }

    #[tokio::test]
    async fn provider_error_propagates_without_retry() {
        let p = ScriptedProvider::new(Vec::<String>::new()).then_error(CourseError::provider("groq", Some(500), "boom"));
        let err = validate_query(&llm(p.clone()), "learn graph theory", &Transcript::disabled()).await.unwrap_err();
        assert!(matches!(err, CourseError::Provider { .. }));
        assert_eq!(p.calls(), 1);
    }

    #[test]
    fn rejection_without_reasons_gets_a_generic_one() {
        let err = ensure_valid(ValidationVerdict { is_valid: false, reasons: vec![" ".into()] }).unwrap_err();
        match err {
            CourseError::Rejected { reasons } => assert_eq!(reasons, vec![NO_REASON.to_string()]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
