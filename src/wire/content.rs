use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One renderable block of lesson content. The shape is checked once when the
/// model output is parsed; stored content is always a list of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Heading {
        text: String,
    },
    Paragraph {
        text: String,
    },
    Code {
        #[serde(default)]
        language: String,
        text: String,
    },
    List {
        items: Vec<String>,
        #[serde(default)]
        ordered: bool,
    },
    Video {
        query: String,
    },
    Mcq {
        question: String,
        options: Vec<String>,
        answer: usize,
        #[serde(default)]
        explanation: String,
    },
}

impl ContentBlock {
    pub fn video_query(&self) -> Option<&str> {
        match self {
            ContentBlock::Video { query } if !query.trim().is_empty() => Some(query.as_str()),
            _ => None,
        }
    }
}

/// Lesson-generation response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    pub content: Vec<ContentBlock>,
}

impl LessonPayload {
    /// Reject structurally valid but unusable output: no blocks, or a quiz
    /// whose answer index points past its options.
    pub fn check(&self) -> Result<(), String> {
        if self.content.is_empty() {
            return Err("lesson content is empty".into());
        }
        for block in &self.content {
            if let ContentBlock::Mcq { question, options, answer, .. } = block {
                if *answer >= options.len() {
                    return Err(format!("mcq answer {answer} out of range for \"{question}\""));
                }
            }
        }
        Ok(())
    }
}

/// Emptiness across every shape a stored `content` value can take.
pub fn is_empty_content(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_block_kinds() {
        let raw = json!({
            "title": "Intro",
            "content": [
                {"type": "heading", "text": "Trees"},
                {"type": "paragraph", "text": "A tree is..."},
                {"type": "code", "language": "python", "text": "class Node: pass"},
                {"type": "list", "items": ["a", "b"]},
                {"type": "video", "query": "binary search tree insertion"},
                {"type": "mcq", "question": "Q?", "options": ["x", "y"], "answer": 1, "explanation": "y"}
            ]
        });
        let payload: LessonPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(payload.content.len(), 6);
        assert!(payload.check().is_ok());
        assert_eq!(payload.content[4].video_query(), Some("binary search tree insertion"));
    }

    #[test]
    fn unknown_block_type_fails_parse() {
        let raw = json!({"content": [{"type": "table", "rows": []}]});
        assert!(serde_json::from_value::<LessonPayload>(raw).is_err());
    }

    #[test]
    fn mcq_answer_must_index_an_option() {
        let payload = LessonPayload {
            title: None,
            objectives: vec![],
            content: vec![ContentBlock::Mcq {
                question: "Q".into(),
                options: vec!["a".into()],
                answer: 3,
                explanation: String::new(),
            }],
        };
        assert!(payload.check().is_err());
    }

    #[test]
    fn emptiness_predicate() {
        assert!(is_empty_content(&Value::Null));
        assert!(is_empty_content(&json!("  ")));
        assert!(is_empty_content(&json!([])));
        assert!(is_empty_content(&json!({})));
        assert!(!is_empty_content(&json!([{"type": "heading", "text": "x"}])));
        assert!(!is_empty_content(&json!("# markdown")));
    }
}
