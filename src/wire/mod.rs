use serde::{Deserialize, Deserializer, Serialize};

pub mod content;

pub use content::{ContentBlock, LessonPayload};

/// ========================================
/// Provider-neutral chat messages
/// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message. Multi-part messages are joined by adapters whose
/// vendor wants a single string per role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, parts: vec![text.into()] }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, parts: vec![text.into()] }
    }

    pub fn joined(&self) -> String {
        self.parts.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Ask the vendor for a JSON-only completion where supported.
    pub json: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.7, top_p: None, max_tokens: Some(6000), json: false }
    }
}

impl GenerationOptions {
    /// Settings for gatekeeping calls: lowest temperature, narrow sampling.
    pub fn deterministic() -> Self {
        Self { temperature: 0.0, top_p: Some(0.1), max_tokens: Some(512), json: true }
    }
}

/// Raw completion; parsing is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    raw: String,
}

impl Completion {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn text(&self) -> &str {
        &self.raw
    }
}

/// ========================================
/// Stage payloads
/// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentCategory {
    #[serde(rename = "Skill Learning")]
    SkillLearning,
    #[serde(rename = "Concept Mastery")]
    ConceptMastery,
    #[serde(rename = "Tool/Framework", alias = "Tool-Framework")]
    ToolFramework,
    #[serde(rename = "Exam/Test Prep", alias = "Exam-Prep", alias = "Exam Prep")]
    ExamPrep,
}

impl IntentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::SkillLearning => "Skill Learning",
            IntentCategory::ConceptMastery => "Concept Mastery",
            IntentCategory::ToolFramework => "Tool/Framework",
            IntentCategory::ExamPrep => "Exam/Test Prep",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub intent_category: IntentCategory,
    pub primary_topic: String,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMetadata {
    pub title: String,
    pub description: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub target_audience: Vec<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub estimated_duration: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub prerequisites: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
}

/// Full module/lesson tree returned by structure generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCourse {
    pub modules: Vec<GeneratedModule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedModule {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub lessons: Vec<GeneratedLesson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedLesson {
    pub title: String,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_minutes: Option<i64>,
}

// Models drift between `"a"` and `["a"]` for list fields.
fn one_or_many<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<OneOrMany>::deserialize(d)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) if s.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

fn text_or_number<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(f64),
    }
    Ok(match Option::<TextOrNumber>::deserialize(d)? {
        None => String::new(),
        Some(TextOrNumber::Text(s)) => s,
        Some(TextOrNumber::Number(n)) => format!("{n} hours"),
    })
}
