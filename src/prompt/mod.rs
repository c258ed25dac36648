use std::collections::HashMap;
use std::fmt;

use crate::cli::ProviderKind;
use crate::errors::{CourseError, Result};
use crate::wire::CourseMetadata;

pub mod gemini;
pub mod groq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptType {
    Security,
    Intent,
    Metadata,
    Course,
    Lesson,
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PromptType::Security => "security",
            PromptType::Intent => "intent",
            PromptType::Metadata => "metadata",
            PromptType::Course => "course",
            PromptType::Lesson => "lesson",
        };
        f.write_str(s)
    }
}

/// Input for the structure prompt.
#[derive(Debug, Clone)]
pub struct CoursePrompt {
    pub user_query: String,
    pub intent_category: String,
    pub metadata: CourseMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingLesson {
    pub title: String,
    pub description: String,
}

/// Input for the per-lesson content prompt.
#[derive(Debug, Clone)]
pub struct LessonPrompt {
    pub course_title: String,
    pub module_title: String,
    pub lesson_title: String,
    pub lesson_description: String,
    pub upcoming: Vec<UpcomingLesson>,
}

#[derive(Debug, Clone)]
pub enum PromptPayload {
    Course(CoursePrompt),
    Lesson(LessonPrompt),
}

/// A static instruction or a pure function of a payload. Render functions
/// return `None` when handed the wrong payload kind.
#[derive(Clone, Copy)]
pub enum Template {
    Text(&'static str),
    Render(fn(&PromptPayload) -> Option<String>),
}

#[derive(Clone, Copy)]
pub struct PromptSet {
    pub security: Template,
    pub intent: Template,
    pub metadata: Template,
    pub course: Template,
    pub lesson: Template,
}

impl PromptSet {
    fn get(&self, ty: PromptType) -> Template {
        match ty {
            PromptType::Security => self.security,
            PromptType::Intent => self.intent,
            PromptType::Metadata => self.metadata,
            PromptType::Course => self.course,
            PromptType::Lesson => self.lesson,
        }
    }
}

#[derive(Clone, Default)]
pub struct PromptRegistry {
    sets: HashMap<ProviderKind, PromptSet>,
}

impl PromptRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Gemini and Groq carry their own wording; the OpenAI-compatible adapter
    /// speaks the same chat dialect as Groq and shares its set.
    pub fn builtin() -> Self {
        let mut reg = Self::empty();
        reg.register(ProviderKind::Gemini, gemini::prompts());
        reg.register(ProviderKind::Groq, groq::prompts());
        reg.register(ProviderKind::OpenAI, groq::prompts());
        reg
    }

    pub fn register(&mut self, kind: ProviderKind, set: PromptSet) {
        self.sets.insert(kind, set);
    }

    pub fn get_prompt(
        &self,
        provider: ProviderKind,
        ty: PromptType,
        payload: Option<&PromptPayload>,
    ) -> Result<String> {
        let set = self.sets.get(&provider).ok_or_else(|| {
            CourseError::Configuration(format!("No prompts registered for {provider}"))
        })?;
        match set.get(ty) {
            Template::Text(s) => Ok(s.to_string()),
            Template::Render(f) => {
                let payload = payload.ok_or_else(|| {
                    CourseError::Configuration(format!("{ty} prompt requires a payload"))
                })?;
                f(payload).ok_or_else(|| {
                    CourseError::Configuration(format!("{ty} prompt got the wrong payload kind"))
                })
            }
        }
    }
}

pub(crate) fn upcoming_lines(upcoming: &[UpcomingLesson]) -> String {
    if upcoming.is_empty() {
        return "- (this is the final lesson of the module)".to_string();
    }
    upcoming
        .iter()
        .map(|l| format!("- {}: {}", l.title, l.description))
        .collect::<Vec<_>>()
        .join("\n")
}
