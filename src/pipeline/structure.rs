use std::collections::HashSet;

use crate::errors::{CourseError, Result};
use crate::extract::parse_json;
use crate::log::Transcript;
use crate::prompt::{CoursePrompt, PromptPayload, PromptType};
use crate::wire::{GeneratedCourse, GenerationOptions, Message};

use super::Llm;

/// Generate the module/lesson tree in one call. Not retried; the caller's
/// deadline bounds it.
pub async fn generate_structure(llm: &Llm, prompt: &CoursePrompt, transcript: &Transcript) -> Result<GeneratedCourse> {
    let text = llm.prompt(PromptType::Course, Some(&PromptPayload::Course(prompt.clone())))?;
    let messages = [Message::user(text)];
    let raw = llm
        .complete("structure", &messages, &GenerationOptions::default(), transcript)
        .await?;
    let generated = parse_json::<GeneratedCourse>(&raw)?;
    let (course, warnings) = sanitize(generated)?;
    for w in &warnings {
        tracing::warn!(warning = %w, "structure sanitised");
    }
    Ok(course)
}

/// Normalise a generated tree before persistence.
/// - Trim titles; drop lessons with a blank title
/// - Drop modules with a blank title or no lessons left
/// - Renumber a module's lessons by position when their orders are missing,
///   non-positive or repeated
/// - Reject duplicate module titles (lessons are attached by module title)
/// - Reject a tree with no modules left
pub fn sanitize(course: GeneratedCourse) -> Result<(GeneratedCourse, Vec<String>)> {
    let mut warnings = Vec::new();
    let mut modules = Vec::with_capacity(course.modules.len());
    let mut seen_titles = HashSet::new();

    for mut module in course.modules {
        module.title = module.title.trim().to_string();
        if module.title.is_empty() {
            warnings.push("dropped module with a blank title".to_string());
            continue;
        }

        let before = module.lessons.len();
        module.lessons.retain(|l| !l.title.trim().is_empty());
        for lesson in &mut module.lessons {
            lesson.title = lesson.title.trim().to_string();
            lesson.estimated_minutes = lesson.estimated_minutes.filter(|m| *m >= 0);
        }
        if module.lessons.len() < before {
            warnings.push(format!(
                "dropped {} untitled lesson(s) from {}",
                before - module.lessons.len(),
                module.title
            ));
        }
        if module.lessons.is_empty() {
            warnings.push(format!("dropped module {} (no lessons)", module.title));
            continue;
        }

        let mut orders = HashSet::new();
        let orders_usable = module
            .lessons
            .iter()
            .all(|l| matches!(l.order, Some(o) if o > 0 && orders.insert(o)));
        if !orders_usable {
            warnings.push(format!("renumbered lessons of {} by position", module.title));
            for (i, lesson) in module.lessons.iter_mut().enumerate() {
                lesson.order = Some(i as i64 + 1);
            }
        }

        if !seen_titles.insert(module.title.clone()) {
            return Err(CourseError::Structure(format!("duplicate module title {:?}", module.title)));
        }
        modules.push(module);
    }

    if modules.is_empty() {
        return Err(CourseError::Structure("generated structure has no usable modules".into()));
    }
    Ok((GeneratedCourse { modules }, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{llm, structure, ScriptedProvider};
    use crate::wire::{CourseMetadata, GeneratedLesson};

    fn lesson(title: &str, order: Option<i64>) -> GeneratedLesson {
        GeneratedLesson { title: title.into(), order, description: String::new(), estimated_minutes: Some(10) }
    }

    #[test]
    fn drops_blank_lessons_and_empty_modules() {
        let mut tree = structure(&[("Basics", &["Intro", "  "]), ("Empty", &[" "]), ("More", &["Deep dive"])]);
        tree.modules[0].title = "  Basics ".into();
        let (clean, warnings) = sanitize(tree).unwrap();
        let titles: Vec<_> = clean.modules.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["Basics", "More"]);
        assert_eq!(clean.modules[0].lessons.len(), 1);
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn keeps_valid_lesson_orders() {
        let mut tree = structure(&[("Basics", &[])]);
        tree.modules[0].lessons = vec![lesson("b", Some(2)), lesson("a", Some(5))];
        let (clean, warnings) = sanitize(tree).unwrap();
        assert!(warnings.is_empty());
        let orders: Vec<_> = clean.modules[0].lessons.iter().map(|l| l.order).collect();
        assert_eq!(orders, [Some(2), Some(5)]);
    }

    #[test]
    fn renumbers_repeated_or_missing_orders() {
        let mut tree = structure(&[("Basics", &[])]);
        tree.modules[0].lessons = vec![lesson("a", Some(1)), lesson("b", Some(1)), lesson("c", None)];
        let (clean, warnings) = sanitize(tree).unwrap();
        let orders: Vec<_> = clean.modules[0].lessons.iter().map(|l| l.order).collect();
        assert_eq!(orders, [Some(1), Some(2), Some(3)]);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn duplicate_module_titles_are_rejected() {
        let tree = structure(&[("Basics", &["a"]), ("Basics", &["b"])]);
        assert!(matches!(sanitize(tree), Err(CourseError::Structure(_))));
    }

    #[test]
    fn nothing_usable_is_an_error() {
        assert!(sanitize(GeneratedCourse { modules: vec![] }).is_err());
    }

    #[tokio::test]
    async fn renders_course_prompt_as_single_user_turn() {
        let raw = serde_json::to_string(&structure(&[("Basics", &["Intro"])])).unwrap();
        let p = ScriptedProvider::new([raw]);
        let prompt = CoursePrompt {
            user_query: "learn sql joins".into(),
            intent_category: "Concept Mastery".into(),
            metadata: CourseMetadata {
                title: "SQL Joins".into(),
                description: "d".into(),
                target_audience: vec![],
                estimated_duration: String::new(),
                prerequisites: vec![],
                tags: vec![],
            },
        };
        let tree = generate_structure(&llm(p.clone()), &prompt, &Transcript::disabled()).await.unwrap();
        assert_eq!(tree.modules.len(), 1);
        let sent = p.last_messages().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].joined().contains("learn sql joins"));
    }
}
