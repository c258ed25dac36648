//! Lazy per-lesson content: generated on first open, then served from storage.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::errors::{CourseError, Result};
use crate::extract::parse_json;
use crate::log::Transcript;
use crate::pipeline::Llm;
use crate::prompt::{LessonPrompt, PromptPayload, PromptType, UpcomingLesson};
use crate::store::lessons::LessonSummary;
use crate::store::{CourseRecord, Database, LessonRecord, ModuleRecord};
use crate::video::DynVideoSearch;
use crate::wire::content::is_empty_content;
use crate::wire::{ContentBlock, GenerationOptions, LessonPayload, Message};

pub mod navigation;

pub use navigation::{LessonRef, Navigation};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    pub course_title: String,
    pub module_title: String,
    #[serde(flatten)]
    pub lesson: LessonRecord,
    pub navigation: Navigation,
    /// True when this call produced the content.
    pub generated: bool,
}

pub struct LessonService {
    llm: Llm,
    db: Arc<Database>,
    videos: DynVideoSearch,
    cfg: Arc<Config>,
    in_flight: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

fn needs_content(lesson: &LessonRecord) -> bool {
    lesson.content.as_ref().map_or(true, is_empty_content)
}

/// Search text when the lesson carries no usable video block: the course's
/// domain tags followed by the course, module and lesson titles.
fn fallback_video_query(course: &CourseRecord, module: &ModuleRecord, lesson: &LessonRecord) -> String {
    course
        .tags
        .iter()
        .map(String::as_str)
        .chain([course.title.as_str(), module.title.as_str(), lesson.title.as_str()])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl LessonService {
    pub fn new(llm: Llm, db: Arc<Database>, videos: DynVideoSearch, cfg: Arc<Config>) -> Self {
        Self { llm, db, videos, cfg, in_flight: Mutex::new(HashMap::new()) }
    }

    /// Resolve `course/module/lesson` for `owner` and return the lesson,
    /// generating its content first if it has none.
    ///
    /// Concurrent opens of the same empty lesson generate once; later
    /// callers wait and then read what the first stored.
    pub async fn open_lesson(
        &self,
        owner: &str,
        course_slug: &str,
        module_slug: &str,
        lesson_slug: &str,
    ) -> Result<LessonView> {
        let course = self.db.find_course(owner, course_slug)?;
        let module = self.db.find_module(course.id, module_slug)?;
        let lesson = self.db.find_lesson(module.id, lesson_slug)?;
        let siblings = self.db.lessons_in_module(module.id)?;
        let navigation = navigation::resolve(&self.db, &module, &siblings, lesson.id)?;

        let (lesson, generated) = if needs_content(&lesson) {
            self.generate_once(&course, &module, lesson, &siblings).await?
        } else {
            (lesson, false)
        };

        Ok(LessonView {
            course_title: course.title,
            module_title: module.title,
            lesson,
            navigation,
            generated,
        })
    }

    async fn generate_once(
        &self,
        course: &CourseRecord,
        module: &ModuleRecord,
        lesson: LessonRecord,
        siblings: &[LessonSummary],
    ) -> Result<(LessonRecord, bool)> {
        let id = lesson.id;
        let gate = Arc::clone(self.in_flight.lock().entry(id).or_default());
        let result: Result<(LessonRecord, bool)> = async {
            let _held = gate.lock().await;
            // another caller may have finished while we waited
            let current = self.db.lesson_by_id(id)?.ok_or(CourseError::LessonNotFound)?;
            if needs_content(&current) {
                self.generate(course, module, &current, siblings).await.map(|l| (l, true))
            } else {
                tracing::debug!(lesson_id = id, "content produced by a concurrent caller");
                Ok((current, false))
            }
        }
        .await;
        self.release(id, &gate);
        result
    }

    // drop the gate once nobody else holds a handle to it
    fn release(&self, id: i64, gate: &Arc<tokio::sync::Mutex<()>>) {
        let mut map = self.in_flight.lock();
        if Arc::strong_count(gate) <= 2 {
            map.remove(&id);
        }
    }

    async fn generate(
        &self,
        course: &CourseRecord,
        module: &ModuleRecord,
        lesson: &LessonRecord,
        siblings: &[LessonSummary],
    ) -> Result<LessonRecord> {
        let transcript = Transcript::new(&self.cfg);
        tracing::info!(lesson_id = lesson.id, slug = %lesson.slug, run = %transcript.run_id(), "generating lesson content");

        let upcoming = siblings
            .iter()
            .filter(|l| l.id != lesson.id && l.order > lesson.order)
            .map(|l| UpcomingLesson { title: l.title.clone(), description: l.description.clone() })
            .collect();
        let payload = PromptPayload::Lesson(LessonPrompt {
            course_title: course.title.clone(),
            module_title: module.title.clone(),
            lesson_title: lesson.title.clone(),
            lesson_description: lesson.description.clone(),
            upcoming,
        });
        let messages = [Message::user(self.llm.prompt(PromptType::Lesson, Some(&payload))?)];
        let raw = self
            .llm
            .complete("lesson", &messages, &GenerationOptions::default(), &transcript)
            .await?;

        let parsed = parse_json::<LessonPayload>(&raw)
            .map_err(|e| CourseError::AiResponseInvalid(e.to_string()))?;
        parsed.check().map_err(CourseError::AiResponseInvalid)?;

        let query = parsed
            .content
            .iter()
            .find_map(ContentBlock::video_query)
            .map(str::to_string)
            .unwrap_or_else(|| fallback_video_query(course, module, lesson));
        let videos = match self.videos.search(&query).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(lesson_id = lesson.id, error = %e, "video search failed, saving lesson without videos");
                Vec::new()
            }
        };

        self.db.save_lesson_content(lesson.id, &parsed.content, &videos)?;
        tracing::info!(lesson_id = lesson.id, blocks = parsed.content.len(), videos = videos.len(), "lesson content saved");
        self.db.lesson_by_id(lesson.id)?.ok_or(CourseError::LessonNotFound)
    }
}
