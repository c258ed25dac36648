//! Course creation: gatekeeping, classification, metadata, then a detached
//! structure-generation task that fills in modules and lessons.
//!
//! The caller gets the course shell back as soon as metadata exists. The
//! structure task runs on its own tokio task under a deadline; its failures
//! are logged and recorded on the course's `generation_status`, never
//! propagated to the caller that started it.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::errors::{CourseError, Result};
use crate::log::Transcript;
use crate::prompt::{CoursePrompt, PromptPayload, PromptRegistry, PromptType};
use crate::provider::DynProvider;
use crate::retry::RetryPolicy;
use crate::safety;
use crate::store::{CourseRecord, Database, NewCourse, PersistSummary};
use crate::wire::{CourseMetadata, GenerationOptions, Message};

pub mod intent;
pub mod metadata;
pub mod structure;
pub mod validate;

/// Model access shared by every stage: the provider, its prompt set and the
/// retry policy for stages that retry.
#[derive(Clone)]
pub struct Llm {
    pub provider: DynProvider,
    pub prompts: Arc<PromptRegistry>,
    pub retry: RetryPolicy,
}

impl Llm {
    pub fn new(provider: DynProvider, prompts: PromptRegistry, retry: RetryPolicy) -> Self {
        Self { provider, prompts: Arc::new(prompts), retry }
    }

    pub fn prompt(&self, ty: PromptType, payload: Option<&PromptPayload>) -> Result<String> {
        self.prompts.get_prompt(self.provider.kind(), ty, payload)
    }

    /// One provider call, recorded in the transcript whatever the outcome.
    pub async fn complete(
        &self,
        stage: &str,
        messages: &[Message],
        opts: &GenerationOptions,
        transcript: &Transcript,
    ) -> Result<String> {
        let out = self.provider.generate_content(messages, opts).await;
        transcript.record(stage, messages, out.as_ref().map(|c| c.text()));
        Ok(out?.text().to_string())
    }
}

/// How the detached structure task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureOutcome {
    Ready(PersistSummary),
    /// Generation failed before anything was written; the shell is kept as `failed`.
    Failed(String),
    TimedOut,
    /// The persistence transaction failed and the shell course was removed.
    Discarded(String),
    /// Another run persisted a structure first; this one wrote nothing.
    Superseded,
}

/// Handle on a detached structure task. Dropping it leaves the task running.
pub struct StructureTask {
    handle: JoinHandle<StructureOutcome>,
}

impl StructureTask {
    pub async fn wait(self) -> StructureOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => StructureOutcome::Failed(format!("structure task aborted: {e}")),
        }
    }
}

pub struct Created {
    pub course: CourseRecord,
    pub task: StructureTask,
}

pub struct CoursePipeline {
    llm: Llm,
    db: Arc<Database>,
    cfg: Arc<Config>,
}

impl CoursePipeline {
    pub fn new(llm: Llm, db: Arc<Database>, cfg: Arc<Config>) -> Self {
        Self { llm, db, cfg }
    }

    /// Validate, classify and describe the request, persist the course shell
    /// and start structure generation in the background.
    ///
    /// Nothing is written unless every stage before the shell succeeds.
    pub async fn create_course(&self, owner: &str, raw_prompt: &str) -> Result<Created> {
        let query = safety::check_query(raw_prompt, self.cfg.max_query_chars)?;
        let transcript = Transcript::new(&self.cfg);
        tracing::info!(run = %transcript.run_id(), owner, "creating course");

        let verdict = validate::validate_query(&self.llm, &query, &transcript).await?;
        validate::ensure_valid(verdict)?;

        let intent = intent::classify_intent(&self.llm, &query, &transcript).await?;
        tracing::info!(category = intent.intent_category.as_str(), topic = %intent.primary_topic, "intent classified");

        let meta = metadata::generate_metadata(&self.llm, &intent, &transcript).await?;
        let course = self
            .db
            .create_course_shell(&NewCourse::from_metadata(&meta, intent.intent_category, &query, owner))?;
        tracing::info!(course_id = course.id, slug = %course.slug, "course shell created");

        let prompt = CoursePrompt {
            user_query: query,
            intent_category: intent.intent_category.as_str().to_string(),
            metadata: meta,
        };
        let task = self.spawn_structure(course.id, prompt, transcript, true);
        Ok(Created { course, task })
    }

    /// Re-run structure generation for an owned course left without modules.
    pub fn regenerate_structure(&self, owner: &str, slug: &str) -> Result<Created> {
        let course = self.db.find_course(owner, slug)?;
        if self.db.module_count(course.id)? > 0 {
            return Err(CourseError::BadRequest(format!("course {slug} already has modules")));
        }
        if !self.db.claim_regeneration(course.id, self.cfg.structure_timeout())? {
            return Err(CourseError::BadRequest(format!("structure generation for {slug} is still running")));
        }
        tracing::info!(course_id = course.id, slug, "regenerating structure");

        let prompt = CoursePrompt {
            user_query: course.prompt.clone(),
            intent_category: course.intent_category.clone(),
            metadata: CourseMetadata {
                title: course.title.clone(),
                description: course.description.clone(),
                target_audience: course.target_audience.clone(),
                estimated_duration: course.estimated_duration.clone(),
                prerequisites: course.prerequisites.clone(),
                tags: course.tags.clone(),
            },
        };
        // an existing course is never deleted on a failed retry
        let task = self.spawn_structure(course.id, prompt, Transcript::new(&self.cfg), false);
        let course = self.db.course_by_id(course.id)?.ok_or(CourseError::CourseNotFound)?;
        Ok(Created { course, task })
    }

    fn spawn_structure(
        &self,
        course_id: i64,
        prompt: CoursePrompt,
        transcript: Transcript,
        discard_on_failure: bool,
    ) -> StructureTask {
        let llm = self.llm.clone();
        let db = Arc::clone(&self.db);
        let deadline = self.cfg.structure_timeout();
        let handle = tokio::spawn(async move {
            run_structure(llm, db, course_id, prompt, transcript, deadline, discard_on_failure).await
        });
        StructureTask { handle }
    }
}

/// Error boundary of the detached task: every failure ends up logged and on
/// the course status.
async fn run_structure(
    llm: Llm,
    db: Arc<Database>,
    course_id: i64,
    prompt: CoursePrompt,
    transcript: Transcript,
    deadline: Duration,
    discard_on_failure: bool,
) -> StructureOutcome {
    let work = AssertUnwindSafe(build_structure(
        &llm,
        &db,
        course_id,
        &prompt,
        &transcript,
        discard_on_failure,
    ))
    .catch_unwind();

    match tokio::time::timeout(deadline, work).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_panic)) => {
            tracing::error!(course_id, "structure task panicked");
            mark_failed(&db, course_id);
            StructureOutcome::Failed("structure task panicked".into())
        }
        Err(_) => {
            tracing::error!(course_id, ?deadline, "structure generation timed out");
            mark_failed(&db, course_id);
            StructureOutcome::TimedOut
        }
    }
}

async fn build_structure(
    llm: &Llm,
    db: &Database,
    course_id: i64,
    prompt: &CoursePrompt,
    transcript: &Transcript,
    discard_on_failure: bool,
) -> StructureOutcome {
    let generated = match structure::generate_structure(llm, prompt, transcript).await {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(course_id, error = %e, "structure generation failed");
            mark_failed(db, course_id);
            return StructureOutcome::Failed(e.to_string());
        }
    };

    match db.persist_structure(course_id, &generated) {
        Ok(summary) => {
            tracing::info!(course_id, modules = summary.modules, lessons = summary.lessons, "structure persisted");
            StructureOutcome::Ready(summary)
        }
        Err(e) => {
            tracing::error!(course_id, error = %e, "structure persistence rolled back");
            if discard_on_failure {
                match db.discard_course_shell(course_id) {
                    Ok(true) => return StructureOutcome::Discarded(e.to_string()),
                    // modules exist, so another run got there first
                    Ok(false) => {}
                    Err(de) => tracing::error!(course_id, error = %de, "could not remove course shell"),
                }
            }
            if mark_failed(db, course_id) {
                StructureOutcome::Failed(e.to_string())
            } else {
                tracing::warn!(course_id, "structure already persisted by another run");
                StructureOutcome::Superseded
            }
        }
    }
}

/// False when the course already has a structure and keeps its status.
fn mark_failed(db: &Database, course_id: i64) -> bool {
    match db.mark_generation_failed(course_id) {
        Ok(marked) => marked,
        Err(e) => {
            tracing::error!(course_id, error = %e, "could not record failed generation");
            true
        }
    }
}
