use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::errors::Result;
use crate::lesson::{LessonService, LessonView};
use crate::pipeline::{CoursePipeline, Created, Llm};
use crate::progress::{self, Rollup};
use crate::prompt::PromptRegistry;
use crate::provider::{make_provider, DynProvider};
use crate::safety;
use crate::store::{CourseRecord, CourseStats, CourseTree, Database, ModuleTree, Page};
use crate::video::{make_video_search, DynVideoSearch};

/// One page of courses plus its pagination envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<T> {
    pub courses: Vec<T>,
    pub pagination: Page,
}

/// Every user-facing operation, each scoped to the owner it is called with.
pub struct App {
    db: Arc<Database>,
    pipeline: CoursePipeline,
    lessons: LessonService,
    videos: DynVideoSearch,
}

impl App {
    pub fn new(cfg: Config, db: Arc<Database>, provider: DynProvider, videos: DynVideoSearch) -> Self {
        let cfg = Arc::new(cfg);
        let llm = Llm::new(provider, PromptRegistry::builtin(), cfg.retry_policy());
        Self {
            pipeline: CoursePipeline::new(llm.clone(), Arc::clone(&db), Arc::clone(&cfg)),
            lessons: LessonService::new(llm, Arc::clone(&db), Arc::clone(&videos), cfg),
            db,
            videos,
        }
    }

    /// Open the database and build vendor clients from config and environment.
    pub fn from_config(cfg: Config) -> Result<Self> {
        let db = Arc::new(Database::open(&cfg.db_path)?);
        let provider = make_provider(&cfg);
        let videos = make_video_search(&cfg);
        tracing::debug!(provider = %provider.kind(), db = %cfg.db_path, "app ready");
        Ok(Self::new(cfg, db, provider, videos))
    }

    pub async fn create_course(&self, owner: &str, prompt: &str) -> Result<Created> {
        self.pipeline.create_course(owner, prompt).await
    }

    pub fn regenerate_structure(&self, owner: &str, slug: &str) -> Result<Created> {
        self.pipeline.regenerate_structure(owner, slug)
    }

    pub fn list_courses(
        &self,
        owner: &str,
        page: i64,
        limit: i64,
        search: &str,
    ) -> Result<Listing<CourseRecord>> {
        safety::check_page(page, limit)?;
        let (courses, pagination) = self.db.list_courses(owner, page, limit, search)?;
        Ok(Listing { courses, pagination })
    }

    pub fn list_courses_with_stats(&self, owner: &str, page: i64, limit: i64) -> Result<Listing<CourseStats>> {
        safety::check_page(page, limit)?;
        let (courses, pagination) = self.db.list_course_stats(owner, page, limit)?;
        Ok(Listing { courses, pagination })
    }

    pub fn view_course(&self, owner: &str, slug: &str) -> Result<CourseTree> {
        let course = self.db.find_course(owner, slug)?;
        self.db.course_tree(course)
    }

    pub fn list_modules(&self, owner: &str, slug: &str) -> Result<Vec<ModuleTree>> {
        let course = self.db.find_course(owner, slug)?;
        self.db.list_modules(course.id)
    }

    pub fn delete_course(&self, owner: &str, slug: &str) -> Result<()> {
        let course = self.db.find_course(owner, slug)?;
        self.db.soft_delete_course(course.id)?;
        tracing::info!(course_id = course.id, slug, "course deleted");
        Ok(())
    }

    pub async fn open_lesson(&self, owner: &str, course: &str, module: &str, lesson: &str) -> Result<LessonView> {
        self.lessons.open_lesson(owner, course, module, lesson).await
    }

    pub fn set_lesson_completion(
        &self,
        owner: &str,
        course: &str,
        module: &str,
        lesson: &str,
        complete: bool,
    ) -> Result<Rollup> {
        let c = self.db.find_course(owner, course)?;
        let m = self.db.find_module(c.id, module)?;
        let l = self.db.find_lesson(m.id, lesson)?;
        progress::set_lesson_completion(&self.db, l.id, complete)
    }

    pub async fn search_videos(&self, query: &str) -> Result<Vec<String>> {
        let query = safety::check_search(query)?;
        self.videos.search(&query).await
    }
}
