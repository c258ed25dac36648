//! Fakes and fixtures shared by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::app::App;
use crate::cli::ProviderKind;
use crate::config::Config;
use crate::errors::{CourseError, Result};
use crate::lesson::LessonService;
use crate::pipeline::{CoursePipeline, Llm};
use crate::prompt::PromptRegistry;
use crate::provider::Provider;
use crate::retry::RetryPolicy;
use crate::store::{CourseRecord, Database, NewCourse};
use crate::video::VideoSearch;
use crate::wire::{Completion, GeneratedCourse, GeneratedLesson, GeneratedModule, GenerationOptions, Message};

/// Provider that replays a queue of completions and errors in order and
/// remembers what it was sent.
#[derive(Clone)]
pub struct ScriptedProvider {
    inner: Arc<Scripted>,
}

struct Scripted {
    script: Mutex<VecDeque<Result<String>>>,
    delays: Mutex<HashMap<usize, Duration>>,
    calls: AtomicUsize,
    last: Mutex<Option<(Vec<Message>, GenerationOptions)>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(completions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(Scripted {
                script: Mutex::new(completions.into_iter().map(|s| Ok(s.into())).collect()),
                delays: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            }),
        }
    }

    pub fn then_error(self, err: CourseError) -> Self {
        self.inner.script.lock().push_back(Err(err));
        self
    }

    /// Sleep before answering the `call`-th request (0-based).
    pub fn with_delay_on(self, call: usize, delay: Duration) -> Self {
        self.inner.delays.lock().insert(call, delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Option<Vec<Message>> {
        self.inner.last.lock().as_ref().map(|(m, _)| m.clone())
    }

    pub fn last_options(&self) -> Option<GenerationOptions> {
        self.inner.last.lock().as_ref().map(|(_, o)| o.clone())
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Groq
    }

    async fn generate_content(&self, messages: &[Message], opts: &GenerationOptions) -> Result<Completion> {
        let n = self.inner.calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.last.lock() = Some((messages.to_vec(), opts.clone()));
        let delay = self.inner.delays.lock().get(&n).copied();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let next = self.inner.script.lock().pop_front();
        match next {
            Some(Ok(text)) => Ok(Completion::new(text)),
            Some(Err(e)) => Err(e),
            None => Err(CourseError::provider("scripted", None, "script exhausted")),
        }
    }
}

/// Video search returning fixed ids, or always failing.
#[derive(Clone)]
pub struct FakeVideoSearch {
    inner: Arc<FakeVideos>,
}

struct FakeVideos {
    ids: Option<Vec<String>>,
    calls: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl FakeVideoSearch {
    pub fn returning<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(Some(ids.into_iter().map(Into::into).collect()))
    }

    pub fn failing() -> Self {
        Self::build(None)
    }

    fn build(ids: Option<Vec<String>>) -> Self {
        Self {
            inner: Arc::new(FakeVideos { ids, calls: AtomicUsize::new(0), last_query: Mutex::new(None) }),
        }
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.inner.last_query.lock().clone()
    }
}

#[async_trait]
impl VideoSearch for FakeVideoSearch {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.last_query.lock() = Some(query.to_string());
        self.inner
            .ids
            .clone()
            .ok_or_else(|| CourseError::VideoSearch("quota exceeded".into()))
    }
}

pub fn llm(provider: ScriptedProvider) -> Llm {
    Llm::new(
        Arc::new(provider),
        PromptRegistry::builtin(),
        RetryPolicy { max_attempts: 3, delay: Duration::from_millis(1) },
    )
}

pub fn pipeline(provider: ScriptedProvider, cfg: Config) -> (CoursePipeline, Arc<Database>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let llm = Llm::new(Arc::new(provider), PromptRegistry::builtin(), cfg.retry_policy());
    (CoursePipeline::new(llm, Arc::clone(&db), Arc::new(cfg)), db)
}

pub fn lesson_service(provider: ScriptedProvider, videos: FakeVideoSearch) -> (LessonService, Arc<Database>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let svc = LessonService::new(llm(provider), Arc::clone(&db), Arc::new(videos), Arc::new(Config::default()));
    (svc, db)
}

pub fn app(provider: ScriptedProvider, videos: FakeVideoSearch) -> App {
    let cfg = Config { retry_delay_ms: 1, ..Config::default() };
    let db = Arc::new(Database::open_in_memory().unwrap());
    App::new(cfg, db, Arc::new(provider), Arc::new(videos))
}

pub fn new_course(title: &str, owner: &str) -> NewCourse {
    NewCourse {
        title: title.into(),
        description: "A course".into(),
        tags: vec!["algorithms".into(), "trees".into()],
        target_audience: vec!["students".into()],
        estimated_duration: "4 hours".into(),
        prerequisites: vec![],
        intent_category: "Concept Mastery".into(),
        prompt: format!("I want to learn {title}"),
        created_by: owner.into(),
    }
}

/// Module/lesson tree from titles; lesson orders follow position.
pub fn structure(modules: &[(&str, &[&str])]) -> GeneratedCourse {
    GeneratedCourse {
        modules: modules
            .iter()
            .map(|(title, lessons)| GeneratedModule {
                title: title.to_string(),
                description: format!("about {title}"),
                order: None,
                lessons: lessons
                    .iter()
                    .enumerate()
                    .map(|(j, l)| GeneratedLesson {
                        title: l.to_string(),
                        order: Some(j as i64 + 1),
                        description: format!("about {l}"),
                        estimated_minutes: Some(15),
                    })
                    .collect(),
            })
            .collect(),
    }
}

pub fn course_with_structure(db: &Database, owner: &str, title: &str, tree: GeneratedCourse) -> CourseRecord {
    let course = db.create_course_shell(&new_course(title, owner)).unwrap();
    db.persist_structure(course.id, &tree).unwrap();
    db.course_by_id(course.id).unwrap().unwrap()
}

/// A well-formed lesson-generation response, optionally with a video block.
pub fn lesson_json(video_query: Option<&str>) -> String {
    let mut content = vec![
        json!({"type": "heading", "text": "Overview"}),
        json!({"type": "paragraph", "text": "A binary search tree keeps keys ordered."}),
        json!({"type": "code", "language": "python", "text": "def insert(node, key): ..."}),
    ];
    if let Some(q) = video_query {
        content.push(json!({"type": "video", "query": q}));
    }
    content.push(json!({
        "type": "mcq",
        "question": "Where do smaller keys go?",
        "options": ["left", "right"],
        "answer": 0,
        "explanation": "Left subtree holds smaller keys."
    }));
    json!({"title": "Lesson", "objectives": ["understand ordering"], "content": content}).to_string()
}
