//! SQLite persistence for courses, modules and lessons.
//!
//! Three tables related by foreign key, each with a unique `slug` and an
//! `is_deleted` flag. A single connection sits behind a mutex; every public
//! method takes the lock for the duration of its statements and never across
//! an `.await`.
//!
//! Multi-statement writes go through [`Database::transaction`], so structure
//! persistence, cascade deletes and progress rollups are all-or-nothing.

use chrono::{DateTime, SecondsFormat, Utc};
use fs_err as fs;
use parking_lot::Mutex;
use rusqlite::{Connection, Row, Transaction};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::errors::{CourseError, Result};
use crate::slug;

pub mod courses;
pub mod lessons;
pub mod structure;

pub use courses::{CourseStats, CourseTree, ModuleTree, NewCourse, Page};
pub use structure::PersistSummary;

/// Attempts per entity before a slug race is treated as fatal.
const SLUG_INSERT_ATTEMPTS: u32 = 5;

pub struct Database {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    /// Shell exists; structure generation has not finished.
    Pending,
    Ready,
    /// Structure generation timed out or failed; shell kept with no modules.
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Ready => "ready",
            GenerationStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "ready" => GenerationStatus::Ready,
            "failed" => GenerationStatus::Failed,
            _ => GenerationStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub tags: Vec<String>,
    pub target_audience: Vec<String>,
    pub estimated_duration: String,
    pub prerequisites: Vec<String>,
    pub intent_category: String,
    /// The learner's original request, kept for regeneration.
    pub prompt: String,
    pub created_by: String,
    pub generation_status: GenerationStatus,
    pub is_completed: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub order: i64,
    pub is_completed: bool,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    pub slug: String,
    pub order: i64,
    pub description: String,
    pub estimated_minutes: i64,
    /// `None` until content generation has run.
    pub content: Option<Value>,
    pub yt_videos: Vec<String>,
    pub is_completed: bool,
    pub is_deleted: bool,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| CourseError::Configuration(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn: Mutex::new(conn) };
        db.initialize_schema()?;
        Ok(db)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '[]',
                target_audience TEXT NOT NULL DEFAULT '[]',
                estimated_duration TEXT NOT NULL DEFAULT '',
                prerequisites TEXT NOT NULL DEFAULT '[]',
                intent_category TEXT NOT NULL DEFAULT '',
                prompt TEXT NOT NULL DEFAULT '',
                created_by TEXT NOT NULL,
                generation_status TEXT NOT NULL DEFAULT 'pending',
                is_completed INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_courses_owner ON courses(created_by, is_deleted);

            CREATE TABLE IF NOT EXISTS modules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                ord INTEGER NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (course_id, ord)
            );

            CREATE TABLE IF NOT EXISTS lessons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                ord INTEGER NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                estimated_minutes INTEGER NOT NULL DEFAULT 0,
                content TEXT,
                yt_videos TEXT NOT NULL DEFAULT '[]',
                is_completed INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (module_id, ord)
            );
            "#,
        )?;
        Ok(())
    }

    /// Run `f` inside one transaction; commits on `Ok`, rolls back on `Err`.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }
}

pub(crate) fn now() -> String {
    stamp(Utc::now())
}

/// Fixed-width UTC timestamp; these compare correctly as strings.
pub(crate) fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn to_json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".into())
}

fn from_json_list(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

pub(crate) const COURSE_COLUMNS: &str = "id, title, slug, description, tags, target_audience, \
     estimated_duration, prerequisites, intent_category, created_by, generation_status, \
     is_completed, is_deleted, created_at, updated_at, prompt";

pub(crate) fn course_from_row(row: &Row<'_>) -> rusqlite::Result<CourseRecord> {
    Ok(CourseRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        tags: from_json_list(&row.get::<_, String>(4)?),
        target_audience: from_json_list(&row.get::<_, String>(5)?),
        estimated_duration: row.get(6)?,
        prerequisites: from_json_list(&row.get::<_, String>(7)?),
        intent_category: row.get(8)?,
        prompt: row.get(15)?,
        created_by: row.get(9)?,
        generation_status: GenerationStatus::parse(&row.get::<_, String>(10)?),
        is_completed: row.get(11)?,
        is_deleted: row.get(12)?,
        created_at: parse_time(&row.get::<_, String>(13)?),
        updated_at: parse_time(&row.get::<_, String>(14)?),
    })
}

pub(crate) const MODULE_COLUMNS: &str =
    "id, course_id, title, slug, description, ord, is_completed, is_deleted";

pub(crate) fn module_from_row(row: &Row<'_>) -> rusqlite::Result<ModuleRecord> {
    Ok(ModuleRecord {
        id: row.get(0)?,
        course_id: row.get(1)?,
        title: row.get(2)?,
        slug: row.get(3)?,
        description: row.get(4)?,
        order: row.get(5)?,
        is_completed: row.get(6)?,
        is_deleted: row.get(7)?,
    })
}

pub(crate) const LESSON_COLUMNS: &str = "id, module_id, title, slug, ord, description, \
     estimated_minutes, content, yt_videos, is_completed, is_deleted";

pub(crate) fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<LessonRecord> {
    let content: Option<String> = row.get(7)?;
    Ok(LessonRecord {
        id: row.get(0)?,
        module_id: row.get(1)?,
        title: row.get(2)?,
        slug: row.get(3)?,
        order: row.get(4)?,
        description: row.get(5)?,
        estimated_minutes: row.get(6)?,
        // unparseable legacy text is kept as a string value
        content: content.map(|s| serde_json::from_str(&s).unwrap_or(Value::String(s))),
        yt_videos: from_json_list(&row.get::<_, String>(8)?),
        is_completed: row.get(9)?,
        is_deleted: row.get(10)?,
    })
}

/// A unique-index violation on a `slug` column.
pub fn is_slug_conflict(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, Some(msg)) => {
            err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE && msg.ends_with(".slug")
        }
        _ => false,
    }
}

/// First free slug for `base` in `table`, considering every row including
/// soft-deleted ones.
fn allocate_slug(conn: &Connection, table: &str, base: &str, from: u32) -> Result<(String, u32)> {
    let sql = format!("SELECT slug FROM {table} WHERE slug = ?1 OR slug LIKE ?2");
    let mut stmt = conn.prepare(&sql)?;
    let taken = stmt
        .query_map([base, &format!("{base}-%")], |r| r.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .filter(|s| slug::is_variant_of(base, s))
        .collect::<HashSet<_>>();
    Ok(slug::next_free(base, &taken, from))
}

/// Insert a row whose slug derives from `title`. The read-then-insert is
/// backed by the unique index: a conflict moves on to the next counter.
pub(crate) fn insert_with_unique_slug<F>(
    conn: &Connection,
    table: &str,
    title: &str,
    mut insert: F,
) -> Result<(i64, String)>
where
    F: FnMut(&Connection, &str) -> rusqlite::Result<()>,
{
    let base = slug::slugify(title);
    let mut from = 0;
    for _ in 0..SLUG_INSERT_ATTEMPTS {
        let (candidate, counter) = allocate_slug(conn, table, &base, from)?;
        match insert(conn, &candidate) {
            Ok(()) => return Ok((conn.last_insert_rowid(), candidate)),
            Err(e) if is_slug_conflict(&e) => {
                tracing::debug!(table, slug = %candidate, "slug taken concurrently, trying next");
                from = counter + 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(CourseError::Structure(format!("no free slug for {title:?} in {table}")))
}
