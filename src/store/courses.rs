use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use super::{
    course_from_row, insert_with_unique_slug, module_from_row, now, stamp, to_json_list, CourseRecord,
    Database, GenerationStatus, ModuleRecord, COURSE_COLUMNS, MODULE_COLUMNS,
};
use crate::errors::{CourseError, Result};
use crate::store::lessons::{LessonSummary, LESSON_SUMMARY_COLUMNS};
use crate::wire::{CourseMetadata, IntentCategory};

/// Fields of a course shell, before any module exists.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub target_audience: Vec<String>,
    pub estimated_duration: String,
    pub prerequisites: Vec<String>,
    pub intent_category: String,
    pub prompt: String,
    pub created_by: String,
}

impl NewCourse {
    pub fn from_metadata(
        meta: &CourseMetadata,
        intent: IntentCategory,
        prompt: &str,
        owner: &str,
    ) -> Self {
        Self {
            title: meta.title.trim().to_string(),
            description: meta.description.clone(),
            tags: meta.tags.clone(),
            target_audience: meta.target_audience.clone(),
            estimated_duration: meta.estimated_duration.clone(),
            prerequisites: meta.prerequisites.clone(),
            intent_category: intent.as_str().to_string(),
            prompt: prompt.to_string(),
            created_by: owner.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl Page {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self { total, page, limit, total_pages }
    }

    fn offset(page: i64, limit: i64) -> i64 {
        (page.max(1) - 1) * limit
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseStats {
    #[serde(flatten)]
    pub course: CourseRecord,
    pub total_modules: i64,
    pub completed_modules: i64,
    pub total_lessons: i64,
    pub completed_lessons: i64,
    /// Whole percent of completed lessons.
    pub progress: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleTree {
    #[serde(flatten)]
    pub module: ModuleRecord,
    pub lessons: Vec<LessonSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseTree {
    #[serde(flatten)]
    pub course: CourseRecord,
    pub modules: Vec<ModuleTree>,
}

fn like_pattern(search: &str) -> String {
    let escaped = search
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl Database {
    /// Insert a course with no modules and status `pending`.
    pub fn create_course_shell(&self, new: &NewCourse) -> Result<CourseRecord> {
        let id = self.with_conn(|conn| {
            let ts = now();
            let (id, _) = insert_with_unique_slug(conn, "courses", &new.title, |conn, slug| {
                conn.execute(
                    "INSERT INTO courses (title, slug, description, tags, target_audience, \
                     estimated_duration, prerequisites, intent_category, prompt, created_by, \
                     generation_status, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'pending', ?11, ?11)",
                    params![
                        new.title,
                        slug,
                        new.description,
                        to_json_list(&new.tags),
                        to_json_list(&new.target_audience),
                        new.estimated_duration,
                        to_json_list(&new.prerequisites),
                        new.intent_category,
                        new.prompt,
                        new.created_by,
                        ts,
                    ],
                )?;
                Ok(())
            })?;
            Ok(id)
        })?;
        self.course_by_id(id)?.ok_or(CourseError::CourseNotFound)
    }

    pub fn course_by_id(&self, id: i64) -> Result<Option<CourseRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"),
                    [id],
                    course_from_row,
                )
                .optional()?)
        })
    }

    /// Live course with this slug owned by `owner`.
    pub fn find_course(&self, owner: &str, slug: &str) -> Result<CourseRecord> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {COURSE_COLUMNS} FROM courses \
                         WHERE slug = ?1 AND created_by = ?2 AND is_deleted = 0"
                    ),
                    params![slug, owner],
                    course_from_row,
                )
                .optional()?)
        })?
        .ok_or(CourseError::CourseNotFound)
    }

    /// Owner's live courses, newest first, optionally filtered by a
    /// case-insensitive substring of title, description or tags.
    pub fn list_courses(
        &self,
        owner: &str,
        page: i64,
        limit: i64,
        search: &str,
    ) -> Result<(Vec<CourseRecord>, Page)> {
        let pattern = like_pattern(search);
        let filter = "created_by = ?1 AND is_deleted = 0 AND (?2 = '%%' OR lower(title) LIKE ?2 ESCAPE '\\' \
                      OR lower(description) LIKE ?2 ESCAPE '\\' OR lower(tags) LIKE ?2 ESCAPE '\\')";
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM courses WHERE {filter}"),
                params![owner, pattern],
                |r| r.get(0),
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {COURSE_COLUMNS} FROM courses WHERE {filter} \
                 ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4"
            ))?;
            let courses = stmt
                .query_map(
                    params![owner, pattern, limit, Page::offset(page, limit)],
                    course_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((courses, Page::new(total, page, limit)))
        })
    }

    pub fn list_course_stats(
        &self,
        owner: &str,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<CourseStats>, Page)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM courses WHERE created_by = ?1 AND is_deleted = 0",
                [owner],
                |r| r.get(0),
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {COURSE_COLUMNS},
                    (SELECT COUNT(*) FROM modules m
                       WHERE m.course_id = courses.id AND m.is_deleted = 0),
                    (SELECT COUNT(*) FROM modules m
                       WHERE m.course_id = courses.id AND m.is_deleted = 0 AND m.is_completed = 1),
                    (SELECT COUNT(*) FROM lessons l JOIN modules m ON l.module_id = m.id
                       WHERE m.course_id = courses.id AND m.is_deleted = 0 AND l.is_deleted = 0),
                    (SELECT COUNT(*) FROM lessons l JOIN modules m ON l.module_id = m.id
                       WHERE m.course_id = courses.id AND m.is_deleted = 0 AND l.is_deleted = 0
                         AND l.is_completed = 1)
                 FROM courses
                 WHERE created_by = ?1 AND is_deleted = 0
                 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(params![owner, limit, Page::offset(page, limit)], |row| {
                    let total_lessons: i64 = row.get(18)?;
                    let completed_lessons: i64 = row.get(19)?;
                    Ok(CourseStats {
                        course: course_from_row(row)?,
                        total_modules: row.get(16)?,
                        completed_modules: row.get(17)?,
                        total_lessons,
                        completed_lessons,
                        progress: if total_lessons == 0 {
                            0
                        } else {
                            completed_lessons * 100 / total_lessons
                        },
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((rows, Page::new(total, page, limit)))
        })
    }

    /// Modules of a course in order, each with its lesson summaries in order.
    pub fn list_modules(&self, course_id: i64) -> Result<Vec<ModuleTree>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MODULE_COLUMNS} FROM modules \
                 WHERE course_id = ?1 AND is_deleted = 0 ORDER BY ord"
            ))?;
            let modules = stmt
                .query_map([course_id], module_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut stmt = conn.prepare(&format!(
                "SELECT l.module_id, {LESSON_SUMMARY_COLUMNS} FROM lessons l \
                 JOIN modules m ON l.module_id = m.id \
                 WHERE m.course_id = ?1 AND m.is_deleted = 0 AND l.is_deleted = 0 \
                 ORDER BY l.ord"
            ))?;
            let mut by_module: HashMap<i64, Vec<LessonSummary>> = HashMap::new();
            let rows = stmt.query_map([course_id], |row| {
                Ok((row.get::<_, i64>(0)?, LessonSummary::from_row(row, 1)?))
            })?;
            for row in rows {
                let (module_id, lesson) = row?;
                by_module.entry(module_id).or_default().push(lesson);
            }

            Ok(modules
                .into_iter()
                .map(|module| {
                    let lessons = by_module.remove(&module.id).unwrap_or_default();
                    ModuleTree { module, lessons }
                })
                .collect())
        })
    }

    pub fn course_tree(&self, course: CourseRecord) -> Result<CourseTree> {
        let modules = self.list_modules(course.id)?;
        Ok(CourseTree { course, modules })
    }

    /// Live modules, soft-deleted ones excluded.
    pub fn module_count(&self, course_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM modules WHERE course_id = ?1 AND is_deleted = 0",
                [course_id],
                |r| r.get(0),
            )?)
        })
    }

    /// Record a failed generation unless some run already persisted a
    /// structure. Returns false when the course was left as it was.
    pub fn mark_generation_failed(&self, course_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE courses SET generation_status = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND NOT EXISTS (SELECT 1 FROM modules WHERE course_id = ?3)",
                params![GenerationStatus::Failed.as_str(), now(), course_id],
            )?;
            Ok(n > 0)
        })
    }

    /// Move an empty course back to `pending` for another structure run.
    ///
    /// Only a `failed` course, or a `pending` one untouched for longer than
    /// `stale_after` (its run can no longer be alive), is claimed; the
    /// check and the update are one statement, so two callers never both win.
    pub fn claim_regeneration(&self, course_id: i64, stale_after: Duration) -> Result<bool> {
        let age = chrono::Duration::from_std(stale_after)
            .map_err(|e| CourseError::Configuration(format!("structure timeout: {e}")))?;
        let cutoff = stamp(chrono::Utc::now() - age);
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE courses SET generation_status = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND is_deleted = 0 \
                 AND NOT EXISTS (SELECT 1 FROM modules WHERE course_id = ?3) \
                 AND (generation_status = ?4 OR (generation_status = ?1 AND updated_at <= ?5))",
                params![
                    GenerationStatus::Pending.as_str(),
                    now(),
                    course_id,
                    GenerationStatus::Failed.as_str(),
                    cutoff
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_generation_status(&self, course_id: i64, status: GenerationStatus) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE courses SET generation_status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now(), course_id],
            )?;
            Ok(())
        })
    }

    /// Flag the course and everything under it as deleted, in one transaction.
    pub fn soft_delete_course(&self, course_id: i64) -> Result<()> {
        self.transaction(|tx| {
            let ts = now();
            tx.execute(
                "UPDATE lessons SET is_deleted = 1, updated_at = ?2 \
                 WHERE module_id IN (SELECT id FROM modules WHERE course_id = ?1)",
                params![course_id, ts],
            )?;
            tx.execute(
                "UPDATE modules SET is_deleted = 1, updated_at = ?2 WHERE course_id = ?1",
                params![course_id, ts],
            )?;
            tx.execute(
                "UPDATE courses SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
                params![course_id, ts],
            )?;
            Ok(())
        })
    }

    /// Remove a shell course that never received modules. Returns whether a
    /// row was deleted; a course with modules is left alone.
    pub fn discard_course_shell(&self, course_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM courses WHERE id = ?1 \
                 AND NOT EXISTS (SELECT 1 FROM modules WHERE course_id = ?1)",
                [course_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn course_count(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM courses", [], |r| r.get(0))?))
    }
}
