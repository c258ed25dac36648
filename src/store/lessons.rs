use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::{lesson_from_row, module_from_row, now, Database, LessonRecord, ModuleRecord, LESSON_COLUMNS, MODULE_COLUMNS};
use crate::errors::{CourseError, Result};
use crate::wire::ContentBlock;

/// Lesson columns for listings, qualified for use against `lessons l`.
pub(crate) const LESSON_SUMMARY_COLUMNS: &str =
    "l.id, l.title, l.slug, l.ord, l.description, l.estimated_minutes, l.is_completed";

/// Lesson without its content, as shown in course and module listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub order: i64,
    pub description: String,
    pub estimated_minutes: i64,
    pub is_completed: bool,
}

impl LessonSummary {
    pub(crate) fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(at)?,
            title: row.get(at + 1)?,
            slug: row.get(at + 2)?,
            order: row.get(at + 3)?,
            description: row.get(at + 4)?,
            estimated_minutes: row.get(at + 5)?,
            is_completed: row.get(at + 6)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl Database {
    /// Live module of `course_id` with this slug.
    pub fn find_module(&self, course_id: i64, slug: &str) -> Result<ModuleRecord> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {MODULE_COLUMNS} FROM modules \
                         WHERE course_id = ?1 AND slug = ?2 AND is_deleted = 0"
                    ),
                    params![course_id, slug],
                    module_from_row,
                )
                .optional()?)
        })?
        .ok_or(CourseError::ModuleNotFound)
    }

    /// Live lesson of `module_id` with this slug.
    pub fn find_lesson(&self, module_id: i64, slug: &str) -> Result<LessonRecord> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {LESSON_COLUMNS} FROM lessons \
                         WHERE module_id = ?1 AND slug = ?2 AND is_deleted = 0"
                    ),
                    params![module_id, slug],
                    lesson_from_row,
                )
                .optional()?)
        })?
        .ok_or(CourseError::LessonNotFound)
    }

    pub fn lesson_by_id(&self, id: i64) -> Result<Option<LessonRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1"),
                    [id],
                    lesson_from_row,
                )
                .optional()?)
        })
    }

    /// Live lessons of a module in order.
    pub fn lessons_in_module(&self, module_id: i64) -> Result<Vec<LessonSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LESSON_SUMMARY_COLUMNS} FROM lessons l \
                 WHERE l.module_id = ?1 AND l.is_deleted = 0 ORDER BY l.ord"
            ))?;
            let rows = stmt
                .query_map([module_id], |r| LessonSummary::from_row(r, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// The live module immediately before or after `order` in the course.
    pub fn adjacent_module(
        &self,
        course_id: i64,
        order: i64,
        direction: Direction,
    ) -> Result<Option<ModuleRecord>> {
        let (cmp, sort) = match direction {
            Direction::Previous => ("<", "DESC"),
            Direction::Next => (">", "ASC"),
        };
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {MODULE_COLUMNS} FROM modules \
                         WHERE course_id = ?1 AND is_deleted = 0 AND ord {cmp} ?2 \
                         ORDER BY ord {sort} LIMIT 1"
                    ),
                    params![course_id, order],
                    module_from_row,
                )
                .optional()?)
        })
    }

    /// Store generated content and its videos in one write.
    pub fn save_lesson_content(
        &self,
        lesson_id: i64,
        content: &[ContentBlock],
        videos: &[String],
    ) -> Result<()> {
        let content = serde_json::to_string(content)?;
        let videos = serde_json::to_string(videos)?;
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE lessons SET content = ?1, yt_videos = ?2, updated_at = ?3 WHERE id = ?4",
                params![content, videos, now(), lesson_id],
            )?;
            if n == 0 {
                return Err(CourseError::LessonNotFound);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{course_with_structure, structure};

    #[test]
    fn slug_chain_lookups_are_scoped_to_parent() {
        let db = Database::open_in_memory().unwrap();
        let a = course_with_structure(&db, "u", "Trees", structure(&[("Basics", &["Intro", "Nodes"])]));
        let b = course_with_structure(&db, "u", "Graphs", structure(&[("Basics", &["Intro"])]));

        let ma = db.find_module(a.id, "basics").unwrap();
        assert!(matches!(db.find_module(b.id, "basics"), Err(CourseError::ModuleNotFound)));
        let mb = db.find_module(b.id, "basics-1").unwrap();

        assert_eq!(db.find_lesson(ma.id, "intro").unwrap().title, "Intro");
        assert!(matches!(db.find_lesson(mb.id, "intro"), Err(CourseError::LessonNotFound)));
        assert_eq!(db.find_lesson(mb.id, "intro-1").unwrap().title, "Intro");
    }

    #[test]
    fn adjacent_modules_follow_order() {
        let db = Database::open_in_memory().unwrap();
        let c = course_with_structure(
            &db,
            "u",
            "Trees",
            structure(&[("One", &["a"]), ("Two", &["b"]), ("Three", &["c"])]),
        );
        let two = db.find_module(c.id, "two").unwrap();
        assert_eq!(db.adjacent_module(c.id, two.order, Direction::Next).unwrap().unwrap().slug, "three");
        assert_eq!(db.adjacent_module(c.id, two.order, Direction::Previous).unwrap().unwrap().slug, "one");
        assert!(db.adjacent_module(c.id, 3, Direction::Next).unwrap().is_none());
    }

    #[test]
    fn content_round_trips_through_storage() {
        let db = Database::open_in_memory().unwrap();
        let c = course_with_structure(&db, "u", "Trees", structure(&[("Basics", &["Intro"])]));
        let m = db.find_module(c.id, "basics").unwrap();
        let lesson = db.find_lesson(m.id, "intro").unwrap();
        assert!(lesson.content.is_none());
        assert!(lesson.yt_videos.is_empty());

        let blocks = vec![ContentBlock::Paragraph { text: "hi".into() }];
        db.save_lesson_content(lesson.id, &blocks, &["abc123".into()]).unwrap();

        let lesson = db.lesson_by_id(lesson.id).unwrap().unwrap();
        let stored: Vec<ContentBlock> = serde_json::from_value(lesson.content.unwrap()).unwrap();
        assert_eq!(stored, blocks);
        assert_eq!(lesson.yt_videos, vec!["abc123"]);
    }

    #[test]
    fn saving_unknown_lesson_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.save_lesson_content(42, &[], &[]), Err(CourseError::LessonNotFound)));
    }
}
