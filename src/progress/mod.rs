use rusqlite::{params, OptionalExtension, Transaction};
use serde::Serialize;

use crate::errors::{CourseError, Result};
use crate::store::{now, Database};

/// Completion state after a lesson update, bottom-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollup {
    pub lesson_id: i64,
    pub lesson_completed: bool,
    pub module_completed: bool,
    pub course_completed: bool,
}

/// Set a lesson's completion flag and recompute its module and course.
///
/// A module is complete when all of its live lessons are; a course when all
/// of its live modules are. The three writes share one transaction, so two
/// sibling updates cannot both read stale counts.
pub fn set_lesson_completion(db: &Database, lesson_id: i64, complete: bool) -> Result<Rollup> {
    db.transaction(|tx| {
        let ts = now();
        let module_id: i64 = tx
            .query_row(
                "SELECT module_id FROM lessons WHERE id = ?1 AND is_deleted = 0",
                [lesson_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or(CourseError::LessonNotFound)?;
        tx.execute(
            "UPDATE lessons SET is_completed = ?1, updated_at = ?2 WHERE id = ?3",
            params![complete, ts, lesson_id],
        )?;

        let module_completed = all_complete(tx, "lessons", "module_id", module_id)?;
        tx.execute(
            "UPDATE modules SET is_completed = ?1, updated_at = ?2 WHERE id = ?3",
            params![module_completed, ts, module_id],
        )?;

        let course_id: i64 =
            tx.query_row("SELECT course_id FROM modules WHERE id = ?1", [module_id], |r| r.get(0))?;
        let course_completed = all_complete(tx, "modules", "course_id", course_id)?;
        tx.execute(
            "UPDATE courses SET is_completed = ?1, updated_at = ?2 WHERE id = ?3",
            params![course_completed, ts, course_id],
        )?;

        tracing::debug!(lesson_id, complete, module_completed, course_completed, "progress rolled up");
        Ok(Rollup { lesson_id, lesson_completed: complete, module_completed, course_completed })
    })
}

// true when the parent has at least one live child and none is incomplete
fn all_complete(tx: &Transaction<'_>, table: &str, parent_col: &str, parent_id: i64) -> Result<bool> {
    let (total, done): (i64, i64) = tx.query_row(
        &format!(
            "SELECT COUNT(*), COALESCE(SUM(is_completed), 0) FROM {table} \
             WHERE {parent_col} = ?1 AND is_deleted = 0"
        ),
        [parent_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(total > 0 && total == done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{course_with_structure, structure};

    fn lesson_ids(db: &Database, course_id: i64) -> Vec<Vec<i64>> {
        db.list_modules(course_id)
            .unwrap()
            .iter()
            .map(|m| m.lessons.iter().map(|l| l.id).collect())
            .collect()
    }

    #[test]
    fn completing_every_lesson_completes_module_then_course() {
        let db = Database::open_in_memory().unwrap();
        let c = course_with_structure(&db, "u", "Trees", structure(&[("A", &["a1", "a2"]), ("B", &["b1"])]));
        let ids = lesson_ids(&db, c.id);

        let r = set_lesson_completion(&db, ids[0][0], true).unwrap();
        assert!(!r.module_completed);
        let r = set_lesson_completion(&db, ids[0][1], true).unwrap();
        assert!(r.module_completed);
        assert!(!r.course_completed);
        let r = set_lesson_completion(&db, ids[1][0], true).unwrap();
        assert!(r.module_completed && r.course_completed);
        assert!(db.course_by_id(c.id).unwrap().unwrap().is_completed);
    }

    #[test]
    fn uncompleting_one_lesson_flips_both_ancestors() {
        let db = Database::open_in_memory().unwrap();
        let c = course_with_structure(&db, "u", "Trees", structure(&[("A", &["a1", "a2"]), ("B", &["b1"])]));
        for id in lesson_ids(&db, c.id).concat() {
            set_lesson_completion(&db, id, true).unwrap();
        }
        let first = lesson_ids(&db, c.id)[0][0];
        let r = set_lesson_completion(&db, first, false).unwrap();
        assert_eq!(
            r,
            Rollup { lesson_id: first, lesson_completed: false, module_completed: false, course_completed: false }
        );
        let modules = db.list_modules(c.id).unwrap();
        assert!(!modules[0].module.is_completed);
        assert!(modules[1].module.is_completed);
        assert!(!db.course_by_id(c.id).unwrap().unwrap().is_completed);
    }

    #[test]
    fn unknown_lesson_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(set_lesson_completion(&db, 999, true), Err(CourseError::LessonNotFound)));
    }
}
