use rusqlite::params;
use serde::Serialize;
use std::collections::HashMap;

use super::{insert_with_unique_slug, now, Database, GenerationStatus};
use crate::errors::{CourseError, Result};
use crate::wire::GeneratedCourse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    pub modules: usize,
    pub lessons: usize,
}

impl Database {
    /// Insert every module, then every lesson, then mark the course `ready`,
    /// all in one transaction. Module order is the array position; lesson
    /// order comes from the generated tree, falling back to position.
    ///
    /// On error nothing from this call is visible; the shell course itself
    /// is untouched.
    pub fn persist_structure(&self, course_id: i64, course: &GeneratedCourse) -> Result<PersistSummary> {
        self.transaction(|tx| {
            let ts = now();

            let mut module_ids: HashMap<&str, i64> = HashMap::with_capacity(course.modules.len());
            for (i, module) in course.modules.iter().enumerate() {
                let (id, _) = insert_with_unique_slug(tx, "modules", &module.title, |conn, slug| {
                    conn.execute(
                        "INSERT INTO modules (course_id, title, slug, description, ord, created_at, updated_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                        params![course_id, module.title, slug, module.description, i as i64 + 1, ts],
                    )?;
                    Ok(())
                })?;
                if module_ids.insert(module.title.as_str(), id).is_some() {
                    return Err(CourseError::Structure(format!(
                        "duplicate module title {:?}",
                        module.title
                    )));
                }
            }

            let mut lessons = 0;
            for module in &course.modules {
                let module_id = *module_ids.get(module.title.as_str()).ok_or_else(|| {
                    CourseError::Structure(format!("unknown module {:?}", module.title))
                })?;
                for (j, lesson) in module.lessons.iter().enumerate() {
                    let order = lesson.order.filter(|o| *o > 0).unwrap_or(j as i64 + 1);
                    insert_with_unique_slug(tx, "lessons", &lesson.title, |conn, slug| {
                        conn.execute(
                            "INSERT INTO lessons (module_id, title, slug, ord, description, \
                             estimated_minutes, created_at, updated_at) \
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                            params![
                                module_id,
                                lesson.title,
                                slug,
                                order,
                                lesson.description,
                                lesson.estimated_minutes.unwrap_or(0),
                                ts,
                            ],
                        )?;
                        Ok(())
                    })?;
                    lessons += 1;
                }
            }

            tx.execute(
                "UPDATE courses SET generation_status = ?1, updated_at = ?2 WHERE id = ?3",
                params![GenerationStatus::Ready.as_str(), ts, course_id],
            )?;

            Ok(PersistSummary { modules: course.modules.len(), lessons })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_course, structure};

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|c| Ok(c.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn persists_modules_then_lessons_and_marks_ready() {
        let db = Database::open_in_memory().unwrap();
        let c = db.create_course_shell(&new_course("Trees", "u")).unwrap();
        let tree = structure(&[("Basics", &["Intro", "Nodes"]), ("Balancing", &["Rotations"])]);

        let summary = db.persist_structure(c.id, &tree).unwrap();
        assert_eq!(summary, PersistSummary { modules: 2, lessons: 3 });

        let modules = db.list_modules(c.id).unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].module.order, 1);
        assert_eq!(modules[1].module.order, 2);
        let titles: Vec<_> = modules[0].lessons.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["Intro", "Nodes"]);
        assert_eq!(
            db.course_by_id(c.id).unwrap().unwrap().generation_status,
            GenerationStatus::Ready
        );
    }

    #[test]
    fn lesson_failure_rolls_back_modules_too() {
        let db = Database::open_in_memory().unwrap();
        let c = db.create_course_shell(&new_course("Trees", "u")).unwrap();
        let mut tree = structure(&[("Basics", &["Intro", "Nodes"]), ("Balancing", &["Rotations"])]);
        // same order twice within one module violates (module_id, ord)
        let dup = tree.modules[1].lessons[0].clone();
        tree.modules[1].lessons.push(dup);
        tree.modules[1].lessons[1].title = "Rotations again".into();

        assert!(db.persist_structure(c.id, &tree).is_err());
        assert_eq!(count(&db, "modules"), 0);
        assert_eq!(count(&db, "lessons"), 0);
        assert_eq!(
            db.course_by_id(c.id).unwrap().unwrap().generation_status,
            GenerationStatus::Pending
        );
    }

    #[test]
    fn ambiguous_module_titles_abort_the_transaction() {
        let db = Database::open_in_memory().unwrap();
        let c = db.create_course_shell(&new_course("Trees", "u")).unwrap();
        let tree = structure(&[("Basics", &["Intro"]), ("Basics", &["More"])]);

        let err = db.persist_structure(c.id, &tree).unwrap_err();
        assert!(matches!(err, CourseError::Structure(_)));
        assert_eq!(count(&db, "modules"), 0);
    }

    #[test]
    fn repeated_titles_within_a_course_get_distinct_slugs() {
        let db = Database::open_in_memory().unwrap();
        let c = db.create_course_shell(&new_course("Trees", "u")).unwrap();
        let tree = structure(&[("Basics", &["Summary"]), ("Advanced", &["Summary"])]);
        db.persist_structure(c.id, &tree).unwrap();

        let modules = db.list_modules(c.id).unwrap();
        assert_eq!(modules[0].lessons[0].slug, "summary");
        assert_eq!(modules[1].lessons[0].slug, "summary-1");
    }
}
