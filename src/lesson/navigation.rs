use serde::Serialize;

use crate::errors::Result;
use crate::store::lessons::{Direction, LessonSummary};
use crate::store::{Database, ModuleRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRef {
    pub module_slug: String,
    pub lesson_slug: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub previous: Option<LessonRef>,
    pub next: Option<LessonRef>,
}

/// Neighbours of `lesson_id` within the course. Inside a module the sibling
/// list decides; at a module boundary the nearest module in that direction
/// that still has lessons supplies its first (or last) lesson.
pub fn resolve(
    db: &Database,
    module: &ModuleRecord,
    siblings: &[LessonSummary],
    lesson_id: i64,
) -> Result<Navigation> {
    let Some(idx) = siblings.iter().position(|l| l.id == lesson_id) else {
        return Ok(Navigation::default());
    };
    let here = |l: &LessonSummary| LessonRef { module_slug: module.slug.clone(), lesson_slug: l.slug.clone() };

    let next = match siblings.get(idx + 1) {
        Some(l) => Some(here(l)),
        None => across(db, module, Direction::Next)?,
    };
    let previous = match idx.checked_sub(1).and_then(|i| siblings.get(i)) {
        Some(l) => Some(here(l)),
        None => across(db, module, Direction::Previous)?,
    };
    Ok(Navigation { previous, next })
}

fn across(db: &Database, from: &ModuleRecord, direction: Direction) -> Result<Option<LessonRef>> {
    let mut order = from.order;
    while let Some(module) = db.adjacent_module(from.course_id, order, direction)? {
        let lessons = db.lessons_in_module(module.id)?;
        let edge = match direction {
            Direction::Next => lessons.first(),
            Direction::Previous => lessons.last(),
        };
        if let Some(l) = edge {
            return Ok(Some(LessonRef { module_slug: module.slug.clone(), lesson_slug: l.slug.clone() }));
        }
        order = module.order;
    }
    Ok(None)
}
