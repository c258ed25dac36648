use crate::errors::{CourseError, Result};

/// Shape check on the raw prompt, applied before any model call.
///
/// Rules:
/// - Surrounding whitespace is trimmed; the trimmed text is what the
///   pipeline sees from here on.
/// - Empty after trimming is rejected.
/// - Longer than `max_chars` characters (not bytes) is rejected.
///
/// Topic, safety and intent checks belong to the validation stage.
pub fn check_query(raw: &str, max_chars: usize) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CourseError::BadRequest("prompt is required".into()));
    }
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(CourseError::BadRequest(format!(
            "prompt is {len} characters; the limit is {max_chars}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Non-blank search text, trimmed.
pub fn check_search(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CourseError::BadRequest("search query is required".into()));
    }
    Ok(trimmed.to_string())
}

/// 1-based page and positive limit.
pub fn check_page(page: i64, limit: i64) -> Result<()> {
    if page < 1 {
        return Err(CourseError::BadRequest(format!("page must be at least 1, got {page}")));
    }
    if limit < 1 {
        return Err(CourseError::BadRequest(format!("limit must be at least 1, got {limit}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_accepts() {
        assert_eq!(check_query("  learn binary search trees \n", 500).unwrap(), "learn binary search trees");
    }

    #[test]
    fn rejects_blank() {
        assert!(matches!(check_query(" \t\n", 500), Err(CourseError::BadRequest(_))));
        assert!(check_search("   ").is_err());
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let q = "é".repeat(500);
        assert!(check_query(&q, 500).is_ok());
        assert!(check_query(&format!("{q}x"), 500).is_err());
    }

    #[test]
    fn pages_start_at_one() {
        assert!(check_page(1, 20).is_ok());
        assert!(check_page(0, 20).is_err());
        assert!(check_page(1, 0).is_err());
    }
}
