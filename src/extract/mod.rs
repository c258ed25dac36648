use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use crate::errors::{CourseError, Result};

fn leading_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\A\s*```(?:json)?[ \t]*").expect("valid regex"))
}

fn trailing_fences() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\s*```)+\s*\z").expect("valid regex"))
}

/// Strip one leading code fence (optionally tagged `json`) and any trailing
/// fences. Fences inside the payload, e.g. in code block text, are left alone.
pub fn extract_json(raw: &str) -> String {
    let s = leading_fence().replace(raw, "");
    let s = trailing_fences().replace(&s, "");
    s.trim().to_string()
}

/// `extract_json` then deserialize. No repair is attempted; a failure is a
/// `Parse` error the caller may answer with a fresh prompt.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = extract_json(raw);
    serde_json::from_str(&cleaned).map_err(|e| {
        CourseError::Parse(format!("{e} (response began with {:?})", preview(&cleaned)))
    })
}

fn preview(s: &str) -> String {
    s.chars().take(80).collect()
}
