use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CourseError>;

#[derive(Error, Debug)]
pub enum CourseError {
    #[error("query rejected: {}", reasons.join("; "))]
    Rejected { reasons: Vec<String> },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("course not found")]
    CourseNotFound,
    #[error("module not found")]
    ModuleNotFound,
    #[error("lesson not found")]
    LessonNotFound,
    #[error("AI returned invalid JSON: {0}")]
    AiResponseInvalid(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("provider error ({provider}, status {status:?}): {message}")]
    Provider {
        provider: String,
        status: Option<u16>,
        message: String,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("video search failed: {0}")]
    VideoSearch(String),
    #[error("structure error: {0}")]
    Structure(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// JSON envelope returned to callers for any failed operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub success: bool,
    pub message: String,
    pub errors: Vec<String>,
    pub error_code: &'static str,
}

impl CourseError {
    pub fn provider(provider: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        CourseError::Provider {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            CourseError::Rejected { .. } => 422,
            CourseError::BadRequest(_) => 400,
            CourseError::CourseNotFound
            | CourseError::ModuleNotFound
            | CourseError::LessonNotFound => 404,
            CourseError::Provider { .. } | CourseError::VideoSearch(_) => 502,
            CourseError::Timeout(_) => 504,
            CourseError::AiResponseInvalid(_)
            | CourseError::Parse(_)
            | CourseError::Configuration(_)
            | CourseError::Structure(_)
            | CourseError::Storage(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            CourseError::Rejected { .. } => "QUERY_REJECTED",
            CourseError::BadRequest(_) => "BAD_REQUEST",
            CourseError::CourseNotFound => "COURSE_NOT_FOUND",
            CourseError::ModuleNotFound => "MODULE_NOT_FOUND",
            CourseError::LessonNotFound => "LESSON_NOT_FOUND",
            CourseError::AiResponseInvalid(_) => "AI_RESPONSE_INVALID",
            CourseError::Provider { .. } => "AI_PROVIDER_ERROR",
            CourseError::VideoSearch(_) => "VIDEO_SEARCH_FAILED",
            CourseError::Timeout(_) => "TIMEOUT",
            CourseError::Parse(_)
            | CourseError::Configuration(_)
            | CourseError::Structure(_)
            | CourseError::Storage(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Caller-facing form. Rejections and bad requests keep their detail;
    /// infrastructure failures collapse to a short generic message.
    pub fn to_body(&self) -> ErrorBody {
        let (message, errors) = match self {
            CourseError::Rejected { reasons } => {
                ("Invalid user query from AI model".to_string(), reasons.clone())
            }
            CourseError::BadRequest(msg) => ("Validation Error".to_string(), vec![msg.clone()]),
            CourseError::CourseNotFound => ("Course not found".to_string(), vec![]),
            CourseError::ModuleNotFound => ("Module not found".to_string(), vec![]),
            CourseError::LessonNotFound => ("Lesson not found".to_string(), vec![]),
            CourseError::AiResponseInvalid(_) => ("AI returned invalid JSON".to_string(), vec![]),
            CourseError::Provider { .. } => ("AI provider is unavailable".to_string(), vec![]),
            CourseError::VideoSearch(_) => ("Video search is unavailable".to_string(), vec![]),
            CourseError::Timeout(_) => ("Request timed out".to_string(), vec![]),
            _ => ("Something went wrong".to_string(), vec![]),
        };
        ErrorBody {
            status_code: self.status_code(),
            success: false,
            message,
            errors,
            error_code: self.error_code(),
        }
    }
}

impl From<serde_json::Error> for CourseError {
    fn from(e: serde_json::Error) -> Self {
        CourseError::Parse(e.to_string())
    }
}
