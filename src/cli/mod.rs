use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(alias = "google")]
    Gemini,
    Groq,
    #[value(name = "openai", alias = "open-ai")]
    OpenAI,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAI => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Parser, Debug)]
#[command(name = "coursegen", version, about = "Generate structured courses from a learning goal with an LLM")]
pub struct Args {
    /// Owner identity every course operation is scoped to.
    #[arg(long, global = true, default_value = "local-user")]
    pub user: String,

    #[arg(long, global = true)]
    pub config: Option<String>,

    #[arg(long, global = true)]
    pub db: Option<String>,

    #[arg(long, global = true, value_enum)]
    pub provider: Option<ProviderKind>,

    #[arg(long, global = true)]
    pub model: Option<String>,

    #[arg(long, global = true, default_value_t = false)]
    pub save_transcripts: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a learning goal, synthesize metadata and build the course structure.
    Create {
        prompt: String,
        /// Print the course shell and finish the structure without progress output.
        #[arg(long, default_value_t = false)]
        detach: bool,
    },
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value = "")]
        search: String,
    },
    Stats {
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    View {
        slug: String,
    },
    Modules {
        slug: String,
    },
    Delete {
        slug: String,
    },
    /// Open a lesson, generating its content on first view.
    Lesson {
        course: String,
        module: String,
        lesson: String,
    },
    Complete {
        course: String,
        module: String,
        lesson: String,
        #[arg(long, default_value_t = false)]
        undo: bool,
    },
    /// Rebuild modules and lessons for a course left empty by a failed generation.
    Regenerate {
        slug: String,
    },
    Videos {
        query: String,
    },
}
