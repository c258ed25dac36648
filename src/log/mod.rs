use fs_err as fs;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::EnvFilter;
use uuid::Uuid;

use crate::config::Config;
use crate::wire::Message;

/// Stderr logging filtered by `RUST_LOG`, `coursegen=info` when unset.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coursegen=info"));
    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Per-run record of every model exchange, written as
/// `<transcripts_dir>/<run-id>/<stage>.json`. Disabled transcripts accept
/// and drop everything.
#[derive(Debug, Clone)]
pub struct Transcript {
    run_id: Uuid,
    dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct Exchange<'a> {
    run_id: String,
    stage: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    completion: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_dir(root: &Path, run_id: Uuid) -> PathBuf {
    root.join(run_id.to_string())
}

impl Transcript {
    pub fn new(cfg: &Config) -> Self {
        let run_id = Uuid::new_v4();
        let dir = cfg
            .save_transcripts
            .then(|| run_dir(Path::new(&cfg.transcripts_dir), run_id));
        Self { run_id, dir }
    }

    pub fn disabled() -> Self {
        Self { run_id: Uuid::new_v4(), dir: None }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Save one exchange. Write failures are logged and swallowed.
    pub fn record(
        &self,
        stage: &str,
        messages: &[Message],
        outcome: Result<&str, &crate::errors::CourseError>,
    ) {
        let Some(dir) = &self.dir else { return };
        let exchange = Exchange {
            run_id: self.run_id.to_string(),
            stage,
            messages,
            completion: outcome.ok(),
            error: outcome.err().map(|e| e.to_string()),
        };
        if let Err(e) = write_exchange(dir, stage, &exchange) {
            tracing::warn!(stage, dir = %dir.display(), error = %e, "could not save transcript");
        }
    }
}

fn write_exchange(dir: &Path, stage: &str, exchange: &Exchange<'_>) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stage}.json"));
    fs::write(&path, to_string_pretty(exchange)?)?;
    Ok(path)
}
