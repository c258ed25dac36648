use anyhow::{Context, Result};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cli::{Args, ProviderKind};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderKind,
    /// Overrides the per-provider default model when set.
    pub model: Option<String>,
    pub gemini_model: String,
    pub groq_model: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub db_path: String,
    pub http_timeout_secs: u64,
    pub structure_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub max_query_chars: usize,
    pub save_transcripts: bool,
    pub transcripts_dir: String,
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub endpoint: String,
    pub max_results: u32,
    pub category_id: String,
    pub relevance_language: String,
    pub safe_search: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Groq,
            model: None,
            gemini_model: "gemini-2.0-flash-lite".into(),
            groq_model: "openai/gpt-oss-120b".into(),
            openai_model: "google/gemma-3-27b-it".into(),
            openai_base_url: "https://api.aimlapi.com/v1".into(),
            db_path: "coursegen.db".into(),
            http_timeout_secs: 120,
            structure_timeout_secs: 30,
            retry_attempts: 3,
            retry_delay_ms: 500,
            max_query_chars: 500,
            save_transcripts: false,
            transcripts_dir: ".coursegen/transcripts".into(),
            video: VideoConfig::default(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/youtube/v3/search".into(),
            max_results: 5,
            category_id: "27".into(),
            relevance_language: "en".into(),
            safe_search: "strict".into(),
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then CLI flags.
    pub fn load(args: &Args) -> Result<Self> {
        let mut cfg = match &args.config {
            Some(path) => Self::from_file(Path::new(path))?,
            None => Self::default(),
        };
        if let Some(p) = args.provider {
            cfg.provider = p;
        }
        if let Some(m) = &args.model {
            cfg.model = Some(m.clone());
        }
        if let Some(db) = &args.db {
            cfg.db_path = db.clone();
        }
        if args.save_transcripts {
            cfg.save_transcripts = true;
        }
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn model_for(&self, kind: ProviderKind) -> String {
        if let Some(m) = &self.model {
            return m.clone();
        }
        match kind {
            ProviderKind::Gemini => self.gemini_model.clone(),
            ProviderKind::Groq => self.groq_model.clone(),
            ProviderKind::OpenAI => self.openai_model.clone(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn structure_timeout(&self) -> Duration {
        Duration::from_secs(self.structure_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { max_attempts: self.retry_attempts, delay: self.retry_delay() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn defaults_match_pipeline_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.structure_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.retry_attempts, 3);
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
        assert_eq!(cfg.video.max_results, 5);
        assert_eq!(cfg.video.category_id, "27");
        assert_eq!(cfg.model_for(ProviderKind::Groq), "openai/gpt-oss-120b");
    }

    #[test]
    fn file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "provider = \"gemini\"\nstructure_timeout_secs = 45\n[video]\nmax_results = 3"
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = Args::parse_from(["coursegen", "--config", &path, "--db", "x.db", "view", "s"]);
        let cfg = Config::load(&args).unwrap();
        assert_eq!(cfg.provider, ProviderKind::Gemini);
        assert_eq!(cfg.structure_timeout_secs, 45);
        assert_eq!(cfg.video.max_results, 3);
        assert_eq!(cfg.video.safe_search, "strict");
        assert_eq!(cfg.db_path, "x.db");

        let args = Args::parse_from(["coursegen", "--config", &path, "--model", "m", "view", "s"]);
        let cfg = Config::load(&args).unwrap();
        assert_eq!(cfg.model_for(ProviderKind::Gemini), "m");
    }
}
