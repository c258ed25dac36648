use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, VideoConfig};
use crate::errors::{CourseError, Result};

/// Keyword search returning video ids, best match first.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<String>>;
}

pub type DynVideoSearch = Arc<dyn VideoSearch>;

pub fn make_video_search(cfg: &Config) -> DynVideoSearch {
    Arc::new(YouTubeSearch::new(
        std::env::var("YOUTUBE_API_KEY").unwrap_or_default(),
        cfg.video.clone(),
        cfg.http_timeout(),
    ))
}

/// YouTube Data API v3 `search.list`, restricted to safe educational videos.
pub struct YouTubeSearch {
    api_key: String,
    cfg: VideoConfig,
    client: Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: ItemId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    #[serde(default)]
    video_id: Option<String>,
}

impl YouTubeSearch {
    pub fn new(api_key: String, cfg: VideoConfig, timeout: Duration) -> Self {
        Self { api_key, cfg, client: Client::new(), timeout }
    }

    fn query_params<'a>(&'a self, query: &'a str) -> Vec<(&'static str, String)> {
        vec![
            ("part", "snippet".into()),
            ("type", "video".into()),
            ("q", query.to_string()),
            ("maxResults", self.cfg.max_results.to_string()),
            ("videoCategoryId", self.cfg.category_id.clone()),
            ("relevanceLanguage", self.cfg.relevance_language.clone()),
            ("safeSearch", self.cfg.safe_search.clone()),
            ("key", self.api_key.clone()),
        ]
    }
}

/// Ids in result order; channel and playlist hits carry no `videoId` and are skipped.
fn parse_ids(body: &str) -> Result<Vec<String>> {
    let parsed: SearchResponse = serde_json::from_str(body)
        .map_err(|e| CourseError::VideoSearch(format!("unreadable response body: {e}")))?;
    Ok(parsed.items.into_iter().filter_map(|i| i.id.video_id).collect())
}

#[async_trait]
impl VideoSearch for YouTubeSearch {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        if self.api_key.trim().is_empty() {
            return Err(CourseError::Configuration("YOUTUBE_API_KEY env var is not set".into()));
        }
        tracing::debug!(query, "video search");
        let resp = self
            .client
            .get(&self.cfg.endpoint)
            .query(&self.query_params(query))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CourseError::VideoSearch(e.to_string()))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| CourseError::VideoSearch(e.to_string()))?;
        if !status.is_success() {
            return Err(CourseError::VideoSearch(format!("status {status}: {text}")));
        }
        parse_ids(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_video_ids_in_order() {
        let body = r#"{"items":[
            {"id":{"kind":"youtube#video","videoId":"aaa"}},
            {"id":{"kind":"youtube#channel","channelId":"ccc"}},
            {"id":{"kind":"youtube#video","videoId":"bbb"}}
        ]}"#;
        assert_eq!(parse_ids(body).unwrap(), vec!["aaa", "bbb"]);
        assert!(parse_ids("{}").unwrap().is_empty());
        assert!(matches!(parse_ids("nope"), Err(CourseError::VideoSearch(_))));
    }

    #[test]
    fn sends_educational_filters() {
        let yt = YouTubeSearch::new("k".into(), VideoConfig::default(), Duration::from_secs(5));
        let params = yt.query_params("bst insertion");
        let get = |name: &str| params.iter().find(|(k, _)| *k == name).map(|(_, v)| v.as_str());
        assert_eq!(get("videoCategoryId"), Some("27"));
        assert_eq!(get("safeSearch"), Some("strict"));
        assert_eq!(get("maxResults"), Some("5"));
        assert_eq!(get("q"), Some("bst insertion"));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let yt = YouTubeSearch::new(String::new(), VideoConfig::default(), Duration::from_secs(5));
        assert!(matches!(yt.search("x").await, Err(CourseError::Configuration(_))));
    }
}
