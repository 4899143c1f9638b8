//! Web search augmentation behind a global cooldown.
//!
//! Searches go to the Brave Search web API. A search is refused while the
//! cooldown since the last successful search is still running; the check,
//! the call and the timestamp update all happen under one lock, so
//! concurrent requests cannot slip through on a stale timestamp.

use crate::config::{ProxyConfig, SearchConfig};
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Formatted, numbered result list ready to hand to the model.
    Results(String),
    NoResults,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search is cooling down, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Search failed: {message}")]
    Failed { message: String },
}

impl SearchError {
    fn failed(msg: impl Into<String>) -> Self {
        Self::Failed {
            message: msg.into(),
        }
    }
}

/// Minimum spacing between successful searches.
#[derive(Debug, Clone)]
pub struct Cooldown {
    window: Duration,
    last_success: Option<Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_success: None,
        }
    }

    /// Time left before another search is allowed, if any.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_success?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed < self.window).then(|| self.window - elapsed)
    }

    pub fn record(&mut self, now: Instant) {
        self.last_success = Some(now);
    }
}

/// Whole seconds to wait, rounded up and never zero.
pub fn retry_after_secs(remaining: Duration) -> u64 {
    let millis = remaining.as_millis();
    let secs = millis / 1000 + u128::from(millis % 1000 != 0);
    u64::try_from(secs).unwrap_or(u64::MAX).max(1)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Default, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Numbered `title / description / URL` entries separated by blank lines.
pub fn format_results(hits: &[SearchHit], max: usize) -> String {
    hits.iter()
        .take(max)
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. {}\n{}\nURL: {}",
                i + 1,
                hit.title.trim(),
                hit.description.trim(),
                hit.url.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct SearchAugmenter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_results: usize,
    timeout: Duration,
    cooldown: Mutex<Cooldown>,
}

impl SearchAugmenter {
    pub fn new(client: reqwest::Client, config: &SearchConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
            max_results: config.max_results,
            timeout: Duration::from_secs(config.timeout_secs),
            cooldown: Mutex::new(Cooldown::new(Duration::from_secs(config.cooldown_secs))),
        }
    }

    /// Build the augmenter if search is enabled and its key is present.
    pub fn from_config(client: reqwest::Client, config: &ProxyConfig) -> Option<Self> {
        if !config.search.enabled {
            return None;
        }
        match config.resolve_search_key() {
            Some(key) => Some(Self::new(client, &config.search, key)),
            None => {
                tracing::warn!(
                    env = %config.search.api_key_env,
                    "Search is enabled but no API key is set; search augmentation disabled"
                );
                None
            }
        }
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        let mut cooldown = self.cooldown.lock().await;

        if let Some(remaining) = cooldown.remaining(Instant::now()) {
            return Err(SearchError::RateLimited {
                retry_after_secs: retry_after_secs(remaining),
            });
        }

        let hits = self.fetch(query).await?;
        cooldown.record(Instant::now());

        tracing::debug!(hits = hits.len(), "Search completed");

        if hits.is_empty() {
            Ok(SearchOutcome::NoResults)
        } else {
            Ok(SearchOutcome::Results(format_results(&hits, self.max_results)))
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let count = self.max_results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("count", count.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SearchError::failed(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::failed(format!(
                "Search API returned status {}",
                status.as_u16()
            )));
        }

        let parsed: BraveResponse = response
            .json()
            .await
            .map_err(|e| SearchError::failed(format!("Failed to parse search response: {e}")))?;

        Ok(parsed.web.map(|w| w.results).unwrap_or_default())
    }
}
