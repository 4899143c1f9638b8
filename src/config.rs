use crate::error::{ProxyError, Result};
use crate::models::default_model_table;
use crate::translate::paragraphs::DEFAULT_MAX_PARAGRAPHS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub port: u16,
    pub upstream: UpstreamConfig,
    pub response: ResponseConfig,
    pub search: SearchConfig,
    /// Caller-facing model name -> upstream model identifier.
    pub models: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub name: String,
    pub base_url: String,
    pub api_key_env: String,
    /// Upstream model used when the caller's model is not in `models`.
    pub default_model: String,
    pub default_temperature: f64,
    pub default_max_tokens: u64,
    /// Request timeout. Unset means the HTTP client's defaults apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Model name echoed back when the caller did not send one.
    pub default_model_name: String,
    /// Maximum paragraphs per reply. Unset disables the cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_cap: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key_env: String,
    pub cooldown_secs: u64,
    pub max_results: usize,
    /// Bound on each search call. The cooldown lock is held for the call.
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 10000,
            upstream: UpstreamConfig::default(),
            response: ResponseConfig::default(),
            search: SearchConfig::default(),
            models: default_model_table(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            name: "nvidia-nim".to_string(),
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            api_key_env: "NIM_API_KEY".to_string(),
            default_model: "deepseek-ai/deepseek-r1-0528".to_string(),
            default_temperature: 0.8,
            default_max_tokens: 3000,
            timeout_secs: None,
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            default_model_name: "gpt-4o".to_string(),
            paragraph_cap: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.search.brave.com/res/v1/web/search".to_string(),
            api_key_env: "BRAVE_API_KEY".to_string(),
            cooldown_secs: 30,
            max_results: 5,
            timeout_secs: 10,
        }
    }
}

impl ProxyConfig {
    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir > built-in defaults
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Overlay settings taken from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(PORT_ENV) {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.port = raw.parse().map_err(|_| {
                    ProxyError::config(format!("{PORT_ENV}='{raw}' is not a valid port number"))
                })?;
            }
        }
        Ok(())
    }

    /// Reject settings that would only fail later at request time.
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.upstream.base_url).map_err(|e| {
            ProxyError::config(format!(
                "upstream.base_url '{}' is not a valid URL: {}",
                self.upstream.base_url, e
            ))
        })?;

        if self.upstream.default_model.trim().is_empty() {
            return Err(ProxyError::config("upstream.default_model must not be empty"));
        }

        if let Some((name, _)) = self.models.iter().find(|(_, target)| target.trim().is_empty()) {
            return Err(ProxyError::config(format!(
                "models.\"{name}\" maps to an empty upstream model"
            )));
        }

        if self.response.paragraph_cap == Some(0) {
            return Err(ProxyError::config(format!(
                "response.paragraph_cap must be at least 1 (the usual value is {DEFAULT_MAX_PARAGRAPHS})"
            )));
        }

        if self.search.enabled {
            reqwest::Url::parse(&self.search.base_url).map_err(|e| {
                ProxyError::config(format!(
                    "search.base_url '{}' is not a valid URL: {}",
                    self.search.base_url, e
                ))
            })?;
            if self.search.max_results == 0 {
                return Err(ProxyError::config("search.max_results must be at least 1"));
            }
            if self.search.timeout_secs == 0 {
                return Err(ProxyError::config("search.timeout_secs must be at least 1"));
            }
        }

        Ok(())
    }

    /// Full URL of the upstream chat completions endpoint.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.upstream.base_url.trim_end_matches('/'))
    }

    /// Resolve the upstream API key from the configured environment variable.
    /// Unset and blank both count as "not configured".
    pub fn resolve_api_key(&self) -> Option<String> {
        non_empty_env(&self.upstream.api_key_env)
    }

    pub fn resolve_search_key(&self) -> Option<String> {
        non_empty_env(&self.search.api_key_env)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("nim-proxy.toml"));

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("nim-proxy").join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("nim-proxy").join("config.toml"));
        paths.push(home.join(".nim-proxy.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
