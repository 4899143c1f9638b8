//! Caller-facing model names and their upstream targets.
//!
//! The mapping is built once at startup and never changes afterwards.

use crate::config::ProxyConfig;
use crate::translate::types::{ModelList, ModelObject};
use chrono::Utc;
use std::collections::BTreeMap;

/// Built-in mapping used when the config file has no `[models]` table.
pub fn default_model_table() -> BTreeMap<String, String> {
    [
        ("gpt-4o", "deepseek-ai/deepseek-r1-0528"),
        ("gpt-4", "deepseek-ai/deepseek-v3.2"),
        ("gpt-3.5-turbo", "deepseek-ai/deepseek-v3.1"),
        ("deepseek-r1", "deepseek-ai/deepseek-r1-0528"),
        ("deepseek-v3.1", "deepseek-ai/deepseek-v3.1"),
        ("deepseek-v3.2", "deepseek-ai/deepseek-v3.2"),
        ("deepseek-terminus", "deepseek-ai/deepseek-v3.1-terminus"),
        ("claude-3-opus", "deepseek-ai/deepseek-v3.2"),
    ]
    .into_iter()
    .map(|(caller, upstream)| (caller.to_string(), upstream.to_string()))
    .collect()
}

#[derive(Debug, Clone)]
pub struct ModelMapping {
    table: BTreeMap<String, String>,
    default_model: String,
}

impl ModelMapping {
    pub fn new(table: BTreeMap<String, String>, default_model: impl Into<String>) -> Self {
        Self {
            table,
            default_model: default_model.into(),
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.models.clone(), config.upstream.default_model.clone())
    }

    /// Upstream identifier for `caller_model`. Exact, case-sensitive match;
    /// anything unmapped goes to the default.
    pub fn resolve(&self, caller_model: &str) -> &str {
        self.table
            .get(caller_model)
            .map_or(self.default_model.as_str(), String::as_str)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn names(&self) -> Vec<String> {
        self.table.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// `/v1/models` payload listing every caller-facing name.
    pub fn model_list(&self, owned_by: &str) -> ModelList {
        let created = Utc::now().timestamp();
        let data = self
            .table
            .iter()
            .map(|(name, upstream)| ModelObject {
                id: name.clone(),
                object: "model".to_string(),
                created,
                owned_by: owned_by.to_string(),
                nvidia_model: upstream.clone(),
            })
            .collect();

        ModelList {
            object: "list".to_string(),
            data,
        }
    }
}
