// Copyright 2025 Wissen Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::WissenError;

/// File-share collector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    pub mount_path: String,
    pub max_files: usize,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            mount_path: "/mnt/nas".to_string(),
            max_files: 1000,
        }
    }
}

/// A single crawl target. Authenticated domains are skipped silently
/// when no valid credentials are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDomain {
    pub host: String,
    #[serde(default)]
    pub authenticated: bool,
}

/// Web collector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default)]
    pub domains: Vec<WebDomain>,
    pub page_budget: usize,
    pub min_request_interval_ms: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            page_budget: 30,
            min_request_interval_ms: 1000,
            fetch_timeout_secs: 10,
        }
    }
}

/// Model backend settings. One endpoint serves both generation and
/// embeddings so index-time and query-time vectors share one space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub endpoint: String,
    pub generation_model: String,
    pub embedding_model: String,
    pub embed_timeout_secs: u64,
    pub generation_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            generation_model: "gpt-oss:20b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embed_timeout_secs: 30,
            generation_timeout_secs: 60,
        }
    }
}

/// Vector store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    pub uri: String,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            uri: "~/.local/share/wissen/index".to_string(),
        }
    }
}

/// Retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_results: usize,
    pub similarity_threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            similarity_threshold: 0.25,
        }
    }
}

/// Chunking and normalization bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_document_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 20,
            max_document_chars: 50_000,
        }
    }
}

/// Main configuration for wissen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_language_code")]
    pub default_language: String,
    #[serde(default)]
    pub share: ShareConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

fn default_language_code() -> String {
    "de".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_language: default_language_code(),
            share: ShareConfig::default(),
            web: WebConfig::default(),
            model: ModelConfig::default(),
            vector: VectorConfig::default(),
            search: SearchConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the data directory, creating it from the
    /// embedded template on first run. Environment variables override
    /// the file afterwards.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path()?;

        let mut config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&content)?
        } else {
            let template_content = include_str!("../config-templates/default.toml");
            let config: Self = toml::from_str(template_content)?;

            if let Some(parent) = config_path.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&config_path, template_content)?;

            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WISSEN_SHARE_MOUNT") {
            self.share.mount_path = v;
        }
        if let Ok(v) = std::env::var("WISSEN_MODEL_ENDPOINT") {
            self.model.endpoint = v;
        }
        if let Ok(v) = std::env::var("WISSEN_VECTOR_URI") {
            self.vector.uri = v;
        }
        if let Ok(v) = std::env::var("WISSEN_DEFAULT_LANGUAGE") {
            self.default_language = v;
        }
    }

    /// Fail fast before any query is accepted: a deployment without a
    /// vector store location or model endpoint is broken, not degraded.
    pub fn validate(&self) -> Result<()> {
        if self.vector.uri.trim().is_empty() {
            return Err(WissenError::ConfigurationMissing("vector.uri".to_string()).into());
        }
        if self.model.endpoint.trim().is_empty() {
            return Err(WissenError::ConfigurationMissing("model.endpoint".to_string()).into());
        }
        if self.index.chunk_overlap >= self.index.chunk_size {
            return Err(WissenError::ConfigurationMissing(
                "index.chunk_overlap must be smaller than index.chunk_size".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Vector store URI with a leading `~/` expanded.
    pub fn vector_uri(&self) -> Result<String> {
        expand_home(&self.vector.uri)
    }

    /// Mount path with a leading `~/` expanded.
    pub fn mount_path(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(expand_home(&self.share.mount_path)?))
    }
}

/// Data directory following XDG conventions, `~/.local/share/wissen`.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data_home).join("wissen")
    } else {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".local")
            .join("share")
            .join("wissen")
    };

    if !base_dir.exists() {
        std::fs::create_dir_all(&base_dir)?;
    }

    Ok(base_dir)
}

fn config_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("config.toml"))
}

fn expand_home(path: &str) -> Result<String> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(rest).to_string_lossy().into_owned())
    } else {
        Ok(path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_and_validates() {
        let template = include_str!("../config-templates/default.toml");
        let config: Config = toml::from_str(template).unwrap();
        config.validate().unwrap();
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.index.chunk_size, 1024);
        assert_eq!(config.index.chunk_overlap, 20);
    }

    #[test]
    fn test_empty_vector_uri_is_fatal() {
        let config = Config {
            vector: VectorConfig {
                uri: "  ".to_string(),
            },
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("vector.uri"));
    }

    #[test]
    fn test_empty_model_endpoint_is_fatal() {
        let config = Config {
            model: ModelConfig {
                endpoint: String::new(),
                ..ModelConfig::default()
            },
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("model.endpoint"));
    }

    #[test]
    fn test_overlap_must_stay_below_chunk_size() {
        let config = Config {
            index: IndexConfig {
                chunk_size: 100,
                chunk_overlap: 100,
                max_document_chars: 1000,
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
