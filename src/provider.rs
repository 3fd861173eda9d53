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
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::ModelConfig;
use crate::error::WissenError;

/// Dimension of the degraded hashed embeddings.
const DEGRADED_DIM: usize = 384;

/// The single model capability seam: embeddings and text completion.
///
/// One provider instance is selected at startup and shared by the
/// indexing and answer engines, so index-time and query-time vectors
/// are guaranteed to live in the same embedding space.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    async fn complete(&self, prompt: &str) -> Result<String>;
    fn is_live(&self) -> bool;
}

/// Probe the configured backend once and pick the provider for the
/// lifetime of the process, along with its embedding width. The
/// degraded variant is a startup decision, never an ad-hoc per-call
/// substitution.
pub async fn select_provider(config: &ModelConfig) -> (Arc<dyn ModelProvider>, usize) {
    let live = HttpProvider::new(config);
    match live.embed(&["startup probe".to_string()]).await {
        Ok(vectors) => {
            let vector_dim = vectors[0].len();
            (Arc::new(live), vector_dim)
        }
        Err(e) => {
            warn!(
                "model backend at {} unavailable ({}), running degraded",
                config.endpoint, e
            );
            (Arc::new(DegradedProvider::new()), DEGRADED_DIM)
        }
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Live provider speaking the Ollama-compatible HTTP API.
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    embedding_model: String,
    generation_model: String,
    embed_timeout: Duration,
    generation_timeout: Duration,
}

impl HttpProvider {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            embed_timeout: Duration::from_secs(config.embed_timeout_secs),
            generation_timeout: Duration::from_secs(config.generation_timeout_secs),
        }
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.endpoint);
        let response = self
            .client
            .post(&url)
            .timeout(self.embed_timeout)
            .json(&EmbeddingsRequest {
                model: &self.embedding_model,
                prompt: text,
            })
            .send()
            .await
            .context("embedding request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("embedding request returned HTTP {}", response.status());
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .context("failed to parse embedding response")?;

        if parsed.embedding.is_empty() {
            anyhow::bail!("embedding backend returned an empty vector");
        }

        Ok(parsed.embedding)
    }
}

#[async_trait]
impl ModelProvider for HttpProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_one(text).await?);
        }
        Ok(embeddings)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        let response = self
            .client
            .post(&url)
            .timeout(self.generation_timeout)
            .json(&GenerateRequest {
                model: &self.generation_model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| WissenError::GenerationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WissenError::GenerationFailed(format!(
                "generation request returned HTTP {}",
                response.status()
            ))
            .into());
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| WissenError::GenerationFailed(e.to_string()))?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(
                WissenError::GenerationFailed("backend returned empty text".to_string()).into(),
            );
        }

        Ok(text)
    }

    fn is_live(&self) -> bool {
        true
    }
}

/// Deterministic local stand-in used when the model backend is down.
///
/// Embeddings are a normalized hashed bag of words with bigram
/// features, which keeps vector search functional (exact-phrase
/// matches still rank first). Completion is unavailable; the answer
/// engine falls back to listing retrieved passages instead.
pub struct DegradedProvider {
    dim: usize,
}

impl DegradedProvider {
    pub fn new() -> Self {
        Self { dim: DEGRADED_DIM }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized = text.to_lowercase();
        let words: Vec<&str> = normalized.split_whitespace().collect();

        let mut embedding = vec![0.0f32; self.dim];

        for (pos, word) in words.iter().enumerate() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let hash = hasher.finish();

            let idx1 = (hash % self.dim as u64) as usize;
            let idx2 = ((hash >> 16) % self.dim as u64) as usize;
            let idx3 = ((hash >> 32) % self.dim as u64) as usize;

            let position_weight = 1.0 / (pos as f32 + 1.0);
            embedding[idx1] += position_weight;
            embedding[idx2] += position_weight * 0.7;
            embedding[idx3] += position_weight * 0.5;
        }

        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            let mut hasher = DefaultHasher::new();
            bigram.hash(&mut hasher);
            let idx = (hasher.finish() % self.dim as u64) as usize;
            embedding[idx] += 0.8;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in embedding.iter_mut() {
                *val /= magnitude;
            }
        }

        embedding
    }
}

impl Default for DegradedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for DegradedProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(WissenError::ProviderDown("no generation backend".to_string()).into())
    }

    fn is_live(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_degraded_embeddings_are_deterministic() {
        let provider = DegradedProvider::new();
        let texts = vec!["Das FAPS wurde 1975 gegründet.".to_string()];
        let a = provider.embed(&texts).await.unwrap();
        let b = provider.embed(&texts).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), DEGRADED_DIM);
    }

    #[tokio::test]
    async fn test_degraded_embeddings_are_normalized() {
        let provider = DegradedProvider::new();
        let texts = vec!["Laborausstattung und Infrastruktur".to_string()];
        let embedding = &provider.embed(&texts).await.unwrap()[0];
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_similar_texts_rank_above_unrelated() {
        let provider = DegradedProvider::new();
        let texts = vec![
            "Wann wurde FAPS gegründet?".to_string(),
            "Das FAPS wurde 1975 gegründet.".to_string(),
            "CNC Fräsmaschinen benötigen regelmäßige Wartung.".to_string(),
        ];
        let embeddings = provider.embed(&texts).await.unwrap();

        let cosine = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
        };

        let related = cosine(&embeddings[0], &embeddings[1]);
        let unrelated = cosine(&embeddings[0], &embeddings[2]);
        assert!(related > unrelated);
    }

    #[tokio::test]
    async fn test_degraded_completion_reports_provider_down() {
        let provider = DegradedProvider::new();
        let err = provider.complete("irrelevant").await.unwrap_err();
        assert!(err.to_string().contains("provider unavailable"));
    }
}
