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

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::document::{Document, SourceType};
use crate::index::chunker::Chunk;
use crate::index::store::{DocumentSummary, IndexStats, RetrievedChunk, VectorIndex};

/// In-memory substitute index.
///
/// Serves two roles: the degraded-mode fallback when the LanceDB
/// backend cannot be opened at startup, and the store used by pipeline
/// tests. Same delete-then-insert semantics as the real backend; the
/// write lock makes each document replacement atomic for readers.
#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<Vec<StoredEntry>>,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    chunk_id: String,
    document_id: String,
    source_type: SourceType,
    source_path: String,
    title: String,
    content: String,
    content_hash: String,
    extra: BTreeMap<String, String>,
    indexed_at: DateTime<Utc>,
    embedding: Vec<f32>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Fixed seed set indexed when running degraded, so the assistant can
/// still answer basic questions about the institute.
pub fn seed_documents() -> Vec<Document> {
    let entries = [
        (
            "seed/lehrstuhl",
            "Lehrstuhl FAPS",
            "Der Lehrstuhl für Fertigungsautomatisierung und Produktionssystematik (FAPS) \
             wurde 1975 gegründet und beschäftigt sich mit der Erforschung und Entwicklung \
             von Automatisierungslösungen für die Produktion.",
        ),
        (
            "seed/forschung",
            "Forschungsschwerpunkte",
            "Forschungsschwerpunkte des Lehrstuhls sind adaptive Fertigungssysteme, \
             cyber-physische Produktionssysteme, künstliche Intelligenz in der Fertigung \
             und nachhaltige Produktionsverfahren.",
        ),
    ];

    entries
        .iter()
        .map(|(path, title, text)| Document {
            id: crate::document::document_id(SourceType::FileShare, path),
            text: text.to_string(),
            source_type: SourceType::FileShare,
            source_path: path.to_string(),
            title: title.to_string(),
            last_modified: None,
            extra: BTreeMap::new(),
        })
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn replace_document(
        &self,
        document: &Document,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        content_hash: &str,
    ) -> Result<()> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.document_id != document.id);
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            entries.push(StoredEntry {
                chunk_id: chunk.chunk_id(),
                document_id: document.id.clone(),
                source_type: document.source_type,
                source_path: document.source_path.clone(),
                title: document.title.clone(),
                content: chunk.content.clone(),
                content_hash: content_hash.to_string(),
                extra: document.extra.clone(),
                indexed_at: now,
                embedding: embedding.clone(),
            });
        }
        Ok(())
    }

    async fn content_hash(&self, document_id: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|e| e.document_id == document_id)
            .map(|e| e.content_hash.clone()))
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.document_id != document_id);
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let entries = self.entries.read().await;
        let mut scored: Vec<RetrievedChunk> = entries
            .iter()
            .map(|e| RetrievedChunk {
                chunk_id: e.chunk_id.clone(),
                document_id: e.document_id.clone(),
                source_type: e.source_type,
                source_path: e.source_path.clone(),
                title: e.title.clone(),
                content: e.content.clone(),
                extra: e.extra.clone(),
                score: cosine_similarity(vector, &e.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let entries = self.entries.read().await;
        let mut stats = IndexStats {
            total_chunks: entries.len(),
            ..IndexStats::default()
        };

        let mut documents = std::collections::HashSet::new();
        for entry in entries.iter() {
            if documents.insert(entry.document_id.clone()) {
                *stats
                    .by_source_type
                    .entry(entry.source_type.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }
        stats.total_documents = documents.len();
        Ok(stats)
    }

    async fn list_documents(&self, limit: Option<usize>) -> Result<Vec<DocumentSummary>> {
        let entries = self.entries.read().await;
        let mut summaries: BTreeMap<String, DocumentSummary> = BTreeMap::new();

        for entry in entries.iter() {
            summaries
                .entry(entry.document_id.clone())
                .and_modify(|s| s.chunks += 1)
                .or_insert_with(|| DocumentSummary {
                    title: entry.title.clone(),
                    source_path: entry.source_path.clone(),
                    chunks: 1,
                    indexed_at: Some(entry.indexed_at),
                });
        }

        let mut result: Vec<DocumentSummary> = summaries.into_values().collect();
        result.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }
}
