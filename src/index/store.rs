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

use crate::document::{Document, SourceType};
use crate::index::chunker::Chunk;

/// A chunk returned from vector search, carrying its parent document's
/// metadata for citation building.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub source_type: SourceType,
    pub source_path: String,
    pub title: String,
    pub content: String,
    pub extra: BTreeMap<String, String>,
    pub score: f32,
}

/// Aggregate counts over the stored entries.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub by_source_type: BTreeMap<String, usize>,
}

/// One indexed document in a sources listing.
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub title: String,
    pub source_path: String,
    pub chunks: usize,
    pub indexed_at: Option<DateTime<Utc>>,
}

/// Storage seam between the indexing engine (sole writer) and the
/// answer engine (reader). Replacement is keyed by document id:
/// delete-then-insert of the whole chunk set, so re-indexing never
/// leaves stale chunks behind and never duplicates a document.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn replace_document(
        &self,
        document: &Document,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        content_hash: &str,
    ) -> Result<()>;

    /// Content hash stored with a document's chunks, for incremental
    /// staleness checks. `None` if the document is not indexed.
    async fn content_hash(&self, document_id: &str) -> Result<Option<String>>;

    async fn delete_document(&self, document_id: &str) -> Result<()>;

    /// Top-k nearest chunks by cosine similarity.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>>;

    async fn stats(&self) -> Result<IndexStats>;

    async fn list_documents(&self, limit: Option<usize>) -> Result<Vec<DocumentSummary>>;
}
