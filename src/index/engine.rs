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
use std::sync::Arc;
use tracing::{info, warn};

use crate::cancel::CancelFlag;
use crate::config::IndexConfig;
use crate::document::{content_hash, Document};
use crate::index::chunker::Chunker;
use crate::index::store::VectorIndex;
use crate::provider::ModelProvider;

/// Outcome of one indexing run. Per-document failures are counted,
/// never propagated: an unreliable source must not abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub chunks: usize,
}

/// The sole writer of the vector index. Splits documents into chunks,
/// embeds them through the shared provider, and replaces each
/// document's chunk set atomically.
pub struct Indexer {
    index: Arc<dyn VectorIndex>,
    provider: Arc<dyn ModelProvider>,
    chunker: Chunker,
}

impl Indexer {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        provider: Arc<dyn ModelProvider>,
        config: &IndexConfig,
    ) -> Self {
        Self {
            index,
            provider,
            chunker: Chunker::new(config),
        }
    }

    /// Re-index every supplied document unconditionally.
    pub async fn index_all(&self, documents: &[Document], cancel: &CancelFlag) -> IndexSummary {
        self.run(documents, cancel, false).await
    }

    /// Re-index only documents whose content changed since they were
    /// last stored; unchanged documents are skipped without touching
    /// the embedding backend.
    pub async fn index_incremental(
        &self,
        documents: &[Document],
        cancel: &CancelFlag,
    ) -> IndexSummary {
        self.run(documents, cancel, true).await
    }

    pub async fn remove(&self, document_id: &str) -> Result<()> {
        self.index.delete_document(document_id).await
    }

    async fn run(
        &self,
        documents: &[Document],
        cancel: &CancelFlag,
        skip_unchanged: bool,
    ) -> IndexSummary {
        let mut summary = IndexSummary::default();

        // Documents are processed in the supplied order; the
        // delete-then-insert per document is serialized with itself.
        for document in documents {
            if cancel.is_cancelled() {
                warn!(
                    "indexing cancelled, {} of {} documents done",
                    summary.indexed + summary.skipped,
                    documents.len()
                );
                break;
            }

            match self.index_document(document, skip_unchanged).await {
                Ok(Some(chunks)) => {
                    summary.indexed += 1;
                    summary.chunks += chunks;
                }
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    warn!("failed to index {}: {}", document.source_path, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "indexing done: {} indexed, {} skipped, {} failed, {} chunks",
            summary.indexed, summary.skipped, summary.failed, summary.chunks
        );
        summary
    }

    /// Returns the number of chunks written, or `None` when the
    /// document was skipped as unchanged.
    async fn index_document(
        &self,
        document: &Document,
        skip_unchanged: bool,
    ) -> Result<Option<usize>> {
        let hash = content_hash(&document.text);

        if skip_unchanged {
            if let Some(stored) = self.index.content_hash(&document.id).await? {
                if stored == hash {
                    return Ok(None);
                }
            }
        }

        let chunks = self.chunker.chunk(&document.id, &document.text);
        if chunks.is_empty() {
            // Nothing to embed; make sure no stale entries linger.
            self.index.delete_document(&document.id).await?;
            return Ok(Some(0));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.provider.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            anyhow::bail!(
                "embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                embeddings.len()
            );
        }

        self.index
            .replace_document(document, &chunks, &embeddings, &hash)
            .await?;

        Ok(Some(chunks.len()))
    }
}
