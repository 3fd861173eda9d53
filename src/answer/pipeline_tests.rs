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

//! End-to-end pipeline tests over the in-memory index with counting
//! stubs, covering the short-circuit and fallback guarantees.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::answer::engine::AnswerEngine;
use crate::cancel::CancelFlag;
use crate::config::{IndexConfig, SearchConfig};
use crate::document::{document_id, Document, SourceType};
use crate::index::chunker::Chunk;
use crate::index::engine::Indexer;
use crate::index::memory::MemoryIndex;
use crate::index::store::{DocumentSummary, IndexStats, RetrievedChunk, VectorIndex};
use crate::localization::{self, Language};
use crate::provider::{DegradedProvider, ModelProvider};

/// Embeds like the degraded provider (deterministic), generates a
/// fixed answer, and counts every backend call.
struct TestProvider {
    hashing: DegradedProvider,
    live: bool,
    generation: Option<String>,
    embed_calls: AtomicUsize,
    complete_calls: AtomicUsize,
}

impl TestProvider {
    fn live(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            hashing: DegradedProvider::new(),
            live: true,
            generation: Some(answer.to_string()),
            embed_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            hashing: DegradedProvider::new(),
            live: true,
            generation: None,
            embed_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
        })
    }

    fn degraded() -> Arc<Self> {
        Arc::new(Self {
            hashing: DegradedProvider::new(),
            live: false,
            generation: None,
            embed_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ModelProvider for TestProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.hashing.embed(texts).await
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        match &self.generation {
            Some(text) => Ok(text.clone()),
            None => anyhow::bail!("generation backend exploded"),
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// Pass-through index that counts search round trips.
struct CountingIndex {
    inner: MemoryIndex,
    query_calls: AtomicUsize,
}

impl CountingIndex {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryIndex::new(),
            query_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn replace_document(
        &self,
        document: &Document,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        content_hash: &str,
    ) -> Result<()> {
        self.inner
            .replace_document(document, chunks, embeddings, content_hash)
            .await
    }

    async fn content_hash(&self, document_id: &str) -> Result<Option<String>> {
        self.inner.content_hash(document_id).await
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.inner.delete_document(document_id).await
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.query(vector, k).await
    }

    async fn stats(&self) -> Result<IndexStats> {
        self.inner.stats().await
    }

    async fn list_documents(&self, limit: Option<usize>) -> Result<Vec<DocumentSummary>> {
        self.inner.list_documents(limit).await
    }
}

fn search_config() -> SearchConfig {
    SearchConfig {
        max_results: 5,
        similarity_threshold: 0.05,
    }
}

fn index_config() -> IndexConfig {
    IndexConfig {
        chunk_size: 1024,
        chunk_overlap: 20,
        max_document_chars: 50_000,
    }
}

fn share_document(path: &str, text: &str) -> Document {
    Document {
        id: document_id(SourceType::FileShare, path),
        text: text.to_string(),
        source_type: SourceType::FileShare,
        source_path: path.to_string(),
        title: path.to_string(),
        last_modified: None,
        extra: BTreeMap::new(),
    }
}

async fn index_documents(
    index: Arc<CountingIndex>,
    provider: Arc<TestProvider>,
    documents: &[Document],
) {
    let indexer = Indexer::new(index, provider, &index_config());
    let summary = indexer.index_all(documents, &CancelFlag::new()).await;
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_empty_query_short_circuits_without_backend_calls() {
    let provider = TestProvider::live("unbenutzt");
    let index = CountingIndex::new();
    let engine = AnswerEngine::new(provider.clone(), index.clone(), search_config());

    for question in ["", "   ", "\n\t"] {
        let result = engine.answer(question, Language::De).await;
        assert_eq!(result.answer, localization::no_query(Language::De));
        assert!(result.citations.is_empty());
        assert!(result.error.is_none());
    }

    assert_eq!(provider.embed_calls.load(Ordering::SeqCst), 0);
    assert_eq!(provider.complete_calls.load(Ordering::SeqCst), 0);
    assert_eq!(index.query_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_zero_retrieval_skips_generation() {
    let provider = TestProvider::live("unbenutzt");
    let index = CountingIndex::new();
    let engine = AnswerEngine::new(provider.clone(), index.clone(), search_config());

    let result = engine.answer("Wie lautet die Antwort?", Language::En).await;

    assert_eq!(result.answer, localization::no_results(Language::En));
    assert!(result.citations.is_empty());
    assert_eq!(provider.complete_calls.load(Ordering::SeqCst), 0);
    assert_eq!(index.query_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_generation_failure_falls_back_with_citations() {
    let provider = TestProvider::failing();
    let index = CountingIndex::new();
    index_documents(
        index.clone(),
        provider.clone(),
        &[share_document(
            "/wiki/gruendung.txt",
            "Das FAPS wurde 1975 gegründet.",
        )],
    )
    .await;

    let engine = AnswerEngine::new(provider.clone(), index, search_config());
    let result = engine
        .answer("Wann wurde FAPS gegründet?", Language::De)
        .await;

    assert_eq!(result.answer, localization::no_results(Language::De));
    assert!(!result.citations.is_empty());
    assert!(result.error.is_some());
    assert_eq!(provider.complete_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_degraded_provider_lists_passages_without_generation() {
    let provider = TestProvider::degraded();
    let index = CountingIndex::new();
    index_documents(
        index.clone(),
        provider.clone(),
        &[share_document(
            "/wiki/gruendung.txt",
            "Das FAPS wurde 1975 gegründet.",
        )],
    )
    .await;

    let engine = AnswerEngine::new(provider.clone(), index, search_config());
    let result = engine
        .answer("Wann wurde FAPS gegründet?", Language::De)
        .await;

    assert_eq!(result.answer, localization::degraded_notice(Language::De));
    assert!(!result.citations.is_empty());
    assert_eq!(provider.complete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_indexed_document_is_answered_with_citation() {
    let provider = TestProvider::live("Das FAPS wurde 1975 gegründet.");
    let index = CountingIndex::new();
    index_documents(
        index.clone(),
        provider.clone(),
        &[share_document(
            "/Präsentationen/Lehrstuhl.pptx",
            "Das FAPS wurde 1975 gegründet.",
        )],
    )
    .await;

    let engine = AnswerEngine::new(provider.clone(), index, search_config());
    let result = engine
        .answer("Wann wurde FAPS gegründet?", Language::De)
        .await;

    assert!(!result.answer.is_empty());
    assert!(result.error.is_none());
    assert_eq!(result.language, Language::De);
    assert_eq!(result.citations.len(), 1);

    let citation = &result.citations[0];
    assert_eq!(citation.source_path, "/Präsentationen/Lehrstuhl.pptx");
    assert_eq!(citation.source_type, SourceType::FileShare);
    assert!(citation.excerpt.contains("1975"));
    assert!(citation.score > 0.0);
}

#[tokio::test]
async fn test_reindexed_document_is_cited_only_with_updated_text() {
    let provider = TestProvider::live("1975, in Erlangen.");
    let index = CountingIndex::new();

    index_documents(
        index.clone(),
        provider.clone(),
        &[share_document(
            "/wiki/gruendung.txt",
            "Das FAPS wurde 1975 gegründet.",
        )],
    )
    .await;
    index_documents(
        index.clone(),
        provider.clone(),
        &[share_document(
            "/wiki/gruendung.txt",
            "Das FAPS wurde 1975 in Erlangen gegründet.",
        )],
    )
    .await;

    let engine = AnswerEngine::new(provider.clone(), index, search_config());
    let result = engine
        .answer("Wann wurde FAPS gegründet?", Language::De)
        .await;

    assert!(!result.citations.is_empty());
    for citation in &result.citations {
        assert!(citation.excerpt.contains("in Erlangen"));
    }
}
