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
use arrow::record_batch::RecordBatchIterator;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::{
    connect,
    query::{ExecutableQuery, QueryBase},
    Connection, DistanceType,
};
use std::collections::BTreeMap;
use std::iter::once;
use std::sync::Arc;

use crate::document::{Document, SourceType};
use crate::error::WissenError;
use crate::index::chunker::Chunk;
use crate::index::store::{DocumentSummary, IndexStats, RetrievedChunk, VectorIndex};

const TABLE_NAME: &str = "chunks";

/// LanceDB-backed vector index, the production store.
pub struct LanceIndex {
    db: Connection,
    vector_dim: usize,
}

impl LanceIndex {
    pub async fn connect(uri: &str, vector_dim: usize) -> Result<Self> {
        std::fs::create_dir_all(uri)
            .with_context(|| format!("failed to create index directory {}", uri))?;

        let db = connect(uri)
            .execute()
            .await
            .map_err(|e| WissenError::StoreDown(e.to_string()))?;
        let index = Self { db, vector_dim };
        index.initialize_table().await?;
        Ok(index)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("source_type", DataType::Utf8, false),
            Field::new("source_path", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("char_start", DataType::Int32, false),
            Field::new("char_end", DataType::Int32, false),
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("extra", DataType::Utf8, true), // JSON serialized
            Field::new("last_modified", DataType::Utf8, true),
            Field::new("indexed_at", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.vector_dim as i32,
                ),
                false,
            ),
        ]))
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self.db.table_names().execute().await?;
        if !table_names.contains(&TABLE_NAME.to_string()) {
            self.db
                .create_empty_table(TABLE_NAME, self.schema())
                .execute()
                .await?;
        }
        Ok(())
    }

    fn quote_filter_string(input: &str) -> String {
        input.replace('\'', "''")
    }

    fn document_filter(document_id: &str) -> String {
        format!("document_id = '{}'", Self::quote_filter_string(document_id))
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn replace_document(
        &self,
        document: &Document,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        content_hash: &str,
    ) -> Result<()> {
        // Full replacement per document: stale chunks must never
        // survive a re-index.
        self.delete_document(&document.id).await?;

        if chunks.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let extra_json = serde_json::to_string(&document.extra)?;
        let last_modified = document.last_modified.map(|dt| dt.to_rfc3339());

        let ids: Vec<String> = chunks.iter().map(|c| c.chunk_id()).collect();
        let ids: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let document_ids: Vec<&str> = chunks.iter().map(|_| document.id.as_str()).collect();
        let source_types: Vec<&str> = chunks
            .iter()
            .map(|_| document.source_type.as_str())
            .collect();
        let source_paths: Vec<&str> = chunks.iter().map(|_| document.source_path.as_str()).collect();
        let titles: Vec<&str> = chunks.iter().map(|_| document.title.as_str()).collect();
        let chunk_indices: Vec<i32> = chunks.iter().map(|c| c.chunk_index).collect();
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let char_starts: Vec<i32> = chunks.iter().map(|c| c.char_start as i32).collect();
        let char_ends: Vec<i32> = chunks.iter().map(|c| c.char_end as i32).collect();
        let content_hashes: Vec<&str> = chunks.iter().map(|_| content_hash).collect();
        let extras: Vec<Option<&str>> = chunks.iter().map(|_| Some(extra_json.as_str())).collect();
        let last_modifieds: Vec<Option<&str>> = chunks
            .iter()
            .map(|_| last_modified.as_deref())
            .collect();
        let indexed_ats: Vec<&str> = chunks.iter().map(|_| now.as_str()).collect();

        let embedding_values: Vec<f32> =
            embeddings.iter().flat_map(|e| e.iter().copied()).collect();
        let embedding_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.vector_dim as i32,
            Arc::new(Float32Array::from(embedding_values)),
            None,
        )?;

        let schema = self.schema();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(document_ids)),
                Arc::new(StringArray::from(source_types)),
                Arc::new(StringArray::from(source_paths)),
                Arc::new(StringArray::from(titles)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(contents)),
                Arc::new(Int32Array::from(char_starts)),
                Arc::new(Int32Array::from(char_ends)),
                Arc::new(StringArray::from(content_hashes)),
                Arc::new(StringArray::from(extras)),
                Arc::new(StringArray::from(last_modifieds)),
                Arc::new(StringArray::from(indexed_ats)),
                Arc::new(embedding_array),
            ],
        )?;

        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let batches = once(Ok(batch.clone()));
        let batch_reader = RecordBatchIterator::new(batches, schema);
        table.add(batch_reader).execute().await?;

        Ok(())
    }

    async fn content_hash(&self, document_id: &str) -> Result<Option<String>> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let query = table
            .query()
            .only_if(Self::document_filter(document_id))
            .limit(1);

        let results = query.execute().await?;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        if batches.is_empty() || batches[0].num_rows() == 0 {
            return Ok(None);
        }

        let content_hashes = batches[0]
            .column_by_name("content_hash")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        Ok(Some(content_hashes.value(0).to_string()))
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        table.delete(&Self::document_filter(document_id)).await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;

        let query = table
            .vector_search(vector)?
            .distance_type(DistanceType::Cosine)
            .limit(k);

        let mut results = query.execute().await?;
        let mut retrieved = Vec::new();

        while let Some(batch) = results.try_next().await? {
            if batch.num_rows() == 0 {
                continue;
            }

            let ids = string_column(&batch, "id");
            let document_ids = string_column(&batch, "document_id");
            let source_types = string_column(&batch, "source_type");
            let source_paths = string_column(&batch, "source_path");
            let titles = string_column(&batch, "title");
            let contents = string_column(&batch, "content");
            let extras = string_column(&batch, "extra");
            let distances = batch
                .column_by_name("_distance")
                .unwrap()
                .as_any()
                .downcast_ref::<Float32Array>()
                .unwrap();

            for i in 0..batch.num_rows() {
                let extra: BTreeMap<String, String> = if extras.is_null(i) {
                    BTreeMap::new()
                } else {
                    serde_json::from_str(extras.value(i)).unwrap_or_default()
                };

                retrieved.push(RetrievedChunk {
                    chunk_id: ids.value(i).to_string(),
                    document_id: document_ids.value(i).to_string(),
                    source_type: SourceType::from_str_lossy(source_types.value(i)),
                    source_path: source_paths.value(i).to_string(),
                    title: titles.value(i).to_string(),
                    content: contents.value(i).to_string(),
                    extra,
                    score: 1.0 - distances.value(i),
                });
            }
        }

        Ok(retrieved)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let count = table.count_rows(None).await?;

        let mut stats = IndexStats {
            total_chunks: count,
            ..IndexStats::default()
        };
        if count == 0 {
            return Ok(stats);
        }

        let results = table.query().execute().await?;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut documents = std::collections::HashSet::new();
        for batch in batches {
            let document_ids = string_column(&batch, "document_id");
            let source_types = string_column(&batch, "source_type");

            for i in 0..batch.num_rows() {
                if documents.insert(document_ids.value(i).to_string()) {
                    *stats
                        .by_source_type
                        .entry(source_types.value(i).to_string())
                        .or_insert(0) += 1;
                }
            }
        }
        stats.total_documents = documents.len();
        Ok(stats)
    }

    async fn list_documents(&self, limit: Option<usize>) -> Result<Vec<DocumentSummary>> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let results = table.query().execute().await?;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut summaries: BTreeMap<String, DocumentSummary> = BTreeMap::new();

        for batch in batches {
            let document_ids = string_column(&batch, "document_id");
            let source_paths = string_column(&batch, "source_path");
            let titles = string_column(&batch, "title");
            let indexed_ats = string_column(&batch, "indexed_at");

            for i in 0..batch.num_rows() {
                let indexed_at = DateTime::parse_from_rfc3339(indexed_ats.value(i))
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc));

                summaries
                    .entry(document_ids.value(i).to_string())
                    .and_modify(|s| s.chunks += 1)
                    .or_insert_with(|| DocumentSummary {
                        title: titles.value(i).to_string(),
                        source_path: source_paths.value(i).to_string(),
                        chunks: 1,
                        indexed_at,
                    });
            }
        }

        let mut result: Vec<DocumentSummary> = summaries.into_values().collect();
        result.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> &'a StringArray {
    batch
        .column_by_name(name)
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap()
}
