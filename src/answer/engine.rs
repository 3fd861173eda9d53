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
use tracing::{debug, error, warn};

use crate::answer::{QueryResult, SourceCitation};
use crate::config::SearchConfig;
use crate::index::store::{RetrievedChunk, VectorIndex};
use crate::localization::{self, Language};
use crate::provider::ModelProvider;

/// Excerpt length for citations.
const EXCERPT_CHARS: usize = 300;

/// Per-query pipeline states, for tracing.
#[derive(Debug)]
enum QueryState {
    Validated,
    Embedded,
    Retrieved(usize),
    Generated,
    Fallback,
}

/// The query pipeline: validate, embed, retrieve, prompt, generate.
///
/// `answer` is infallible from the caller's perspective; every failure
/// inside the pipeline collapses into a localized message with the
/// diagnostic in `QueryResult::error`.
pub struct AnswerEngine {
    provider: Arc<dyn ModelProvider>,
    index: Arc<dyn VectorIndex>,
    search: SearchConfig,
}

impl AnswerEngine {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        index: Arc<dyn VectorIndex>,
        search: SearchConfig,
    ) -> Self {
        Self {
            provider,
            index,
            search,
        }
    }

    pub async fn answer(&self, question: &str, language: Language) -> QueryResult {
        let question = question.trim();

        // Empty questions never reach the vector store or the model.
        if question.is_empty() {
            return QueryResult::message(localization::no_query(language), language);
        }
        debug!(state = ?QueryState::Validated, "query accepted");

        match self.run_pipeline(question, language).await {
            Ok(result) => result,
            Err(e) => {
                error!("query pipeline failed for {:?}: {:#}", question, e);
                QueryResult {
                    answer: localization::generation_error(language).to_string(),
                    language,
                    citations: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn run_pipeline(&self, question: &str, language: Language) -> Result<QueryResult> {
        // The same provider embeds at index time and query time, so
        // both sides share one embedding space.
        let embeddings = self.provider.embed(&[question.to_string()]).await?;
        debug!(state = ?QueryState::Embedded, "question embedded");

        let retrieved = self
            .index
            .query(&embeddings[0], self.search.max_results)
            .await?;
        let retrieved: Vec<RetrievedChunk> = retrieved
            .into_iter()
            .filter(|c| c.score >= self.search.similarity_threshold)
            .collect();
        debug!(state = ?QueryState::Retrieved(retrieved.len()), "chunks retrieved");
        for chunk in &retrieved {
            debug!(
                "candidate {} from {} score {:.2}",
                chunk.chunk_id, chunk.document_id, chunk.score
            );
        }

        // No grounding context: answer deterministically instead of
        // letting the model hallucinate over nothing.
        if retrieved.is_empty() {
            debug!(state = ?QueryState::Fallback, "no chunks above threshold");
            return Ok(QueryResult::message(
                localization::no_results(language),
                language,
            ));
        }

        let citations: Vec<SourceCitation> = retrieved.iter().map(build_citation).collect();

        if !self.provider.is_live() {
            debug!(state = ?QueryState::Fallback, "provider degraded");
            return Ok(QueryResult {
                answer: localization::degraded_notice(language).to_string(),
                language,
                citations,
                error: None,
            });
        }

        let prompt = build_prompt(question, language, &retrieved);
        match self.provider.complete(&prompt).await {
            Ok(text) => {
                debug!(state = ?QueryState::Generated, "answer generated");
                Ok(QueryResult {
                    answer: text,
                    language,
                    citations,
                    error: None,
                })
            }
            Err(e) => {
                warn!("generation failed for {:?}: {:#}", question, e);
                debug!(state = ?QueryState::Fallback, "generation fallback");
                Ok(QueryResult {
                    answer: localization::no_results(language).to_string(),
                    language,
                    citations,
                    error: Some(e.to_string()),
                })
            }
        }
    }
}

/// Retrieved chunks become labeled context blocks; the language
/// instruction is part of the prompt so behavior does not depend on
/// model-specific parameters.
fn build_prompt(question: &str, language: Language, retrieved: &[RetrievedChunk]) -> String {
    let mut prompt = String::from("Context:\n\n");
    for (i, chunk) in retrieved.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {} ({}):\n{}\n\n",
            i + 1,
            chunk.title,
            chunk.source_path,
            chunk.content
        ));
    }
    prompt.push_str("---\n\n");
    prompt.push_str(&localization::answer_instruction(language, question));
    prompt
}

fn build_citation(chunk: &RetrievedChunk) -> SourceCitation {
    SourceCitation {
        title: chunk.title.clone(),
        source_type: chunk.source_type,
        source_path: chunk.source_path.clone(),
        excerpt: excerpt(&chunk.content),
        score: chunk.score,
        extra: chunk.extra.clone(),
    }
}

fn excerpt(content: &str) -> String {
    if content.chars().count() <= EXCERPT_CHARS {
        content.to_string()
    } else {
        let cut: String = content.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    }
}
