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
use std::time::Duration;
use tracing::{info, warn};

use crate::answer::engine::AnswerEngine;
use crate::answer::format;
use crate::cancel::CancelFlag;
use crate::cli::Commands;
use crate::collector::auth::CredentialStore;
use crate::collector::ratelimit::DomainRateLimiter;
use crate::collector::share::FileShareCollector;
use crate::collector::web::WebCollector;
use crate::collector::SourceCollector;
use crate::config::Config;
use crate::document::{document_id, normalize, Document, SourceType};
use crate::index::engine::Indexer;
use crate::index::lance::LanceIndex;
use crate::index::memory::{seed_documents, MemoryIndex};
use crate::index::store::VectorIndex;
use crate::localization::Language;
use crate::provider::{select_provider, ModelProvider};

/// Explicitly constructed application context. Owns the one provider
/// instance and the one index handle both engines share; built once
/// per invocation at the entry point and passed down, never ambient.
pub struct AppContext {
    pub config: Config,
    pub provider: Arc<dyn ModelProvider>,
    pub index: Arc<dyn VectorIndex>,
    store_ready: bool,
}

impl AppContext {
    pub async fn initialize(config: &Config) -> Result<Self> {
        // One provider instance for indexing and querying; the store
        // schema takes its vector width from the startup probe.
        let (provider, vector_dim) = select_provider(&config.model).await;

        let uri = config.vector_uri()?;
        let (index, store_ready): (Arc<dyn VectorIndex>, bool) =
            match LanceIndex::connect(&uri, vector_dim).await {
                Ok(store) => (Arc::new(store), true),
                Err(e) => {
                    warn!(
                        "vector store at {} unavailable ({}), using in-memory substitute",
                        uri, e
                    );
                    let memory: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());
                    let indexer = Indexer::new(memory.clone(), provider.clone(), &config.index);
                    indexer
                        .index_all(&seed_documents(), &CancelFlag::new())
                        .await;
                    (memory, false)
                }
            };

        Ok(Self {
            config: config.clone(),
            provider,
            index,
            store_ready,
        })
    }

    /// False while running on the in-memory substitute or without the
    /// live model backend.
    pub fn is_ready(&self) -> bool {
        self.store_ready && self.provider.is_live()
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(self.index.clone(), self.provider.clone(), &self.config.index)
    }

    pub fn answer_engine(&self) -> AnswerEngine {
        AnswerEngine::new(
            self.provider.clone(),
            self.index.clone(),
            self.config.search.clone(),
        )
    }
}

pub async fn execute(config: &Config, command: Commands, cancel: CancelFlag) -> Result<()> {
    match command {
        Commands::Index { full, max_pages } => {
            let mut config = config.clone();
            if let Some(budget) = max_pages {
                config.web.page_budget = budget;
            }
            index_command(&config, full, cancel).await
        }
        Commands::Ask {
            question,
            language,
            format,
        } => ask_command(config, &question, language.as_deref(), &format).await,
        Commands::Status => status_command(config).await,
        Commands::Sources { limit } => sources_command(config, limit).await,
        Commands::Forget { source_path } => forget_command(config, &source_path).await,
    }
}

async fn collect_documents(config: &Config, cancel: &CancelFlag) -> Result<Vec<Document>> {
    let limiter = Arc::new(DomainRateLimiter::new(Duration::from_millis(
        config.web.min_request_interval_ms,
    )));
    let hosts: Vec<String> = config.web.domains.iter().map(|d| d.host.clone()).collect();
    let credentials = Arc::new(CredentialStore::from_env(&hosts));

    let collectors: Vec<Box<dyn SourceCollector>> = vec![
        Box::new(FileShareCollector::new(config.mount_path()?, &config.share)),
        Box::new(WebCollector::new(&config.web, limiter, credentials)),
    ];

    let mut raw = Vec::new();
    for collector in &collectors {
        info!("collecting from {}", collector.name());
        raw.extend(collector.collect(cancel).await);
    }

    let total = raw.len();
    let documents: Vec<Document> = raw
        .into_iter()
        .filter_map(|r| normalize(r, config.index.max_document_chars))
        .collect();
    info!(
        "{} of {} collected items have indexable text",
        documents.len(),
        total
    );

    Ok(documents)
}

async fn index_command(config: &Config, full: bool, cancel: CancelFlag) -> Result<()> {
    let ctx = AppContext::initialize(config).await?;
    if !ctx.store_ready {
        warn!("indexing into the in-memory substitute; results are not persisted");
    }

    let documents = collect_documents(config, &cancel).await?;
    let indexer = ctx.indexer();
    let summary = if full {
        indexer.index_all(&documents, &cancel).await
    } else {
        indexer.index_incremental(&documents, &cancel).await
    };

    println!(
        "Indexed {} documents ({} chunks), {} unchanged, {} failed",
        summary.indexed, summary.chunks, summary.skipped, summary.failed
    );
    Ok(())
}

async fn ask_command(
    config: &Config,
    question: &str,
    language: Option<&str>,
    output_format: &str,
) -> Result<()> {
    let ctx = AppContext::initialize(config).await?;
    let language = Language::from_code(language.unwrap_or(&config.default_language));

    let result = ctx.answer_engine().answer(question, language).await;

    match output_format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => println!("{}", format::format_answer(&result)),
    }
    Ok(())
}

async fn status_command(config: &Config) -> Result<()> {
    let ctx = AppContext::initialize(config).await?;
    let stats = ctx.index.stats().await?;
    println!(
        "{}",
        format::format_stats(&stats, ctx.is_ready(), ctx.provider.is_live())
    );
    Ok(())
}

async fn sources_command(config: &Config, limit: Option<usize>) -> Result<()> {
    let ctx = AppContext::initialize(config).await?;
    let sources = ctx.index.list_documents(limit).await?;
    println!("{}", format::format_source_list(&sources));
    Ok(())
}

async fn forget_command(config: &Config, source_path: &str) -> Result<()> {
    let ctx = AppContext::initialize(config).await?;

    let source_type = if source_path.starts_with("http://") || source_path.starts_with("https://")
    {
        SourceType::Web
    } else {
        SourceType::FileShare
    };
    let id = document_id(source_type, source_path);

    ctx.indexer().remove(&id).await?;
    println!("Removed {} from the index", source_path);
    Ok(())
}
