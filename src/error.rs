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

use thiserror::Error;

/// Failure classification for the collection and query pipelines.
///
/// Only `ConfigurationMissing` is fatal; everything else is recovered
/// locally (empty results, dropped document, degraded mode, or a
/// localized fallback answer).
#[derive(Debug, Error)]
pub enum WissenError {
    /// Mount missing or domain unreachable. The affected source yields
    /// empty results and processing continues.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// No extraction strategy for the file type. The document is dropped.
    #[error("no extraction strategy for '{0}'")]
    ExtractionUnsupported(String),

    /// Embedding/generation backend unreachable. The engine runs degraded
    /// and reports it through readiness, never mid-query.
    #[error("model provider unavailable: {0}")]
    ProviderDown(String),

    /// Vector store backend unreachable. Same handling as `ProviderDown`.
    #[error("vector store unavailable: {0}")]
    StoreDown(String),

    /// Generation call failed or timed out. Recovered with the
    /// deterministic fallback answer.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// Required configuration absent entirely. Fatal at startup, before
    /// any query is accepted.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),
}
