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

pub mod engine;
pub mod format;

#[cfg(test)]
mod pipeline_tests;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::document::SourceType;
use crate::localization::Language;

/// One retrieved passage used as answer context, with enough of the
/// parent document's metadata to link back to the origin.
#[derive(Debug, Clone, Serialize)]
pub struct SourceCitation {
    pub title: String,
    pub source_type: SourceType,
    pub source_path: String,
    /// Bounded excerpt of the retrieved chunk, not the full text.
    pub excerpt: String,
    pub score: f32,
    pub extra: BTreeMap<String, String>,
}

/// The answer returned to a caller. Failure paths still produce a
/// localized `answer`; `error` carries the diagnostic, never a stack
/// trace.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub language: Language,
    pub citations: Vec<SourceCitation>,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn message(answer: impl Into<String>, language: Language) -> Self {
        Self {
            answer: answer.into(),
            language,
            citations: Vec::new(),
            error: None,
        }
    }
}
