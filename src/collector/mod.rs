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

pub mod auth;
pub mod extract;
pub mod ratelimit;
pub mod share;
pub mod web;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::cancel::CancelFlag;
use crate::document::SourceType;

/// Raw collector output: descriptor metadata plus extracted text.
/// `text: None` means nothing extractable; the normalizer drops it.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source_type: SourceType,
    pub source_path: String,
    pub title: String,
    pub text: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub extra: BTreeMap<String, String>,
}

/// A source of raw documents. Collection is best-effort: individual
/// item failures are logged and skipped, an unavailable source yields
/// an empty batch, and the cancel flag is honored between items.
#[async_trait]
pub trait SourceCollector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn collect(&self, cancel: &CancelFlag) -> Vec<RawDocument>;
}
