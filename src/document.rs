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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::collector::RawDocument;

/// Origin of a document. The string form doubles as the id prefix, so
/// ids stay readable in citations and store filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[serde(rename = "nas")]
    FileShare,
    Web,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::FileShare => "nas",
            SourceType::Web => "web",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "web" => SourceType::Web,
            _ => SourceType::FileShare,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical unit of retrievable content. Everything downstream of the
/// collectors (chunking, indexing, citations) works on this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub source_type: SourceType,
    pub source_path: String,
    pub title: String,
    pub last_modified: Option<DateTime<Utc>>,
    /// Open metadata (download URL, MIME type, domain). Opaque to the
    /// indexing engine, passed through to citations.
    pub extra: BTreeMap<String, String>,
}

/// Stable id derived from the logical source identity. Re-collecting
/// the same item yields the same id, so re-indexing replaces instead of
/// duplicating.
pub fn document_id(source_type: SourceType, source_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_type.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(source_path.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}_{}", source_type.as_str(), &digest[..16])
}

/// SHA256 of document text, used for incremental-indexing staleness
/// checks.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Convert raw collector output into a canonical document.
///
/// Documents with no extractable text are dropped here, which also
/// keeps unextractable-format placeholders out of the index. Oversized
/// text is truncated at a char boundary to bound indexing cost.
pub fn normalize(raw: RawDocument, max_chars: usize) -> Option<Document> {
    let text = raw.text?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let text = truncate_chars(text, max_chars);

    Some(Document {
        id: document_id(raw.source_type, &raw.source_path),
        text,
        source_type: raw.source_type,
        source_path: raw.source_path,
        title: raw.title,
        last_modified: raw.last_modified,
        extra: raw.extra,
    })
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        input.to_string()
    } else {
        input.chars().take(max_chars).collect()
    }
}
