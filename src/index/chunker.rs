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

use crate::config::IndexConfig;

/// A contiguous slice of a document's text, sized for embedding.
///
/// Chunks are derived and disposable: fully regenerable from the
/// parent document, identified by the parent id plus their index.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_index: i32,
    pub content: String,
    pub char_start: usize,
    pub char_end: usize,
}

impl Chunk {
    /// Store key: `document_id` plus offset, never random, so
    /// re-chunking the same text produces the same keys.
    pub fn chunk_id(&self) -> String {
        format!("{}:{}", self.document_id, self.chunk_index)
    }
}

/// Splits document text into bounded chunks with a small overlap
/// window, so a sentence split exactly at a boundary still appears
/// whole in one of its neighbors.
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }

    pub fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        self.split_spans(text)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Chunk {
                document_id: document_id.to_string(),
                chunk_index: i as i32,
                content: text[start..end].to_string(),
                char_start: start,
                char_end: end,
            })
            .collect()
    }

    /// Byte spans covering the whole text, each at most roughly
    /// chunk_size long, consecutive spans overlapping by up to
    /// chunk_overlap.
    fn split_spans(&self, text: &str) -> Vec<(usize, usize)> {
        if text.len() <= self.chunk_size {
            return vec![(0, text.len())];
        }

        let mut spans = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let end_target = (start + self.chunk_size).min(text.len());
            let end = floor_char_boundary(text, end_target);

            // Prefer ending on a sentence boundary near the target.
            let chunk_end = if end < text.len() {
                self.find_sentence_boundary(text, end)
            } else {
                end
            };
            let chunk_end = if chunk_end <= start {
                ceil_char_boundary(text, start + 1)
            } else {
                chunk_end
            };

            spans.push((start, chunk_end));

            if chunk_end >= text.len() {
                break;
            }
            let next_target = chunk_end.saturating_sub(self.chunk_overlap);
            let mut next_start = floor_char_boundary(text, next_target);
            // A very short chunk plus overlap must not walk backwards.
            if next_start <= start {
                next_start = chunk_end;
            }
            start = next_start;
        }

        spans
    }

    /// Find a sentence ending within 100 chars of the target position,
    /// falling back to the target itself.
    fn find_sentence_boundary(&self, text: &str, target: usize) -> usize {
        let search_start = floor_char_boundary(text, target.saturating_sub(100));
        let search_end = floor_char_boundary(text, (target + 100).min(text.len()));
        let search_text = &text[search_start..search_end];

        let relative_target = target - search_start;
        for (i, ch) in search_text[..relative_target].char_indices().rev() {
            if matches!(ch, '.' | '!' | '?') {
                if let Some(next_ch) = search_text[i + 1..].chars().next() {
                    if next_ch.is_whitespace() {
                        return search_start + i + 1;
                    }
                }
            }
        }

        target
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> Chunker {
        Chunker::new(&IndexConfig {
            chunk_size,
            chunk_overlap,
            max_document_chars: 50_000,
        })
    }

    #[test]
    fn test_short_text_is_one_lossless_chunk() {
        let text = "Das FAPS wurde 1975 gegründet.";
        let chunks = chunker(1024, 20).chunk("nas_abc", text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks[0].char_end, text.len());
    }

    #[test]
    fn test_chunk_ids_are_deterministic() {
        let chunks = chunker(1024, 20).chunk("nas_abc", "Inhalt");
        assert_eq!(chunks[0].chunk_id(), "nas_abc:0");
    }

    #[test]
    fn test_long_text_spans_cover_everything_with_bounded_overlap() {
        let sentence = "Der Lehrstuhl forscht an adaptiven Fertigungssystemen. ";
        let text = sentence.repeat(50);
        let text = text.trim();
        let chunks = chunker(200, 20).chunk("nas_abc", text);
        assert!(chunks.len() > 1);

        // Spans are contiguous-or-overlapping and reach both ends.
        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks.last().unwrap().char_end, text.len());
        for pair in chunks.windows(2) {
            assert!(pair[1].char_start <= pair[0].char_end);
            assert!(pair[1].char_end > pair[0].char_end);
            let overlap = pair[0].char_end - pair[1].char_start;
            assert!(overlap <= 20, "overlap {} exceeds configured window", overlap);
        }

        // Each chunk is the literal slice of the original text.
        for chunk in &chunks {
            assert_eq!(chunk.content, &text[chunk.char_start..chunk.char_end]);
        }
    }

    #[test]
    fn test_chunks_prefer_sentence_boundaries() {
        let sentence = "Kurzer Satz über Produktionssysteme und mehr dazu. ";
        let text = sentence.repeat(20);
        let chunks = chunker(150, 10).chunk("web_1", text.trim());
        // All but the last chunk should end right after a sentence end.
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.content.trim_end().ends_with('.'),
                "chunk does not end at a sentence: {:?}",
                chunk.content
            );
        }
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "Präzisionsmessgeräte für die Qualitätssicherung. ".repeat(30);
        let chunks = chunker(100, 10).chunk("nas_x", text.trim());
        // Slicing would have panicked on a bad boundary; also verify
        // the chunks re-assemble into valid UTF-8 content.
        for chunk in &chunks {
            assert!(!chunk.content.is_empty());
        }
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunker(100, 10).chunk("nas_x", "   ").is_empty());
    }
}
