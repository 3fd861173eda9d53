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
use colored::Colorize;

use crate::answer::QueryResult;
use crate::index::store::{DocumentSummary, IndexStats};

pub fn format_answer(result: &QueryResult) -> String {
    let mut output = String::new();

    output.push_str(&result.answer.bold().to_string());
    output.push_str("\n\n");

    for citation in &result.citations {
        output.push_str(&"━".repeat(60));
        output.push('\n');

        output.push_str(&citation.title.blue().bold().to_string());
        output.push('\n');

        output.push_str(
            &format!("[{}] {}", citation.source_type, citation.source_path)
                .bright_black()
                .to_string(),
        );
        output.push('\n');

        if let Some(url) = citation.extra.get("download_url") {
            output.push_str(&url.bright_black().to_string());
            output.push('\n');
        }

        output.push_str(&citation.excerpt);
        output.push('\n');

        let score_pct = (citation.score * 100.0) as u32;
        output.push_str(&format!("{}% relevant", score_pct).green().to_string());
        output.push_str("\n\n");
    }

    if let Some(error) = &result.error {
        output.push_str(&format!("({})", error).bright_black().to_string());
        output.push('\n');
    }

    output
}

pub fn format_stats(stats: &IndexStats, ready: bool, provider_live: bool) -> String {
    let mut output = String::new();

    output.push_str(&"Index Status".bold().to_string());
    output.push('\n');
    output.push_str(&format!(
        "Ready: {}\n",
        if ready { "yes".green() } else { "no".red() }
    ));
    output.push_str(&format!(
        "Model backend: {}\n",
        if provider_live {
            "live".green()
        } else {
            "degraded".yellow()
        }
    ));
    output.push_str(&format!("Total Documents: {}\n", stats.total_documents));
    output.push_str(&format!("Total Chunks: {}\n", stats.total_chunks));

    for (source_type, count) in &stats.by_source_type {
        output.push_str(&format!("  {}: {} documents\n", source_type, count));
    }

    output
}

pub fn format_source_list(sources: &[DocumentSummary]) -> String {
    if sources.is_empty() {
        return "No sources indexed".to_string();
    }

    let mut output = String::new();

    output.push_str(
        &format!(
            "{:<52} {:<32} {:<8} {}\n",
            "Source", "Title", "Chunks", "Last Indexed"
        )
        .bold()
        .to_string(),
    );
    output.push_str(&"─".repeat(120));
    output.push('\n');

    for summary in sources {
        let path_truncated = truncate_with_ellipsis(&summary.source_path, 50);
        let title_truncated = truncate_with_ellipsis(&summary.title, 30);

        let indexed = summary
            .indexed_at
            .map(format_relative_time)
            .unwrap_or_else(|| "unknown".to_string());

        output.push_str(&format!(
            "{:<52} {:<32} {:<8} {}\n",
            path_truncated, title_truncated, summary.chunks, indexed
        ));
    }

    output
}

fn format_relative_time(dt: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(dt);

    if duration.num_days() > 0 {
        format!("{} days ago", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{} hours ago", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{} minutes ago", duration.num_minutes())
    } else {
        "just now".to_string()
    }
}

fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    if input.chars().count() > max_chars {
        let cut: String = input.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::Language;

    #[test]
    fn test_format_answer_includes_citations() {
        let result = QueryResult {
            answer: "Das FAPS wurde 1975 gegründet.".to_string(),
            language: Language::De,
            citations: vec![crate::answer::SourceCitation {
                title: "Präsentation".to_string(),
                source_type: crate::document::SourceType::FileShare,
                source_path: "/Präsentationen/Lehrstuhl.pptx".to_string(),
                excerpt: "Der Lehrstuhl wurde 1975 gegründet".to_string(),
                score: 0.87,
                extra: Default::default(),
            }],
            error: None,
        };

        let formatted = format_answer(&result);
        assert!(formatted.contains("Das FAPS wurde 1975 gegründet."));
        assert!(formatted.contains("/Präsentationen/Lehrstuhl.pptx"));
        assert!(formatted.contains("87% relevant"));
    }

    #[test]
    fn test_format_source_list_empty() {
        assert_eq!(format_source_list(&[]), "No sources indexed");
    }

    #[test]
    fn test_truncation_is_char_safe() {
        let truncated = truncate_with_ellipsis(&"ä".repeat(100), 10);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 10);
    }
}
