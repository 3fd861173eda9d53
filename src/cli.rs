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

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "wissen")]
#[command(version)]
#[command(about = "Bilingual retrieval-augmented question answering over file shares and intranet sources", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect documents from all configured sources and update the index
    Index {
        /// Re-embed every document even if its content is unchanged
        #[arg(long)]
        full: bool,

        /// Crawl at most this many pages per web domain
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Ask a question against the indexed sources
    Ask {
        /// The question text
        question: String,

        /// Answer language: de or en (defaults to the configured language)
        #[arg(short, long)]
        language: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show readiness and index statistics
    Status,

    /// List indexed sources
    Sources {
        /// Maximum number of sources to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Remove one source from the index
    Forget {
        /// Source path or URL as shown by `sources`
        source_path: String,
    },
}
