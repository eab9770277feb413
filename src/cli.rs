// Copyright 2026 Quire Authors
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

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

use crate::model::SortOrder;

#[derive(Parser, Debug)]
#[command(name = "quire", version, about = "Full-text search over manuscript page records")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new Quire store
    Init {
        /// Path to the store directory
        path: Option<PathBuf>,
    },

    /// Index page records from JSONL files
    Add(AddArgs),

    /// Search with plain query text
    Search(SearchArgs),

    /// Search with a structured query
    Query(QueryArgs),

    /// List the searchable fields
    Fields {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every indexed page
    Clear {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show stats
    Stats {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Run integrity checks
    Doctor {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// JSONL files or directories to index
    pub paths: Vec<PathBuf>,

    /// Glob for files picked up from directories
    #[arg(long)]
    pub glob: Option<String>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text, matched against every searchable field
    pub query: String,

    /// Skip this many matches
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Matches per page; negative means the configured default
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub count: i64,

    /// Resume token from a previous page
    #[arg(long)]
    pub resume: Option<String>,

    /// Result order
    #[arg(long, value_enum, default_value_t = SortOrder::Relevance)]
    pub sort: SortOrder,

    /// Restriction termlist, e.g. "category:'psalter'"
    #[arg(long)]
    pub restrict: Option<String>,

    /// Include the compiled query in the output
    #[arg(long)]
    pub debug: bool,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Query string or @file
    #[arg(long)]
    pub dsl: String,

    /// Skip this many matches
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Matches per page; negative means the configured default
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub count: i64,

    /// Resume token from a previous page
    #[arg(long)]
    pub resume: Option<String>,

    /// Result order
    #[arg(long, value_enum, default_value_t = SortOrder::Relevance)]
    pub sort: SortOrder,

    /// Restriction termlist, e.g. "category:'psalter'"
    #[arg(long)]
    pub restrict: Option<String>,

    /// Include the compiled query in the output
    #[arg(long)]
    pub debug: bool,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}
