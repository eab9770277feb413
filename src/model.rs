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

//! Shared domain types used across indexing, query execution, and assembly.

use clap::ValueEnum;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDocument {
    pub id: String,
    pub entries: Vec<PageEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEntry {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Best match first, entity id as tie-break.
    #[default]
    Relevance,
    /// Entity id, ascending.
    Id,
}

impl SortOrder {
    pub fn label(self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::Id => "id",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub offset: usize,
    pub match_count: i64,
    pub resume_token: Option<String>,
    pub sort: SortOrder,
    pub debug: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            offset: 0,
            match_count: -1,
            resume_token: None,
            sort: SortOrder::default(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextPair {
    pub label: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuePair {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub id: String,
    pub context: Vec<ContextPair>,
    pub values: Vec<ValuePair>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub total: i64,
    pub offset: usize,
    pub matches: Vec<SearchMatch>,
    pub resume_token: Option<String>,
    pub sort: SortOrder,
    pub debug: Option<String>,
}
