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

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{kind} at byte {pos}")]
    Parse { kind: ParseErrorKind, pos: usize },

    #[error("unknown search field: {0}")]
    UnknownField(String),

    #[error("query has no search terms")]
    EmptyQuery,

    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),
}

impl SearchError {
    pub fn parse(kind: ParseErrorKind, pos: usize) -> Self {
        SearchError::Parse { kind, pos }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SearchError::Parse { .. } => "parse_error",
            SearchError::UnknownField(_) => "unknown_field",
            SearchError::EmptyQuery => "empty_query",
            SearchError::Index(_) => "index_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    EmptyInput,
    UnexpectedChar,
    UnterminatedValue,
    BadEscape,
    UnquotedValue,
    ExpectedTerm,
    ExpectedColon,
    ExpectedValue,
    ExpectedOperator,
    MixedOperators,
    UnterminatedGroup,
    TrailingInput,
}

impl ParseErrorKind {
    pub fn message(self) -> &'static str {
        match self {
            ParseErrorKind::EmptyInput => "empty query",
            ParseErrorKind::UnexpectedChar => "unexpected character",
            ParseErrorKind::UnterminatedValue => "unterminated quoted value",
            ParseErrorKind::BadEscape => "invalid escape sequence",
            ParseErrorKind::UnquotedValue => "term value must be quoted",
            ParseErrorKind::ExpectedTerm => "expected a term or group",
            ParseErrorKind::ExpectedColon => "expected ':' after field name",
            ParseErrorKind::ExpectedValue => "expected quoted value",
            ParseErrorKind::ExpectedOperator => "expected '&' or '|'",
            ParseErrorKind::MixedOperators => "cannot mix '&' and '|' in one group",
            ParseErrorKind::UnterminatedGroup => "unterminated group",
            ParseErrorKind::TrailingInput => "unexpected input after query",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
