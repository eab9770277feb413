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

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64;
use serde::Deserialize;
use serde::Serialize;

use crate::model::SortOrder;

pub const CURSOR_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub v: u32,
    pub fp: String,
    pub sort: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<f64>,
    pub id: String,
}

impl Cursor {
    pub fn new(fp: &str, sort: SortOrder, rank: Option<f64>, id: &str) -> Self {
        Cursor {
            v: CURSOR_VERSION,
            fp: fp.to_string(),
            sort: sort.label().to_string(),
            rank,
            id: id.to_string(),
        }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        BASE64.encode(json)
    }

    pub fn decode(token: &str) -> Option<Cursor> {
        let bytes = BASE64.decode(token.trim()).ok()?;
        let cursor: Cursor = serde_json::from_slice(&bytes).ok()?;
        if cursor.v != CURSOR_VERSION {
            return None;
        }
        Some(cursor)
    }

    pub fn matches(&self, fp: &str, sort: SortOrder) -> bool {
        self.fp == fp && self.sort == sort.label()
    }
}
