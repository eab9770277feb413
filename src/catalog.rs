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

use std::collections::HashSet;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "la")]
    Latin,
    #[serde(rename = "fro")]
    OldFrench,
    #[serde(rename = "dum")]
    MiddleDutch,
}

impl Language {
    pub fn all() -> [Language; 5] {
        [
            Language::English,
            Language::French,
            Language::Latin,
            Language::OldFrench,
            Language::MiddleDutch,
        ]
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::French => "fr",
            Language::Latin => "la",
            Language::OldFrench => "fro",
            Language::MiddleDutch => "dum",
        }
    }

    pub fn from_code(code: &str) -> Option<Language> {
        Language::all().into_iter().find(|lang| lang.code() == code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Language(Language),
    Exact,
}

impl FieldType {
    pub fn code(self) -> &'static str {
        match self {
            FieldType::Language(lang) => lang.code(),
            FieldType::Exact => "str",
        }
    }

    pub fn from_code(code: &str) -> Option<FieldType> {
        if code == "str" {
            return Some(FieldType::Exact);
        }
        Language::from_code(code).map(FieldType::Language)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct SearchField {
    pub name: String,
    pub label: String,
    pub description: String,
    pub types: Vec<FieldType>,
    pub context: bool,
    pub include_value: bool,
    pub suggestions: Vec<Suggestion>,
}

impl SearchField {
    pub fn subfield(&self, ftype: FieldType) -> String {
        format!("{}_{}", self.name, ftype.code())
    }

    pub fn languages(&self) -> Vec<Language> {
        self.types
            .iter()
            .filter_map(|ftype| match ftype {
                FieldType::Language(lang) => Some(*lang),
                FieldType::Exact => None,
            })
            .collect()
    }

    pub fn has_exact(&self) -> bool {
        self.types.contains(&FieldType::Exact)
    }

    pub fn exact_subfield(&self) -> Option<String> {
        self.has_exact().then(|| self.subfield(FieldType::Exact))
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    fields: Vec<SearchField>,
}

impl Catalog {
    pub fn new(fields: Vec<SearchField>) -> Result<Self> {
        if fields.is_empty() {
            anyhow::bail!("field catalog is empty");
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if !is_identifier(&field.name) {
                anyhow::bail!("invalid field name {:?}", field.name);
            }
            if !seen.insert(field.name.clone()) {
                anyhow::bail!("duplicate field {}", field.name);
            }
            if field.types.is_empty() {
                anyhow::bail!("field {} declares no types", field.name);
            }
            let mut types_seen = HashSet::new();
            for ftype in &field.types {
                if !types_seen.insert(ftype.code()) {
                    anyhow::bail!("field {} declares type {} twice", field.name, ftype.code());
                }
            }
        }
        // The full-text table needs at least one column to exist.
        if fields.iter().all(|field| field.languages().is_empty()) {
            anyhow::bail!("field catalog declares no language variants");
        }
        Ok(Self { fields })
    }

    pub fn get(&self, name: &str) -> Option<&SearchField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn fields(&self) -> &[SearchField] {
        &self.fields
    }

    pub fn fts_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for field in &self.fields {
            for ftype in &field.types {
                if matches!(ftype, FieldType::Language(_)) {
                    columns.push(field.subfield(*ftype));
                }
            }
        }
        columns
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for field in &self.fields {
            hasher.update(field.name.as_bytes());
            for ftype in &field.types {
                hasher.update(b":");
                hasher.update(ftype.code().as_bytes());
            }
            hasher.update(b";");
        }
        hex::encode(hasher.finalize())[..16].to_string()
    }

    pub fn infos(&self) -> Vec<FieldInfo> {
        self.fields
            .iter()
            .map(|field| FieldInfo {
                name: field.name.clone(),
                label: field.label.clone(),
                description: field.description.clone(),
                types: field.types.iter().map(|t| t.code().to_string()).collect(),
                context: field.context,
                include_value: field.include_value,
                suggestions: field.suggestions.clone(),
            })
            .collect()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub label: String,
    pub description: String,
    pub types: Vec<String>,
    pub context: bool,
    pub include_value: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
}
