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

use std::collections::BTreeMap;

use unicode_normalization::UnicodeNormalization;

use crate::catalog::Language;

#[derive(Debug, Clone)]
pub struct Analyzer {
    marker_open: char,
    marker_close: char,
    strip_diacritics: bool,
    fold_letters: bool,
    fold_geminates: bool,
}

impl Analyzer {
    pub fn for_language(lang: Language, markers: (char, char)) -> Self {
        let (marker_open, marker_close) = markers;
        match lang {
            Language::English | Language::French => Self {
                marker_open,
                marker_close,
                strip_diacritics: false,
                fold_letters: false,
                fold_geminates: false,
            },
            Language::Latin => Self {
                marker_open,
                marker_close,
                strip_diacritics: true,
                fold_letters: false,
                fold_geminates: false,
            },
            Language::OldFrench | Language::MiddleDutch => Self {
                marker_open,
                marker_close,
                strip_diacritics: true,
                fold_letters: true,
                fold_geminates: true,
            },
        }
    }

    pub fn normalize(&self, text: &str) -> String {
        self.normalize_tokens(text).join(" ")
    }

    pub fn normalize_tokens(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .flat_map(|word| self.split_fold(word))
            .collect()
    }

    pub fn normalize_indexed(&self, text: &str) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        for (idx, word) in text.split_whitespace().enumerate() {
            for token in self.split_fold(word) {
                out.push((idx, token));
            }
        }
        out
    }

    fn split_fold(&self, word: &str) -> Vec<String> {
        let stripped: String = word
            .chars()
            .filter(|&c| c != self.marker_open && c != self.marker_close)
            .collect();
        let decomposed: String = if self.strip_diacritics {
            stripped.nfd().filter(|&c| !is_combining_mark(c)).collect()
        } else {
            stripped
        };
        let mut parts = Vec::new();
        let mut cur = String::new();
        let mut last = '\0';
        for ch in decomposed.chars().flat_map(char::to_lowercase) {
            if !ch.is_alphanumeric() {
                if !cur.is_empty() {
                    parts.push(std::mem::take(&mut cur));
                }
                last = '\0';
                continue;
            }
            let ch = if self.fold_letters { fold_letter(ch) } else { ch };
            if self.fold_geminates && ch == last {
                continue;
            }
            cur.push(ch);
            last = ch;
        }
        if !cur.is_empty() {
            parts.push(cur);
        }
        parts
    }
}

fn fold_letter(ch: char) -> char {
    match ch {
        'v' => 'u',
        'j' => 'i',
        'y' => 'i',
        _ => ch,
    }
}

fn is_combining_mark(c: char) -> bool {
    matches!(c,
        '\u{0300}'..='\u{036F}'
            | '\u{1AB0}'..='\u{1AFF}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
            | '\u{FE20}'..='\u{FE2F}')
}

pub fn exact_normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone)]
pub struct AnalyzerRegistry {
    analyzers: BTreeMap<Language, Analyzer>,
}

impl AnalyzerRegistry {
    pub fn new(markers: (char, char)) -> Self {
        let analyzers = Language::all()
            .into_iter()
            .map(|lang| (lang, Analyzer::for_language(lang, markers)))
            .collect();
        Self { analyzers }
    }

    pub fn analyzer(&self, lang: Language) -> &Analyzer {
        &self.analyzers[&lang]
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new(('[', ']'))
    }
}
