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

use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use walkdir::WalkDir;

use crate::analyzer::AnalyzerRegistry;
use crate::analyzer::exact_normalize;
use crate::catalog::Catalog;
use crate::catalog::FieldType;
use crate::catalog::Language;
use crate::error::SearchError;
use crate::model::PageDocument;
use crate::store::Store;
use crate::store::now_rfc3339;

const DEFAULT_GLOB: &str = "*.jsonl";

#[derive(Debug)]
pub struct IndexReport {
    pub pages_indexed: usize,
    pub values_indexed: usize,
    pub warnings: Vec<String>,
}

pub fn load_documents(paths: &[PathBuf], glob: Option<&str>) -> Result<Vec<PageDocument>> {
    let include_set = build_globset(glob.unwrap_or(DEFAULT_GLOB))?;
    let mut docs = Vec::new();
    for path in paths {
        if path.is_file() {
            load_file(path, &mut docs)?;
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && include_set.is_match(entry.path()) {
                    load_file(entry.path(), &mut docs)?;
                }
            }
        } else {
            anyhow::bail!("no such path: {}", path.display());
        }
    }
    Ok(docs)
}

fn build_globset(pattern: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    builder.add(Glob::new(pattern)?);
    Ok(builder.build()?)
}

fn load_file(path: &Path, docs: &mut Vec<PageDocument>) -> Result<()> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let doc: PageDocument = serde_json::from_str(trimmed)
            .with_context(|| format!("parse {}:{}", path.display(), idx + 1))?;
        docs.push(doc);
    }
    Ok(())
}

pub fn index_documents(
    store: &Store,
    catalog: &Catalog,
    analyzers: &AnalyzerRegistry,
    docs: &[PageDocument],
) -> Result<IndexReport, SearchError> {
    let columns = catalog.fts_columns();
    let placeholders = vec!["?"; columns.len() + 1].join(", ");
    let fts_insert = format!(
        "INSERT INTO page_fts (rowid, {}) VALUES ({})",
        columns.join(", "),
        placeholders
    );
    let indexed_at = now_rfc3339();

    let mut report = IndexReport {
        pages_indexed: 0,
        values_indexed: 0,
        warnings: Vec::new(),
    };

    store.conn.execute_batch("BEGIN IMMEDIATE")?;
    let res = (|| -> Result<(), SearchError> {
        for doc in docs {
            if doc.id.trim().is_empty() {
                report.warnings.push("skipping page with empty id".to_string());
                continue;
            }
            index_page(store, catalog, analyzers, doc, &columns, &fts_insert, &indexed_at, &mut report)?;
        }
        Ok(())
    })();

    if let Err(err) = res {
        store.conn.execute_batch("ROLLBACK")?;
        return Err(err);
    }
    store.conn.execute_batch("COMMIT")?;
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn index_page(
    store: &Store,
    catalog: &Catalog,
    analyzers: &AnalyzerRegistry,
    doc: &PageDocument,
    columns: &[String],
    fts_insert: &str,
    indexed_at: &str,
    report: &mut IndexReport,
) -> Result<(), SearchError> {
    let conn = &store.conn;

    conn.execute(
        "DELETE FROM page_fts WHERE rowid IN (SELECT rowid FROM page WHERE id = ?1)",
        params![doc.id],
    )?;
    conn.execute("DELETE FROM page_value WHERE page_id = ?1", params![doc.id])?;
    conn.execute("DELETE FROM page_exact WHERE page_id = ?1", params![doc.id])?;
    conn.execute("DELETE FROM page WHERE id = ?1", params![doc.id])?;
    conn.execute(
        "INSERT INTO page (id, indexed_at) VALUES (?1, ?2)",
        params![doc.id, indexed_at],
    )?;
    let rowid = conn.last_insert_rowid();

    let mut streams: HashMap<String, String> = HashMap::new();
    let mut ords: HashMap<String, i64> = HashMap::new();

    for entry in &doc.entries {
        let Some(field) = catalog.get(&entry.field) else {
            report.warnings.push(format!(
                "page {}: unknown field '{}'",
                doc.id, entry.field
            ));
            continue;
        };

        let ord = ords.entry(field.name.clone()).or_insert(0);
        conn.execute(
            "INSERT INTO page_value (page_id, field, ord, value) VALUES (?1, ?2, ?3, ?4)",
            params![doc.id, field.name, *ord, entry.value],
        )?;
        *ord += 1;
        report.values_indexed += 1;

        let targets: Vec<Language> = match entry.lang.as_deref() {
            None => field.languages(),
            Some(code) => match Language::from_code(code) {
                Some(lang) if field.languages().contains(&lang) => vec![lang],
                Some(lang) => {
                    report.warnings.push(format!(
                        "page {}: field '{}' does not declare language '{}'",
                        doc.id,
                        field.name,
                        lang.code()
                    ));
                    Vec::new()
                }
                None => {
                    report.warnings.push(format!(
                        "page {}: unknown language '{}' on field '{}'",
                        doc.id, code, field.name
                    ));
                    Vec::new()
                }
            },
        };
        for lang in targets {
            let normalized = analyzers.analyzer(lang).normalize(&entry.value);
            if normalized.is_empty() {
                continue;
            }
            let stream = streams
                .entry(field.subfield(FieldType::Language(lang)))
                .or_default();
            if !stream.is_empty() {
                stream.push(' ');
            }
            stream.push_str(&normalized);
        }

        if field.has_exact() {
            let norm = exact_normalize(&entry.value);
            if !norm.is_empty() {
                conn.execute(
                    "INSERT INTO page_exact (page_id, subfield, norm) VALUES (?1, ?2, ?3)",
                    params![doc.id, field.subfield(FieldType::Exact), norm],
                )?;
            }
        }
    }

    let mut fts_params: Vec<SqlValue> = Vec::with_capacity(columns.len() + 1);
    fts_params.push(SqlValue::from(rowid));
    for column in columns {
        fts_params.push(SqlValue::from(
            streams.get(column).cloned().unwrap_or_default(),
        ));
    }
    conn.execute(fts_insert, params_from_iter(fts_params))?;
    report.pages_indexed += 1;
    Ok(())
}
