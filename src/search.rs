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

use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;

use crate::analyzer::AnalyzerRegistry;
use crate::analyzer::exact_normalize;
use crate::catalog::Catalog;
use crate::catalog::SearchField;
use crate::compile::CompiledQuery;
use crate::config::Config;
use crate::cursor::Cursor;
use crate::error::SearchError;
use crate::model::ContextPair;
use crate::model::SearchMatch;
use crate::model::SearchOptions;
use crate::model::SearchResult;
use crate::model::SortOrder;
use crate::model::ValuePair;
use crate::store::Store;

pub fn run(
    store: &Store,
    catalog: &Catalog,
    analyzers: &AnalyzerRegistry,
    config: &Config,
    compiled: &CompiledQuery,
    opts: &SearchOptions,
) -> Result<SearchResult, SearchError> {
    let limit = if opts.match_count < 0 {
        config.default_page_size as i64
    } else {
        opts.match_count
    };

    let count_sql = format!("SELECT COUNT(*) FROM page WHERE {}", compiled.where_sql);
    let total: i64 = store.conn.query_row(
        &count_sql,
        params_from_iter(compiled.where_params.iter().cloned()),
        |row| row.get(0),
    )?;

    let cursor = opts
        .resume_token
        .as_deref()
        .and_then(Cursor::decode)
        .filter(|c| c.matches(&compiled.fingerprint, opts.sort));

    let rank_join = match opts.sort {
        SortOrder::Relevance => compiled.fts_query.clone(),
        SortOrder::Id => None,
    };
    let rank_expr = if rank_join.is_some() {
        "COALESCE(hits.rank, 0.0)"
    } else {
        "0.0"
    };

    let mut sql = format!("SELECT page.id, {rank_expr} AS rank FROM page");
    let mut params: Vec<SqlValue> = Vec::new();
    if let Some(match_expr) = rank_join {
        sql.push_str(
            " LEFT JOIN (SELECT rowid, bm25(page_fts) AS rank FROM page_fts WHERE page_fts MATCH ?) hits ON hits.rowid = page.rowid",
        );
        params.push(SqlValue::from(match_expr));
    }
    sql.push_str(" WHERE (");
    sql.push_str(&compiled.where_sql);
    sql.push(')');
    params.extend(compiled.where_params.iter().cloned());

    match (&cursor, opts.sort) {
        (Some(cursor), SortOrder::Relevance) => {
            sql.push_str(&format!(" AND ({rank_expr}, page.id) > (?, ?)"));
            params.push(SqlValue::from(cursor.rank.unwrap_or(0.0)));
            params.push(SqlValue::from(cursor.id.clone()));
        }
        (Some(cursor), SortOrder::Id) => {
            sql.push_str(" AND page.id > ?");
            params.push(SqlValue::from(cursor.id.clone()));
        }
        (None, _) => {}
    }

    match opts.sort {
        SortOrder::Relevance => sql.push_str(" ORDER BY rank ASC, page.id ASC"),
        SortOrder::Id => sql.push_str(" ORDER BY page.id ASC"),
    }

    sql.push_str(" LIMIT ?");
    params.push(SqlValue::from(limit));
    if cursor.is_none() && opts.offset > 0 {
        sql.push_str(" OFFSET ?");
        params.push(SqlValue::from(opts.offset as i64));
    }

    let mut stmt = store.conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;
    let mut hits: Vec<(String, f64)> = Vec::new();
    for row in rows {
        hits.push(row?);
    }

    let returned = hits.len() as i64;
    let done = returned == 0 || opts.offset as i64 + returned >= total;
    let resume_token = if done {
        None
    } else {
        hits.last().map(|(id, rank)| {
            let rank = matches!(opts.sort, SortOrder::Relevance).then_some(*rank);
            Cursor::new(&compiled.fingerprint, opts.sort, rank, id).encode()
        })
    };

    let mut matches = Vec::with_capacity(hits.len());
    for (id, _) in &hits {
        matches.push(assemble_match(
            store,
            catalog,
            analyzers,
            compiled,
            id,
            config.context_window,
        )?);
    }

    Ok(SearchResult {
        total,
        offset: opts.offset,
        matches,
        resume_token,
        sort: opts.sort,
        debug: opts.debug.then(|| compiled.debug_text()),
    })
}

fn assemble_match(
    store: &Store,
    catalog: &Catalog,
    analyzers: &AnalyzerRegistry,
    compiled: &CompiledQuery,
    id: &str,
    window: usize,
) -> Result<SearchMatch, SearchError> {
    let mut stmt = store
        .conn
        .prepare("SELECT field, value FROM page_value WHERE page_id = ?1 ORDER BY ord")?;
    let rows = stmt.query_map(params![id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut values_by_field: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (field, value) = row?;
        values_by_field.entry(field).or_default().push(value);
    }

    let mut context = Vec::new();
    for field in catalog.fields() {
        if !field.context || !compiled.touches(&field.name) {
            continue;
        }
        let Some(values) = values_by_field.get(&field.name) else {
            continue;
        };
        if let Some(snippet) = snippet_for_field(analyzers, compiled, field, values, window) {
            context.push(ContextPair {
                label: field.label.clone(),
                snippet,
            });
        }
    }

    let mut out_values = Vec::new();
    for field in catalog.fields() {
        if !field.include_value {
            continue;
        }
        if let Some(values) = values_by_field.get(&field.name) {
            for value in values {
                out_values.push(ValuePair {
                    field: field.name.clone(),
                    value: value.clone(),
                });
            }
        }
    }

    Ok(SearchMatch {
        id: id.to_string(),
        context,
        values: out_values,
    })
}

fn snippet_for_field(
    analyzers: &AnalyzerRegistry,
    compiled: &CompiledQuery,
    field: &SearchField,
    values: &[String],
    window: usize,
) -> Option<String> {
    for value in values {
        for term in compiled.exacts.iter().filter(|t| t.field == field.name) {
            if exact_normalize(value) == term.norm {
                return Some(format!("<b>{value}</b>"));
            }
        }
        for phrase in compiled.phrases.iter().filter(|t| t.field == field.name) {
            let indexed = analyzers.analyzer(phrase.lang).normalize_indexed(value);
            if let Some(start) = find_phrase(&indexed, &phrase.tokens) {
                return Some(render_window(
                    value,
                    &indexed,
                    start,
                    phrase.tokens.len(),
                    window,
                ));
            }
        }
    }
    None
}

fn find_phrase(indexed: &[(usize, String)], tokens: &[String]) -> Option<usize> {
    if tokens.is_empty() || indexed.len() < tokens.len() {
        return None;
    }
    (0..=indexed.len() - tokens.len())
        .find(|&i| tokens.iter().enumerate().all(|(j, tok)| indexed[i + j].1 == *tok))
}

fn render_window(
    value: &str,
    indexed: &[(usize, String)],
    start: usize,
    len: usize,
    window: usize,
) -> String {
    let words: Vec<&str> = value.split_whitespace().collect();
    let first = indexed[start].0;
    let last = indexed[start + len - 1].0;
    let from = first.saturating_sub(window);
    let to = usize::min(last + window, words.len().saturating_sub(1));

    let mut out = String::new();
    if from > 0 {
        out.push_str("... ");
    }
    for (idx, word) in words.iter().enumerate().take(to + 1).skip(from) {
        if idx > from {
            out.push(' ');
        }
        if idx == first {
            out.push_str("<b>");
        }
        out.push_str(word);
        if idx == last {
            out.push_str("</b>");
        }
    }
    if to + 1 < words.len() {
        out.push_str(" ...");
    }
    out
}
