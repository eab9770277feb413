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

use std::collections::BTreeSet;

use rusqlite::types::Value as SqlValue;
use sha2::Digest;
use sha2::Sha256;

use crate::analyzer::AnalyzerRegistry;
use crate::analyzer::exact_normalize;
use crate::catalog::Catalog;
use crate::catalog::FieldType;
use crate::catalog::Language;
use crate::catalog::SearchField;
use crate::dsl::Operator;
use crate::dsl::Query;
use crate::dsl::QueryTerm;
use crate::error::SearchError;

const MATCH_NOTHING: &str = "0 = 1";

#[derive(Clone, Debug)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn raw_with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn and(self, other: SqlFragment) -> SqlFragment {
        let sql = format!("({}) AND ({})", self.sql, other.sql);
        let mut params = self.params;
        params.extend(other.params);
        SqlFragment { sql, params }
    }

    pub fn or(self, other: SqlFragment) -> SqlFragment {
        let sql = format!("({}) OR ({})", self.sql, other.sql);
        let mut params = self.params;
        params.extend(other.params);
        SqlFragment { sql, params }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhraseTerm {
    pub field: String,
    pub lang: Language,
    pub tokens: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExactTerm {
    pub field: String,
    pub norm: String,
}

#[derive(Debug)]
pub struct CompiledQuery {
    pub ast: Query,
    pub where_sql: String,
    pub where_params: Vec<SqlValue>,
    pub fts_query: Option<String>,
    pub phrases: Vec<PhraseTerm>,
    pub exacts: Vec<ExactTerm>,
    touched: BTreeSet<String>,
    pub fingerprint: String,
}

impl CompiledQuery {
    pub fn describe(&self) -> String {
        self.ast.to_string()
    }

    pub fn touches(&self, field: &str) -> bool {
        self.touched.contains(field)
    }

    pub fn debug_text(&self) -> String {
        format!(
            "dsl: {} | fts: {} | where: {}",
            self.describe(),
            self.fts_query.as_deref().unwrap_or("-"),
            self.where_sql
        )
    }
}

pub fn plain_query(catalog: &Catalog, text: &str) -> Result<Query, SearchError> {
    if text.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    let mut children: Vec<Query> = catalog
        .fields()
        .iter()
        .map(|field| Query::leaf(&field.name, text))
        .collect();
    match children.len() {
        0 => Err(SearchError::EmptyQuery),
        1 => Ok(children.remove(0)),
        _ => Ok(Query::Group {
            op: Operator::Or,
            children,
        }),
    }
}

pub fn compile_request(
    catalog: &Catalog,
    analyzers: &AnalyzerRegistry,
    query: Option<Query>,
    restrict: &[QueryTerm],
) -> Result<CompiledQuery, SearchError> {
    let mut children: Vec<Query> = Vec::new();
    if let Some(query) = query {
        children.push(query);
    }
    children.extend(
        restrict
            .iter()
            .map(|term| Query::leaf(&term.field, &term.value)),
    );
    let ast = match children.len() {
        0 => return Err(SearchError::EmptyQuery),
        1 => children.remove(0),
        _ => Query::Group {
            op: Operator::And,
            children,
        },
    };

    let mut ctx = CompileCtx {
        catalog,
        analyzers,
        fts_exprs: Vec::new(),
        phrases: Vec::new(),
        exacts: Vec::new(),
        touched: BTreeSet::new(),
    };
    let fragment = compile_node(&ast, &mut ctx)?;

    let canonical = ast.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let fingerprint = hex::encode(hasher.finalize())[..16].to_string();

    let fts_query = if ctx.fts_exprs.is_empty() {
        None
    } else {
        Some(ctx.fts_exprs.join(" OR "))
    };

    Ok(CompiledQuery {
        ast,
        where_sql: fragment.sql,
        where_params: fragment.params,
        fts_query,
        phrases: ctx.phrases,
        exacts: ctx.exacts,
        touched: ctx.touched,
        fingerprint,
    })
}

struct CompileCtx<'a> {
    catalog: &'a Catalog,
    analyzers: &'a AnalyzerRegistry,
    fts_exprs: Vec<String>,
    phrases: Vec<PhraseTerm>,
    exacts: Vec<ExactTerm>,
    touched: BTreeSet<String>,
}

fn compile_node(node: &Query, ctx: &mut CompileCtx) -> Result<SqlFragment, SearchError> {
    match node {
        Query::Leaf { field, value } => compile_leaf(field, value, ctx),
        Query::Group { op, children } => {
            let mut combined: Option<SqlFragment> = None;
            for child in children {
                let fragment = compile_node(child, ctx)?;
                combined = Some(match (combined, op) {
                    (None, _) => fragment,
                    (Some(acc), Operator::And) => acc.and(fragment),
                    (Some(acc), Operator::Or) => acc.or(fragment),
                });
            }
            combined.ok_or(SearchError::EmptyQuery)
        }
    }
}

fn compile_leaf(
    field_name: &str,
    value: &str,
    ctx: &mut CompileCtx,
) -> Result<SqlFragment, SearchError> {
    let field = ctx
        .catalog
        .get(field_name)
        .ok_or_else(|| SearchError::UnknownField(field_name.to_string()))?
        .clone();
    ctx.touched.insert(field.name.clone());

    let single_word = value.split_whitespace().count() == 1;
    if field.has_exact() && (single_word || field.languages().is_empty()) {
        return Ok(exact_predicate(&field, value, ctx));
    }
    Ok(phrase_predicate(&field, value, ctx))
}

fn exact_predicate(field: &SearchField, value: &str, ctx: &mut CompileCtx) -> SqlFragment {
    let norm = exact_normalize(value);
    let subfield = field.subfield(FieldType::Exact);
    ctx.exacts.push(ExactTerm {
        field: field.name.clone(),
        norm: norm.clone(),
    });
    SqlFragment::raw_with_params(
        "page.id IN (SELECT page_id FROM page_exact WHERE subfield = ? AND norm = ?)",
        vec![SqlValue::from(subfield), SqlValue::from(norm)],
    )
}

fn phrase_predicate(field: &SearchField, value: &str, ctx: &mut CompileCtx) -> SqlFragment {
    let mut exprs: Vec<String> = Vec::new();
    for lang in field.languages() {
        let tokens = ctx.analyzers.analyzer(lang).normalize_tokens(value);
        if tokens.is_empty() {
            continue;
        }
        // tokens are alphanumeric, double-quoting needs no escaping
        exprs.push(format!(
            "({} : \"{}\")",
            field.subfield(FieldType::Language(lang)),
            tokens.join(" ")
        ));
        ctx.phrases.push(PhraseTerm {
            field: field.name.clone(),
            lang,
            tokens,
        });
    }
    if exprs.is_empty() {
        return SqlFragment::raw(MATCH_NOTHING);
    }
    let match_expr = exprs.join(" OR ");
    ctx.fts_exprs.push(match_expr.clone());
    SqlFragment::raw_with_params(
        "page.rowid IN (SELECT rowid FROM page_fts WHERE page_fts MATCH ?)",
        vec![SqlValue::from(match_expr)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse_query;
    use crate::dsl::parse_terms;

    fn test_catalog() -> Catalog {
        Catalog::new(vec![
            SearchField {
                name: "title".into(),
                label: "Title".into(),
                description: String::new(),
                types: vec![
                    FieldType::Language(Language::English),
                    FieldType::Language(Language::OldFrench),
                ],
                context: true,
                include_value: true,
                suggestions: Vec::new(),
            },
            SearchField {
                name: "author".into(),
                label: "Author".into(),
                description: String::new(),
                types: vec![FieldType::Exact, FieldType::Language(Language::English)],
                context: false,
                include_value: true,
                suggestions: Vec::new(),
            },
            SearchField {
                name: "category".into(),
                label: "Category".into(),
                description: String::new(),
                types: vec![FieldType::Exact],
                context: false,
                include_value: false,
                suggestions: Vec::new(),
            },
        ])
        .expect("catalog should validate")
    }

    fn compile(query: &str, restrict: &str) -> Result<CompiledQuery, SearchError> {
        let catalog = test_catalog();
        let analyzers = AnalyzerRegistry::default();
        let ast = if query.is_empty() {
            None
        } else {
            Some(parse_query(query).expect("query should parse"))
        };
        let terms = parse_terms(restrict).expect("restrict should parse");
        compile_request(&catalog, &analyzers, ast, &terms)
    }

    #[test]
    fn multi_word_leaf_fans_out_per_language() {
        let compiled = compile("title:'Joie perdue'", "").unwrap();
        assert_eq!(compiled.phrases.len(), 2);
        assert_eq!(
            compiled.phrases[0],
            PhraseTerm {
                field: "title".into(),
                lang: Language::English,
                tokens: vec!["joie".into(), "perdue".into()],
            }
        );
        // The loose analyzer folds j -> i.
        assert_eq!(
            compiled.phrases[1].tokens,
            vec!["ioie".to_string(), "perdue".into()]
        );
        let fts = compiled.fts_query.as_deref().unwrap();
        assert_eq!(
            fts,
            "(title_en : \"joie perdue\") OR (title_fro : \"ioie perdue\")"
        );
        assert!(compiled.where_sql.contains("page_fts MATCH ?"));
        assert!(compiled.exacts.is_empty());
    }

    #[test]
    fn single_word_prefers_exact_variant() {
        let compiled = compile("author:'Machaut'", "").unwrap();
        assert_eq!(compiled.fts_query, None);
        assert!(compiled.phrases.is_empty());
        assert_eq!(
            compiled.exacts,
            vec![ExactTerm {
                field: "author".into(),
                norm: "machaut".into(),
            }]
        );
        assert!(compiled.where_sql.contains("page_exact"));
        assert_eq!(
            compiled.where_params,
            vec![
                SqlValue::from("author_str".to_string()),
                SqlValue::from("machaut".to_string()),
            ]
        );
    }

    #[test]
    fn exact_only_field_takes_multi_word_values() {
        let compiled = compile("category:'Book  of HOURS'", "").unwrap();
        assert_eq!(
            compiled.exacts,
            vec![ExactTerm {
                field: "category".into(),
                norm: "book of hours".into(),
            }]
        );
        assert_eq!(compiled.fts_query, None);
    }

    #[test]
    fn multi_word_on_mixed_field_uses_languages() {
        let compiled = compile("author:'Guillaume de Machaut'", "").unwrap();
        assert!(compiled.exacts.is_empty());
        assert_eq!(compiled.phrases.len(), 1);
        assert_eq!(compiled.phrases[0].lang, Language::English);
    }

    #[test]
    fn unknown_field_is_a_compile_error() {
        let err = compile("nope:'x'", "").unwrap_err();
        assert!(matches!(err, SearchError::UnknownField(name) if name == "nope"));
    }

    #[test]
    fn empty_request_is_rejected() {
        let err = compile("", "").unwrap_err();
        assert!(matches!(err, SearchError::EmptyQuery));
    }

    #[test]
    fn restrictions_alone_form_the_query() {
        let compiled = compile("", "category:'psalter'").unwrap();
        assert_eq!(compiled.describe(), "category:'psalter'");
    }

    #[test]
    fn restrictions_are_anded_onto_the_query() {
        let compiled = compile("title:'joie'", "category:'psalter' author:'Machaut'").unwrap();
        assert_eq!(
            compiled.describe(),
            "(title:'joie' & category:'psalter' & author:'Machaut')"
        );
        let reparsed = parse_query(&compiled.describe()).unwrap();
        assert_eq!(reparsed, compiled.ast);
        assert!(compiled.touches("title"));
        assert!(compiled.touches("category"));
        assert!(!compiled.touches("description"));
    }

    #[test]
    fn group_composition_follows_operators() {
        let compiled = compile("(title:'joie chant' | author:'Jean Froissart')", "").unwrap();
        assert!(compiled.where_sql.starts_with('('));
        assert!(compiled.where_sql.contains(") OR ("));
        // Two FTS leaves, both in the scoring union.
        let fts = compiled.fts_query.unwrap();
        assert!(fts.contains("title_en"));
        assert!(fts.contains("author_en"));
    }

    #[test]
    fn unanalyzable_value_matches_nothing() {
        let compiled = compile("title:'... !!'", "").unwrap();
        assert_eq!(compiled.where_sql, MATCH_NOTHING);
        assert_eq!(compiled.fts_query, None);
        assert!(compiled.where_params.is_empty());
    }

    #[test]
    fn plain_query_spans_the_catalog() {
        let catalog = test_catalog();
        let query = plain_query(&catalog, "joie").unwrap();
        match &query {
            Query::Group { op, children } => {
                assert_eq!(*op, Operator::Or);
                assert_eq!(children.len(), 3);
            }
            other => panic!("expected group, got {other:?}"),
        }
        assert!(plain_query(&catalog, "   ").is_err());
    }

    #[test]
    fn fingerprint_tracks_the_canonical_text() {
        let a = compile("title:'joie chant'", "").unwrap();
        let b = compile("title:'joie chant'", "").unwrap();
        let c = compile("title:'autre chose'", "").unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(a.fingerprint.len(), 16);
    }
}
