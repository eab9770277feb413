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

mod analyzer;
mod catalog;
mod cli;
mod compile;
mod config;
mod cursor;
mod dsl;
mod error;
mod index;
mod model;
mod output;
mod search;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::QueryArgs;
use crate::cli::SearchArgs;
use crate::config::ConfigCtx;
use crate::error::SearchError;
use crate::model::SearchOptions;
use crate::model::SearchResult;
use crate::output::JsonResponse;
use crate::output::StatsOut;
use crate::output::print_json;
use crate::store::Store;
use crate::store::StoreMode;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init { path } => cmd_init(path),
        Commands::Add(args) => {
            handle_result(cmd_add(args.paths, args.glob, args.json), args.json)
        }
        Commands::Search(args) => {
            let json = args.json;
            handle_result(cmd_search(args), json)
        }
        Commands::Query(args) => {
            let json = args.json;
            handle_result(cmd_query(args), json)
        }
        Commands::Fields { json } => handle_result(cmd_fields(json), json),
        Commands::Clear { json } => handle_result(cmd_clear(json), json),
        Commands::Stats { json } => handle_result(cmd_stats(json), json),
        Commands::Doctor { json } => handle_result(cmd_doctor(json), json),
    }
}

fn handle_result(result: Result<()>, json: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                let code = match err.downcast_ref::<SearchError>() {
                    Some(search_err) => search_err.code(),
                    None => "error",
                };
                let resp = JsonResponse::error(code, &err.to_string());
                print_json(&resp)?;
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&root).with_context(|| format!("create dir {root:?}"))?;

    let config = config::load_global_config()?;
    let catalog = config.catalog()?;
    let store_path = root.join(&config.store_path);
    Store::init(&store_path, &catalog)?;

    println!("Initialized Quire store at {}", store_path.display());
    Ok(())
}

fn cmd_add(paths: Vec<PathBuf>, glob: Option<String>, json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let catalog = ctx.config.catalog()?;
    let analyzers = ctx.config.analyzers();
    let store = Store::open(&ctx.store_path(), StoreMode::ReadWrite, &catalog)?;

    let started = Instant::now();
    let docs = index::load_documents(&paths, glob.as_deref())?;
    let report = index::index_documents(&store, &catalog, &analyzers, &docs)?;
    let took_ms = started.elapsed().as_millis() as i64;

    if json {
        let resp = JsonResponse::ok()
            .with_stats(StatsOut {
                took_ms,
                page_count: Some(report.pages_indexed as i64),
                value_count: Some(report.values_indexed as i64),
                ..Default::default()
            })
            .with_warnings(report.warnings);
        print_json(&resp)?;
    } else {
        println!(
            "Indexed {} pages ({} values)",
            report.pages_indexed, report.values_indexed
        );
        for warn in report.warnings {
            eprintln!("warning: {warn}");
        }
    }

    Ok(())
}

fn cmd_search(args: SearchArgs) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let catalog = ctx.config.catalog()?;
    let analyzers = ctx.config.analyzers();
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly, &catalog)?;

    let terms = dsl::parse_terms(args.restrict.as_deref().unwrap_or_default())?;
    let query = compile::plain_query(&catalog, &args.query)?;
    let compiled = compile::compile_request(&catalog, &analyzers, Some(query), &terms)?;

    let opts = SearchOptions {
        offset: args.offset,
        match_count: args.count,
        resume_token: args.resume,
        sort: args.sort,
        debug: args.debug,
    };
    let started = Instant::now();
    let result = search::run(&store, &catalog, &analyzers, &ctx.config, &compiled, &opts)?;
    let took_ms = started.elapsed().as_millis() as i64;

    if args.json {
        let resp = JsonResponse::ok()
            .with_query(
                &args.query,
                &compiled.describe(),
                args.restrict,
                result.debug.clone(),
            )
            .with_result(&result)
            .with_stats(StatsOut {
                took_ms,
                ..Default::default()
            });
        print_json(&resp)?;
    } else {
        print_result(&result);
    }

    Ok(())
}

fn cmd_query(args: QueryArgs) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let catalog = ctx.config.catalog()?;
    let analyzers = ctx.config.analyzers();
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly, &catalog)?;

    let dsl_text = if let Some(path) = args.dsl.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("read query file {path}"))?
    } else {
        args.dsl
    };

    let terms = dsl::parse_terms(args.restrict.as_deref().unwrap_or_default())?;
    let query = dsl::parse_query(&dsl_text)?;
    let compiled = compile::compile_request(&catalog, &analyzers, Some(query), &terms)?;

    let opts = SearchOptions {
        offset: args.offset,
        match_count: args.count,
        resume_token: args.resume,
        sort: args.sort,
        debug: args.debug,
    };
    let started = Instant::now();
    let result = search::run(&store, &catalog, &analyzers, &ctx.config, &compiled, &opts)?;
    let took_ms = started.elapsed().as_millis() as i64;

    if args.json {
        let resp = JsonResponse::ok()
            .with_query("", &compiled.describe(), args.restrict, result.debug.clone())
            .with_result(&result)
            .with_stats(StatsOut {
                took_ms,
                ..Default::default()
            });
        print_json(&resp)?;
    } else {
        print_result(&result);
    }

    Ok(())
}

fn print_result(result: &SearchResult) {
    println!(
        "{} matches ({} shown from offset {})",
        result.total,
        result.matches.len(),
        result.offset
    );
    for hit in &result.matches {
        println!("{}", hit.id);
        for pair in &hit.context {
            println!("  {}: {}", pair.label, pair.snippet);
        }
        for pair in &hit.values {
            println!("  {} = {}", pair.field, pair.value);
        }
    }
    if let Some(token) = &result.resume_token {
        println!("next: --resume {token}");
    }
    if let Some(debug) = &result.debug {
        eprintln!("debug: {debug}");
    }
}

fn cmd_fields(json: bool) -> Result<()> {
    let config = config::load_global_config()?;
    let catalog = config.catalog()?;

    if json {
        let resp = JsonResponse::ok().with_fields(catalog.infos());
        print_json(&resp)?;
    } else {
        for info in catalog.infos() {
            println!("{} [{}]  {}", info.name, info.types.join(", "), info.label);
            if !info.description.is_empty() {
                println!("  {}", info.description);
            }
            for suggestion in &info.suggestions {
                println!("  * {} ({})", suggestion.value, suggestion.label);
            }
        }
    }

    Ok(())
}

fn cmd_clear(json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let catalog = ctx.config.catalog()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadWrite, &catalog)?;
    let stats = store.stats()?;
    store.clear()?;

    if json {
        let resp = JsonResponse::ok().with_stats(StatsOut {
            took_ms: 0,
            page_count: Some(stats.page_count),
            ..Default::default()
        });
        print_json(&resp)?;
    } else {
        println!("Cleared {} pages", stats.page_count);
    }

    Ok(())
}

fn cmd_stats(json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let catalog = ctx.config.catalog()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly, &catalog)?;
    let stats = store.stats()?;

    if json {
        let resp = JsonResponse::ok().with_stats(StatsOut {
            took_ms: 0,
            page_count: Some(stats.page_count),
            value_count: Some(stats.value_count),
            db_size_bytes: Some(stats.db_size_bytes),
            status: None,
        });
        print_json(&resp)?;
    } else {
        println!("Pages: {}", stats.page_count);
        println!("Values: {}", stats.value_count);
        println!("DB size: {} bytes", stats.db_size_bytes);
    }

    Ok(())
}

fn cmd_doctor(json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let catalog = ctx.config.catalog()?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly, &catalog)?;
    let report = store.integrity_check()?;
    let consistency = store.consistency_report()?;

    let mut warnings = Vec::new();
    if !consistency.fts_ok() {
        warnings.push(format!(
            "{} of {} pages missing from the text index",
            consistency.fts_missing, consistency.page_count
        ));
    }
    if !consistency.orphans_ok() {
        warnings.push(format!(
            "{} orphan values, {} orphan exact postings",
            consistency.orphan_values, consistency.orphan_exact
        ));
    }

    if json {
        let resp = JsonResponse::ok()
            .with_stats(StatsOut {
                took_ms: 0,
                page_count: Some(report.stats.page_count),
                value_count: Some(report.stats.value_count),
                db_size_bytes: Some(report.stats.db_size_bytes),
                status: Some(report.status.clone()),
            })
            .with_warnings(warnings);
        print_json(&resp)?;
    } else {
        println!("Integrity: {}", report.status);
        for warn in warnings {
            eprintln!("warning: {warn}");
        }
    }

    Ok(())
}
