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

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use assert_cmd::Command;
use jsonschema::JSONSchema;
use predicates::prelude::*;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

fn quire_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("quire"))
}

fn quire_cmd_with_env(config_root: &Path) -> Command {
    let mut cmd = quire_cmd();
    cmd.env("XDG_CONFIG_HOME", config_root);
    cmd.env("HOME", config_root);
    cmd.env("APPDATA", config_root);
    cmd
}

fn global_config_path(config_root: &Path) -> PathBuf {
    let base = if cfg!(target_os = "macos") {
        config_root.join("Library").join("Application Support")
    } else {
        config_root.to_path_buf()
    };
    base.join("quire").join("quire.toml")
}

fn load_schema() -> JSONSchema {
    let schema_text = include_str!("../schemas/response.schema.json");
    let schema_json: Value = serde_json::from_str(schema_text).expect("schema json");
    JSONSchema::options()
        .compile(&schema_json)
        .expect("compile schema")
}

fn normalize_json(mut value: Value) -> Value {
    if let Some(stats) = value.get_mut("stats")
        && let Some(obj) = stats.as_object_mut()
    {
        obj.insert("took_ms".to_string(), json!(0));
        if obj.contains_key("db_size_bytes") {
            obj.insert("db_size_bytes".to_string(), json!(0));
        }
    }
    strip_tokens(&mut value);
    value
}

fn strip_tokens(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(token) = map.get_mut("resume_token")
                && token.is_string()
            {
                *token = json!("");
            }
            for v in map.values_mut() {
                strip_tokens(v);
            }
        }
        Value::Array(items) => {
            for v in items {
                strip_tokens(v);
            }
        }
        _ => {}
    }
}

fn run_json(cmd: &mut Command, cwd: &Path) -> Value {
    let output = cmd.current_dir(cwd).output().expect("run command");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("parse json")
}

fn assert_schema(schema: &JSONSchema, value: &Value) {
    if let Err(errors) = schema.validate(value) {
        let msgs: Vec<String> = errors.map(|e| e.to_string()).collect();
        panic!("schema validation failed:\n{}", msgs.join("\n"));
    }
}

fn result_ids(value: &Value) -> Vec<String> {
    value
        .get("results")
        .and_then(|v| v.as_array())
        .expect("results array")
        .iter()
        .filter_map(|item| item.get("id"))
        .filter_map(|id| id.as_str())
        .map(str::to_string)
        .collect()
}

fn seed_pages(root: &Path) {
    fs::create_dir_all(root.join("pages")).expect("pages dir");
    let lines = [
        json!({"id": "walters-w88-f1r", "entries": [
            {"field": "title", "lang": "en", "value": "Book of Hours"},
            {"field": "title", "lang": "la", "value": "Horae beatae Mariae virginis"},
            {"field": "author", "value": "Anonymous"},
            {"field": "shelfmark", "value": "W.88"},
            {"field": "category", "value": "book of hours"},
            {"field": "transcription", "lang": "la", "value": "Domine labia mea aperies"},
        ]}),
        json!({"id": "bnf-fr1586-f55v", "entries": [
            {"field": "title", "lang": "fr", "value": "Remede de Fortune"},
            {"field": "author", "value": "Guillaume de Machaut"},
            {"field": "shelfmark", "value": "fr. 1586"},
            {"field": "category", "value": "poetry"},
            {"field": "transcription", "lang": "fro", "value": "Car tout le bien qui me puet avenir"},
            {"field": "annotation", "lang": "en", "value": "Scribal correction in the margin"},
        ]}),
        json!({"id": "kb-76e5-f12r", "entries": [
            {"field": "title", "lang": "en", "value": "Psalter of Eleanor"},
            {"field": "category", "value": "psalter"},
            {"field": "description", "lang": "en", "value": "Full-page miniature of the Annunciation"},
            {"field": "transcription", "lang": "dum", "value": "Doe hi dat cruce sach"},
        ]}),
    ];
    let text: String = lines.iter().map(|v| format!("{v}\n")).collect();
    fs::write(root.join("pages/pages.jsonl"), text).expect("write pages");
}

fn init_and_add(config_root: &Path, root: &Path, schema: &JSONSchema) -> Value {
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["init", "."]);
    let output = cmd.current_dir(root).output().expect("init");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["add", "pages", "--glob", "*.jsonl", "--json"]);
    let add_json = run_json(&mut cmd, root);
    assert_schema(schema, &add_json);
    add_json
}

#[test]
fn golden_cli_outputs() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let config_root = config_temp.path();
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    seed_pages(root);

    let add_json = init_and_add(config_root, root, &schema);
    insta::assert_json_snapshot!("add", normalize_json(add_json));

    // plain search
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["search", "fortune", "--json"]);
    let search_json = run_json(&mut cmd, root);
    assert_schema(&schema, &search_json);
    insta::assert_json_snapshot!("search", normalize_json(search_json));

    // multi-word author lookup goes through the language variant
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["query", "--dsl", "author:'guillaume de machaut'", "--json"]);
    let author_json = run_json(&mut cmd, root);
    assert_schema(&schema, &author_json);
    insta::assert_json_snapshot!("query_author", normalize_json(author_json));

    // search with punctuation only matches nothing but stays well formed
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["search", "???", "--json"]);
    let sanitized_json = run_json(&mut cmd, root);
    assert_schema(&schema, &sanitized_json);
    insta::assert_json_snapshot!("search_sanitized", normalize_json(sanitized_json));

    // structured query, loose spelling reaches the Old French transcription
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["query", "--dsl", "transcription:'quj me puet'", "--json"]);
    let query_json = run_json(&mut cmd, root);
    assert_schema(&schema, &query_json);
    insta::assert_json_snapshot!("query_loose", normalize_json(query_json));

    // boolean group with a restriction
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args([
        "query",
        "--dsl",
        "(title:'hours' | title:'psalter')",
        "--restrict",
        "category:'book of hours'",
        "--json",
    ]);
    let restricted_json = run_json(&mut cmd, root);
    assert_schema(&schema, &restricted_json);
    insta::assert_json_snapshot!("query_restricted", normalize_json(restricted_json));

    // debug echoes the compiled form
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["search", "fortune", "--debug", "--json"]);
    let debug_json = run_json(&mut cmd, root);
    assert_schema(&schema, &debug_json);
    let debug_text = debug_json["query"]["debug"].as_str().expect("debug text");
    assert!(debug_text.contains("where:"), "got: {debug_text}");

    // fields
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["fields", "--json"]);
    let fields_json = run_json(&mut cmd, root);
    assert_schema(&schema, &fields_json);
    insta::assert_json_snapshot!("fields", normalize_json(fields_json));

    // stats
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["stats", "--json"]);
    let stats_json = run_json(&mut cmd, root);
    assert_schema(&schema, &stats_json);
    insta::assert_json_snapshot!("stats", normalize_json(stats_json));

    // doctor
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["doctor", "--json"]);
    let doctor_json = run_json(&mut cmd, root);
    assert_schema(&schema, &doctor_json);
    insta::assert_json_snapshot!("doctor", normalize_json(doctor_json));

    // clear
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["clear", "--json"]);
    let clear_json = run_json(&mut cmd, root);
    assert_schema(&schema, &clear_json);
    insta::assert_json_snapshot!("clear", normalize_json(clear_json));

    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["stats", "--json"]);
    let stats_json = run_json(&mut cmd, root);
    assert_eq!(stats_json["stats"]["page_count"], json!(0));
}

#[test]
fn error_envelopes_stay_well_formed() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let config_root = config_temp.path();
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    seed_pages(root);
    init_and_add(config_root, root, &schema);

    let cases = [
        (
            vec!["query", "--dsl", "title:'unclosed", "--json"],
            "parse_error",
        ),
        (
            vec!["query", "--dsl", "nave:'north'", "--json"],
            "unknown_field",
        ),
        (vec!["search", "   ", "--json"], "empty_query"),
    ];
    for (args, code) in cases {
        let mut cmd = quire_cmd_with_env(config_root);
        cmd.args(&args);
        let value = run_json(&mut cmd, root);
        assert_schema(&schema, &value);
        assert_eq!(value["ok"], json!(false), "args: {args:?}");
        assert_eq!(value["error"]["code"], json!(code), "args: {args:?}");
    }

    // without --json the same failure goes to stderr and exits nonzero
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["query", "--dsl", "nave:'north'"]);
    cmd.current_dir(root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nave"));

    // a missing store is an ordinary error envelope, not a crash
    let empty = TempDir::new().expect("tempdir");
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["search", "machaut", "--json"]);
    let value = run_json(&mut cmd, empty.path());
    assert_schema(&schema, &value);
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("error"));
    let message = value["error"]["message"].as_str().expect("message");
    assert!(message.contains("quire init"), "got: {message}");
}

#[test]
fn resume_walk_matches_a_single_page() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let config_root = config_temp.path();
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();

    fs::create_dir_all(root.join("pages")).expect("pages dir");
    let text: String = (1..=7)
        .map(|i| {
            format!(
                "{}\n",
                json!({"id": format!("page-{i}"), "entries": [
                    {"field": "title", "lang": "en", "value": "the joy of books"},
                ]})
            )
        })
        .collect();
    fs::write(root.join("pages/pages.jsonl"), text).expect("write pages");

    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["init", "."]);
    assert!(cmd.current_dir(root).output().unwrap().status.success());
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["add", "pages", "--json"]);
    let add_json = run_json(&mut cmd, root);
    assert_schema(&schema, &add_json);

    let mut walked: Vec<String> = Vec::new();
    let mut token: Option<String> = None;
    let mut offset = 0usize;
    let mut pages = 0usize;
    loop {
        let mut cmd = quire_cmd_with_env(config_root);
        cmd.args(["search", "joy", "--count", "3", "--json"]);
        cmd.args(["--offset", &offset.to_string()]);
        if let Some(token) = &token {
            cmd.args(["--resume", token]);
        }
        let value = run_json(&mut cmd, root);
        assert_schema(&schema, &value);
        assert_eq!(value["page"]["total"], json!(7));
        let ids = result_ids(&value);
        offset += ids.len();
        walked.extend(ids);
        pages += 1;
        match value["page"]["resume_token"].as_str() {
            Some(next) => token = Some(next.to_string()),
            None => break,
        }
    }
    assert_eq!(pages, 3);
    assert_eq!(walked.len(), 7);

    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["search", "joy", "--count", "10", "--json"]);
    let single = run_json(&mut cmd, root);
    assert_eq!(result_ids(&single), walked);

    // a damaged token still lands on the right page through the offset
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args([
        "search", "joy", "--count", "3", "--offset", "3", "--resume", "!!bad!!", "--json",
    ]);
    let value = run_json(&mut cmd, root);
    assert_schema(&schema, &value);
    assert_eq!(result_ids(&value), walked[3..6].to_vec());
}

#[test]
fn declared_fields_replace_the_default_catalog() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let config_root = config_temp.path();
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();

    let config_path = global_config_path(config_root);
    fs::create_dir_all(config_path.parent().expect("config parent")).expect("config dir");
    let config = String::from(
        "store_path = \"quire.db\"\ndefault_page_size = 10\ncontext_window = 4\n\n[[fields]]\nname = \"incipit\"\nlabel = \"Incipit\"\ntypes = [\"la\", \"str\"]\ncontext = true\ninclude_value = true\n",
    );
    fs::write(&config_path, config).expect("write config");

    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["init", "."]);
    assert!(cmd.current_dir(root).output().unwrap().status.success());

    fs::create_dir_all(root.join("pages")).expect("pages dir");
    let text = format!(
        "{}\n",
        json!({"id": "clm-4660-f1r", "entries": [
            {"field": "incipit", "value": "Beatus uir qui non abiit"},
        ]})
    );
    fs::write(root.join("pages/pages.jsonl"), text).expect("write pages");

    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["add", "pages", "--json"]);
    let add_json = run_json(&mut cmd, root);
    assert_schema(&schema, &add_json);

    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["fields", "--json"]);
    let fields_json = run_json(&mut cmd, root);
    assert_schema(&schema, &fields_json);
    let fields = fields_json["fields"].as_array().expect("fields array");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0]["name"], json!("incipit"));

    // the Latin analyzer folds nothing beyond diacritics, so "uir" is literal
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["query", "--dsl", "incipit:'beatus uir'", "--json"]);
    let query_json = run_json(&mut cmd, root);
    assert_schema(&schema, &query_json);
    assert_eq!(result_ids(&query_json), vec!["clm-4660-f1r"]);

    // single-word lookups on a str-typed field hit the exact variant whole
    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["query", "--dsl", "incipit:'beatus'", "--json"]);
    let exact_json = run_json(&mut cmd, root);
    assert_schema(&schema, &exact_json);
    assert_eq!(exact_json["page"]["total"], json!(0));

    let mut cmd = quire_cmd_with_env(config_root);
    cmd.args(["search", "Beatus uir qui non abiit", "--json"]);
    let search_json = run_json(&mut cmd, root);
    assert_schema(&schema, &search_json);
    assert_eq!(search_json["page"]["total"], json!(1));
    let snippet = search_json["results"][0]["context"][0]["snippet"]
        .as_str()
        .expect("snippet");
    assert!(snippet.contains("<b>"), "got: {snippet}");
}
