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

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::analyzer::AnalyzerRegistry;
use crate::catalog::Catalog;
use crate::catalog::FieldType;
use crate::catalog::Language;
use crate::catalog::SearchField;
use crate::catalog::Suggestion;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: PathBuf,
    pub default_page_size: usize,
    pub context_window: usize,
    pub marker_open: char,
    pub marker_close: char,
    pub fields: Vec<FieldSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("quire.db"),
            default_page_size: 25,
            context_window: 8,
            marker_open: '[',
            marker_close: ']',
            fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub description: String,
    pub types: Vec<String>,
    pub context: bool,
    pub include_value: bool,
    pub suggestions: Vec<Suggestion>,
}

impl Config {
    pub fn markers(&self) -> (char, char) {
        (self.marker_open, self.marker_close)
    }

    pub fn analyzers(&self) -> AnalyzerRegistry {
        AnalyzerRegistry::new(self.markers())
    }

    pub fn catalog(&self) -> Result<Catalog> {
        if self.fields.is_empty() {
            return default_catalog();
        }
        let fields = self
            .fields
            .iter()
            .map(spec_to_field)
            .collect::<Result<Vec<_>>>()?;
        Catalog::new(fields)
    }
}

fn spec_to_field(spec: &FieldSpec) -> Result<SearchField> {
    let mut types = Vec::new();
    for code in &spec.types {
        let ftype = FieldType::from_code(code).ok_or_else(|| {
            anyhow::anyhow!("unknown type '{}' on field '{}'", code, spec.name)
        })?;
        types.push(ftype);
    }
    Ok(SearchField {
        name: spec.name.clone(),
        label: if spec.label.is_empty() {
            spec.name.clone()
        } else {
            spec.label.clone()
        },
        description: spec.description.clone(),
        types,
        context: spec.context,
        include_value: spec.include_value,
        suggestions: spec.suggestions.clone(),
    })
}

fn default_catalog() -> Result<Catalog> {
    use FieldType::Exact;
    use FieldType::Language as Lang;
    let field = |name: &str,
                 label: &str,
                 description: &str,
                 types: Vec<FieldType>,
                 context: bool,
                 include_value: bool| SearchField {
        name: name.to_string(),
        label: label.to_string(),
        description: description.to_string(),
        types,
        context,
        include_value,
        suggestions: Vec::new(),
    };
    let mut category = field(
        "category",
        "Category",
        "Kind of manuscript",
        vec![Exact],
        false,
        true,
    );
    category.suggestions = vec![
        Suggestion {
            value: "book of hours".into(),
            label: "Book of Hours".into(),
        },
        Suggestion {
            value: "psalter".into(),
            label: "Psalter".into(),
        },
        Suggestion {
            value: "bible".into(),
            label: "Bible".into(),
        },
        Suggestion {
            value: "breviary".into(),
            label: "Breviary".into(),
        },
    ];
    Catalog::new(vec![
        field(
            "title",
            "Title",
            "Title of the work",
            vec![
                Lang(Language::English),
                Lang(Language::French),
                Lang(Language::Latin),
            ],
            true,
            true,
        ),
        field(
            "author",
            "Author",
            "Attributed author or workshop",
            vec![Exact, Lang(Language::English)],
            false,
            true,
        ),
        field(
            "shelfmark",
            "Shelfmark",
            "Holding library call number",
            vec![Exact],
            false,
            true,
        ),
        field(
            "description",
            "Description",
            "Curatorial description",
            vec![Lang(Language::English), Lang(Language::French)],
            true,
            false,
        ),
        field(
            "transcription",
            "Transcription",
            "Diplomatic transcription of the page",
            vec![
                Lang(Language::OldFrench),
                Lang(Language::MiddleDutch),
                Lang(Language::Latin),
            ],
            true,
            false,
        ),
        field(
            "annotation",
            "Annotations",
            "Marginal and interlinear annotations",
            vec![Lang(Language::English), Lang(Language::OldFrench)],
            true,
            false,
        ),
        category,
    ])
}

#[derive(Debug, Clone)]
pub struct ConfigCtx {
    pub root: PathBuf,
    pub config: Config,
}

impl ConfigCtx {
    pub fn load_from_cwd() -> Result<Self> {
        let cwd = std::env::current_dir().context("get current dir")?;
        Self::load_from(&cwd)
    }

    pub fn load_from(start: &Path) -> Result<Self> {
        let config = load_global_config()?;
        let root = find_store_root(start, &config.store_path)
            .ok_or_else(|| anyhow::anyhow!("store not found; run `quire init` first"))?;
        let legacy = root.join("quire.toml");
        if legacy.exists() {
            let global = global_config_path()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<config dir unavailable>".to_string());
            anyhow::bail!(
                "local quire.toml is no longer supported; move settings to {}",
                global
            );
        }
        Ok(Self { root, config })
    }

    pub fn store_path(&self) -> PathBuf {
        if self.config.store_path.is_absolute() {
            self.config.store_path.clone()
        } else {
            self.root.join(&self.config.store_path)
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return Some(PathBuf::from(appdata));
        }
        if let Ok(profile) = std::env::var("USERPROFILE") {
            return Some(PathBuf::from(profile).join("AppData").join("Roaming"));
        }
        return None;
    }

    if cfg!(target_os = "macos") {
        let home = std::env::var("HOME").ok()?;
        return Some(
            PathBuf::from(home)
                .join("Library")
                .join("Application Support"),
        );
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config"))
}

pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("quire").join("quire.toml"))
}

pub fn load_global_config() -> Result<Config> {
    let Some(path) = global_config_path() else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Ok(Config::default());
    }
    read_config(&path)
}

pub fn find_store_root(start: &Path, store_path: &Path) -> Option<PathBuf> {
    if store_path.is_absolute() {
        return store_path
            .exists()
            .then(|| store_path.parent().unwrap_or(store_path).to_path_buf());
    }

    let mut cur = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    loop {
        let candidate = cur.join(store_path);
        if candidate.exists() {
            return Some(cur);
        }
        match cur.parent() {
            Some(parent) => cur = parent.to_path_buf(),
            None => return None,
        }
    }
}

pub fn read_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut config: Config = toml::from_str(&text).context("parse quire.toml")?;
    if config.default_page_size == 0 {
        config.default_page_size = Config::default().default_page_size;
    }
    Ok(config)
}
