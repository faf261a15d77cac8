//! Installed search engines and alias normalization.
//!
//! Every refresh walks the provider's visible engines in order and makes sure
//! each one carries a short, keyword-friendly alias (`^[a-z0-9_-]+$`), unique
//! within the pass. Aliases are written back to the engine only when they
//! change: on a real browser the write hits the search service and is slow.
//!
//! The resulting table is published as one immutable snapshot, so readers
//! never observe a half-normalized registry.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::codec::encode_component;

/// MIME type of the JSON suggestion protocol.
pub const SUGGEST_JSON: &str = "application/x-suggestions+json";

/// Alias used when nothing usable can be derived from an engine's name.
pub const FALLBACK_ALIAS: &str = "search";

/// Number of numeric suffixes tried on an alias collision.
pub const MAX_ALIAS_SUFFIX: u32 = 10;

static VALID_ALIAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("valid regex"));

static NAME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^A-Za-z0-9_-]*([A-Za-z0-9_-]+)").expect("valid regex"));

/// POST body attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostData {
    pub content_type: String,
    pub body: String,
}

impl PostData {
    /// `application/x-www-form-urlencoded` body.
    pub fn form(body: impl Into<String>) -> Self {
        Self {
            content_type: "application/x-www-form-urlencoded".to_string(),
            body: body.into(),
        }
    }
}

/// A concrete request produced by an engine for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub url: String,
    pub post_data: Option<PostData>,
}

/// An engine as exposed by the browser's search service.
pub trait SearchEngine {
    fn name(&self) -> &str;
    fn alias(&self) -> Option<String>;
    /// Persists a new alias. Expensive on real providers.
    fn set_alias(&self, alias: &str);
    fn description(&self) -> &str;
    fn icon(&self) -> Option<&str>;
    /// Raw search template, for display.
    fn template(&self) -> &str;
    fn supports_response_type(&self, mime: &str) -> bool;
    /// `None` response type means a regular HTML search.
    fn submission(&self, query: &str, response_type: Option<&str>) -> Option<Submission>;
}

pub trait SearchEngineProvider {
    fn visible_engines(&self) -> Vec<Rc<dyn SearchEngine>>;
}

/// Snapshot entry describing one engine after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRecord {
    pub alias: String,
    pub description: String,
    pub submission_template: String,
    pub supports_suggestions: bool,
    pub icon: Option<String>,
}

struct Entry {
    record: EngineRecord,
    engine: Rc<dyn SearchEngine>,
}

pub struct EngineRegistry {
    provider: Rc<dyn SearchEngineProvider>,
    snapshot: RefCell<Option<Rc<[Entry]>>>,
}

impl EngineRegistry {
    pub fn new(provider: Rc<dyn SearchEngineProvider>) -> Self {
        Self {
            provider,
            snapshot: RefCell::new(None),
        }
    }

    /// Re-reads the provider, normalizes aliases and publishes a new snapshot.
    pub fn refresh(&self) {
        let engines = self.provider.visible_engines();
        let mut assigned: Vec<String> = Vec::with_capacity(engines.len());
        let mut entries = Vec::with_capacity(engines.len());

        for engine in engines {
            let current = engine.alias();
            let candidate = derive_alias(current.as_deref(), engine.name());
            let alias = unique_alias(&candidate, &assigned);

            if current.as_deref() != Some(alias.as_str()) {
                debug!(
                    engine = engine.name(),
                    old = current.as_deref().unwrap_or(""),
                    new = %alias,
                    "Rewriting engine alias"
                );
                engine.set_alias(&alias);
            }

            assigned.push(alias.clone());
            entries.push(Entry {
                record: EngineRecord {
                    alias,
                    description: engine.description().to_string(),
                    submission_template: engine.template().to_string(),
                    supports_suggestions: engine.supports_response_type(SUGGEST_JSON),
                    icon: engine.icon().map(str::to_string),
                },
                engine,
            });
        }

        debug!(count = entries.len(), "Search engine registry rebuilt");
        *self.snapshot.borrow_mut() = Some(Rc::from(entries));
    }

    /// Rebuilds the registry and returns the engines in provider order.
    pub fn list_engines(&self) -> Vec<EngineRecord> {
        self.refresh();
        self.entries()
            .iter()
            .map(|entry| entry.record.clone())
            .collect()
    }

    /// First engine with this alias in the current snapshot.
    pub fn by_alias(&self, alias: &str) -> Option<Rc<dyn SearchEngine>> {
        self.entries()
            .iter()
            .find(|entry| entry.record.alias == alias)
            .map(|entry| Rc::clone(&entry.engine))
    }

    pub fn record(&self, alias: &str) -> Option<EngineRecord> {
        self.entries()
            .iter()
            .find(|entry| entry.record.alias == alias)
            .map(|entry| entry.record.clone())
    }

    /// Current snapshot, built on first use.
    fn entries(&self) -> Rc<[Entry]> {
        if self.snapshot.borrow().is_none() {
            self.refresh();
        }
        self.snapshot
            .borrow()
            .as_ref()
            .map(Rc::clone)
            .unwrap_or_else(|| Rc::from(Vec::new()))
    }
}

/// Keeps a valid alias, otherwise derives one from the engine's display name.
pub fn derive_alias(current: Option<&str>, name: &str) -> String {
    if let Some(alias) = current
        && VALID_ALIAS.is_match(alias)
    {
        return alias.to_string();
    }
    NAME_PREFIX
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|word| word.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| FALLBACK_ALIAS.to_string())
}

/// Appends `1`, `2`, … while `candidate` is taken.
///
/// After [`MAX_ALIAS_SUFFIX`] attempts the last variant is kept even if it
/// collides; the registry then holds a duplicate and lookups return the first
/// engine carrying it.
pub fn unique_alias(candidate: &str, taken: &[String]) -> String {
    let mut alias = candidate.to_string();
    for n in 1..=MAX_ALIAS_SUFFIX {
        if !taken.iter().any(|existing| *existing == alias) {
            break;
        }
        alias = format!("{candidate}{n}");
    }
    alias
}

// ─────────────────────────────────────────────────────────────────────────────
// Template-backed engines
// ─────────────────────────────────────────────────────────────────────────────

/// Engine defined by `%s` URL templates, as found in the `[[engines]]`
/// config section.
#[derive(Debug)]
pub struct TemplateEngine {
    name: String,
    alias: RefCell<Option<String>>,
    description: String,
    icon: Option<String>,
    search_url: String,
    post_data: Option<String>,
    suggest_url: Option<String>,
    alias_writes: Cell<usize>,
}

impl TemplateEngine {
    pub fn new(name: impl Into<String>, search_url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            alias: RefCell::new(None),
            icon: None,
            search_url: search_url.into(),
            post_data: None,
            suggest_url: None,
            alias_writes: Cell::new(0),
        }
    }

    pub fn with_alias(self, alias: impl Into<String>) -> Self {
        *self.alias.borrow_mut() = Some(alias.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_post_data(mut self, template: impl Into<String>) -> Self {
        self.post_data = Some(template.into());
        self
    }

    pub fn with_suggest_url(mut self, template: impl Into<String>) -> Self {
        self.suggest_url = Some(template.into());
        self
    }

    /// How many times the registry rewrote this engine's alias.
    pub fn alias_writes(&self) -> usize {
        self.alias_writes.get()
    }
}

impl SearchEngine for TemplateEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> Option<String> {
        self.alias.borrow().clone()
    }

    fn set_alias(&self, alias: &str) {
        *self.alias.borrow_mut() = Some(alias.to_string());
        self.alias_writes.set(self.alias_writes.get() + 1);
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    fn template(&self) -> &str {
        &self.search_url
    }

    fn supports_response_type(&self, mime: &str) -> bool {
        match mime {
            SUGGEST_JSON => self.suggest_url.is_some(),
            "text/html" => true,
            _ => false,
        }
    }

    fn submission(&self, query: &str, response_type: Option<&str>) -> Option<Submission> {
        let encoded = encode_component(query);
        match response_type {
            None | Some("text/html") => Some(Submission {
                url: self.search_url.replace("%s", &encoded),
                post_data: self
                    .post_data
                    .as_ref()
                    .map(|template| PostData::form(template.replace("%s", &encoded))),
            }),
            Some(SUGGEST_JSON) => self.suggest_url.as_ref().map(|template| Submission {
                url: template.replace("%s", &encoded),
                post_data: None,
            }),
            Some(_) => None,
        }
    }
}

/// Ordered list of engines kept in memory.
#[derive(Default)]
pub struct MemoryEngines {
    engines: Vec<Rc<TemplateEngine>>,
}

impl MemoryEngines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, engine: TemplateEngine) -> Rc<TemplateEngine> {
        let engine = Rc::new(engine);
        self.engines.push(Rc::clone(&engine));
        engine
    }
}

impl SearchEngineProvider for MemoryEngines {
    fn visible_engines(&self) -> Vec<Rc<dyn SearchEngine>> {
        self.engines
            .iter()
            .map(|engine| Rc::clone(engine) as Rc<dyn SearchEngine>)
            .collect()
    }
}
