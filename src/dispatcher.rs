//! Entry point tying the keyword store, engine registry, resolver and
//! suggestion fan-out together.
//!
//! Collaborators are passed in explicitly; the only shared state is the two
//! snapshot-holding registries, threaded through by `Rc`.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::codec::{DefaultCodec, TextCodec};
use crate::config::Config;
use crate::engines::{EngineRecord, EngineRegistry, MemoryEngines, SearchEngineProvider, TemplateEngine};
use crate::error::ConfigError;
use crate::history::{HistoryProvider, MemoryHistory};
use crate::keywords::{BookmarkKeywordProvider, KeywordStore, MemoryBookmarks};
use crate::resolver::{CharsetLookup, ResolvedTarget, TemplateResolver};
use crate::suggest::{DEFAULT_SUGGEST_ENGINE, HttpFetch, SuggestionFanout};

/// External services the dispatcher reads from.
pub struct Collaborators {
    pub bookmarks: Rc<dyn BookmarkKeywordProvider>,
    pub charsets: Rc<dyn CharsetLookup>,
    pub engines: Rc<dyn SearchEngineProvider>,
    pub history: Rc<dyn HistoryProvider>,
    pub fetch: Arc<dyn HttpFetch>,
    pub codec: Rc<dyn TextCodec>,
}

/// Search behavior that is not owned by any collaborator.
#[derive(Debug, Clone, Default)]
pub struct DispatchSettings {
    pub default_engine: String,
    pub suggest_engines: Vec<String>,
    pub suggest_timeout: Option<Duration>,
}

pub struct SearchDispatcher {
    pub(crate) keywords: Rc<KeywordStore>,
    pub(crate) engines: Rc<EngineRegistry>,
    pub(crate) resolver: TemplateResolver,
    pub(crate) fanout: SuggestionFanout,
    pub(crate) history: Rc<dyn HistoryProvider>,
    pub(crate) settings: DispatchSettings,
}

impl SearchDispatcher {
    pub fn new(collaborators: Collaborators, settings: DispatchSettings) -> Self {
        let keywords = Rc::new(KeywordStore::new(collaborators.bookmarks));
        let engines = Rc::new(EngineRegistry::new(collaborators.engines));
        let resolver = TemplateResolver::new(
            Rc::clone(&keywords),
            Rc::clone(&engines),
            collaborators.charsets,
            collaborators.codec,
        );
        let fanout = SuggestionFanout::new(Rc::clone(&engines), collaborators.fetch)
            .with_timeout(settings.suggest_timeout);
        Self {
            keywords,
            engines,
            resolver,
            fanout,
            history: collaborators.history,
            settings,
        }
    }

    /// Builds in-memory collaborators from the config sections.
    pub fn from_config(config: &Config, fetch: Arc<dyn HttpFetch>) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut bookmarks = MemoryBookmarks::new();
        for keyword in &config.keywords {
            bookmarks.insert(keyword.to_record());
            if let Some(charset) = &keyword.charset {
                bookmarks.set_charset(keyword.url.clone(), charset.clone());
            }
        }
        let bookmarks = Rc::new(bookmarks);

        let mut engines = MemoryEngines::new();
        for entry in &config.engines {
            let mut engine = TemplateEngine::new(entry.name.clone(), entry.search_url.clone());
            if let Some(alias) = &entry.alias {
                engine = engine.with_alias(alias.clone());
            }
            if !entry.description.is_empty() {
                engine = engine.with_description(entry.description.clone());
            }
            if let Some(icon) = &entry.icon {
                engine = engine.with_icon(icon.clone());
            }
            if let Some(post_data) = &entry.post_data {
                engine = engine.with_post_data(post_data.clone());
            }
            if let Some(suggest_url) = &entry.suggest_url {
                engine = engine.with_suggest_url(suggest_url.clone());
            }
            engines.push(engine);
        }

        info!(
            engines = config.engines.len(),
            keywords = config.keywords.len(),
            history = config.history.len(),
            "Search dispatcher configured"
        );

        Ok(Self::new(
            Collaborators {
                bookmarks: bookmarks.clone(),
                charsets: bookmarks,
                engines: Rc::new(engines),
                history: Rc::new(MemoryHistory::new(config.history.clone())),
                fetch,
                codec: Rc::new(DefaultCodec),
            },
            DispatchSettings {
                default_engine: config.search.default_engine.clone(),
                suggest_engines: config.search.suggest_engines.clone(),
                suggest_timeout: config.search.suggest_timeout(),
            },
        ))
    }

    /// `None` means "not a keyword": treat the text as a URL or a search.
    pub fn resolve(&self, text: &str) -> Option<ResolvedTarget> {
        self.resolver.resolve(text)
    }

    /// Resolves through the default engine when `use_default` is set.
    pub fn resolve_with_default(&self, text: &str, use_default: bool) -> Option<ResolvedTarget> {
        self.resolver
            .resolve_with_default(text, &self.settings.default_engine, use_default)
    }

    /// Normalized engine list, rebuilt from the provider.
    pub fn list_engines(&self) -> Vec<EngineRecord> {
        self.engines.list_engines()
    }

    /// Re-reads bookmark keywords and engines.
    pub fn refresh(&self) {
        self.keywords.refresh();
        self.engines.refresh();
    }

    /// Engines used for suggestions when the caller names none.
    pub(crate) fn suggest_engines(&self) -> Vec<String> {
        if self.settings.suggest_engines.is_empty() {
            vec![DEFAULT_SUGGEST_ENGINE.to_string()]
        } else {
            self.settings.suggest_engines.clone()
        }
    }
}
