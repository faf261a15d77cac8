//! Bookmark keyword store.
//!
//! Read-only view over an external bookmark provider. The list of keyword
//! records is held as an immutable snapshot, replaced wholesale by
//! [`KeywordStore::refresh`]; exact lookups used by resolution go straight to
//! the provider so a freshly added keyword resolves before the next refresh.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::resolver::CharsetLookup;

/// One bookmark carrying a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub keyword: String,
    /// May contain a `%s` / `%S` placeholder.
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// POST body template, stored percent-escaped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
}

/// What the bookmark provider returns for an exact keyword lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordLookup {
    pub url: String,
    pub post_data: Option<String>,
}

/// External bookmark storage, as far as keywords are concerned.
pub trait BookmarkKeywordProvider {
    fn lookup_keyword(&self, keyword: &str) -> Option<KeywordLookup>;

    /// Every bookmark that has a keyword, in storage order.
    fn keyword_records(&self) -> Vec<KeywordRecord>;
}

pub struct KeywordStore {
    provider: Rc<dyn BookmarkKeywordProvider>,
    snapshot: RefCell<Rc<[KeywordRecord]>>,
}

impl KeywordStore {
    pub fn new(provider: Rc<dyn BookmarkKeywordProvider>) -> Self {
        let store = Self {
            provider,
            snapshot: RefCell::new(Rc::from(Vec::new())),
        };
        store.refresh();
        store
    }

    /// Rebuilds the snapshot from the provider.
    pub fn refresh(&self) {
        let records: Rc<[KeywordRecord]> = Rc::from(self.provider.keyword_records());
        debug!(count = records.len(), "Keyword snapshot refreshed");
        *self.snapshot.borrow_mut() = records;
    }

    pub fn records(&self) -> Rc<[KeywordRecord]> {
        Rc::clone(&self.snapshot.borrow())
    }

    /// Exact match against the current snapshot.
    pub fn get(&self, keyword: &str) -> Option<KeywordRecord> {
        self.snapshot
            .borrow()
            .iter()
            .find(|record| record.keyword == keyword)
            .cloned()
    }

    pub fn lookup(&self, keyword: &str) -> Option<KeywordLookup> {
        if keyword.is_empty() {
            return None;
        }
        self.provider.lookup_keyword(keyword)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory provider
// ─────────────────────────────────────────────────────────────────────────────

/// Bookmarks held in memory, filled from the `[[keywords]]` config section.
///
/// Also answers charset lookups, since the charset of a page is remembered
/// alongside its history entry in a real browser.
#[derive(Debug, Default)]
pub struct MemoryBookmarks {
    records: Vec<KeywordRecord>,
    charsets: HashMap<String, String>,
}

impl MemoryBookmarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record. A later record with the same keyword replaces the
    /// earlier one, keeping keywords unique.
    pub fn insert(&mut self, record: KeywordRecord) {
        match self
            .records
            .iter_mut()
            .find(|existing| existing.keyword == record.keyword)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn set_charset(&mut self, url: impl Into<String>, charset: impl Into<String>) {
        self.charsets.insert(url.into(), charset.into());
    }
}

impl BookmarkKeywordProvider for MemoryBookmarks {
    fn lookup_keyword(&self, keyword: &str) -> Option<KeywordLookup> {
        self.records
            .iter()
            .find(|record| record.keyword == keyword)
            .map(|record| KeywordLookup {
                url: record.url.clone(),
                post_data: record.post_data.clone(),
            })
    }

    fn keyword_records(&self) -> Vec<KeywordRecord> {
        self.records.clone()
    }
}

impl CharsetLookup for MemoryBookmarks {
    fn charset_for_url(&self, url: &str) -> Option<String> {
        self.charsets.get(url).cloned()
    }
}
