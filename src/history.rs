//! Keyword quick search over browsing history.
//!
//! For a keyword bookmark like `http://y/?q=%s`, past visits to
//! `http://y/?q=<something>` are turned back into the queries that produced
//! them, so `kw <Tab>` can offer previous searches.

use serde::{Deserialize, Serialize};

use crate::codec::percent_decode;
use crate::context::Item;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

pub trait HistoryProvider {
    /// Visited pages whose URL starts with `prefix`.
    fn entries_with_prefix(&self, prefix: &str) -> Vec<HistoryEntry>;
}

#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Vec<HistoryEntry>,
}

impl MemoryHistory {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }
}

impl HistoryProvider for MemoryHistory {
    fn entries_with_prefix(&self, prefix: &str) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.url.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// Previous queries for `template`, in history order.
///
/// Only the first `%s` counts. Entries whose query contains `&` (extra form
/// fields) or does not decode are skipped.
pub fn quick_search_items(history: &dyn HistoryProvider, template: &str) -> Vec<Item> {
    let Some((begin, end)) = template.split_once("%s") else {
        return Vec::new();
    };
    history
        .entries_with_prefix(begin)
        .into_iter()
        .filter_map(|entry| {
            let query = entry.url.strip_prefix(begin)?.strip_suffix(end)?;
            if query.contains('&') {
                return None;
            }
            let query = query.split('#').next().unwrap_or("").replace('+', " ");
            let query = percent_decode(&query)?;
            Some(Item::History {
                query,
                title: entry.title,
                url: entry.url,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> HistoryEntry {
        HistoryEntry {
            url: url.to_string(),
            title: format!("title of {url}"),
        }
    }

    fn queries(items: &[Item]) -> Vec<&str> {
        items.iter().map(Item::text).collect()
    }

    #[test]
    fn test_previous_queries_are_decoded() {
        let history = MemoryHistory::new(vec![
            entry("http://y/?q=rust+lang"),
            entry("http://y/?q=caf%C3%A9"),
            entry("http://other/?q=nope"),
        ]);
        let items = quick_search_items(&history, "http://y/?q=%s");
        assert_eq!(queries(&items), ["rust lang", "café"]);
    }

    #[test]
    fn test_suffix_must_match_template() {
        let history = MemoryHistory::new(vec![
            entry("http://y/search/tokio/page"),
            entry("http://y/search/tokio/other"),
        ]);
        let items = quick_search_items(&history, "http://y/search/%s/page");
        assert_eq!(queries(&items), ["tokio"]);
    }

    #[test]
    fn test_extra_fields_and_bad_encoding_are_skipped() {
        let history = MemoryHistory::new(vec![
            entry("http://y/?q=a&lang=en"),
            entry("http://y/?q=%FF"),
            entry("http://y/?q=ok"),
        ]);
        let items = quick_search_items(&history, "http://y/?q=%s");
        assert_eq!(queries(&items), ["ok"]);
    }

    #[test]
    fn test_no_placeholder_no_items() {
        let history = MemoryHistory::new(vec![entry("http://y/")]);
        assert!(quick_search_items(&history, "http://y/").is_empty());
    }
}
