//! Search completion: keyword/engine listing, per-engine suggestions and
//! keyword quick search, merged into one context tree.
//!
//! [`SearchDispatcher::build_completion_context`] returns a
//! [`CompletionSession`]. Its synchronous parts are filled immediately; the
//! suggestion children stay pending until their request settles. The session
//! is the only writer of the tree: it applies each [`Delivery`] in turn,
//! so partial results can be read between two deliveries.

use std::rc::Rc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::{CompletionContext, Item, Sort};
use crate::dispatcher::SearchDispatcher;
use crate::history::quick_search_items;
use crate::suggest::{Delivery, DeliveryFeed};

/// Completers a session can run, each under its own child of the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleterKind {
    /// Keywords and engines, plus suggestions once an argument is typed.
    Search,
    /// Suggestions from the configured engines for the whole filter.
    Suggest,
}

impl CompleterKind {
    fn context_name(self) -> &'static str {
        match self {
            CompleterKind::Search => "search",
            CompleterKind::Suggest => "suggest",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub completers: Vec<CompleterKind>,
    /// List keywords and engines only.
    pub no_suggest: bool,
    /// Engines for [`CompleterKind::Suggest`]; `None` uses the configured list.
    pub suggest_engines: Option<Vec<String>>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            completers: vec![CompleterKind::Search],
            no_suggest: false,
            suggest_engines: None,
        }
    }
}

/// One in-flight query and the receiving end of its suggestion requests.
pub struct CompletionSession {
    root: CompletionContext,
    rx: UnboundedReceiver<Delivery>,
}

impl CompletionSession {
    pub fn context(&self) -> &CompletionContext {
        &self.root
    }

    /// Aggregated items available right now. Runs lazy children first.
    pub fn items(&mut self) -> Vec<&Item> {
        self.root.generate();
        self.root.items()
    }

    pub fn is_incomplete(&self) -> bool {
        self.root.is_incomplete()
    }

    /// Abandons the query: outstanding requests are cancelled and any late
    /// result is dropped.
    pub fn invalidate(&mut self) {
        self.root.token().cancel();
        self.rx.close();
        debug!(filter = self.root.filter(), "Completion session invalidated");
    }

    pub fn is_invalidated(&self) -> bool {
        self.root.token().is_cancelled()
    }

    /// Applies one delivery. Returns `false` when it was stale and dropped.
    pub fn apply(&mut self, delivery: Delivery) -> bool {
        if self.is_invalidated() {
            debug!(path = ?delivery.path, "Dropping delivery for invalidated session");
            return false;
        }
        let Some(context) = self.root.find_mut(&delivery.path) else {
            debug!(path = ?delivery.path, "Dropping delivery for removed context");
            return false;
        };
        if context.generation() != delivery.generation || context.token().is_cancelled() {
            debug!(path = ?delivery.path, "Dropping delivery for replaced context");
            return false;
        }
        let items = delivery
            .suggestions
            .into_iter()
            .map(Item::Suggestion)
            .collect();
        context.finish(items)
    }

    /// Waits for the next delivery that changes the tree. Returns `false`
    /// once nothing is pending anymore, or the session was invalidated.
    pub async fn next_update(&mut self) -> bool {
        loop {
            if self.is_invalidated() || !self.root.is_incomplete() {
                return false;
            }
            match self.rx.recv().await {
                Some(delivery) => {
                    if self.apply(delivery) {
                        return true;
                    }
                }
                None => return false,
            }
        }
    }

    /// Applies deliveries until every child has settled.
    ///
    /// Never returns if an endpoint never answers and no timeout is set.
    pub async fn settle(&mut self) {
        while self.next_update().await {}
    }
}

impl SearchDispatcher {
    /// Starts completion for `filter`. Suggestion requests need a tokio
    /// runtime; without one they settle empty.
    pub fn build_completion_context(
        &self,
        filter: &str,
        options: &CompletionOptions,
    ) -> CompletionSession {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed = DeliveryFeed::new(tx);
        let mut root = CompletionContext::root(filter, CancellationToken::new());

        for kind in &options.completers {
            root.fork(kind.context_name(), 0, |context| match kind {
                CompleterKind::Search => self.search(context, &feed, options.no_suggest),
                CompleterKind::Suggest => self.search_engine_suggest(
                    context,
                    options.suggest_engines.as_deref(),
                    false,
                    &feed,
                ),
            });
        }

        CompletionSession { root, rx }
    }

    /// Lists keywords and engines. Once the filter has an argument after the
    /// first word, also forks suggestions from the engine named by that word
    /// and, for a templated keyword, its quick search over history.
    pub fn search(&self, context: &mut CompletionContext, feed: &DeliveryFeed, no_suggest: bool) {
        let (keyword, space, offset) = split_filter(context.filter());
        let keyword = keyword.to_string();
        let has_argument = !space.is_empty();

        let keywords = self.keywords.records();
        let engines = self.engines.list_engines();
        let items = keywords
            .iter()
            .map(|record| Item::Keyword {
                keyword: record.keyword.clone(),
                title: record.title.clone(),
                url: record.url.clone(),
            })
            .chain(engines.into_iter().map(|engine| Item::Engine {
                alias: engine.alias,
                description: engine.description,
                icon: engine.icon,
            }))
            .collect();
        context.set_title(["Search Keywords"]);
        context.finish(items);

        if !has_argument || no_suggest {
            return;
        }

        let engine_list = [keyword.clone()];
        context.fork("suggest", offset, |child| {
            self.search_engine_suggest(child, Some(engine_list.as_slice()), true, feed);
        });

        if let Some(record) = self.keywords.get(&keyword)
            && record.url.contains("%s")
        {
            let history = Rc::clone(&self.history);
            let template = record.url;
            let child = context.fork_lazy(&format!("keyword/{keyword}"), offset, move |_| {
                quick_search_items(history.as_ref(), &template)
            });
            child.set_title([format!("{keyword} Quick Search")]);
            child.set_compare(Sort::Unsorted);
        }
    }

    /// Fans the context's filter out to `aliases`, or to the configured
    /// suggestion engines when none are given.
    pub fn search_engine_suggest(
        &self,
        context: &mut CompletionContext,
        aliases: Option<&[String]>,
        allow_exact_keyword: bool,
        feed: &DeliveryFeed,
    ) {
        let engines = match aliases {
            Some(list) if !list.is_empty() => list.to_vec(),
            _ => self.suggest_engines(),
        };
        self.fanout.fan_out(context, &engines, allow_exact_keyword, feed);
    }
}

/// Splits `"  kw  args"` into the keyword, the blank run after it, and the
/// byte offset where the arguments start.
fn split_filter(filter: &str) -> (&str, &str, usize) {
    let rest = filter.trim_start();
    let keyword_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let keyword = &rest[..keyword_end];
    let after = &rest[keyword_end..];
    let args = after.trim_start();
    let space = &after[..after.len() - args.len()];
    (keyword, space, filter.len() - args.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_filter() {
        assert_eq!(split_filter("kw"), ("kw", "", 2));
        assert_eq!(split_filter("kw foo bar"), ("kw", " ", 3));
        assert_eq!(split_filter("  kw\t\tfoo"), ("kw", "\t\t", 6));
        assert_eq!(split_filter("kw "), ("kw", " ", 3));
        assert_eq!(split_filter(""), ("", "", 0));
    }
}
