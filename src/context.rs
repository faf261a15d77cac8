//! Completion context tree.
//!
//! A [`CompletionContext`] is one (sub)query: a filter, a title, its own
//! items and the children forked from it. The parent owns its children
//! exclusively. The aggregated view is a read-only walk: local items first
//! (ordered by the context's [`Sort`] policy), then each child in fork order.
//!
//! A context is *sealed* the first time its items are set. Until then it may
//! be pending (`incomplete`); after that its items never change.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::suggest::Suggestion;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A completion candidate, tagged by where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Keyword {
        keyword: String,
        title: String,
        url: String,
    },
    Engine {
        alias: String,
        description: String,
        icon: Option<String>,
    },
    Suggestion(Suggestion),
    /// Past query of a keyword quick search, decoded from a history URL.
    History {
        query: String,
        title: String,
        url: String,
    },
}

impl Item {
    /// Text inserted when the item is picked.
    pub fn text(&self) -> &str {
        match self {
            Item::Keyword { keyword, .. } => keyword,
            Item::Engine { alias, .. } => alias,
            Item::Suggestion(suggestion) => &suggestion.text,
            Item::History { query, .. } => query,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Item::Keyword { title, .. } => title,
            Item::Engine { description, .. } => description,
            Item::Suggestion(suggestion) => &suggestion.annotation,
            Item::History { title, .. } => title,
        }
    }
}

/// Ordering of a context's own items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sort {
    #[default]
    ByText,
    /// Arrival order, verbatim.
    Unsorted,
}

type Generator = Box<dyn FnOnce(&str) -> Vec<Item>>;

pub struct CompletionContext {
    name: String,
    path: Vec<String>,
    filter: String,
    offset: usize,
    title: Vec<String>,
    completions: Vec<Item>,
    children: Vec<CompletionContext>,
    incomplete: bool,
    sealed: bool,
    compare: Sort,
    generation: u64,
    token: CancellationToken,
    generator: Option<Generator>,
}

impl CompletionContext {
    /// Root of a query. Cancelling `token` invalidates the whole tree.
    pub fn root(filter: impl Into<String>, token: CancellationToken) -> Self {
        Self::new(String::new(), Vec::new(), filter.into(), 0, token)
    }

    fn new(
        name: String,
        path: Vec<String>,
        filter: String,
        offset: usize,
        token: CancellationToken,
    ) -> Self {
        Self {
            name,
            path,
            filter,
            offset,
            title: Vec::new(),
            completions: Vec::new(),
            children: Vec::new(),
            incomplete: false,
            sealed: false,
            compare: Sort::default(),
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            token,
            generator: None,
        }
    }

    fn child(&self, name: &str, offset: usize) -> Self {
        let mut path = self.path.clone();
        path.push(name.to_string());
        let filter = self.filter.get(offset..).unwrap_or("").to_string();
        Self::new(
            name.to_string(),
            path,
            filter,
            self.offset + offset,
            self.token.child_token(),
        )
    }

    /// Creates the child `name` over `filter[offset..]`, runs `computation`
    /// on it and links it. A previous child with the same name is cancelled
    /// and replaced in place.
    pub fn fork<F>(&mut self, name: &str, offset: usize, computation: F) -> &mut CompletionContext
    where
        F: FnOnce(&mut CompletionContext),
    {
        let mut child = self.child(name, offset);
        computation(&mut child);
        self.link(child)
    }

    /// Like [`fork`](Self::fork), but `generator` runs on the first
    /// [`generate`](Self::generate) pass instead of now.
    pub fn fork_lazy<F>(&mut self, name: &str, offset: usize, generator: F) -> &mut CompletionContext
    where
        F: FnOnce(&str) -> Vec<Item> + 'static,
    {
        let mut child = self.child(name, offset);
        child.generator = Some(Box::new(generator));
        self.link(child)
    }

    fn link(&mut self, child: CompletionContext) -> &mut CompletionContext {
        let index = match self.children.iter().position(|c| c.name == child.name) {
            Some(index) => {
                let old = std::mem::replace(&mut self.children[index], child);
                old.token.cancel();
                debug!(path = ?old.path, "Replaced forked context");
                index
            }
            None => {
                self.children.push(child);
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Runs pending lazy generators in the whole tree.
    pub fn generate(&mut self) {
        if let Some(generator) = self.generator.take() {
            let items = generator(&self.filter);
            self.finish(items);
        }
        for child in &mut self.children {
            child.generate();
        }
    }

    /// Marks this context as waiting for asynchronous data.
    pub fn begin_pending(&mut self) {
        if !self.sealed {
            self.incomplete = true;
        }
    }

    /// Sets the final items and clears `incomplete`. Returns `false` if the
    /// context was already sealed, in which case nothing changes.
    pub fn finish(&mut self, items: Vec<Item>) -> bool {
        if self.sealed {
            debug!(path = ?self.path, "Ignoring items for a sealed context");
            return false;
        }
        self.completions = items;
        self.incomplete = false;
        self.sealed = true;
        true
    }

    pub fn set_title<I, S>(&mut self, title: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.title = title.into_iter().map(Into::into).collect();
    }

    pub fn set_compare(&mut self, compare: Sort) {
        self.compare = compare;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child names from the root down to this context.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Byte offset of this context's filter inside the root filter.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn title(&self) -> &[String] {
        &self.title
    }

    pub fn compare(&self) -> Sort {
        self.compare
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// This context's own pending flag, children excluded.
    pub fn incomplete(&self) -> bool {
        self.incomplete
    }

    /// `true` while this context or any descendant is pending.
    pub fn is_incomplete(&self) -> bool {
        self.incomplete || self.children.iter().any(CompletionContext::is_incomplete)
    }

    pub fn completions(&self) -> &[Item] {
        &self.completions
    }

    pub fn children(&self) -> &[CompletionContext] {
        &self.children
    }

    pub fn child_named(&self, name: &str) -> Option<&CompletionContext> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Descendant addressed by `path`, relative to this context.
    pub fn find_mut(&mut self, path: &[String]) -> Option<&mut CompletionContext> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .children
                .iter_mut()
                .find(|c| c.name == *head)?
                .find_mut(rest),
        }
    }

    /// Aggregated items: own items, then each child's, in fork order.
    /// Pending children contribute nothing yet.
    pub fn items(&self) -> Vec<&Item> {
        let mut items: Vec<&Item> = self.completions.iter().collect();
        if self.compare == Sort::ByText {
            items.sort_by(|a, b| a.text().cmp(b.text()));
        }
        for child in &self.children {
            items.extend(child.items());
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(text: &str) -> Item {
        Item::Suggestion(Suggestion::new(text))
    }

    fn texts(context: &CompletionContext) -> Vec<&str> {
        context.items().into_iter().map(Item::text).collect()
    }

    #[test]
    fn test_fork_scopes_filter_by_offset() {
        let mut root = CompletionContext::root("g rust lang", CancellationToken::new());
        let child = root.fork("suggest", 2, |_| {});
        assert_eq!(child.filter(), "rust lang");
        assert_eq!(child.offset(), 2);
        assert_eq!(child.path(), ["suggest"]);
        let grandchild = child.fork("google", 5, |_| {});
        assert_eq!(grandchild.filter(), "lang");
        assert_eq!(grandchild.offset(), 7);
        assert_eq!(grandchild.path(), ["suggest", "google"]);
    }

    #[test]
    fn test_out_of_range_offset_gives_empty_filter() {
        let mut root = CompletionContext::root("é", CancellationToken::new());
        assert_eq!(root.fork("a", 1, |_| {}).filter(), "");
        assert_eq!(root.fork("b", 10, |_| {}).filter(), "");
    }

    #[test]
    fn test_local_items_first_then_children_in_fork_order() {
        let mut root = CompletionContext::root("q", CancellationToken::new());
        root.finish(vec![suggestion("zeta"), suggestion("alpha")]);
        root.fork("second", 0, |c| {
            c.set_compare(Sort::Unsorted);
            c.finish(vec![suggestion("y"), suggestion("b")]);
        });
        root.fork("third", 0, |c| {
            c.finish(vec![suggestion("m"), suggestion("c")]);
        });
        assert_eq!(texts(&root), ["alpha", "zeta", "y", "b", "c", "m"]);
    }

    #[test]
    fn test_refork_replaces_in_place_and_cancels_old() {
        let mut root = CompletionContext::root("q", CancellationToken::new());
        let old_token = root.fork("a", 0, |c| c.begin_pending()).token().clone();
        let old_generation = root.child_named("a").unwrap().generation();
        root.fork("b", 0, |c| {
            c.finish(vec![suggestion("from b")]);
        });
        root.fork("a", 0, |c| {
            c.finish(vec![suggestion("from new a")]);
        });

        assert!(old_token.is_cancelled());
        assert_eq!(root.children().len(), 2);
        assert_ne!(root.child_named("a").unwrap().generation(), old_generation);
        assert_eq!(texts(&root), ["from new a", "from b"]);
        assert!(!root.is_incomplete());
    }

    #[test]
    fn test_pending_child_does_not_hide_settled_siblings() {
        let mut root = CompletionContext::root("q", CancellationToken::new());
        root.fork("slow", 0, |c| c.begin_pending());
        root.fork("fast", 0, |c| {
            c.finish(vec![suggestion("ready")]);
        });
        assert!(root.is_incomplete());
        assert_eq!(texts(&root), ["ready"]);
    }

    #[test]
    fn test_finish_seals_context() {
        let mut root = CompletionContext::root("q", CancellationToken::new());
        let child = root.fork("a", 0, |c| c.begin_pending());
        assert!(child.incomplete());
        assert!(child.finish(vec![suggestion("one")]));
        assert!(!child.incomplete());
        assert!(!child.finish(vec![suggestion("two")]));
        child.begin_pending();
        assert!(!child.incomplete());
        assert_eq!(child.completions(), [suggestion("one")]);
    }

    #[test]
    fn test_lazy_fork_runs_on_generate() {
        let mut root = CompletionContext::root("kw rust", CancellationToken::new());
        root.fork_lazy("keyword/kw", 3, |filter| vec![suggestion(&format!("{filter}!"))]);
        assert!(texts(&root).is_empty());
        root.generate();
        assert_eq!(texts(&root), ["rust!"]);
        root.generate();
        assert_eq!(texts(&root), ["rust!"]);
    }

    #[test]
    fn test_find_mut_by_path() {
        let mut root = CompletionContext::root("q", CancellationToken::new());
        root.fork("suggest", 0, |c| {
            c.fork("google", 0, |_| {});
        });
        let path = vec!["suggest".to_string(), "google".to_string()];
        assert_eq!(root.find_mut(&path).unwrap().name(), "google");
        assert!(root.find_mut(&["missing".to_string()]).is_none());
    }

    #[test]
    fn test_root_cancellation_reaches_children() {
        let token = CancellationToken::new();
        let mut root = CompletionContext::root("q", token.clone());
        let child_token = root.fork("a", 0, |_| {}).token().clone();
        token.cancel();
        assert!(child_token.is_cancelled());
    }
}
