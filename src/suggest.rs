//! Remote search suggestions.
//!
//! Each engine that supports `application/x-suggestions+json` gets its own
//! child context and one outbound request, spawned on the current runtime.
//! The spawned task never touches the context tree: it hands its result to a
//! [`SuggestionSink`], which posts a [`Delivery`] to the owning session. The
//! session applies deliveries one at a time and drops stale ones.
//!
//! Wire format (read-only): `[query, [string, ...], ...]`. Anything else, or
//! any transport failure, yields an empty list.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::{CompletionContext, Item, Sort};
use crate::engines::{EngineRegistry, SUGGEST_JSON};
use crate::error::FetchError;

/// Engine list used when neither the caller nor the config names one.
pub const DEFAULT_SUGGEST_ENGINE: &str = "google";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub annotation: String,
}

impl Suggestion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotation: String::new(),
        }
    }
}

/// Outbound HTTP GET returning the body as text.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// Decodes a suggestion response, keeping only string entries.
pub fn decode_suggestions(body: &str) -> Vec<Suggestion> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Suggestion response is not JSON");
            return Vec::new();
        }
    };
    match value.get(1).and_then(Value::as_array) {
        Some(entries) => entries
            .iter()
            .filter_map(Value::as_str)
            .map(Suggestion::new)
            .collect(),
        None => {
            debug!("Suggestion response has no second-element list");
            Vec::new()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Delivery plumbing
// ─────────────────────────────────────────────────────────────────────────────

/// Final result of one engine's request, addressed to a context.
#[derive(Debug)]
pub struct Delivery {
    pub path: Vec<String>,
    pub generation: u64,
    pub suggestions: Vec<Suggestion>,
}

/// One-shot result slot for a pending context. Consumed on delivery.
#[derive(Debug)]
pub struct SuggestionSink {
    path: Vec<String>,
    generation: u64,
    token: CancellationToken,
    tx: UnboundedSender<Delivery>,
}

impl SuggestionSink {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Posts the result, unless the owning context was invalidated.
    pub fn deliver(self, suggestions: Vec<Suggestion>) {
        if self.token.is_cancelled() {
            debug!(path = ?self.path, "Context invalidated, dropping suggestions");
            return;
        }
        let delivery = Delivery {
            path: self.path,
            generation: self.generation,
            suggestions,
        };
        if self.tx.send(delivery).is_err() {
            debug!("Completion session gone, dropping suggestions");
        }
    }
}

/// Sending half of a session's delivery channel.
#[derive(Debug, Clone)]
pub struct DeliveryFeed {
    tx: UnboundedSender<Delivery>,
}

impl DeliveryFeed {
    pub fn new(tx: UnboundedSender<Delivery>) -> Self {
        Self { tx }
    }

    /// Sink bound to `context`'s current incarnation.
    pub fn sink(&self, context: &CompletionContext) -> SuggestionSink {
        SuggestionSink {
            path: context.path().to_vec(),
            generation: context.generation(),
            token: context.token().clone(),
            tx: self.tx.clone(),
        }
    }
}

/// Outcome of starting a single engine query.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Known without any request (no engine, no suggestion support).
    Ready(Vec<Suggestion>),
    /// A request is in flight; the sink will be called once.
    Pending,
}

// ─────────────────────────────────────────────────────────────────────────────
// Fan-out
// ─────────────────────────────────────────────────────────────────────────────

pub struct SuggestionFanout {
    engines: Rc<EngineRegistry>,
    fetch: Arc<dyn HttpFetch>,
    timeout: Option<Duration>,
}

impl SuggestionFanout {
    pub fn new(engines: Rc<EngineRegistry>, fetch: Arc<dyn HttpFetch>) -> Self {
        Self {
            engines,
            fetch,
            timeout: None,
        }
    }

    /// Requests slower than `timeout` settle with no suggestions. Without a
    /// timeout, an endpoint that never answers leaves its context pending.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Starts one engine's suggestion request for `query`.
    ///
    /// Outside a tokio runtime nothing can be spawned: the request is skipped
    /// and settles with no suggestions.
    pub fn fetch_suggestions(&self, alias: &str, query: &str, sink: SuggestionSink) -> Dispatch {
        let Some(engine) = self.engines.by_alias(alias) else {
            return Dispatch::Ready(Vec::new());
        };
        if !engine.supports_response_type(SUGGEST_JSON) {
            return Dispatch::Ready(Vec::new());
        }
        let Some(submission) = engine.submission(query, Some(SUGGEST_JSON)) else {
            return Dispatch::Ready(Vec::new());
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(alias = %alias, "No tokio runtime, skipping suggestion request");
            return Dispatch::Ready(Vec::new());
        };

        let fetch = Arc::clone(&self.fetch);
        let timeout = self.timeout;
        let alias = alias.to_string();
        let url = submission.url;
        debug!(alias = %alias, url = %url, "Requesting suggestions");

        runtime.spawn(async move {
            let token = sink.token().clone();
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(alias = %alias, "Suggestion request cancelled");
                    return;
                }
                result = fetch_with_timeout(fetch.as_ref(), &url, timeout) => result,
            };
            let suggestions = match result {
                Ok(body) => decode_suggestions(&body),
                Err(e) => {
                    warn!(alias = %alias, error = %e, "Suggestion request failed");
                    Vec::new()
                }
            };
            debug!(alias = %alias, count = suggestions.len(), "Suggestions received");
            sink.deliver(suggestions);
        });

        Dispatch::Pending
    }

    /// Forks one pending child per engine under `context` and starts its
    /// request. Engines are skipped when unknown, or when the first word of
    /// the filter is already the alias itself, unless `allow_exact_keyword`.
    /// Returns the number of children forked.
    pub fn fan_out(
        &self,
        context: &mut CompletionContext,
        aliases: &[String],
        allow_exact_keyword: bool,
        feed: &DeliveryFeed,
    ) -> usize {
        if context.filter().is_empty() {
            return 0;
        }
        let first_word = context
            .filter()
            .split_whitespace()
            .next()
            .map(str::to_string);

        let mut forked = 0;
        for alias in aliases {
            let Some(record) = self.engines.record(alias) else {
                debug!(alias = %alias, "Unknown suggestion engine");
                continue;
            };
            if !allow_exact_keyword && first_word.as_deref() == Some(alias.as_str()) {
                continue;
            }

            let child = context.fork(alias, 0, |child| {
                child.set_title([format!("{} Suggestions", record.description)]);
                child.set_compare(Sort::Unsorted);
                child.begin_pending();
            });
            forked += 1;
            let sink = feed.sink(child);
            let query = child.filter().to_string();
            if let Dispatch::Ready(suggestions) = self.fetch_suggestions(alias, &query, sink) {
                child.finish(suggestions.into_iter().map(Item::Suggestion).collect());
            }
        }
        if forked > 0 {
            info!(engines = forked, filter = context.filter(), "Suggestion fan-out started");
        }
        forked
    }
}

async fn fetch_with_timeout(
    fetch: &dyn HttpFetch,
    url: &str,
    timeout: Option<Duration>,
) -> Result<String, FetchError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fetch.get(url))
            .await
            .map_err(|_| FetchError::Timeout(limit))?,
        None => fetch.get(url).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::engines::{MemoryEngines, TemplateEngine};

    /// Answers every URL with a fixed body and counts calls.
    struct StaticFetch {
        body: String,
        calls: AtomicUsize,
    }

    impl StaticFetch {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HttpFetch for StaticFetch {
        async fn get(&self, _url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    /// Holds each request until the test releases it.
    struct GatedFetch {
        gate: Mutex<Option<oneshot::Receiver<String>>>,
    }

    #[async_trait]
    impl HttpFetch for GatedFetch {
        async fn get(&self, _url: &str) -> Result<String, FetchError> {
            let rx = self.gate.lock().unwrap().take();
            match rx {
                Some(rx) => Ok(rx.await.unwrap_or_default()),
                None => std::future::pending().await,
            }
        }
    }

    fn engines() -> Rc<EngineRegistry> {
        let mut provider = MemoryEngines::new();
        provider.push(
            TemplateEngine::new("Google", "http://g/?q=%s")
                .with_alias("google")
                .with_suggest_url("http://g/ac?q=%s"),
        );
        provider.push(
            TemplateEngine::new("Duck", "http://d/?q=%s")
                .with_alias("ddg")
                .with_suggest_url("http://d/ac?q=%s"),
        );
        provider.push(TemplateEngine::new("Plain", "http://p/?q=%s").with_alias("plain"));
        Rc::new(EngineRegistry::new(Rc::new(provider)))
    }

    fn aliases(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_decode_keeps_only_strings() {
        let suggestions = decode_suggestions(r#"["rust", ["rust lang", 42, null, "rustup"], []]"#);
        assert_eq!(
            suggestions,
            vec![Suggestion::new("rust lang"), Suggestion::new("rustup")]
        );
        assert!(suggestions.iter().all(|s| s.annotation.is_empty()));
    }

    #[test]
    fn test_decode_malformed_payloads_are_empty() {
        assert!(decode_suggestions("not json").is_empty());
        assert!(decode_suggestions(r#"{"q": ["a"]}"#).is_empty());
        assert!(decode_suggestions(r#"["only"]"#).is_empty());
        assert!(decode_suggestions(r#"["q", "not a list"]"#).is_empty());
        assert!(decode_suggestions("").is_empty());
    }

    #[tokio::test]
    async fn test_engine_without_suggestions_is_empty_without_fetch() {
        let fetch = StaticFetch::new(r#"["q", ["x"]]"#);
        let fanout = SuggestionFanout::new(engines(), fetch.clone());
        let (tx, _rx) = mpsc::unbounded_channel();
        let feed = DeliveryFeed::new(tx);
        let root = CompletionContext::root("q", CancellationToken::new());

        assert_eq!(
            fanout.fetch_suggestions("plain", "q", feed.sink(&root)),
            Dispatch::Ready(Vec::new())
        );
        assert_eq!(
            fanout.fetch_suggestions("unknown", "q", feed.sink(&root)),
            Dispatch::Ready(Vec::new())
        );
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_delivers_once_to_sink() {
        let fetch = StaticFetch::new(r#"["q", ["q one", "q two"]]"#);
        let fanout = SuggestionFanout::new(engines(), fetch.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let feed = DeliveryFeed::new(tx);
        let mut root = CompletionContext::root("q", CancellationToken::new());
        let child = root.fork("google", 0, |c| c.begin_pending());

        let dispatch = fanout.fetch_suggestions("google", "q", feed.sink(child));
        assert_eq!(dispatch, Dispatch::Pending);
        drop(feed);

        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.path, ["google"]);
        assert_eq!(delivery.generation, child.generation());
        assert_eq!(delivery.suggestions.len(), 2);
        assert!(rx.recv().await.is_none());
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fan_out_forks_pending_children() {
        let fetch = StaticFetch::new(r#"["q", ["a"]]"#);
        let fanout = SuggestionFanout::new(engines(), fetch.clone());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut root = CompletionContext::root("rust", CancellationToken::new());

        let forked = fanout.fan_out(
            &mut root,
            &aliases(&["google", "plain", "missing", "ddg"]),
            false,
            &DeliveryFeed::new(tx),
        );
        assert_eq!(forked, 3);

        let names: Vec<&str> = root.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["google", "plain", "ddg"]);
        assert!(root.child_named("google").unwrap().incomplete());
        assert!(root.child_named("ddg").unwrap().incomplete());
        // No suggestion support: settled immediately, empty.
        let plain = root.child_named("plain").unwrap();
        assert!(!plain.incomplete());
        assert!(plain.completions().is_empty());
        assert_eq!(
            root.child_named("google").unwrap().title(),
            ["Google Suggestions"]
        );
    }

    #[tokio::test]
    async fn test_fan_out_skips_exact_keyword_unless_overridden() {
        let fetch = StaticFetch::new(r#"["q", []]"#);
        let fanout = SuggestionFanout::new(engines(), fetch.clone());
        let (tx, _rx) = mpsc::unbounded_channel();
        let feed = DeliveryFeed::new(tx);

        let mut root = CompletionContext::root("google rust", CancellationToken::new());
        assert_eq!(fanout.fan_out(&mut root, &aliases(&["google"]), false, &feed), 0);
        assert!(root.children().is_empty());

        assert_eq!(fanout.fan_out(&mut root, &aliases(&["google"]), true, &feed), 1);
        assert_eq!(root.children().len(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_counts_only_forked_children() {
        let fetch = StaticFetch::new(r#"["q", []]"#);
        let fanout = SuggestionFanout::new(engines(), fetch.clone());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut root = CompletionContext::root("ddg rust", CancellationToken::new());

        let forked = fanout.fan_out(
            &mut root,
            &aliases(&["missing", "ddg", "other"]),
            false,
            &DeliveryFeed::new(tx),
        );
        assert_eq!(forked, 0);
        assert!(root.children().is_empty());
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fan_out_empty_filter_does_nothing() {
        let fetch = StaticFetch::new(r#"["q", []]"#);
        let fanout = SuggestionFanout::new(engines(), fetch.clone());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut root = CompletionContext::root("", CancellationToken::new());
        let forked = fanout.fan_out(&mut root, &aliases(&["google"]), false, &DeliveryFeed::new(tx));
        assert_eq!(forked, 0);
        assert!(root.children().is_empty());
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_never_delivers() {
        let (release, gate) = oneshot::channel();
        let fetch = Arc::new(GatedFetch {
            gate: Mutex::new(Some(gate)),
        });
        let fanout = SuggestionFanout::new(engines(), fetch);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let feed = DeliveryFeed::new(tx);
        let token = CancellationToken::new();
        let mut root = CompletionContext::root("q", token.clone());
        let child = root.fork("google", 0, |c| c.begin_pending());

        fanout.fetch_suggestions("google", "q", feed.sink(child));
        drop(feed);
        token.cancel();
        let _ = release.send(r#"["q", ["late"]]"#.to_string());

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_settles_with_empty_list() {
        let fetch = Arc::new(GatedFetch {
            gate: Mutex::new(None),
        });
        let fanout = SuggestionFanout::new(engines(), fetch)
            .with_timeout(Some(Duration::from_millis(10)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let feed = DeliveryFeed::new(tx);
        let root = CompletionContext::root("q", CancellationToken::new());

        fanout.fetch_suggestions("google", "q", feed.sink(&root));
        let delivery = rx.recv().await.unwrap();
        assert!(delivery.suggestions.is_empty());
    }
}
