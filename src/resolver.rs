//! Résolution mot-clé → requête navigable.
//!
//! L'entrée est découpée en `keyword` + `param` sur le premier blanc. Un alias
//! de moteur gagne sur un mot-clé de marque-page. Pour un marque-page, le
//! paramètre est substitué dans `%s` (encodé) et `%S` (brut), dans l'URL comme
//! dans le gabarit POST, avec le charset éventuellement annoté par
//! `&mozcharset=<nom>`.
//!
//! Aucun échec ne sort d'ici : pas de correspondance = `None`, et l'appelant
//! traite alors le texte comme une URL littérale ou une recherche.

use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::codec::{TextCodec, escape_bytes, unescape_lossy};
use crate::engines::{EngineRegistry, PostData};
use crate::keywords::KeywordStore;

static CHARSET_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.*)&mozcharset=([a-zA-Z][_\-a-zA-Z0-9]+)\s*$").expect("valid regex")
});

/// Charset previously seen for a page, as remembered by history.
pub trait CharsetLookup {
    fn charset_for_url(&self, url: &str) -> Option<String>;
}

/// Where a resolved keyword or engine search should navigate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub url: String,
    pub post_data: Option<PostData>,
}

pub struct TemplateResolver {
    keywords: Rc<KeywordStore>,
    engines: Rc<EngineRegistry>,
    charsets: Rc<dyn CharsetLookup>,
    codec: Rc<dyn TextCodec>,
}

impl TemplateResolver {
    pub fn new(
        keywords: Rc<KeywordStore>,
        engines: Rc<EngineRegistry>,
        charsets: Rc<dyn CharsetLookup>,
        codec: Rc<dyn TextCodec>,
    ) -> Self {
        Self {
            keywords,
            engines,
            charsets,
            codec,
        }
    }

    /// Resolves `"<keyword> <param>"` to a target, or `None` if `keyword`
    /// names neither an engine alias nor a bookmark keyword.
    pub fn resolve(&self, input: &str) -> Option<ResolvedTarget> {
        // Aliases must be normalized even if no completion ran yet.
        self.engines.refresh();

        let (keyword, param) = split_keyword(input);
        let target = self.expand(keyword, param)?;
        if target.url == input {
            return None;
        }
        debug!(keyword, url = %target.url, post = target.post_data.is_some(), "Keyword resolved");
        Some(target)
    }

    /// Like [`resolve`](Self::resolve), prefixing the default engine's alias
    /// when `use_default` is set and a default is configured.
    pub fn resolve_with_default(
        &self,
        text: &str,
        default_engine: &str,
        use_default: bool,
    ) -> Option<ResolvedTarget> {
        if use_default && !default_engine.is_empty() {
            self.resolve(&format!("{default_engine} {text}"))
        } else {
            self.resolve(text)
        }
    }

    fn expand(&self, keyword: &str, param: &str) -> Option<ResolvedTarget> {
        if let Some(engine) = self.engines.by_alias(keyword)
            && let Some(submission) = engine.submission(param, None)
        {
            return Some(ResolvedTarget {
                url: submission.url,
                post_data: submission.post_data,
            });
        }

        let lookup = self.keywords.lookup(keyword)?;
        let data = lookup
            .post_data
            .as_deref()
            .map(unescape_lossy)
            .unwrap_or_default();

        if !has_placeholder(&lookup.url) && !has_placeholder(&data) {
            // Extra text after a non-templated keyword is dropped.
            if !param.is_empty() {
                debug!(keyword, "Keyword has no placeholder, ignoring parameter");
            }
            return Some(ResolvedTarget {
                url: lookup.url,
                post_data: None,
            });
        }

        let (url, charset) = match CHARSET_SUFFIX.captures(&lookup.url) {
            Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
            None => {
                let charset = self.charsets.charset_for_url(&lookup.url);
                (lookup.url.clone(), charset)
            }
        };

        let encoded = self.encode_param(param, charset.as_deref());
        let url = substitute(&url, &encoded, param);
        let post_data = has_placeholder(&data).then(|| PostData::form(substitute(&data, &encoded, param)));

        Some(ResolvedTarget { url, post_data })
    }

    fn encode_param(&self, param: &str, charset: Option<&str>) -> String {
        match charset.filter(|name| !name.is_empty()) {
            Some(name) => match self.codec.encode(name, param) {
                Some(bytes) => escape_bytes(&bytes),
                None => {
                    warn!(charset = name, "Unsupported charset, falling back to UTF-8");
                    self.codec.percent_encode(param)
                }
            },
            None => self.codec.percent_encode(param),
        }
    }
}

/// Splits on the first whitespace run. No whitespace → `(input, "")`.
pub fn split_keyword(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim_start()),
        None => (input, ""),
    }
}

fn has_placeholder(text: &str) -> bool {
    text.contains("%s") || text.contains("%S")
}

/// `%s` takes the encoded parameter, `%S` the raw text.
fn substitute(template: &str, encoded: &str, raw: &str) -> String {
    template.replace("%s", encoded).replace("%S", raw)
}
