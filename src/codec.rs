//! Parameter encoding for keyword and engine templates.
//!
//! Two escaping flavours coexist:
//! - UTF-8 text uses the `encodeURIComponent` reserved set (space → `%20`).
//! - Bytes produced by a legacy charset use the older `escape()` set, which
//!   leaves `@*_+-./` untouched.

use encoding_rs::Encoding;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, percent_encode};
use tracing::debug;

/// Characters left as-is by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Characters left as-is by the legacy `escape()` function.
const LEGACY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'@')
    .remove(b'*')
    .remove(b'_')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'/');

/// Text conversion needed by the template resolver.
pub trait TextCodec {
    /// Converts `text` to the bytes of `charset`. `None` when the charset
    /// label is unknown.
    fn encode(&self, charset: &str, text: &str) -> Option<Vec<u8>>;

    /// UTF-8 percent-encoding with the `encodeURIComponent` reserved set.
    fn percent_encode(&self, text: &str) -> String;
}

/// `TextCodec` backed by `encoding_rs` and `percent-encoding`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCodec;

impl TextCodec for DefaultCodec {
    fn encode(&self, charset: &str, text: &str) -> Option<Vec<u8>> {
        let encoding = Encoding::for_label(charset.trim().as_bytes())?;
        let (bytes, used, had_errors) = encoding.encode(text);
        if had_errors {
            debug!(charset, used = used.name(), "Unmappable characters replaced");
        }
        Some(bytes.into_owned())
    }

    fn percent_encode(&self, text: &str) -> String {
        encode_component(text)
    }
}

/// Percent-encodes UTF-8 text like `encodeURIComponent`.
pub fn encode_component(text: &str) -> String {
    percent_encode(text.as_bytes(), URI_COMPONENT).to_string()
}

/// Percent-encodes raw charset bytes like the legacy `escape()`.
pub fn escape_bytes(bytes: &[u8]) -> String {
    percent_encode(bytes, LEGACY_ESCAPE).to_string()
}

/// Decodes `%XX` sequences. `None` if the result is not valid UTF-8.
pub fn percent_decode(text: &str) -> Option<String> {
    percent_decode_str(text)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Lossy variant used for stored POST templates.
pub fn unescape_lossy(text: &str) -> String {
    percent_decode_str(text).decode_utf8_lossy().into_owned()
}
