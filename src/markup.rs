//! Small regex-based helpers shared by the catalogue parser, the sanitizer and
//! the login probe.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Compiles a regex that is known to be valid at compile time.
///
/// # Panics
///
/// Panics when the pattern is invalid, which is a programming error.
#[must_use]
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?s)<[^>]*>"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

/// Returns the visible text of a markup fragment: tags removed, common entities
/// decoded, whitespace collapsed and trimmed.
#[must_use]
pub(crate) fn text_content(fragment: &str) -> String {
    let without_tags = TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Decodes the handful of named entities that appear in catalogue labels.
#[must_use]
pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Resolves an href against the source base URL.
///
/// Returns `None` for empty, fragment-only and `javascript:` hrefs, which do not
/// point at content.
#[must_use]
pub(crate) fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    let value = decode_entities(value.trim());
    if value.is_empty() || value.starts_with('#') {
        return None;
    }
    if value.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value);
    }
    base_url.join(&value).ok().map(|url| url.to_string())
}
