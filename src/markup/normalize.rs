use std::borrow::Cow;

use scraper::Html;
use tracing::debug;

/// Decode HTML entities left over after the outer XML parse. The AIPS export
/// double-escapes the content blob, so the XML layer resolves one level and
/// this resolves the rest (`&nbsp;`, `&auml;`, numeric references, ...).
pub fn unescape(raw: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(raw)
}

/// Unescape and parse one record's markup blob. The parser is lenient:
/// unclosed tags, unknown tags and stray text never fail, they just shape
/// the tree differently.
pub fn normalize(raw: &str) -> Html {
    let html = Html::parse_fragment(&unescape(raw));
    if !html.errors.is_empty() {
        debug!("markup parsed with {} recoverable errors", html.errors.len());
    }
    html
}
