//! Markup-to-text extraction for post bodies.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Convert post HTML into plain text: line breaks become newlines,
/// remaining tags are stripped, entities are decoded.
pub fn extract_text(markup: &str) -> String {
    static RE_BR: OnceCell<Regex> = OnceCell::new();
    let re_br = RE_BR.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
    let out = re_br.replace_all(markup, "\n");

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(&out, "");

    html_escape::decode_html_entities(out.as_ref())
        .trim()
        .to_string()
}
