//! HTML page parsers.
//!
//! Each parser is a pure function from a raw page (plus whatever context the
//! page does not carry itself) to typed records. A missing structural anchor
//! is always a [`ParseError`]; parsers never return partial results.

mod chat;
mod flags;
mod mail;
mod user;

pub use chat::parse_chat;
pub use flags::{flags_message_id, parse_flags};
pub use mail::{parse_mailbox, parse_message};
pub use user::{parse_online, parse_profile};

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::ParseError;

/// Result type for parsers.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parse a constant CSS selector.
fn selector(s: &str) -> Selector {
    Selector::parse(s).unwrap_or_else(|e| panic!("invalid built-in selector '{s}': {e:?}"))
}

/// Decode a page, replacing invalid UTF-8 rather than failing on it.
fn document(content: &[u8]) -> Html {
    Html::parse_document(&String::from_utf8_lossy(content))
}

/// Non-blank text nodes under `elem`, trimmed.
fn stripped_strings(elem: ElementRef<'_>) -> Vec<String> {
    elem.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// All text under `elem`, trimmed.
fn text_of(elem: ElementRef<'_>) -> String {
    elem.text().collect::<String>().trim().to_string()
}

/// First following sibling element named `name`.
fn next_sibling_named<'a>(elem: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    elem.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == name)
}

/// First element named `name` after `anchor` in document order, within `scope`.
fn next_in_scope<'a>(
    scope: ElementRef<'a>,
    anchor: ElementRef<'a>,
    name: &str,
) -> Option<ElementRef<'a>> {
    scope
        .descendants()
        .skip_while(|node| node.id() != anchor.id())
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == name)
}

/// Text of the node right after `elem`, whether a text node or an element.
fn next_sibling_text(elem: ElementRef<'_>) -> Option<String> {
    let node = elem.next_sibling()?;
    match node.value() {
        Node::Text(text) => Some(text.text.to_string()),
        Node::Element(_) => ElementRef::wrap(node).map(|e| e.text().collect()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stripped_strings() {
        let html = Html::parse_fragment("<div> <b>one</b>\n two <i> </i>three</div>");
        let div = html.select(&selector("div")).next().unwrap();
        assert_eq!(stripped_strings(div), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_next_in_scope_skips_anchor() {
        let html = Html::parse_fragment(
            "<div><span>a</span><i>x</i><p><span>b</span></p><span>c</span></div>",
        );
        let div = html.select(&selector("div")).next().unwrap();
        let i = div.select(&selector("i")).next().unwrap();
        let next = next_in_scope(div, i, "span").unwrap();
        assert_eq!(text_of(next), "b");
    }
}
