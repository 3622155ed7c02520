//! Utility functions and helpers.

pub mod cache;
pub mod http;
pub mod time;

/// Read a query parameter out of a (possibly relative) link such as
/// `profile.php?user_name=Ffff`. Values are percent-decoded.
pub fn query_param(href: &str, key: &str) -> Option<String> {
    let (_, query) = href.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
