//! Profile and user-list parsers.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{ParseResult, document, next_sibling_named, selector, text_of};
use crate::error::ParseError;
use crate::models::{Role, UserSnapshot};
use crate::utils::query_param;

static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static BADGE_CARD: LazyLock<Selector> = LazyLock::new(|| selector(".card"));
static ROLE_BADGE: LazyLock<Selector> =
    LazyLock::new(|| selector("img[src='/img/items/admin.png']"));

static FRIENDS_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^members\.php\?type=friended&id=(\d+)$").expect("valid regex")
});

const PROFILE_LINK_PREFIX: &str = "profile.php?";

/// Parse a profile page into a snapshot taken at `now`.
///
/// The username is the one the page was requested with; the page itself is
/// only consulted for the numeric id and the role badge.
pub fn parse_profile(
    username: &str,
    content: &[u8],
    now: DateTime<Utc>,
) -> ParseResult<UserSnapshot> {
    let html = document(content);

    let user_id = html
        .select(&LINK)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| FRIENDS_LINK_RE.captures(href))
        .and_then(|caps| caps[1].parse().ok())
        .ok_or_else(|| ParseError::new("Unable to find friends link", content))?;

    let role = parse_role(&html, content)?;
    Ok(UserSnapshot::new(user_id, now, username, role))
}

/// Look for a staff badge in the first card. No badge means no role, but a
/// badge with a missing or unknown label is an error.
fn parse_role(html: &Html, content: &[u8]) -> ParseResult<Option<Role>> {
    let Some(card) = html.select(&BADGE_CARD).next() else {
        return Ok(None);
    };
    let Some(badge) = card.select(&ROLE_BADGE).next() else {
        return Ok(None);
    };
    let label = next_sibling_named(badge, "strong")
        .map(text_of)
        .ok_or_else(|| ParseError::new("No role label found", content))?;
    Role::from_label(&label)
        .map(Some)
        .ok_or_else(|| ParseError::new(format!("Unknown role string: {label:?}"), content))
}

/// Parse every profile link on a user list page (`online.php`, staff list).
pub fn parse_online(content: &[u8]) -> ParseResult<Vec<String>> {
    let html = document(content);
    html.select(&LINK)
        .filter_map(profile_href)
        .map(|href| {
            query_param(href, "user_name").ok_or_else(|| {
                ParseError::new(format!("Profile link has no user_name: {href:?}"), content)
            })
        })
        .collect()
}

fn profile_href(a: ElementRef<'_>) -> Option<&str> {
    a.value()
        .attr("href")
        .filter(|href| href.starts_with(PROFILE_LINK_PREFIX))
}
