//! Small HTML extraction helpers shared by both source parsers

use crate::fetch::records::TeamRef;
use chrono::{NaiveDate, NaiveDateTime};
use scraper::{ElementRef, Selector};

/// Collects the visible text of an element, whitespace-collapsed
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let raw = element.text().collect::<String>();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First element matching a selector within a scope
pub(crate) fn select_first<'a>(scope: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    scope.select(&sel).next()
}

/// Whitespace-collapsed text of the first match, `None` when empty or absent
pub(crate) fn select_text(scope: ElementRef<'_>, selector: &str) -> Option<String> {
    select_first(scope, selector).and_then(|el| non_empty(element_text(el)))
}

/// Numeric content of the first match
pub(crate) fn select_number(scope: ElementRef<'_>, selector: &str) -> Option<u32> {
    select_first(scope, selector).and_then(|el| parse_u32(&element_text(el)))
}

/// A team link: the href carries the site id, the text the name
pub(crate) fn team_ref(element: ElementRef<'_>) -> Option<TeamRef> {
    let anchor = select_first(element, "a")?;
    let site_id = id_from_href(anchor.value().attr("href")?)?;
    let name = non_empty(element_text(anchor))?;
    Some(TeamRef { site_id, name })
}

/// Extracts a numeric id from an href, either from an `id` query parameter
/// (`match.php?id=123`) or from the last path segment (`/match/123`)
pub(crate) fn id_from_href(href: &str) -> Option<u32> {
    if let Some((_, query)) = href.split_once('?') {
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("id=") {
                return value.parse().ok();
            }
        }
        return None;
    }
    href.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Splits a "Lastname Firstname" display name as rendered by both sites
///
/// A single token becomes the last name with an empty first name.
pub(crate) fn split_name(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let last = parts.next().unwrap_or("").to_string();
    let first = parts.collect::<Vec<_>>().join(" ");
    (last, first)
}

/// Parses a non-negative integer, tolerating surrounding junk like "182 cm"
pub(crate) fn parse_u32(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Parses a "home:away" score pair
pub(crate) fn parse_score_pair(text: &str) -> Option<(u32, u32)> {
    let (home, away) = text.split_once(':')?;
    Some((home.trim().parse().ok()?, away.trim().parse().ok()?))
}

/// Parses the date-time formats both sites use
pub(crate) fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%d.%m.%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    // Date-only rows get midnight
    parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    for format in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    None
}

/// Non-empty trimmed text or `None`
pub(crate) fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
