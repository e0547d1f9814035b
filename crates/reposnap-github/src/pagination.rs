//! `Link` header pagination

use once_cell::sync::Lazy;
use regex::Regex;

static NEXT_LINK: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).ok());

/// URL of the next page from a `Link` header, if any
#[must_use]
pub fn next_link(header: &str) -> Option<String> {
    NEXT_LINK
        .as_ref()?
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|url| url.as_str().to_string())
}
