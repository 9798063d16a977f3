//! Small text and URL helpers shared by both retrieval tiers.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref TICKET_PATH: Regex = Regex::new(r"(?i)/agent/tickets/(\d+)").unwrap();
    static ref VIEW_PATH: Regex = Regex::new(r"(?i)/agent/filters/(\d+)").unwrap();
    static ref NON_SLUG: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Collapse runs of whitespace and trim.
pub fn clean(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Clean `text`, returning `None` when nothing is left.
pub fn clean_opt(text: &str) -> Option<String> {
    let cleaned = clean(text);
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// Lowercase, dash-separated form used for snapshot directory names.
pub fn slugify(value: &str) -> String {
    let lowered = clean(value).to_lowercase();
    let slug = NON_SLUG.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug.to_string()
    }
}

/// Keep only ASCII digits (`"#123"` becomes `"123"`).
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn is_numeric_id(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

pub fn ticket_id_from_url(page_url: &str) -> Option<String> {
    TICKET_PATH
        .captures(page_url)
        .map(|caps| caps[1].to_string())
}

pub fn view_id_from_url(page_url: &str) -> Option<String> {
    VIEW_PATH.captures(page_url).map(|caps| caps[1].to_string())
}

/// `scheme://host[:port]` of a URL, or `None` when it does not parse.
pub fn base_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Join an agent path onto a base URL; a missing base yields the bare path.
pub fn agent_url(base: &str, suffix: &str) -> String {
    let path = if suffix.starts_with('/') {
        suffix.to_string()
    } else {
        format!("/{}", suffix)
    };
    format!("{}{}", base, path)
}

/// Whether a path (or URL) sits inside the authenticated agent area.
pub fn is_agent_path(path: &str) -> bool {
    path.to_ascii_lowercase().starts_with("/agent/")
}

/// Percent-encode a query-string component, spaces as `%20`.
pub fn encode_component(value: &str) -> String {
    // byte_serialize escapes a literal '+' as %2B, so any '+' left is a space
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
