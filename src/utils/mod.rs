//! Utility functions and helpers.

pub mod http;

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href.trim())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Collapse runs of whitespace and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed text, or `None` when nothing is left.
pub fn non_empty(s: &str) -> Option<String> {
    let text = normalize_whitespace(s);
    if text.is_empty() { None } else { Some(text) }
}

fn number_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[\d.,]*").ok()).as_ref()
}

/// Parse the first decimal number in a text, accepting `,` as decimal mark.
///
/// `"3 Zimmer"` -> 3.0, `"65,5 m²"` -> 65.5, `"2.5"` -> 2.5.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let raw = number_pattern()?.find(text)?.as_str();
    raw.trim_end_matches(['.', ','])
        .replace(',', ".")
        .parse()
        .ok()
}

/// Parse the first money amount in a text, where `.` groups thousands.
///
/// `"ab 1.200,50 €"` -> 1200.5.
pub fn parse_amount(text: &str) -> Option<f64> {
    let raw = number_pattern()?.find(text)?.as_str();
    raw.trim_end_matches(['.', ','])
        .replace('.', "")
        .replace(',', ".")
        .parse()
        .ok()
}
