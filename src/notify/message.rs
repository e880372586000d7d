//! Telegram HTML rendering of listings.

use html_escape::{encode_double_quoted_attribute, encode_text};
use unicode_segmentation::UnicodeSegmentation;

use crate::models::Listing;

/// Max grapheme clusters in the headline snippet.
const SNIPPET_LEN: usize = 80;

/// Render a listing as a Telegram HTML message.
///
/// ```text
/// 🏠 <b>Gewobag</b>: Top Wohnung
/// 📍 Berlin
/// 🛏 3 rooms – 65 m²
/// 💶 1200 €
/// 🔗 <a href="https://www.gewobag.de/flat1">Listing</a>
/// ```
pub fn render_message(listing: &Listing) -> String {
    let mut lines = vec![format!(
        "🏠 <b>{}</b>: {}",
        encode_text(&listing.provider),
        encode_text(&snippet(listing))
    )];

    if let Some(address) = &listing.address {
        lines.push(format!("📍 {}", encode_text(address)));
    }

    let rooms = listing.rooms.map(|r| format!("{} rooms", format_number(r)));
    let area = listing.area.map(|a| format!("{} m²", format_number(a)));
    match (rooms, area) {
        (Some(rooms), Some(area)) => lines.push(format!("🛏 {rooms} – {area}")),
        (Some(part), None) | (None, Some(part)) => lines.push(format!("🛏 {part}")),
        (None, None) => {}
    }

    if let Some(rent) = listing.rent {
        lines.push(format!("💶 {} €", format_number(rent)));
    }

    lines.push(format!(
        "🔗 <a href=\"{}\">Listing</a>",
        encode_double_quoted_attribute(&listing.url)
    ));
    lines.join("\n")
}

/// Whole numbers without decimals, others with at most one.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        return format!("{value:.0}");
    }
    let text = format!("{value:.1}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Title, else address, else the last URL path segment.
fn snippet(listing: &Listing) -> String {
    let source = listing
        .title
        .as_deref()
        .or(listing.address.as_deref())
        .unwrap_or_else(|| {
            listing
                .url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
        });
    source.graphemes(true).take(SNIPPET_LEN).collect()
}
