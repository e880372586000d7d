// src/services/wbm.rs

//! WBM apartment offers.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::FetchError;
use crate::models::{Listing, SourceConfig, SourceKind};
use crate::services::{FetchContext, SiteAdapter, keep_matching, parse_selector, select_text};
use crate::utils::{http, parse_decimal, resolve_url};

const BASE_URL: &str = "https://www.wbm.de/";

const ROW: &str = "div.row.openimmo-search-list-item";
const ROOMS: &str = "div.main-property-rooms";
const SIZE: &str = "div.main-property-size";
const DETAILS: &str = "a[title=\"Details\"]";

/// Adapter for the WBM offer list.
pub struct WbmAdapter {
    source: SourceConfig,
    ctx: FetchContext,
}

impl WbmAdapter {
    pub fn new(source: SourceConfig, ctx: FetchContext) -> Self {
        Self { source, ctx }
    }

    /// Parse an offer page into filtered listings.
    pub fn parse(&self, html: &str) -> Result<Vec<Listing>, FetchError> {
        let document = Html::parse_document(html);
        let row_sel = parse_selector(ROW)?;
        let selectors = [
            parse_selector(ROOMS)?,
            parse_selector(SIZE)?,
            parse_selector(DETAILS)?,
        ];
        let base = Url::parse(BASE_URL)?;

        let rows = document
            .select(&row_sel)
            .map(|row| Self::parse_row(&row, &selectors, &base))
            .collect();

        Ok(keep_matching(
            SourceKind::Wbm.display_name(),
            rows,
            &self.source.filter,
        ))
    }

    /// The offer list carries no title or address, only the key figures.
    fn parse_row(row: &ElementRef, sel: &[Selector; 3], base: &Url) -> Option<Listing> {
        let [rooms_sel, size_sel, details_sel] = sel;

        let id = row.value().attr("data-uid")?.trim();
        if id.is_empty() {
            return None;
        }
        let rooms = parse_decimal(&select_text(row, rooms_sel)?)?;
        let area = parse_decimal(&select_text(row, size_sel)?)?;
        let href = row.select(details_sel).next()?.value().attr("href")?;

        let kind = SourceKind::Wbm;
        let mut listing = Listing::new(kind.key(), kind.display_name(), id, resolve_url(base, href));
        listing.rooms = Some(rooms);
        listing.area = Some(area);
        Some(listing)
    }
}

#[async_trait]
impl SiteAdapter for WbmAdapter {
    fn source(&self) -> &str {
        SourceKind::Wbm.key()
    }

    async fn fetch(&self) -> Result<Vec<Listing>, FetchError> {
        let body =
            http::fetch_text(&self.ctx.client, self.source.search_url(), self.ctx.attempts)
                .await?;
        let listings = self.parse(&body)?;
        log::info!("[WBM] {} listings", listings.len());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchFilter;

    fn adapter() -> WbmAdapter {
        let filter = SearchFilter {
            min_rooms: Some(2.5),
            min_area: Some(62.0),
            max_rent: None,
        };
        WbmAdapter::new(
            SourceConfig::new(SourceKind::Wbm, filter),
            FetchContext {
                client: reqwest::Client::new(),
                attempts: 1,
            },
        )
    }

    fn item(uid: &str, rooms: &str, size: &str) -> String {
        format!(
            r#"<div class='row openimmo-search-list-item' data-uid='{uid}'>
                <div class='main-property-rooms'>{rooms}</div>
                <div class='main-property-size'>{size}</div>
                <a title='Details' href='/d{uid}'>Details</a>
            </div>"#
        )
    }

    #[test]
    fn test_parse_item() {
        let listings = adapter().parse(&item("u1", "3,0", "70 m²")).unwrap();

        assert_eq!(listings.len(), 1);
        let listing = &listings[0];
        assert_eq!(listing.id, "u1");
        assert_eq!(listing.source, "wbm");
        assert_eq!(listing.provider, "WBM");
        assert_eq!(listing.url, "https://www.wbm.de/du1");
        assert_eq!(listing.rooms, Some(3.0));
        assert_eq!(listing.area, Some(70.0));
        assert_eq!(listing.title, None);
        assert_eq!(listing.address, None);
    }

    #[test]
    fn test_absolute_link_kept() {
        let html = r#"<div class='row openimmo-search-list-item' data-uid='u2'>
                <div class='main-property-rooms'>3</div>
                <div class='main-property-size'>80,25 m²</div>
                <a title='Details' href='https://www.wbm.de/wohnungen/u2/'>Details</a>
            </div>"#;
        let listings = adapter().parse(html).unwrap();
        assert_eq!(listings[0].url, "https://www.wbm.de/wohnungen/u2/");
        assert_eq!(listings[0].area, Some(80.25));
    }

    #[test]
    fn test_skips_rows_without_uid_or_below_filter() {
        let html = [
            item("", "3", "70 m²"),
            item("u3", "2", "70 m²"),
            item("u4", "3", "keine Angabe"),
            item("u5", "4", "100 m²"),
        ]
        .concat();
        let listings = adapter().parse(&html).unwrap();
        let ids: Vec<&str> = listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["u5"]);
    }
}
