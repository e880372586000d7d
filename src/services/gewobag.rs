// src/services/gewobag.rs

//! Gewobag rental offers.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::FetchError;
use crate::models::{Listing, SourceConfig, SourceKind};
use crate::services::{FetchContext, SiteAdapter, keep_matching, parse_selector, select_text};
use crate::utils::{http, parse_decimal, resolve_url};

const BASE_URL: &str = "https://www.gewobag.de/";

const ROW: &str = "article.angebot-big-box";
const AREA: &str = "tr.angebot-area td";
const LINK: &str = "a.read-more-link";
const TITLE: &str = "h3.angebot-title";
const ADDRESS: &str = "address";

/// Adapter for the Gewobag offer list.
pub struct GewobagAdapter {
    source: SourceConfig,
    ctx: FetchContext,
}

struct RowSelectors {
    area: Selector,
    link: Selector,
    title: Selector,
    address: Selector,
}

impl GewobagAdapter {
    pub fn new(source: SourceConfig, ctx: FetchContext) -> Self {
        Self { source, ctx }
    }

    /// Parse an offer page into filtered listings.
    pub fn parse(&self, html: &str) -> Result<Vec<Listing>, FetchError> {
        let document = Html::parse_document(html);
        let row_sel = parse_selector(ROW)?;
        let selectors = RowSelectors {
            area: parse_selector(AREA)?,
            link: parse_selector(LINK)?,
            title: parse_selector(TITLE)?,
            address: parse_selector(ADDRESS)?,
        };
        let base = Url::parse(BASE_URL)?;

        let rows = document
            .select(&row_sel)
            .map(|row| Self::parse_row(&row, &selectors, &base))
            .collect();

        Ok(keep_matching(
            SourceKind::Gewobag.display_name(),
            rows,
            &self.source.filter,
        ))
    }

    /// Area cell reads like `3 Zimmer | 65,0 m²`.
    fn parse_row(row: &ElementRef, sel: &RowSelectors, base: &Url) -> Option<Listing> {
        let area_text = select_text(row, &sel.area)?;
        let (rooms_text, area_text) = area_text.split_once('|')?;
        let rooms = parse_decimal(rooms_text)?;
        let area = parse_decimal(area_text)?;

        let href = row.select(&sel.link).next()?.value().attr("href")?;
        let url = resolve_url(base, href);
        let id = row
            .value()
            .attr("id")
            .filter(|id| !id.trim().is_empty())
            .map(|id| id.trim().to_string())
            .unwrap_or_else(|| Listing::id_from_url(&url));

        let kind = SourceKind::Gewobag;
        let mut listing = Listing::new(kind.key(), kind.display_name(), id, url);
        listing.title = select_text(row, &sel.title);
        listing.address = select_text(row, &sel.address);
        listing.rooms = Some(rooms);
        listing.area = Some(area);
        Some(listing)
    }
}

#[async_trait]
impl SiteAdapter for GewobagAdapter {
    fn source(&self) -> &str {
        SourceKind::Gewobag.key()
    }

    async fn fetch(&self) -> Result<Vec<Listing>, FetchError> {
        let body =
            http::fetch_text(&self.ctx.client, self.source.search_url(), self.ctx.attempts)
                .await?;
        let listings = self.parse(&body)?;
        log::info!("[Gewobag] {} listings", listings.len());
        Ok(listings)
    }
}
