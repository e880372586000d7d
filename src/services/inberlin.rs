// src/services/inberlin.rs

//! inBerlinWohnen apartment finder.
//!
//! The portal aggregates the municipal housing companies, so offers it links
//! to sources that have their own adapter are dropped here.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::FetchError;
use crate::models::{Listing, SourceConfig, SourceKind};
use crate::services::{FetchContext, SiteAdapter, keep_matching, parse_selector, select_text};
use crate::utils::{http, parse_amount, parse_decimal, resolve_url};

const BASE_URL: &str = "https://inberlinwohnen.de/";

const RESULTS: &str = "ul#_tb_relevant_results";
const ROW: &str = "li.tb-merkflat";
const FIGURES: &str = "strong";
const DETAILS: &str = "a[title*=\"detailierte\"]";
const TITLE: &str = "h3";

/// Link fragments of offers already covered by a dedicated adapter.
const COVERED_ELSEWHERE: [&str; 2] = ["wbm.de", "gewobag"];

/// Adapter for the inBerlinWohnen finder.
pub struct InBerlinWohnenAdapter {
    source: SourceConfig,
    ctx: FetchContext,
}

impl InBerlinWohnenAdapter {
    pub fn new(source: SourceConfig, ctx: FetchContext) -> Self {
        Self { source, ctx }
    }

    /// Parse a finder page into filtered listings.
    ///
    /// Fails when the result list is missing, which means the page layout
    /// changed or an error page was served.
    pub fn parse(&self, html: &str) -> Result<Vec<Listing>, FetchError> {
        let document = Html::parse_document(html);
        let results_sel = parse_selector(RESULTS)?;
        let row_sel = parse_selector(ROW)?;
        let selectors = [
            parse_selector(FIGURES)?,
            parse_selector(DETAILS)?,
            parse_selector(TITLE)?,
        ];
        let base = Url::parse(BASE_URL)?;

        let results = document.select(&results_sel).next().ok_or_else(|| {
            FetchError::shape(SourceKind::InBerlinWohnen.key(), "result list not found")
        })?;

        let rows = results
            .select(&row_sel)
            .map(|row| Self::parse_row(&row, &selectors, &base))
            .collect();

        let listings = keep_matching(
            SourceKind::InBerlinWohnen.display_name(),
            rows,
            &self.source.filter,
        );
        Ok(listings
            .into_iter()
            .filter(|l| !COVERED_ELSEWHERE.iter().any(|frag| l.url.contains(frag)))
            .collect())
    }

    /// Figures come as three `strong` elements: rooms, area, rent.
    fn parse_row(row: &ElementRef, sel: &[Selector; 3], base: &Url) -> Option<Listing> {
        let [figures_sel, details_sel, title_sel] = sel;

        let id = row.value().attr("id")?.trim();
        if id.is_empty() {
            return None;
        }

        let figures: Vec<String> = row
            .select(figures_sel)
            .map(|el| el.text().collect::<String>())
            .collect();
        if figures.len() < 3 {
            return None;
        }
        let rooms = parse_decimal(&figures[0])?;
        let area = parse_decimal(&figures[1])?;
        let rent = parse_amount(&figures[2])?;

        let href = row.select(details_sel).next()?.value().attr("href")?;

        let kind = SourceKind::InBerlinWohnen;
        let mut listing = Listing::new(kind.key(), kind.display_name(), id, resolve_url(base, href));
        listing.title = select_text(row, title_sel);
        listing.rooms = Some(rooms);
        listing.area = Some(area);
        listing.rent = Some(rent);
        Some(listing)
    }
}

#[async_trait]
impl SiteAdapter for InBerlinWohnenAdapter {
    fn source(&self) -> &str {
        SourceKind::InBerlinWohnen.key()
    }

    async fn fetch(&self) -> Result<Vec<Listing>, FetchError> {
        let body =
            http::fetch_text(&self.ctx.client, self.source.search_url(), self.ctx.attempts)
                .await?;
        let listings = self.parse(&body)?;
        log::info!("[inberlinwohnen] {} listings", listings.len());
        Ok(listings)
    }
}
