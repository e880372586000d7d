// src/services/mod.rs

//! Site adapters.
//!
//! Each adapter knows one housing site: it fetches the configured search page
//! and turns it into [`Listing`]s. Adapters keep no history, so deduplication
//! happens in one place, against the identity store.

pub mod gewobag;
pub mod inberlin;
pub mod wbm;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Selector};

use crate::error::FetchError;
use crate::models::{Config, Listing, SearchFilter, SourceConfig, SourceKind};

pub use gewobag::GewobagAdapter;
pub use inberlin::InBerlinWohnenAdapter;
pub use wbm::WbmAdapter;

/// A source of current listings.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Key identifying this source in listing identities.
    fn source(&self) -> &str;

    /// Fetch the source's current result set for the configured search.
    async fn fetch(&self) -> Result<Vec<Listing>, FetchError>;
}

/// HTTP settings shared by all adapters.
#[derive(Clone)]
pub struct FetchContext {
    pub client: Client,
    /// Attempts per page fetch
    pub attempts: u32,
}

/// Build the adapter registry from the enabled sources, in config order.
pub fn build_adapters(config: &Config, ctx: &FetchContext) -> Vec<Box<dyn SiteAdapter>> {
    config
        .enabled_sources()
        .map(|source| build_adapter(source.clone(), ctx.clone()))
        .collect()
}

fn build_adapter(source: SourceConfig, ctx: FetchContext) -> Box<dyn SiteAdapter> {
    match source.kind {
        SourceKind::Gewobag => Box::new(GewobagAdapter::new(source, ctx)),
        SourceKind::Wbm => Box::new(WbmAdapter::new(source, ctx)),
        SourceKind::InBerlinWohnen => Box::new(InBerlinWohnenAdapter::new(source, ctx)),
    }
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector, FetchError> {
    Selector::parse(s).map_err(|e| FetchError::selector(s, format!("{e:?}")))
}

/// Normalized text of the first element matching `sel` under `el`.
pub(crate) fn select_text(el: &ElementRef, sel: &Selector) -> Option<String> {
    let text: String = el.select(sel).next()?.text().collect();
    crate::utils::non_empty(&text)
}

/// Drop unparsable rows and listings outside the search filter.
pub(crate) fn keep_matching(
    provider: &str,
    rows: Vec<Option<Listing>>,
    filter: &SearchFilter,
) -> Vec<Listing> {
    let total = rows.len();
    let parsed: Vec<Listing> = rows.into_iter().flatten().collect();
    if parsed.len() < total {
        log::debug!(
            "[{}] skipped {} unparsable rows",
            provider,
            total - parsed.len()
        );
    }

    parsed
        .into_iter()
        .filter(|l| filter.accepts(l.rooms, l.area, l.rent))
        .collect()
}
