//! Listing data structure.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of a listing in the store: the adapter key plus the listing id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingKey {
    pub source: String,
    pub id: String,
}

impl ListingKey {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.id)
    }
}

/// An apartment posting as seen in one fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    /// Stable identifier within the source
    pub id: String,

    /// Adapter key (e.g. "gewobag")
    pub source: String,

    /// Display name of the housing provider
    pub provider: String,

    /// Absolute URL of the listing page
    pub url: String,

    /// Listing headline
    #[serde(default)]
    pub title: Option<String>,

    /// Street address or district
    #[serde(default)]
    pub address: Option<String>,

    /// Number of rooms
    #[serde(default)]
    pub rooms: Option<f64>,

    /// Living area in square metres
    #[serde(default)]
    pub area: Option<f64>,

    /// Monthly rent in euros
    #[serde(default)]
    pub rent: Option<f64>,
}

impl Listing {
    /// Create a listing with only the fields needed for identity and delivery.
    pub fn new(
        source: impl Into<String>,
        provider: impl Into<String>,
        id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            provider: provider.into(),
            url: url.into(),
            title: None,
            address: None,
            rooms: None,
            area: None,
            rent: None,
        }
    }

    /// Store key for this listing.
    pub fn key(&self) -> ListingKey {
        ListingKey::new(self.source.clone(), self.id.clone())
    }

    /// Derive a stable id from the listing URL, for sites without their own key.
    pub fn id_from_url(url: &str) -> String {
        let digest = Sha256::digest(url.trim_end_matches('/').as_bytes());
        hex::encode(&digest[..8])
    }
}
