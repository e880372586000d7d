//! Diff calculation between fetched listings and the identity store.
//!
//! Only additions matter here. A listing that reappears under the same key is
//! never announced again, even when its rent or title changed.

use std::collections::HashSet;

use crate::models::{Listing, ListingKey};
use crate::storage::IdentityStore;

/// Outcome of diffing one cycle's listings.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// Listings never notified before, in fetch order
    pub new: Vec<Listing>,
    /// Listings already present in the store
    pub known: usize,
    /// Repeats of a key seen earlier in the same cycle
    pub duplicates: usize,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.new.is_empty()
    }
}

/// Keep listings whose key is not in the store, first occurrence wins.
pub fn select_new<S>(listings: impl IntoIterator<Item = Listing>, store: &S) -> DiffResult
where
    S: IdentityStore + ?Sized,
{
    let mut seen: HashSet<ListingKey> = HashSet::new();
    let mut result = DiffResult::default();

    for listing in listings {
        let key = listing.key();
        if store.contains(&key) {
            result.known += 1;
        } else if !seen.insert(key) {
            result.duplicates += 1;
        } else {
            result.new.push(listing);
        }
    }

    if result.has_changes() {
        log::info!(
            "Diff: {} new, {} known, {} duplicates",
            result.new.len(),
            result.known,
            result.duplicates
        );
    }
    result
}
