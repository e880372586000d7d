// src/models/mod.rs

//! Domain models for the scanner.
//!
//! This module contains the data structures shared between adapters, the
//! identity store, the notifier and the orchestrator.

mod config;
mod listing;

// Re-export all public types
pub use config::{
    Config, ScannerConfig, SearchFilter, SourceConfig, SourceKind, StoreConfig, TelegramConfig,
};
pub use listing::{Listing, ListingKey};
