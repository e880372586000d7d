//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Polling and HTTP behavior settings
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Identity store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Telegram delivery settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Housing sources, in notification order
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Recognized: `TELEGRAM_BOT_TOKEN`, `TELEGRAM_USER_ID` (or
    /// `TELEGRAM_CHAT_ID`), `TELEGRAM_ALERT_CHAT_ID`, `STATE_FILE`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat) = non_empty("TELEGRAM_USER_ID").or_else(|| non_empty("TELEGRAM_CHAT_ID")) {
            self.telegram.chat_id = Some(chat);
        }
        if let Some(chat) = non_empty("TELEGRAM_ALERT_CHAT_ID") {
            self.telegram.alert_chat_id = Some(chat);
        }
        if let Some(path) = non_empty("STATE_FILE") {
            self.store.path = PathBuf::from(path);
        }
    }

    /// Sources that take part in cycles.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.scanner.user_agent.trim().is_empty() {
            return Err(AppError::validation("scanner.user_agent is empty"));
        }
        if self.scanner.interval_secs == 0 {
            return Err(AppError::validation("scanner.interval_secs must be > 0"));
        }
        if self.scanner.request_timeout_secs == 0 {
            return Err(AppError::validation(
                "scanner.request_timeout_secs must be > 0",
            ));
        }
        if self.scanner.adapter_timeout_secs == 0 {
            return Err(AppError::validation(
                "scanner.adapter_timeout_secs must be > 0",
            ));
        }
        if self.scanner.fetch_attempts == 0 {
            return Err(AppError::validation("scanner.fetch_attempts must be > 0"));
        }
        if self.store.flush_attempts == 0 {
            return Err(AppError::validation("store.flush_attempts must be > 0"));
        }
        if self.telegram.max_attempts == 0 {
            return Err(AppError::validation("telegram.max_attempts must be > 0"));
        }
        if self.enabled_sources().next().is_none() {
            return Err(AppError::validation("No enabled sources defined"));
        }
        for source in self.enabled_sources() {
            url::Url::parse(source.search_url()).map_err(|e| {
                AppError::validation(format!("{} url is invalid: {}", source.kind.key(), e))
            })?;
        }
        if self.telegram.bot_token.as_deref().is_none_or(|t| t.trim().is_empty()) {
            return Err(AppError::validation(
                "telegram bot token missing (set TELEGRAM_BOT_TOKEN)",
            ));
        }
        if self.telegram.chat_id.as_deref().is_none_or(|c| c.trim().is_empty()) {
            return Err(AppError::validation(
                "telegram chat id missing (set TELEGRAM_USER_ID)",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            store: StoreConfig::default(),
            telegram: TelegramConfig::default(),
            sources: defaults::sources(),
        }
    }
}

/// Polling and HTTP behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Seconds between cycle starts
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Upper bound for one adapter's whole fetch, retries included
    #[serde(default = "defaults::adapter_timeout")]
    pub adapter_timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::request_timeout")]
    pub request_timeout_secs: u64,

    /// Attempts per page fetch
    #[serde(default = "defaults::attempts")]
    pub fetch_attempts: u32,
}

impl ScannerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            adapter_timeout_secs: defaults::adapter_timeout(),
            user_agent: defaults::user_agent(),
            request_timeout_secs: defaults::request_timeout(),
            fetch_attempts: defaults::attempts(),
        }
    }
}

/// Identity store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON file holding notified listing keys
    #[serde(default = "defaults::store_path")]
    pub path: PathBuf,

    /// Attempts per end-of-cycle flush
    #[serde(default = "defaults::attempts")]
    pub flush_attempts: u32,

    /// Backoff before the second flush attempt, doubled afterwards
    #[serde(default = "defaults::flush_backoff")]
    pub flush_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: defaults::store_path(),
            flush_attempts: defaults::attempts(),
            flush_backoff_ms: defaults::flush_backoff(),
        }
    }
}

/// Telegram delivery settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Bot token; prefer the TELEGRAM_BOT_TOKEN variable
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Recipient chat for listings
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Optional operator chat for scanner alerts
    #[serde(default)]
    pub alert_chat_id: Option<String>,

    /// Attempts per message
    #[serde(default = "defaults::attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt, doubled afterwards
    #[serde(default = "defaults::base_backoff")]
    pub base_backoff_ms: u64,

    /// Ceiling for any single backoff
    #[serde(default = "defaults::max_backoff")]
    pub max_backoff_secs: u64,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::telegram_timeout")]
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::api_base(),
            bot_token: None,
            chat_id: None,
            alert_chat_id: None,
            max_attempts: defaults::attempts(),
            base_backoff_ms: defaults::base_backoff(),
            max_backoff_secs: defaults::max_backoff(),
            timeout_secs: defaults::telegram_timeout(),
        }
    }
}

// Keeps the token out of logs.
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base", &self.api_base)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("chat_id", &self.chat_id)
            .field("alert_chat_id", &self.alert_chat_id)
            .field("max_attempts", &self.max_attempts)
            .field("base_backoff_ms", &self.base_backoff_ms)
            .field("max_backoff_secs", &self.max_backoff_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Supported housing sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Gewobag,
    Wbm,
    InBerlinWohnen,
}

impl SourceKind {
    /// Stable key used in listing identities.
    pub fn key(self) -> &'static str {
        match self {
            SourceKind::Gewobag => "gewobag",
            SourceKind::Wbm => "wbm",
            SourceKind::InBerlinWohnen => "inberlinwohnen",
        }
    }

    /// Human-readable provider name.
    pub fn display_name(self) -> &'static str {
        match self {
            SourceKind::Gewobag => "Gewobag",
            SourceKind::Wbm => "WBM",
            SourceKind::InBerlinWohnen => "inBerlinWohnen",
        }
    }

    /// Search page used when a source entry has no `url`.
    pub fn default_url(self) -> &'static str {
        match self {
            SourceKind::Gewobag => defaults::GEWOBAG_URL,
            SourceKind::Wbm => "https://www.wbm.de/wohnungen-berlin/angebote/",
            SourceKind::InBerlinWohnen => "https://inberlinwohnen.de/wohnungsfinder/",
        }
    }
}

/// One configured housing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Which site this entry talks to
    pub kind: SourceKind,

    /// Search page URL; defaults per kind
    #[serde(default)]
    pub url: Option<String>,

    /// Whether the source takes part in cycles
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Listing filter applied after parsing
    #[serde(flatten)]
    pub filter: SearchFilter,
}

impl SourceConfig {
    pub fn new(kind: SourceKind, filter: SearchFilter) -> Self {
        Self {
            kind,
            url: None,
            enabled: true,
            filter,
        }
    }

    /// URL of the search page to fetch.
    pub fn search_url(&self) -> &str {
        self.url.as_deref().unwrap_or(self.kind.default_url())
    }
}

/// Bounds a listing must satisfy to be reported.
///
/// Unset bounds accept everything; listings missing a value pass that bound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(default)]
    pub min_rooms: Option<f64>,

    #[serde(default)]
    pub min_area: Option<f64>,

    #[serde(default)]
    pub max_rent: Option<f64>,
}

impl SearchFilter {
    /// Check the parsed values of a listing against the bounds.
    pub fn accepts(&self, rooms: Option<f64>, area: Option<f64>, rent: Option<f64>) -> bool {
        let at_least = |bound: Option<f64>, value: Option<f64>| match (bound, value) {
            (Some(b), Some(v)) => v >= b,
            _ => true,
        };
        let at_most = |bound: Option<f64>, value: Option<f64>| match (bound, value) {
            (Some(b), Some(v)) => v <= b,
            _ => true,
        };
        at_least(self.min_rooms, rooms)
            && at_least(self.min_area, area)
            && at_most(self.max_rent, rent)
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{SearchFilter, SourceConfig, SourceKind};

    pub const GEWOBAG_URL: &str = "https://www.gewobag.de/fuer-mietinteressentinnen/mietangebote/?bezirke%5B%5D=friedrichshain-kreuzberg&bezirke%5B%5D=friedrichshain-kreuzberg-friedrichshain&bezirke%5B%5D=friedrichshain-kreuzberg-kreuzberg&bezirke%5B%5D=mitte&bezirke%5B%5D=mitte-gesundbrunnen&bezirke%5B%5D=mitte-moabit&bezirke%5B%5D=mitte-wedding&bezirke%5B%5D=pankow-pankow&bezirke%5B%5D=pankow-prenzlauer-berg&bezirke%5B%5D=reinickendorf-reinickendorf&objekttyp%5B%5D=wohnung&gesamtmiete_von=&gesamtmiete_bis=&gesamtflaeche_von=60&gesamtflaeche_bis=&zimmer_von=3&zimmer_bis=&sort-by=";

    // Scanner defaults
    pub fn interval() -> u64 {
        120
    }
    pub fn adapter_timeout() -> u64 {
        90
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0".into()
    }
    pub fn request_timeout() -> u64 {
        12
    }
    pub fn attempts() -> u32 {
        3
    }

    // Store defaults
    pub fn store_path() -> PathBuf {
        PathBuf::from("notified.json")
    }
    pub fn flush_backoff() -> u64 {
        1000
    }

    // Telegram defaults
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn base_backoff() -> u64 {
        500
    }
    pub fn max_backoff() -> u64 {
        30
    }
    pub fn telegram_timeout() -> u64 {
        10
    }

    // Source defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn sources() -> Vec<SourceConfig> {
        let large_flat = SearchFilter {
            min_rooms: Some(2.5),
            min_area: Some(62.0),
            max_rent: None,
        };
        vec![
            SourceConfig::new(SourceKind::Gewobag, large_flat.clone()),
            SourceConfig::new(SourceKind::Wbm, large_flat),
            SourceConfig::new(
                SourceKind::InBerlinWohnen,
                SearchFilter {
                    min_rooms: Some(3.0),
                    min_area: None,
                    max_rent: Some(1600.0),
                },
            ),
        ]
    }
}
