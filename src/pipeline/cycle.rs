// src/pipeline/cycle.rs

//! One scan cycle: fetch, diff, notify, commit.
//!
//! Listings are committed one by one right after their message was accepted,
//! so a crash mid-cycle re-sends at most the unflushed tail on restart.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;

use crate::error::{AppError, FetchError, NotifyError, Result, StoreError};
use crate::models::{Config, Listing};
use crate::notify::{Notifier, render_message};
use crate::pipeline::diff::{DiffResult, select_new};
use crate::services::SiteAdapter;
use crate::storage::IdentityStore;

/// Timing knobs for a cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleOptions {
    /// Budget for one adapter's fetch
    pub adapter_timeout: Duration,
    /// Flush attempts before the cycle is aborted
    pub flush_attempts: u32,
    /// Delay before the second flush attempt, doubled afterwards
    pub flush_backoff: Duration,
}

impl CycleOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            adapter_timeout: config.scanner.adapter_timeout(),
            flush_attempts: config.store.flush_attempts.max(1),
            flush_backoff: Duration::from_millis(config.store.flush_backoff_ms),
        }
    }
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            adapter_timeout: Duration::from_secs(90),
            flush_attempts: 3,
            flush_backoff: Duration::from_secs(1),
        }
    }
}

/// Fetch outcome of one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source: String,
    pub fetched: usize,
    pub error: Option<String>,
}

/// Statistics for one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub sources: Vec<SourceReport>,
    pub known: usize,
    pub duplicates: usize,
    pub new: usize,
    pub sent: usize,
    pub failed: usize,
    pub auth_failed: bool,
    pub interrupted: bool,
}

impl CycleReport {
    /// Listings fetched over all sources.
    pub fn fetched(&self) -> usize {
        self.sources.iter().map(|s| s.fetched).sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle: {} fetched from {} sources ({} failed), {} new, {} sent, {} failed",
            self.fetched(),
            self.sources.len(),
            self.failed_sources(),
            self.new,
            self.sent,
            self.failed
        )?;
        if self.auth_failed {
            write!(f, ", auth rejected")?;
        }
        if self.interrupted {
            write!(f, ", interrupted")?;
        }
        Ok(())
    }
}

/// Drives cycles over a fixed adapter set and one identity store.
pub struct Orchestrator<S: IdentityStore> {
    adapters: Vec<Box<dyn SiteAdapter>>,
    store: S,
    notifier: Arc<dyn Notifier>,
    alerts: Option<Arc<dyn Notifier>>,
    options: CycleOptions,
}

impl<S: IdentityStore> Orchestrator<S> {
    pub fn new(
        adapters: Vec<Box<dyn SiteAdapter>>,
        store: S,
        notifier: Arc<dyn Notifier>,
        options: CycleOptions,
    ) -> Self {
        Self {
            adapters,
            store,
            notifier,
            alerts: None,
            options,
        }
    }

    /// Route operator alerts (auth and store failures) to a separate channel.
    pub fn with_alerts(mut self, alerts: Arc<dyn Notifier>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a single cycle without an external shutdown signal.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let (_tx, rx) = watch::channel(false);
        self.run_cycle_with_shutdown(&rx).await
    }

    /// Run a single cycle, stopping the notify phase early on shutdown.
    ///
    /// Fails only when the store cannot be flushed. Commits made in this
    /// cycle stay in memory and are persisted by the next successful flush.
    pub async fn run_cycle_with_shutdown(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let listings = self.fetch_all(&mut report).await;
        let diff = select_new(listings, &self.store);
        report.known = diff.known;
        report.duplicates = diff.duplicates;
        report.new = diff.new.len();

        self.notify_all(diff.new, shutdown, &mut report).await;

        if let Err(e) = self.flush_with_retry().await {
            log::error!("Store flush failed, cycle aborted: {e}");
            self.alert(&format!(
                "⚠️ flatscan: identity store could not be saved ({e}). \
                 Sent listings may be repeated after a restart."
            ))
            .await;
            return Err(AppError::Store(e));
        }

        Ok(report)
    }

    /// Fetch and diff without notifying or committing.
    pub async fn scan(&self) -> (DiffResult, CycleReport) {
        let mut report = CycleReport::default();
        let listings = self.fetch_all(&mut report).await;
        let diff = select_new(listings, &self.store);
        report.known = diff.known;
        report.duplicates = diff.duplicates;
        report.new = diff.new.len();
        (diff, report)
    }

    /// Fetch all adapters concurrently and concatenate in registration order.
    async fn fetch_all(&self, report: &mut CycleReport) -> Vec<Listing> {
        let budget = self.options.adapter_timeout;
        let fetches = self.adapters.iter().map(|adapter| async move {
            let result = match tokio::time::timeout(budget, adapter.fetch()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(budget)),
            };
            (adapter.source().to_string(), result)
        });

        let mut listings = Vec::new();
        for (source, result) in join_all(fetches).await {
            match result {
                Ok(batch) => {
                    report.sources.push(SourceReport {
                        source,
                        fetched: batch.len(),
                        error: None,
                    });
                    listings.extend(batch);
                }
                Err(e) => {
                    log::warn!("[{source}] fetch failed: {e}");
                    report.sources.push(SourceReport {
                        source,
                        fetched: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        listings
    }

    async fn notify_all(
        &mut self,
        listings: Vec<Listing>,
        shutdown: &watch::Receiver<bool>,
        report: &mut CycleReport,
    ) {
        for listing in listings {
            if *shutdown.borrow() {
                log::info!("Shutdown requested, leaving remaining listings for later");
                report.interrupted = true;
                break;
            }

            let key = listing.key();
            match self.notifier.send(&render_message(&listing)).await {
                Ok(()) => {
                    self.store.commit(key);
                    report.sent += 1;
                }
                Err(NotifyError::Auth(reason)) => {
                    log::error!(
                        "Telegram rejected the bot credentials ({reason}); \
                         no further messages this cycle"
                    );
                    self.alert(&format!(
                        "⚠️ flatscan: Telegram refused delivery ({reason}). \
                         Notifications are paused until the next cycle."
                    ))
                    .await;
                    report.failed += 1;
                    report.auth_failed = true;
                    break;
                }
                Err(e) => {
                    log::warn!("Notification for {key} failed: {e}");
                    report.failed += 1;
                }
            }
        }
    }

    async fn flush_with_retry(&mut self) -> std::result::Result<(), StoreError> {
        let attempts = self.options.flush_attempts.max(1);
        let mut delay = self.options.flush_backoff;
        let mut attempt = 1;
        loop {
            match self.store.flush().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    log::warn!("Flush attempt {attempt}/{attempts} failed: {e}");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn alert(&self, text: &str) {
        let Some(alerts) = &self.alerts else {
            return;
        };
        if let Err(e) = alerts.send(text).await {
            log::warn!("Operator alert could not be sent: {e}");
        }
    }
}
