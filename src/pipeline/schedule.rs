//! Long-running scan loop and shutdown signalling.

use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::pipeline::cycle::Orchestrator;
use crate::storage::IdentityStore;

/// Run cycles every `interval` until shutdown is requested.
///
/// The first cycle starts immediately. Ticks missed while a cycle overran are
/// skipped, so cycles never overlap or bunch up. A failed cycle is logged and
/// the loop continues.
pub async fn run_loop<S: IdentityStore>(
    orchestrator: &mut Orchestrator<S>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    log::info!("Scanning every {}s", interval.as_secs());

    loop {
        let sender_gone = tokio::select! {
            _ = ticker.tick() => false,
            changed = shutdown.changed() => changed.is_err(),
        };
        if sender_gone || *shutdown.borrow() {
            break;
        }

        match orchestrator.run_cycle_with_shutdown(&shutdown).await {
            Ok(report) => log::info!("{report}"),
            Err(e) => log::error!("Cycle failed: {e}"),
        }
    }

    log::info!("Scan loop stopped");
}

/// Resolve on Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::warn!("Cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::warn!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Shutdown signal received (Ctrl+C)"),
        _ = terminate => log::info!("Shutdown signal received (SIGTERM)"),
    }
}

/// Spawn a task that flips the returned receiver to `true` on shutdown.
pub fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::{FetchError, NotifyError};
    use crate::models::Listing;
    use crate::notify::Notifier;
    use crate::pipeline::cycle::CycleOptions;
    use crate::services::SiteAdapter;
    use crate::storage::MemoryIdentityStore;

    struct CountingAdapter {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SiteAdapter for CountingAdapter {
        fn source(&self) -> &str {
            "wbm"
        }

        async fn fetch(&self) -> Result<Vec<Listing>, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![Listing::new(
                "wbm",
                "WBM",
                format!("u{n}"),
                format!("https://www.wbm.de/u{n}"),
            )])
        }
    }

    struct NullNotifier;

    #[async_trait]
    impl Notifier for NullNotifier {
        async fn send(&self, _text: &str) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_until_shutdown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapters: Vec<Box<dyn SiteAdapter>> = vec![Box::new(CountingAdapter {
            calls: calls.clone(),
        })];
        let mut orch = Orchestrator::new(
            adapters,
            MemoryIdentityStore::new(),
            Arc::new(NullNotifier),
            CycleOptions::default(),
        );
        let (tx, rx) = watch::channel(false);

        let stopper = async move {
            tokio::time::sleep(Duration::from_secs(250)).await;
            let _ = tx.send(true);
        };
        tokio::join!(run_loop(&mut orch, Duration::from_secs(120), rx), stopper);

        // Ticks at 0s, 120s and 240s.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(orch.store().len(), 3);
    }

    #[tokio::test]
    async fn test_loop_exits_when_already_stopped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapters: Vec<Box<dyn SiteAdapter>> = vec![Box::new(CountingAdapter {
            calls: calls.clone(),
        })];
        let mut orch = Orchestrator::new(
            adapters,
            MemoryIdentityStore::new(),
            Arc::new(NullNotifier),
            CycleOptions::default(),
        );
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        run_loop(&mut orch, Duration::from_secs(120), rx).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
