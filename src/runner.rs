use std::sync::Arc;
use std::time::Duration;

use crate::browser::webdriver::WebDriver;
use crate::collectors::{CollectorSet, Collectors};
use crate::config::{RunOptions, WatchConfig};
use crate::error::AppError;
use crate::filter::Keywords;
use crate::notify::Notifiers;
use crate::pipeline::{Orchestrator, RunReport};
use crate::store::SeenStore;

/// One pass against an already loaded configuration: load the store, check
/// every source, notify, persist.
///
/// Notification failures are logged and never keep the store from being
/// written. A failed write is logged and recorded in the report; the pass
/// still completes with its summary.
pub async fn run_pass(
    config: &WatchConfig,
    store: &SeenStore,
    collectors: Arc<dyn CollectorSet>,
    notifiers: &Notifiers,
) -> RunReport {
    let seen = store.load().await;
    tracing::info!(
        "Loaded {} known posting(s) from {}",
        seen.len(),
        store.path().display()
    );

    let mut report = Orchestrator::new(collectors, Keywords::new(&config.keywords))
        .with_concurrency(config.concurrency)
        .run(&config.sites, seen)
        .await;

    if let Some(message) = report.message() {
        for e in notifiers.dispatch(&message).await {
            tracing::error!("Notification failed: {e}");
        }
    }

    if let Err(e) = store.save(&report.seen).await {
        tracing::error!("Failed to persist {}: {e}", store.path().display());
        report.persist_error = Some(e.to_string());
    }

    let elapsed = chrono::Utc::now() - report.started_at;
    tracing::info!(
        "{} ({} source(s), {} failed, {}s)",
        report.summary(),
        report.sources.len(),
        report.failed_sources().count(),
        elapsed.num_seconds()
    );
    report
}

/// Load the watch file and run one pass with the production collectors and
/// channels. Only a configuration failure is an error; it aborts before
/// anything is fetched.
pub async fn run_once(options: &RunOptions) -> Result<RunReport, AppError> {
    let config = WatchConfig::load(&options.config).await?;
    let store = SeenStore::new(
        options
            .store
            .clone()
            .unwrap_or_else(|| config.store_path.clone()),
    );

    let endpoint = options
        .webdriver_url
        .as_deref()
        .unwrap_or(config.webdriver.url.as_str());
    let browser = WebDriver::new(endpoint, config.webdriver.headless)?;
    let collectors: Arc<dyn CollectorSet> = Arc::new(Collectors::new(Arc::new(browser)));
    let notifiers = Notifiers::from_config(&config.notify)?;

    let report = run_pass(&config, &store, collectors, &notifiers).await;
    match report.message() {
        Some(message) => println!("{message}"),
        None => println!("{}", report.summary()),
    }
    Ok(report)
}

/// Repeat [`run_once`] every `interval` seconds until Ctrl-C.
/// A failed pass is logged and the loop keeps going.
pub async fn watch(options: &RunOptions, interval: u64) -> anyhow::Result<()> {
    tracing::info!(
        "Watching {}, every {interval}s",
        options.config.display()
    );

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, exiting gracefully");
                break;
            }
            _ = async {
                tracing::info!("Pass started at {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
                if let Err(e) = run_once(options).await {
                    tracing::error!("Pass failed: {e}");
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
            } => {}
        }
    }

    Ok(())
}
