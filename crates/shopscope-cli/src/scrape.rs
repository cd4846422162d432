//! `scrape` command: one listing, one JSON record on stdout.

use shopscope_core::AppConfig;
use shopscope_scraper::ListingScraper;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ScrapeFlags {
    pub no_tags: bool,
    pub skip_shop_about: bool,
}

/// Runs a single scrape and prints the record.
///
/// Ctrl-C cancels the run through its token rather than killing the process.
///
/// # Errors
///
/// Returns an error for an invalid URL, a configuration problem, a
/// cancelled run, or a record that fails to serialize.
pub(crate) async fn run_scrape(
    config: &AppConfig,
    url: &str,
    flags: ScrapeFlags,
) -> anyhow::Result<()> {
    let mut scraper = ListingScraper::from_config(config)?;
    if flags.no_tags {
        scraper = scraper.without_tagger();
    }
    if flags.skip_shop_about {
        scraper = scraper.with_shop_about(false);
    }

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling scrape");
                cancel.cancel();
            }
        }
    });

    tracing::info!(url, fetcher = scraper.fetcher_name(), "scraping listing");
    let result = scraper.scrape_with_cancel(url, &cancel).await;
    watcher.abort();

    let record = result?;
    if !record.title.is_available() {
        tracing::warn!(url, "listing could not be fetched; all fields unavailable");
    }
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
