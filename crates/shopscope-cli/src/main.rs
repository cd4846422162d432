mod proxies;
mod scrape;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use shopscope_core::FetchStrategyKind;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shopscope-cli")]
#[command(about = "Scrape marketplace listings into structured records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape one listing and print the record as JSON
    Scrape {
        /// Listing URL
        url: String,

        /// Override the configured fetch strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Skip tag inference even when a tag API key is configured
        #[arg(long)]
        no_tags: bool,

        /// Skip the secondary shop about page fetch
        #[arg(long)]
        skip_shop_about: bool,
    },
    /// Validate a proxy list file and summarise its entries
    Proxies {
        /// Path to a `host:port[:user:pass]` list
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Gateway,
    Browser,
}

impl From<StrategyArg> for FetchStrategyKind {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Gateway => FetchStrategyKind::Gateway,
            StrategyArg::Browser => FetchStrategyKind::Browser,
        }
    }
}

/// Logs go to stderr so stdout carries only the JSON record.
fn init_tracing(fallback_level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            url,
            strategy,
            no_tags,
            skip_shop_about,
        } => {
            let mut config = shopscope_core::load_app_config()?;
            init_tracing(&config.log_level)?;
            if let Some(strategy) = strategy {
                config.fetch_strategy = strategy.into();
            }
            scrape::run_scrape(
                &config,
                &url,
                scrape::ScrapeFlags {
                    no_tags,
                    skip_shop_about,
                },
            )
            .await
        }
        Commands::Proxies { path } => {
            init_tracing("info")?;
            proxies::run_proxies(&path)
        }
    }
}

#[cfg(test)]
mod tests;
