//! Page retrieval strategies.
//!
//! Both strategies share one contract: fetch a URL, optionally through a
//! proxy, and report whether the returned content is a bot challenge.

mod browser;
mod gateway;

use std::future::Future;

pub use browser::{BrowserFetch, BrowserOptions};
pub use gateway::{GatewayFetch, GatewayOptions};

use crate::error::ScraperError;
use crate::proxy::ProxyEntry;

/// Raw page content from one fetch attempt.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub raw_content: String,
    pub final_url: String,
    /// Set by challenge detection before the strategy returns.
    pub blocked: bool,
    /// 1-based attempt number, stamped by the retry controller.
    pub attempt: u32,
}

impl FetchResult {
    /// Builds a result and runs challenge detection on `raw_content`.
    #[must_use]
    pub fn inspect(raw_content: String, final_url: String) -> Self {
        let blocked = match crate::block::challenge_kind(&raw_content) {
            Some(kind) => {
                tracing::debug!(url = %final_url, ?kind, "challenge page detected");
                true
            }
            None => false,
        };
        Self {
            raw_content,
            final_url,
            blocked,
            attempt: 1,
        }
    }
}

/// Retrieves raw page content for a URL.
pub trait FetchStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetches `target_url`, routing through `proxy` when given. `None` means
    /// a direct connection.
    fn fetch(
        &self,
        target_url: &str,
        proxy: Option<&ProxyEntry>,
    ) -> impl Future<Output = Result<FetchResult, ScraperError>> + Send;
}

/// Runtime-selected fetch strategy.
pub enum Fetcher {
    Gateway(GatewayFetch),
    Browser(BrowserFetch),
}

impl FetchStrategy for Fetcher {
    fn name(&self) -> &'static str {
        match self {
            Fetcher::Gateway(f) => f.name(),
            Fetcher::Browser(f) => f.name(),
        }
    }

    async fn fetch(
        &self,
        target_url: &str,
        proxy: Option<&ProxyEntry>,
    ) -> Result<FetchResult, ScraperError> {
        match self {
            Fetcher::Gateway(f) => f.fetch(target_url, proxy).await,
            Fetcher::Browser(f) => f.fetch(target_url, proxy).await,
        }
    }
}
