//! One listing URL in, one [`ListingRecord`] out.
//!
//! The run is a state machine, logged at debug level in this order:
//!
//! ```text
//! Init -> FetchingListing -> ExtractingFields
//!      -> FetchingShopAbout (optional) -> InferringTags (optional)
//!      -> ComputingMetrics -> Assembled -> Done
//! ```
//!
//! `FetchingShopAbout` and `InferringTags` are entered together and run
//! concurrently; `ComputingMetrics` starts once both have settled. The join
//! has all-settled semantics: each failure degrades only its own fields.
//! `Failed` is reached only when the listing fetch itself exhausts its
//! retries, and still yields a record with every field unavailable.

use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use shopscope_core::{AppConfig, Field, FetchStrategyKind, ListingRecord};
use tokio_util::sync::CancellationToken;

use crate::error::ScraperError;
use crate::extract::{ExtractedListing, ListingExtractor, PriceBand, ShopStats};
use crate::fetch::{
    BrowserFetch, BrowserOptions, FetchStrategy, Fetcher, GatewayFetch, GatewayOptions,
};
use crate::metrics::{
    average_price, demand_score, estimated_monthly_revenue, estimated_monthly_views,
    estimated_yearly_revenue, mean_price, DemandWeights, DEFAULT_VIEWS_PER_FAVORITE,
};
use crate::proxy::ProxyPool;
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::tags::{OpenAiTagger, TagInferrer, TaggerOptions};

/// Selector the browser strategy waits for before capturing a page.
pub const DEFAULT_CONTENT_MARKER: &str = "h1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    FetchingListing,
    ExtractingFields,
    FetchingShopAbout,
    InferringTags,
    ComputingMetrics,
    Assembled,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::FetchingListing => "fetching_listing",
            RunState::ExtractingFields => "extracting_fields",
            RunState::FetchingShopAbout => "fetching_shop_about",
            RunState::InferringTags => "inferring_tags",
            RunState::ComputingMetrics => "computing_metrics",
            RunState::Assembled => "assembled",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-run tuning, injected at construction.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub retry: RetryPolicy,
    pub fetch_shop_about: bool,
    pub price_band: PriceBand,
    pub weights: DemandWeights,
    pub views_per_favorite: u64,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            fetch_shop_about: true,
            price_band: PriceBand::default(),
            weights: DemandWeights::default(),
            views_per_favorite: DEFAULT_VIEWS_PER_FAVORITE,
        }
    }
}

impl ScrapeOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                backoff_base_ms: config.retry_backoff_ms,
                ..RetryPolicy::default()
            },
            fetch_shop_about: config.fetch_shop_about,
            price_band: PriceBand {
                min: config.price_min,
                max: config.price_max,
            },
            weights: DemandWeights {
                reference_revenue: config.reference_revenue,
                reference_reviews: config.reference_reviews,
                reference_favorites: config.reference_favorites,
                ..DemandWeights::default()
            },
            views_per_favorite: config.views_per_favorite,
        }
    }
}

/// Drives fetch, extraction, metrics and tagging for single listings.
///
/// Cheap to share behind an `Arc`; runs hold no mutable state.
pub struct ListingScraper<F, T = OpenAiTagger> {
    fetcher: F,
    tagger: Option<T>,
    proxies: Arc<ProxyPool>,
    extractor: ListingExtractor,
    options: ScrapeOptions,
}

impl ListingScraper<Fetcher, OpenAiTagger> {
    /// Wires the configured fetch strategy, proxy list and tagger.
    ///
    /// Tagging is disabled when no tag API key is configured.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Config`] if the proxy list exists but is unreadable.
    /// - [`ScraperError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        let fetcher = match config.fetch_strategy {
            FetchStrategyKind::Gateway => Fetcher::Gateway(GatewayFetch::new(GatewayOptions {
                base_url: config.gateway_url.clone(),
                key_param: config.gateway_key_param.clone(),
                api_key: config.gateway_api_key.clone(),
                timeout_secs: config.request_timeout_secs,
                user_agent: config.user_agent.clone(),
            })?),
            FetchStrategyKind::Browser => Fetcher::Browser(BrowserFetch::new(BrowserOptions {
                user_agent: config.user_agent.clone(),
                render_wait_secs: config.render_wait_secs,
                content_marker: DEFAULT_CONTENT_MARKER.to_owned(),
                chrome_path: config.chrome_path.clone(),
                headless: true,
            })),
        };

        let proxies = config
            .proxy_list_path
            .as_deref()
            .map(ProxyPool::load)
            .transpose()?
            .unwrap_or_default();

        let tagger = config
            .tag_api_key
            .clone()
            .map(|api_key| {
                OpenAiTagger::new(TaggerOptions {
                    api_url: config.tag_api_url.clone(),
                    api_key,
                    model: config.tag_model.clone(),
                    timeout_secs: config.request_timeout_secs,
                })
            })
            .transpose()?;
        if tagger.is_none() {
            tracing::info!("no tag API key configured; tag inference disabled");
        }

        let scraper = Self::new(fetcher, Arc::new(proxies), ScrapeOptions::from_config(config));
        Ok(match tagger {
            Some(t) => scraper.with_tagger(t),
            None => scraper,
        })
    }
}

impl<F, T> ListingScraper<F, T>
where
    F: FetchStrategy,
    T: TagInferrer,
{
    #[must_use]
    pub fn new(fetcher: F, proxies: Arc<ProxyPool>, options: ScrapeOptions) -> Self {
        Self {
            fetcher,
            tagger: None,
            proxies,
            extractor: ListingExtractor::new(options.price_band),
            options,
        }
    }

    #[must_use]
    pub fn with_tagger(mut self, tagger: T) -> Self {
        self.tagger = Some(tagger);
        self
    }

    #[must_use]
    pub fn without_tagger(mut self) -> Self {
        self.tagger = None;
        self
    }

    #[must_use]
    pub fn options(&self) -> &ScrapeOptions {
        &self.options
    }

    /// Enables or disables the secondary shop about fetch.
    #[must_use]
    pub fn with_shop_about(mut self, enabled: bool) -> Self {
        self.options.fetch_shop_about = enabled;
        self
    }

    #[must_use]
    pub fn fetcher_name(&self) -> &'static str {
        self.fetcher.name()
    }

    /// Scrapes `url` to completion.
    ///
    /// # Errors
    ///
    /// See [`scrape_with_cancel`](Self::scrape_with_cancel).
    pub async fn scrape(&self, url: &str) -> Result<ListingRecord, ScraperError> {
        self.scrape_with_cancel(url, &CancellationToken::new())
            .await
    }

    /// Scrapes `url`, stopping early if `cancel` fires.
    ///
    /// Fetch failures never surface here: an exhausted listing fetch returns
    /// [`ListingRecord::unavailable`].
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidUrl`] for a malformed or non-http(s) URL.
    /// - [`ScraperError::Config`] for missing credentials.
    /// - [`ScraperError::Cancelled`] if `cancel` fires during the listing fetch.
    pub async fn scrape_with_cancel(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ListingRecord, ScraperError> {
        log_state(url, RunState::Init);
        let listing_url = validate_url(url)?;

        log_state(url, RunState::FetchingListing);
        let page = match fetch_with_retry(
            &self.fetcher,
            &self.proxies,
            url,
            &self.options.retry,
            cancel,
        )
        .await
        {
            Ok(page) => page,
            Err(e @ (ScraperError::Config(_) | ScraperError::Cancelled { .. })) => {
                log_state(url, RunState::Failed);
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    url,
                    error = %e,
                    fetcher = self.fetcher.name(),
                    "listing fetch failed; returning unavailable record"
                );
                log_state(url, RunState::Failed);
                return Ok(ListingRecord::unavailable(url));
            }
        };

        log_state(url, RunState::ExtractingFields);
        let listing = self.extractor.extract_listing(&page.raw_content);
        drop(page);

        let about_url = if self.options.fetch_shop_about {
            listing
                .shop_name
                .as_option()
                .and_then(|name| shop_about_url(&listing_url, name))
        } else {
            None
        };

        if about_url.is_some() {
            log_state(url, RunState::FetchingShopAbout);
        }
        if self.tagger.is_some() && listing.title.is_available() {
            log_state(url, RunState::InferringTags);
        }
        let about = async {
            match about_url {
                Some(about_url) => self.fetch_shop_stats(about_url.as_str(), cancel).await,
                None => None,
            }
        };
        let tags = self.infer_tags(url, &listing, cancel);
        let (about, tags) = tokio::join!(about, tags);

        let shop = match about {
            Some(stats) => stats.or(listing.shop_stats()),
            None => listing.shop_stats(),
        };

        log_state(url, RunState::ComputingMetrics);
        let record = self.assemble(url, listing, shop, tags);
        log_state(url, RunState::Assembled);

        tracing::info!(
            url,
            title_found = record.title.is_available(),
            price_found = record.price.is_available(),
            demand_score = record.demand_score,
            tags = record.tags.len(),
            "listing scraped"
        );
        log_state(url, RunState::Done);
        Ok(record)
    }

    /// `None` when the about page could not be fetched.
    async fn fetch_shop_stats(&self, about_url: &str, cancel: &CancellationToken) -> Option<ShopStats> {
        match fetch_with_retry(
            &self.fetcher,
            &self.proxies,
            about_url,
            &self.options.retry,
            cancel,
        )
        .await
        {
            Ok(page) => Some(self.extractor.extract_shop_stats(&page.raw_content)),
            Err(e) => {
                tracing::warn!(
                    about_url,
                    error = %e,
                    "shop about fetch failed; keeping listing-page shop fields"
                );
                None
            }
        }
    }

    async fn infer_tags(
        &self,
        url: &str,
        listing: &ExtractedListing,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let (Some(tagger), Some(title)) = (&self.tagger, listing.title.as_option()) else {
            return Vec::new();
        };
        let description = listing.description.as_option().map_or("", String::as_str);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Vec::new(),
            result = tagger.infer_tags(title, description) => result,
        };
        match result {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(url, error = %e, "tag inference failed; tags left empty");
                Vec::new()
            }
        }
    }

    fn assemble(
        &self,
        url: &str,
        listing: ExtractedListing,
        shop: ShopStats,
        tags: Vec<String>,
    ) -> ListingRecord {
        let prices = listing.price.as_option().map_or(&[][..], Vec::as_slice);
        let reviews = listing.review_count.as_option().copied();
        let favorites = listing.favorites_count.as_option().copied();

        let average = average_price(prices);
        let yearly = estimated_yearly_revenue(mean_price(prices).as_ref(), reviews);
        let monthly = estimated_monthly_revenue(yearly.as_ref());
        let score = demand_score(yearly.as_ref(), reviews, favorites, &self.options.weights);
        let views = estimated_monthly_views(favorites, self.options.views_per_favorite);

        ListingRecord {
            url: url.to_owned(),
            title: listing.title,
            price: listing.price,
            rating_value: listing.rating_value,
            review_count: listing.review_count,
            listing_review_count: listing.listing_review_count,
            shop_name: shop.shop_name,
            description: listing.description,
            images: listing.images,
            category: listing.category,
            created_on: listing.created_on,
            shop_creation_year: shop.shop_creation_year,
            shop_sales_count: shop.shop_sales_count,
            favorites_count: listing.favorites_count,
            average_price: Field::from(average),
            estimated_yearly_revenue: Field::from(yearly),
            estimated_monthly_revenue: Field::from(monthly),
            estimated_monthly_views: Field::from(views),
            demand_score: score,
            tags,
        }
    }
}

fn log_state(url: &str, state: RunState) {
    tracing::debug!(url, %state, "scrape state");
}

/// Accepts absolute http(s) URLs with a host.
///
/// # Errors
///
/// [`ScraperError::InvalidUrl`] otherwise.
pub fn validate_url(raw: &str) -> Result<Url, ScraperError> {
    let invalid = |reason: &str| ScraperError::InvalidUrl {
        url: raw.to_owned(),
        reason: reason.to_owned(),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("URL is empty"));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("URL has no host"));
    }
    Ok(url)
}

/// `{origin}/shop/{shop_name}/about` on the listing's own host.
fn shop_about_url(listing_url: &Url, shop_name: &str) -> Option<Url> {
    let mut about = listing_url.clone();
    about
        .path_segments_mut()
        .ok()?
        .clear()
        .extend(["shop", shop_name, "about"]);
    about.set_query(None);
    about.set_fragment(None);
    Some(about)
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
