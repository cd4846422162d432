//! Resilient fetch-and-extract pipeline for marketplace listing pages.
//!
//! [`ListingScraper`] drives a run: fetch the listing through a
//! [`FetchStrategy`] with bounded retries and proxy rotation, run the
//! per-field extraction chains, optionally enrich from the shop's about page
//! and a tagging service, then compute derived metrics.

pub mod block;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod metrics;
pub mod orchestrator;
pub mod proxy;
pub mod retry;
pub mod tags;

pub use block::{challenge_kind, is_blocked, ChallengeKind};
pub use error::ScraperError;
pub use extract::{ListingExtractor, PriceBand};
pub use fetch::{FetchResult, FetchStrategy, Fetcher, GatewayFetch, GatewayOptions};
pub use metrics::DemandWeights;
pub use orchestrator::{validate_url, ListingScraper, RunState, ScrapeOptions};
pub use proxy::{ProxyEntry, ProxyPool};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use tags::{OpenAiTagger, TagInferrer, TaggerOptions};
