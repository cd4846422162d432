use std::net::SocketAddr;
use std::path::PathBuf;

use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which fetch strategy retrieves listing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategyKind {
    /// Single request through the remote rendering/proxy gateway.
    Gateway,
    /// Local headless browser session.
    Browser,
}

impl std::fmt::Display for FetchStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStrategyKind::Gateway => write!(f, "gateway"),
            FetchStrategyKind::Browser => write!(f, "browser"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub fetch_strategy: FetchStrategyKind,
    pub gateway_url: String,
    pub gateway_key_param: String,
    pub gateway_api_key: Option<String>,
    pub tag_api_key: Option<String>,
    pub tag_api_url: String,
    pub tag_model: String,
    pub proxy_list_path: Option<PathBuf>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Browser render wait, already clamped to the supported window.
    pub render_wait_secs: u64,
    pub chrome_path: Option<PathBuf>,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub fetch_shop_about: bool,
    pub price_min: Decimal,
    pub price_max: Decimal,
    pub reference_revenue: Decimal,
    pub reference_reviews: u64,
    pub reference_favorites: u64,
    pub views_per_favorite: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("fetch_strategy", &self.fetch_strategy)
            .field("gateway_url", &self.gateway_url)
            .field("gateway_key_param", &self.gateway_key_param)
            .field(
                "gateway_api_key",
                &self.gateway_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "tag_api_key",
                &self.tag_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("tag_api_url", &self.tag_api_url)
            .field("tag_model", &self.tag_model)
            .field("proxy_list_path", &self.proxy_list_path)
            .field("user_agent", &self.user_agent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("render_wait_secs", &self.render_wait_secs)
            .field("chrome_path", &self.chrome_path)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("fetch_shop_about", &self.fetch_shop_about)
            .field("price_min", &self.price_min)
            .field("price_max", &self.price_max)
            .field("reference_revenue", &self.reference_revenue)
            .field("reference_reviews", &self.reference_reviews)
            .field("reference_favorites", &self.reference_favorites)
            .field("views_per_favorite", &self.views_per_favorite)
            .finish()
    }
}
