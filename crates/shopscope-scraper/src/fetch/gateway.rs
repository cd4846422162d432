//! Fetch through a remote rendering/proxy gateway.
//!
//! The gateway takes the target as a query parameter and returns the
//! server-rendered HTML. No local browser is involved, so client-side
//! rendered markup is out of reach.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, StatusCode};
use shopscope_core::ConfigError;

use super::{FetchResult, FetchStrategy};
use crate::error::ScraperError;
use crate::proxy::ProxyEntry;

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub base_url: String,
    /// Query parameter carrying the key, e.g. `api_key`.
    pub key_param: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

pub struct GatewayFetch {
    client: Client,
    options: GatewayOptions,
}

impl GatewayFetch {
    /// Builds the gateway client.
    ///
    /// A missing API key is not an error here; it is reported by the first
    /// [`FetchStrategy::fetch`] call so configuration problems surface per run.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(options: GatewayOptions) -> Result<Self, ScraperError> {
        let client = Self::client_builder(&options).build()?;
        Ok(Self { client, options })
    }

    fn client_builder(options: &GatewayOptions) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(options.user_agent.clone())
    }

    /// Client routed through `proxy`, with basic auth when it carries
    /// credentials.
    fn proxied_client(&self, proxy: &ProxyEntry) -> Result<Client, ScraperError> {
        let mut upstream = reqwest::Proxy::all(proxy.url())?;
        if let Some((user, pass)) = proxy.credentials() {
            upstream = upstream.basic_auth(user, pass);
        }
        Ok(Self::client_builder(&self.options).proxy(upstream).build()?)
    }

    /// `{base}?{key_param}=<key>&url=<percent-encoded target>`.
    fn gateway_url(&self, api_key: &str, target_url: &str) -> String {
        let encoded_key = utf8_percent_encode(api_key, NON_ALPHANUMERIC);
        let encoded_target = utf8_percent_encode(target_url, NON_ALPHANUMERIC);
        let separator = if self.options.base_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{base}{separator}{param}={encoded_key}&url={encoded_target}",
            base = self.options.base_url,
            param = self.options.key_param,
        )
    }
}

impl FetchStrategy for GatewayFetch {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn fetch(
        &self,
        target_url: &str,
        proxy: Option<&ProxyEntry>,
    ) -> Result<FetchResult, ScraperError> {
        let api_key = self
            .options
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredential("SCRAPER_API_KEY".to_owned()))?;

        let client = match proxy {
            Some(entry) => self.proxied_client(entry)?,
            None => self.client.clone(),
        };

        let url = self.gateway_url(api_key, target_url);
        tracing::debug!(
            target_url,
            proxy = proxy.map(|p| p.host.as_str()),
            "requesting listing through gateway"
        );

        let response = client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(FetchResult::inspect(body, target_url.to_owned()));
        }

        // Gateways relay the origin's challenge page with 403/429; report it
        // as a block so the retry loop rotates identity.
        if matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS) {
            let result = FetchResult::inspect(body, target_url.to_owned());
            if result.blocked {
                return Ok(result);
            }
        }

        Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: target_url.to_owned(),
        })
    }
}
