use shopscope_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    /// Missing credential or unreadable configured resource. Fatal for the run.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connect or timeout failure that did not originate in `reqwest`.
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// Headless browser launch, navigation, or capture failure.
    #[error("browser error fetching {url}: {reason}")]
    Browser { url: String, reason: String },

    #[error("anti-bot challenge served for {url}")]
    BotBlocked { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("tag inference failed: {0}")]
    Tagging(String),

    #[error("invalid listing URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("fetch cancelled for {url}")]
    Cancelled { url: String },
}

impl ScraperError {
    /// Returns `true` if the error is a transient fetch condition worth
    /// another attempt, possibly through a different proxy.
    ///
    /// Configuration problems, bad input, cancellation, and statuses that
    /// will not change on retry are surfaced immediately.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            ScraperError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.is_body()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            ScraperError::Network { .. }
            | ScraperError::Browser { .. }
            | ScraperError::BotBlocked { .. } => true,
            ScraperError::UnexpectedStatus { status, .. } => {
                matches!(status, 403 | 408 | 429) || *status >= 500
            }
            ScraperError::Config(_)
            | ScraperError::Tagging(_)
            | ScraperError::InvalidUrl { .. }
            | ScraperError::Cancelled { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_block_and_network_are_retriable() {
        assert!(ScraperError::BotBlocked {
            url: "https://example.com".to_owned()
        }
        .is_retriable());
        assert!(ScraperError::Network {
            url: "https://example.com".to_owned(),
            reason: "connection reset".to_owned()
        }
        .is_retriable());
    }

    #[test]
    fn config_error_is_not_retriable() {
        let err = ScraperError::Config(ConfigError::MissingCredential(
            "SCRAPER_API_KEY".to_owned(),
        ));
        assert!(!err.is_retriable());
    }

    #[test]
    fn status_retriability_depends_on_code() {
        let status = |status| ScraperError::UnexpectedStatus {
            status,
            url: "https://example.com".to_owned(),
        };
        assert!(status(429).is_retriable());
        assert!(status(403).is_retriable());
        assert!(status(503).is_retriable());
        assert!(!status(404).is_retriable());
        assert!(!status(400).is_retriable());
    }
}
