use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment, FetchStrategyKind};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Supported browser render wait window, in seconds.
const RENDER_WAIT_MIN_SECS: u64 = 15;
const RENDER_WAIT_MAX_SECS: u64 = 60;

/// Highest accepted `SHOPSCOPE_PRICE_MAX`. Any in-band price times a `u64`
/// review count stays within `Decimal` range below this.
const PRICE_MAX_CEILING: i64 = 1_000_000_000;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Empty strings count as unset so `.env` placeholders like `SCRAPER_API_KEY=`
    // don't masquerade as credentials.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let bind_addr = parse_value::<SocketAddr>(
        "SHOPSCOPE_BIND_ADDR",
        &or_default("SHOPSCOPE_BIND_ADDR", "0.0.0.0:3000"),
    )?;
    let env = parse_environment(&or_default("SHOPSCOPE_ENV", "development"))?;
    let log_level = or_default("SHOPSCOPE_LOG_LEVEL", "info");
    let fetch_strategy = parse_fetch_strategy(&or_default("SHOPSCOPE_FETCH_STRATEGY", "gateway"))?;

    let gateway_url = or_default("SHOPSCOPE_GATEWAY_URL", "https://api.scraperapi.com/");
    let gateway_key_param = or_default("SHOPSCOPE_GATEWAY_KEY_PARAM", "api_key");
    let gateway_api_key = optional("SCRAPER_API_KEY");

    let tag_api_key = optional("OPENAI_API_KEY");
    let tag_api_url = or_default(
        "SHOPSCOPE_TAG_API_URL",
        "https://api.openai.com/v1/chat/completions",
    );
    let tag_model = or_default("SHOPSCOPE_TAG_MODEL", "gpt-4o-mini");

    let proxy_list_path = optional("SHOPSCOPE_PROXY_LIST_PATH").map(PathBuf::from);
    let chrome_path = optional("SHOPSCOPE_CHROME_PATH").map(PathBuf::from);
    let user_agent = or_default("SHOPSCOPE_USER_AGENT", DEFAULT_USER_AGENT);

    let request_timeout_secs = parse_value::<u64>(
        "SHOPSCOPE_REQUEST_TIMEOUT_SECS",
        &or_default("SHOPSCOPE_REQUEST_TIMEOUT_SECS", "60"),
    )?;
    let render_wait_secs = parse_value::<u64>(
        "SHOPSCOPE_RENDER_WAIT_SECS",
        &or_default("SHOPSCOPE_RENDER_WAIT_SECS", "30"),
    )?
    .clamp(RENDER_WAIT_MIN_SECS, RENDER_WAIT_MAX_SECS);

    let max_attempts = parse_value::<u32>(
        "SHOPSCOPE_MAX_ATTEMPTS",
        &or_default("SHOPSCOPE_MAX_ATTEMPTS", "3"),
    )?;
    if max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "SHOPSCOPE_MAX_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let retry_backoff_ms = parse_value::<u64>(
        "SHOPSCOPE_RETRY_BACKOFF_MS",
        &or_default("SHOPSCOPE_RETRY_BACKOFF_MS", "1000"),
    )?;
    let fetch_shop_about = parse_bool(
        "SHOPSCOPE_FETCH_SHOP_ABOUT",
        &or_default("SHOPSCOPE_FETCH_SHOP_ABOUT", "true"),
    )?;

    let price_min = parse_value::<Decimal>(
        "SHOPSCOPE_PRICE_MIN",
        &or_default("SHOPSCOPE_PRICE_MIN", "0.50"),
    )?;
    let price_max = parse_value::<Decimal>(
        "SHOPSCOPE_PRICE_MAX",
        &or_default("SHOPSCOPE_PRICE_MAX", "10000"),
    )?;
    if price_max > Decimal::from(PRICE_MAX_CEILING) {
        return Err(ConfigError::InvalidEnvVar {
            var: "SHOPSCOPE_PRICE_MAX".to_string(),
            reason: format!("must not exceed {PRICE_MAX_CEILING}"),
        });
    }
    if price_min >= price_max {
        return Err(ConfigError::InvalidEnvVar {
            var: "SHOPSCOPE_PRICE_MIN".to_string(),
            reason: format!("must be below SHOPSCOPE_PRICE_MAX ({price_max})"),
        });
    }

    let reference_revenue = parse_value::<Decimal>(
        "SHOPSCOPE_REFERENCE_REVENUE",
        &or_default("SHOPSCOPE_REFERENCE_REVENUE", "100000"),
    )?;
    if reference_revenue <= Decimal::ZERO {
        return Err(ConfigError::InvalidEnvVar {
            var: "SHOPSCOPE_REFERENCE_REVENUE".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    let reference_reviews = parse_positive_u64(
        "SHOPSCOPE_REFERENCE_REVIEWS",
        &or_default("SHOPSCOPE_REFERENCE_REVIEWS", "1000"),
    )?;
    let reference_favorites = parse_positive_u64(
        "SHOPSCOPE_REFERENCE_FAVORITES",
        &or_default("SHOPSCOPE_REFERENCE_FAVORITES", "5000"),
    )?;
    let views_per_favorite = parse_value::<u64>(
        "SHOPSCOPE_VIEWS_PER_FAVORITE",
        &or_default("SHOPSCOPE_VIEWS_PER_FAVORITE", "3"),
    )?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        fetch_strategy,
        gateway_url,
        gateway_key_param,
        gateway_api_key,
        tag_api_key,
        tag_api_url,
        tag_model,
        proxy_list_path,
        user_agent,
        request_timeout_secs,
        render_wait_secs,
        chrome_path,
        max_attempts,
        retry_backoff_ms,
        fetch_shop_about,
        price_min,
        price_max,
        reference_revenue,
        reference_reviews,
        reference_favorites,
        views_per_favorite,
    })
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

fn parse_positive_u64(var: &str, raw: &str) -> Result<u64, ConfigError> {
    let value = parse_value::<u64>(var, raw)?;
    if value == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: "must be positive".to_string(),
        });
    }
    Ok(value)
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got \"{other}\""),
        }),
    }
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for unrecognized values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHOPSCOPE_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

fn parse_fetch_strategy(s: &str) -> Result<FetchStrategyKind, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "gateway" => Ok(FetchStrategyKind::Gateway),
        "browser" => Ok(FetchStrategyKind::Browser),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHOPSCOPE_FETCH_STRATEGY".to_string(),
            reason: format!("expected \"gateway\" or \"browser\", got \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
