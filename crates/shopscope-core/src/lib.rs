//! Shared configuration and data model for shopscope.
//!
//! Everything downstream crates exchange lives here: the env-derived
//! [`AppConfig`], the [`ConfigError`] raised while building it, and the
//! [`ListingRecord`] returned for every scraped listing.

pub mod app_config;
pub mod config;
pub mod error;
pub mod listing;

pub use app_config::{AppConfig, Environment, FetchStrategyKind};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use error::ConfigError;
pub use listing::{Currency, Field, ListingRecord, Money};
