//! Declarative field extraction.
//!
//! Every logical field owns an ordered [`FieldChain`]: a list of
//! [`Strategy`] values plus a parse function. Strategies are tried in order
//! and the first one whose raw match parses wins; later strategies are never
//! consulted. A [`ParseError`] only ever moves evaluation to the next
//! strategy, it never leaves this module.

mod document;
mod fields;
mod numeric;
mod price;

use std::sync::LazyLock;

use regex::Regex;
use shopscope_core::Field;

pub use document::ListingDocument;
pub use fields::{ExtractedListing, ListingExtractor, ShopStats};
pub use numeric::parse_count;
pub use price::{parse_prices, PriceBand};

/// Why a raw match was rejected by a field's parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The strategy found nothing in the document.
    #[error("no match")]
    NoMatch,

    #[error("no digits in {0:?}")]
    NoDigits(String),

    #[error("{value:?} is not a valid {expected}")]
    Invalid {
        value: String,
        expected: &'static str,
    },

    #[error("{value} is outside {range}")]
    OutOfRange { value: String, range: &'static str },
}

/// What to read from the elements a selector matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Read {
    /// Whitespace-collapsed text content, one value per element.
    Text,
    /// The named attribute, one value per element that carries it.
    Attr(&'static str),
    /// The number of matching elements, as a single value. Zero matches
    /// count as no match.
    Count,
}

/// One way of locating a field's raw value in a document.
#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    /// JSON pointer into the page's JSON-LD nodes, Product nodes first.
    Metadata { pointer: &'static str },
    PrimarySelector { css: &'static str, read: Read },
    FallbackSelector { css: &'static str, read: Read },
    /// Capture group 1 of every match over the document's visible text.
    FreeText { pattern: &'static LazyLock<Regex> },
}

impl Strategy {
    /// Raw candidate strings for this strategy. Empty means no match.
    #[must_use]
    pub fn raw_values(&self, doc: &ListingDocument) -> Vec<String> {
        match self {
            Strategy::Metadata { pointer } => doc.metadata_values(pointer),
            Strategy::PrimarySelector { css, read } | Strategy::FallbackSelector { css, read } => {
                doc.select(css, *read)
            }
            Strategy::FreeText { pattern } => pattern
                .captures_iter(doc.visible_text())
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Strategy::Metadata { .. } => "metadata",
            Strategy::PrimarySelector { .. } => "primary_selector",
            Strategy::FallbackSelector { .. } => "fallback_selector",
            Strategy::FreeText { .. } => "free_text",
        }
    }
}

pub type Parser<T> = Box<dyn Fn(&[String]) -> Result<T, ParseError> + Send + Sync>;

/// One evaluated strategy, recorded by [`FieldChain::extract_traced`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionAttempt<T> {
    pub strategy_index: usize,
    pub raw_match: Vec<String>,
    pub parsed_value: Result<T, ParseError>,
}

/// Ordered strategies plus the parser that validates their raw matches.
pub struct FieldChain<T> {
    field: &'static str,
    strategies: Vec<Strategy>,
    parse: Parser<T>,
}

impl<T> FieldChain<T> {
    pub fn new<P>(field: &'static str, strategies: Vec<Strategy>, parse: P) -> Self
    where
        P: Fn(&[String]) -> Result<T, ParseError> + Send + Sync + 'static,
    {
        Self {
            field,
            strategies,
            parse: Box::new(parse),
        }
    }

    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    #[must_use]
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Runs the chain; the first strategy whose raw match parses wins.
    #[must_use]
    pub fn extract(&self, doc: &ListingDocument) -> Field<T> {
        for (strategy_index, strategy) in self.strategies.iter().enumerate() {
            let raw = strategy.raw_values(doc);
            if raw.is_empty() {
                continue;
            }
            match (self.parse)(&raw) {
                Ok(value) => {
                    tracing::trace!(
                        field = self.field,
                        strategy_index,
                        strategy = strategy.label(),
                        "field extracted"
                    );
                    return Field::Value(value);
                }
                Err(e) => tracing::trace!(
                    field = self.field,
                    strategy_index,
                    strategy = strategy.label(),
                    error = %e,
                    "strategy rejected; falling through"
                ),
            }
        }
        Field::Unavailable
    }

    /// Like [`extract`](Self::extract), also returning every strategy that
    /// was evaluated. Strategies after the winning one never appear.
    #[must_use]
    pub fn extract_traced(&self, doc: &ListingDocument) -> (Field<T>, Vec<ExtractionAttempt<T>>)
    where
        T: Clone,
    {
        let mut attempts = Vec::new();
        for (strategy_index, strategy) in self.strategies.iter().enumerate() {
            let raw_match = strategy.raw_values(doc);
            let parsed_value = if raw_match.is_empty() {
                Err(ParseError::NoMatch)
            } else {
                (self.parse)(&raw_match)
            };
            let winner = parsed_value.as_ref().ok().cloned();
            attempts.push(ExtractionAttempt {
                strategy_index,
                raw_match,
                parsed_value,
            });
            if let Some(value) = winner {
                return (Field::Value(value), attempts);
            }
        }
        (Field::Unavailable, attempts)
    }
}

impl<T> std::fmt::Debug for FieldChain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldChain")
            .field("field", &self.field)
            .field("strategies", &self.strategies)
            .finish_non_exhaustive()
    }
}

/// First non-empty value, trimmed.
pub(crate) fn parse_text(values: &[String]) -> Result<String, ParseError> {
    values
        .iter()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or(ParseError::NoMatch)
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
