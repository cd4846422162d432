//! Per-field strategy chains for marketplace listing and shop pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use shopscope_core::{Field, Money};

use super::numeric::{first_count, parse_date, parse_rating, parse_year};
use super::price::{parse_prices, PriceBand};
use super::{parse_text, FieldChain, ListingDocument, ParseError, Read, Strategy};

static PRICE_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([$€£]\s?[0-9](?:[0-9.,]*[0-9])?)").expect("valid regex")
});
static RATING_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d(?:\.\d+)?) out of 5 stars").expect("valid regex")
});
static REVIEWS_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\d,]*) (?:shop )?reviews").expect("valid regex"));
static SINCE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)on \w+ since (\d{4})").expect("valid regex"));
static SALES_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\d,]*) sales").expect("valid regex"));
static FAVORITES_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\d,]*) favorites").expect("valid regex"));

/// Fields read from the listing page itself.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedListing {
    pub title: Field<String>,
    pub price: Field<Vec<Money>>,
    pub rating_value: Field<Decimal>,
    pub review_count: Field<u64>,
    pub listing_review_count: Field<u64>,
    pub shop_name: Field<String>,
    pub description: Field<String>,
    pub images: Vec<String>,
    pub category: Field<String>,
    pub created_on: Field<NaiveDate>,
    pub shop_creation_year: Field<i32>,
    pub shop_sales_count: Field<u64>,
    pub favorites_count: Field<u64>,
}

/// Shop aggregates, read from either the listing or the shop's about page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShopStats {
    pub shop_name: Field<String>,
    pub shop_creation_year: Field<i32>,
    pub shop_sales_count: Field<u64>,
}

impl ShopStats {
    /// Values present in `self` win; gaps are filled from `fallback`.
    #[must_use]
    pub fn or(self, fallback: ShopStats) -> ShopStats {
        ShopStats {
            shop_name: self.shop_name.or(fallback.shop_name),
            shop_creation_year: self.shop_creation_year.or(fallback.shop_creation_year),
            shop_sales_count: self.shop_sales_count.or(fallback.shop_sales_count),
        }
    }
}

/// The full set of field chains. Built once and shared.
#[derive(Debug)]
pub struct ListingExtractor {
    pub(crate) title: FieldChain<String>,
    pub(crate) price: FieldChain<Vec<Money>>,
    pub(crate) rating: FieldChain<Decimal>,
    pub(crate) review_count: FieldChain<u64>,
    pub(crate) listing_review_count: FieldChain<u64>,
    pub(crate) shop_name: FieldChain<String>,
    pub(crate) description: FieldChain<String>,
    pub(crate) images: FieldChain<Vec<String>>,
    pub(crate) category: FieldChain<String>,
    pub(crate) created_on: FieldChain<NaiveDate>,
    pub(crate) shop_creation_year: FieldChain<i32>,
    pub(crate) shop_sales: FieldChain<u64>,
    pub(crate) favorites: FieldChain<u64>,
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new(PriceBand::default())
    }
}

impl ListingExtractor {
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn new(band: PriceBand) -> Self {
        use Strategy::{FallbackSelector, FreeText, Metadata, PrimarySelector};

        Self {
            title: FieldChain::new(
                "title",
                vec![
                    Metadata { pointer: "/name" },
                    PrimarySelector {
                        css: "h1[data-buy-box-listing-title]",
                        read: Read::Text,
                    },
                    FallbackSelector {
                        css: r#"meta[property="og:title"]"#,
                        read: Read::Attr("content"),
                    },
                    FallbackSelector {
                        css: "h1",
                        read: Read::Text,
                    },
                ],
                parse_text,
            ),
            price: FieldChain::new(
                "price",
                vec![
                    // Variant options carry one price each.
                    PrimarySelector {
                        css: r#"select[id^="variation-selector"] option"#,
                        read: Read::Text,
                    },
                    FallbackSelector {
                        css: r#"[data-buy-box-region="price"] p"#,
                        read: Read::Text,
                    },
                    FallbackSelector {
                        css: "p.wt-text-title-larger",
                        read: Read::Text,
                    },
                    Metadata { pointer: "/offers" },
                    FreeText {
                        pattern: &PRICE_TEXT,
                    },
                ],
                move |values: &[String]| parse_prices(values, band),
            ),
            rating: FieldChain::new(
                "rating",
                vec![
                    Metadata {
                        pointer: "/aggregateRating/ratingValue",
                    },
                    PrimarySelector {
                        css: r#"input[name="initial-rating"]"#,
                        read: Read::Attr("value"),
                    },
                    FreeText {
                        pattern: &RATING_TEXT,
                    },
                ],
                parse_rating,
            ),
            review_count: FieldChain::new(
                "review_count",
                vec![
                    Metadata {
                        pointer: "/aggregateRating/reviewCount",
                    },
                    PrimarySelector {
                        css: "[data-review-count]",
                        read: Read::Attr("data-review-count"),
                    },
                    FallbackSelector {
                        css: "#same-listing-reviews-tab",
                        read: Read::Text,
                    },
                    FreeText {
                        pattern: &REVIEWS_TEXT,
                    },
                ],
                first_count,
            ),
            listing_review_count: FieldChain::new(
                "listing_review_count",
                vec![PrimarySelector {
                    css: "[data-review-id]",
                    read: Read::Count,
                }],
                first_count,
            ),
            shop_name: FieldChain::new(
                "shop_name",
                vec![
                    Metadata {
                        pointer: "/brand",
                    },
                    PrimarySelector {
                        css: "[data-shop-name]",
                        read: Read::Attr("data-shop-name"),
                    },
                    FallbackSelector {
                        css: r#"a[href*="/shop/"]"#,
                        read: Read::Text,
                    },
                ],
                parse_shop_name,
            ),
            description: FieldChain::new(
                "description",
                vec![
                    Metadata {
                        pointer: "/description",
                    },
                    PrimarySelector {
                        css: "[data-product-details-description-text-content]",
                        read: Read::Text,
                    },
                    FallbackSelector {
                        css: r#"meta[name="description"]"#,
                        read: Read::Attr("content"),
                    },
                ],
                parse_text,
            ),
            images: FieldChain::new(
                "images",
                vec![
                    Metadata { pointer: "/image" },
                    PrimarySelector {
                        css: "img[data-src-zoom-image]",
                        read: Read::Attr("data-src-zoom-image"),
                    },
                    FallbackSelector {
                        css: r#"meta[property="og:image"]"#,
                        read: Read::Attr("content"),
                    },
                ],
                parse_images,
            ),
            category: FieldChain::new(
                "category",
                vec![
                    Metadata {
                        pointer: "/category",
                    },
                    PrimarySelector {
                        css: r#"nav[aria-label="Breadcrumb"] li"#,
                        read: Read::Text,
                    },
                ],
                parse_last_text,
            ),
            created_on: FieldChain::new(
                "created_on",
                vec![Metadata {
                    pointer: "/dateCreated",
                }],
                parse_date,
            ),
            shop_creation_year: FieldChain::new(
                "shop_creation_year",
                vec![
                    Metadata {
                        pointer: "/foundingDate",
                    },
                    PrimarySelector {
                        css: "[data-shop-since]",
                        read: Read::Attr("data-shop-since"),
                    },
                    FreeText {
                        pattern: &SINCE_TEXT,
                    },
                ],
                parse_year,
            ),
            shop_sales: FieldChain::new(
                "shop_sales",
                vec![
                    PrimarySelector {
                        css: "[data-shop-sales]",
                        read: Read::Text,
                    },
                    FreeText {
                        pattern: &SALES_TEXT,
                    },
                ],
                first_count,
            ),
            favorites: FieldChain::new(
                "favorites",
                vec![
                    PrimarySelector {
                        css: r#"a[href$="/favoriters"]"#,
                        read: Read::Text,
                    },
                    FreeText {
                        pattern: &FAVORITES_TEXT,
                    },
                ],
                first_count,
            ),
        }
    }

    /// Runs every listing chain over `raw_html`.
    #[must_use]
    pub fn extract_listing(&self, raw_html: &str) -> ExtractedListing {
        let doc = ListingDocument::parse(raw_html);
        ExtractedListing {
            title: self.title.extract(&doc),
            price: self.price.extract(&doc),
            rating_value: self.rating.extract(&doc),
            review_count: self.review_count.extract(&doc),
            listing_review_count: self.listing_review_count.extract(&doc),
            shop_name: self.shop_name.extract(&doc),
            description: self.description.extract(&doc),
            images: self.images.extract(&doc).into_option().unwrap_or_default(),
            category: self.category.extract(&doc),
            created_on: self.created_on.extract(&doc),
            shop_creation_year: self.shop_creation_year.extract(&doc),
            shop_sales_count: self.shop_sales.extract(&doc),
            favorites_count: self.favorites.extract(&doc),
        }
    }

    /// Runs the shop chains over a shop "about" page.
    #[must_use]
    pub fn extract_shop_stats(&self, raw_html: &str) -> ShopStats {
        let doc = ListingDocument::parse(raw_html);
        ShopStats {
            shop_name: self.shop_name.extract(&doc),
            shop_creation_year: self.shop_creation_year.extract(&doc),
            shop_sales_count: self.shop_sales.extract(&doc),
        }
    }
}

impl ExtractedListing {
    #[must_use]
    pub fn shop_stats(&self) -> ShopStats {
        ShopStats {
            shop_name: self.shop_name.clone(),
            shop_creation_year: self.shop_creation_year.clone(),
            shop_sales_count: self.shop_sales_count.clone(),
        }
    }
}

/// Shop handles are single tokens; link text like "Visit shop" is not one.
fn parse_shop_name(values: &[String]) -> Result<String, ParseError> {
    values
        .iter()
        .map(|v| v.trim())
        .find(|v| !v.is_empty() && !v.contains(char::is_whitespace))
        .map(str::to_owned)
        .ok_or(ParseError::NoMatch)
}

/// Deepest breadcrumb entry.
fn parse_last_text(values: &[String]) -> Result<String, ParseError> {
    values
        .iter()
        .rev()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or(ParseError::NoMatch)
}

/// Image URLs deduplicated by their query-less form; first occurrence kept.
pub(crate) fn parse_images(values: &[String]) -> Result<Vec<String>, ParseError> {
    let mut seen = HashSet::new();
    let images: Vec<String> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !v.contains(char::is_whitespace))
        .filter(|v| seen.insert(strip_query(v).to_owned()))
        .map(str::to_owned)
        .collect();
    if images.is_empty() {
        Err(ParseError::NoMatch)
    } else {
        Ok(images)
    }
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

#[cfg(test)]
#[path = "fields_test.rs"]
mod tests;
