use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// Sentinel written in place of any value that could not be extracted.
pub const UNAVAILABLE: &str = "N/A";

/// A record attribute that is either a typed value or explicitly unavailable.
///
/// Serializes as the bare value, or as the string `"N/A"` when unavailable, so
/// consumers never have to tell `null` apart from "missing".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    Value(T),
    #[default]
    Unavailable,
}

impl<T> Field<T> {
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Field::Value(_))
    }

    #[must_use]
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            Field::Unavailable => None,
        }
    }

    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Value(v) => Some(v),
            Field::Unavailable => None,
        }
    }

    /// Keeps `self` when available, otherwise falls back to `other`.
    #[must_use]
    pub fn or(self, other: Field<T>) -> Field<T> {
        match self {
            Field::Value(_) => self,
            Field::Unavailable => other,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::Unavailable, Field::Value)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(v) => v.serialize(serializer),
            Field::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

/// Currencies the extractor recognises on listing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    #[must_use]
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '$' => Some(Currency::Usd),
            '€' => Some(Currency::Eur),
            '£' => Some(Currency::Gbp),
            _ => None,
        }
    }

    /// Accepts ISO 4217 codes, case-insensitively.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "GBP" => Some(Currency::Gbp),
            _ => None,
        }
    }
}

/// A currency-tagged decimal amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Money {
    pub currency: Currency,
    pub amount: Decimal,
}

impl Money {
    #[must_use]
    pub fn new(currency: Currency, amount: Decimal) -> Self {
        Self { currency, amount }
    }
}

/// Structured commerce data extracted from one listing page.
///
/// Created fresh per input URL and fully populated (or back-filled with
/// [`Field::Unavailable`]) within a single scrape run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub url: String,
    pub title: Field<String>,
    pub price: Field<Vec<Money>>,
    pub rating_value: Field<Decimal>,
    pub review_count: Field<u64>,
    /// Review cards rendered on the listing itself, as opposed to the
    /// listing's advertised total.
    pub listing_review_count: Field<u64>,
    pub shop_name: Field<String>,
    pub description: Field<String>,
    pub images: Vec<String>,
    pub category: Field<String>,
    pub created_on: Field<NaiveDate>,
    pub shop_creation_year: Field<i32>,
    pub shop_sales_count: Field<u64>,
    pub favorites_count: Field<u64>,
    pub average_price: Field<Money>,
    pub estimated_yearly_revenue: Field<Money>,
    pub estimated_monthly_revenue: Field<Money>,
    pub estimated_monthly_views: Field<u64>,
    pub demand_score: u8,
    pub tags: Vec<String>,
}

impl ListingRecord {
    /// A record where every attribute is unavailable: the shape returned when
    /// the listing page itself could not be fetched.
    #[must_use]
    pub fn unavailable(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: Field::Unavailable,
            price: Field::Unavailable,
            rating_value: Field::Unavailable,
            review_count: Field::Unavailable,
            listing_review_count: Field::Unavailable,
            shop_name: Field::Unavailable,
            description: Field::Unavailable,
            images: Vec::new(),
            category: Field::Unavailable,
            created_on: Field::Unavailable,
            shop_creation_year: Field::Unavailable,
            shop_sales_count: Field::Unavailable,
            favorites_count: Field::Unavailable,
            average_price: Field::Unavailable,
            estimated_yearly_revenue: Field::Unavailable,
            estimated_monthly_revenue: Field::Unavailable,
            estimated_monthly_views: Field::Unavailable,
            demand_score: 0,
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "listing_test.rs"]
mod tests;
