use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use rust_decimal::Decimal;

use super::ParseError;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("valid regex"));
static DIGITS_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("valid regex"));
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid regex"));
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));

/// Earliest plausible shop opening year.
const MIN_SHOP_YEAR: i32 = 1990;

/// Parses the first digit run in `raw` as a non-negative count.
///
/// Thousands separators are stripped before validation. `"0 reviews"` is a
/// valid zero; `"no reviews"` is a [`ParseError::NoDigits`].
///
/// # Errors
///
/// [`ParseError::NoDigits`] when `raw` contains no digits, or
/// [`ParseError::Invalid`] when the cleaned digits overflow `u64`.
pub fn parse_count(raw: &str) -> Result<u64, ParseError> {
    let run = DIGIT_RUN
        .find(raw)
        .ok_or_else(|| ParseError::NoDigits(raw.to_owned()))?;
    let cleaned = run.as_str().replace(',', "");
    if !DIGITS_ONLY.is_match(&cleaned) {
        return Err(ParseError::NoDigits(raw.to_owned()));
    }
    cleaned.parse::<u64>().map_err(|_| ParseError::Invalid {
        value: raw.to_owned(),
        expected: "count",
    })
}

/// First value that parses as a count.
pub(crate) fn first_count(values: &[String]) -> Result<u64, ParseError> {
    first_ok(values, |v| parse_count(v))
}

/// Rating on a 0 to 5 scale, e.g. `"4.8"` or `"4.8 out of 5 stars"`.
pub(crate) fn parse_rating(values: &[String]) -> Result<Decimal, ParseError> {
    first_ok(values, |raw| {
        let number = DECIMAL.find(raw).ok_or_else(|| ParseError::Invalid {
            value: raw.to_owned(),
            expected: "rating",
        })?;
        let rating = number
            .as_str()
            .parse::<Decimal>()
            .map_err(|_| ParseError::Invalid {
                value: raw.to_owned(),
                expected: "rating",
            })?;
        if rating > Decimal::from(5) {
            return Err(ParseError::OutOfRange {
                value: rating.to_string(),
                range: "0..=5",
            });
        }
        Ok(rating.normalize())
    })
}

/// Calendar date from an ISO timestamp or date, keeping the date part only.
pub(crate) fn parse_date(values: &[String]) -> Result<NaiveDate, ParseError> {
    first_ok(values, |raw| {
        let date_part = raw.split('T').next().unwrap_or(raw).trim();
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| ParseError::Invalid {
            value: raw.to_owned(),
            expected: "ISO date",
        })
    })
}

/// First four-digit year between 1990 and the current year.
pub(crate) fn parse_year(values: &[String]) -> Result<i32, ParseError> {
    let current = Utc::now().year();
    first_ok(values, |raw| {
        YEAR.captures_iter(raw)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
            .find(|year| (MIN_SHOP_YEAR..=current).contains(year))
            .ok_or_else(|| ParseError::OutOfRange {
                value: raw.to_owned(),
                range: "1990..=current year",
            })
    })
}

/// Applies `parse` to each value in order and returns the first success, or
/// the last error.
fn first_ok<T>(
    values: &[String],
    parse: impl Fn(&str) -> Result<T, ParseError>,
) -> Result<T, ParseError> {
    let mut last_err = ParseError::NoMatch;
    for value in values {
        match parse(value) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn count_strips_thousands_separators() {
        assert_eq!(parse_count("12,345 sales"), Ok(12_345));
    }

    #[test]
    fn zero_is_a_valid_count() {
        assert_eq!(parse_count("0 favorites"), Ok(0));
    }

    #[test]
    fn count_without_digits_is_an_error() {
        assert_eq!(
            parse_count("no reviews yet"),
            Err(ParseError::NoDigits("no reviews yet".to_owned()))
        );
    }

    #[test]
    fn first_count_skips_values_without_digits() {
        assert_eq!(first_count(&strings(&["Reviews", "(1,024)"])), Ok(1_024));
    }

    #[test]
    fn rating_reads_leading_decimal() {
        assert_eq!(
            parse_rating(&strings(&["4.8 out of 5 stars"])),
            Ok(Decimal::new(48, 1))
        );
    }

    #[test]
    fn rating_above_five_is_rejected() {
        assert!(matches!(
            parse_rating(&strings(&["48"])),
            Err(ParseError::OutOfRange { .. })
        ));
    }

    #[test]
    fn date_drops_time_component() {
        assert_eq!(
            parse_date(&strings(&["2023-04-05T10:11:12Z"])),
            Ok(NaiveDate::from_ymd_opt(2023, 4, 5).unwrap())
        );
    }

    #[test]
    fn year_must_be_plausible() {
        assert_eq!(parse_year(&strings(&["On Etsy since 2015"])), Ok(2015));
        assert!(parse_year(&strings(&["Order #1234 shipped"])).is_err());
        assert!(parse_year(&strings(&["since 3021"])).is_err());
    }
}
