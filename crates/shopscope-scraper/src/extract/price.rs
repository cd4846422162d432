//! Price candidate scanning.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use shopscope_core::{Currency, Money};

use super::ParseError;

/// A currency symbol or ISO code, then a run of digits and separators:
/// `$12.50`, `£1,200`, `USD 18.00`, `€15,50`, `€1.200,00`. Which separator
/// is the decimal point is settled by [`resolve_amount`].
static CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:([$€£])|\b(USD|EUR|GBP)\b)\s*([0-9](?:[0-9.,]*[0-9])?)")
        .expect("valid regex")
});

/// Inclusive range of amounts accepted as a listing price. Anything outside
/// is assumed to be an unrelated number on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBand {
    pub min: Decimal,
    pub max: Decimal,
}

impl Default for PriceBand {
    fn default() -> Self {
        Self {
            min: Decimal::new(50, 2),
            max: Decimal::from(10_000),
        }
    }
}

impl PriceBand {
    #[must_use]
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min && amount <= self.max
    }
}

/// Every in-band price candidate across `values`, deduplicated, in page
/// order.
///
/// # Errors
///
/// [`ParseError::NoMatch`] when no candidate survives the band filter.
pub fn parse_prices(values: &[String], band: PriceBand) -> Result<Vec<Money>, ParseError> {
    let mut prices: Vec<Money> = Vec::new();
    for value in values {
        for money in candidates(value) {
            if !band.contains(money.amount) {
                tracing::trace!(
                    amount = %money.amount,
                    currency = ?money.currency,
                    "price outside plausible band; discarded"
                );
                continue;
            }
            if !prices.contains(&money) {
                prices.push(money);
            }
        }
    }
    if prices.is_empty() {
        Err(ParseError::NoMatch)
    } else {
        Ok(prices)
    }
}

fn candidates(text: &str) -> impl Iterator<Item = Money> + '_ {
    CANDIDATE.captures_iter(text).filter_map(|caps| {
        let currency = match (caps.get(1), caps.get(2)) {
            (Some(symbol), _) => Currency::from_symbol(symbol.as_str().chars().next()?),
            (None, Some(code)) => Currency::from_code(code.as_str()),
            (None, None) => None,
        }?;
        let raw = caps.get(3)?.as_str();
        let Some(amount) = resolve_amount(raw) else {
            tracing::trace!(raw, "ambiguous price separators; discarded");
            return None;
        };
        (amount > Decimal::ZERO).then(|| Money::new(currency, amount))
    })
}

/// Reads `1,200.00`, `1.200,00`, `15,50` and `1200` alike.
///
/// The last `,` or `.` is the decimal point when one or two digits follow
/// it. Any other separator groups thousands: a single kind, different from
/// the decimal point, with a lead group of one to three digits and three
/// digits in every later group. Amounts that fit neither reading are `None`
/// rather than truncated.
fn resolve_amount(raw: &str) -> Option<Decimal> {
    let (whole, fraction) = match raw.rfind([',', '.']) {
        Some(at) if matches!(raw.len() - at - 1, 1 | 2) => {
            let point = raw[at..].chars().next()?;
            (&raw[..at], Some((point, &raw[at + 1..])))
        }
        _ => (raw, None),
    };

    let digits = match whole.chars().find(|c| !c.is_ascii_digit()) {
        None => whole.to_owned(),
        Some(grouping) => {
            if fraction.is_some_and(|(point, _)| point == grouping) {
                return None;
            }
            let mut groups = whole.split(grouping);
            let lead = groups.next()?;
            let is_digits = |group: &str| group.bytes().all(|b| b.is_ascii_digit());
            let lead_ok = (1..=3).contains(&lead.len()) && is_digits(lead);
            if !lead_ok || !groups.all(|g| g.len() == 3 && is_digits(g)) {
                return None;
            }
            whole.replace(grouping, "")
        }
    };

    let amount = match fraction {
        Some((_, cents)) => format!("{digits}.{cents}"),
        None => digits,
    };
    amount.parse::<Decimal>().ok().map(|amount| amount.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(amount: &str) -> Money {
        Money::new(Currency::Usd, amount.parse().unwrap())
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn collects_variant_prices_in_order() {
        let prices = parse_prices(
            &strings(&["Small ($10.00)", "Large ($20.00)", "Gift box ($10.00)"]),
            PriceBand::default(),
        )
        .unwrap();
        assert_eq!(prices, vec![usd("10"), usd("20")]);
    }

    #[test]
    fn recognises_three_currencies_and_codes() {
        let prices = parse_prices(
            &strings(&["€15,50 or £12.50", "EUR 1,200.00", "usd 9"]),
            PriceBand::default(),
        )
        .unwrap();
        assert_eq!(
            prices,
            vec![
                Money::new(Currency::Eur, "15.5".parse().unwrap()),
                Money::new(Currency::Gbp, "12.5".parse().unwrap()),
                Money::new(Currency::Eur, Decimal::from(1_200)),
                usd("9"),
            ]
        );
    }

    #[test]
    fn decimal_comma_keeps_cents() {
        let prices = parse_prices(
            &strings(&["€1.200,00", "€15,5", "£2.345"]),
            PriceBand::default(),
        )
        .unwrap();
        assert_eq!(
            prices,
            vec![
                Money::new(Currency::Eur, Decimal::from(1_200)),
                Money::new(Currency::Eur, "15.5".parse().unwrap()),
                Money::new(Currency::Gbp, Decimal::from(2_345)),
            ]
        );
    }

    #[test]
    fn resolves_both_separator_conventions() {
        assert_eq!(resolve_amount("1,234.56"), Some("1234.56".parse().unwrap()));
        assert_eq!(resolve_amount("1.234,56"), Some("1234.56".parse().unwrap()));
        assert_eq!(resolve_amount("12,345"), Some(Decimal::from(12_345)));
        assert_eq!(resolve_amount("1,234,567"), Some(Decimal::from(1_234_567)));
        assert_eq!(resolve_amount("24.99"), Some("24.99".parse().unwrap()));
        assert_eq!(resolve_amount("9"), Some(Decimal::from(9)));
    }

    #[test]
    fn unresolvable_separators_are_rejected() {
        assert_eq!(resolve_amount("1,2,3"), None);
        assert_eq!(resolve_amount("12.345.6"), None);
        assert_eq!(resolve_amount("1,23,456"), None);
        assert_eq!(resolve_amount("1.234,567"), None);
        assert_eq!(resolve_amount("1234,567"), None);
        assert_eq!(
            parse_prices(&strings(&["$1,2,3"]), PriceBand::default()),
            Err(ParseError::NoMatch)
        );
    }

    #[test]
    fn band_discards_implausible_amounts() {
        let prices = parse_prices(
            &strings(&["$0.10 shipping", "$24.99", "$250,000 in sales"]),
            PriceBand::default(),
        )
        .unwrap();
        assert_eq!(prices, vec![usd("24.99")]);
    }

    #[test]
    fn no_currency_marker_is_no_match() {
        assert_eq!(
            parse_prices(&strings(&["24.99", "1,204 favorites"]), PriceBand::default()),
            Err(ParseError::NoMatch)
        );
    }

    #[test]
    fn custom_band_is_respected() {
        let band = PriceBand {
            min: Decimal::from(100),
            max: Decimal::from(200),
        };
        assert_eq!(
            parse_prices(&strings(&["$99", "$150", "$201"]), band).unwrap(),
            vec![usd("150")]
        );
    }
}
