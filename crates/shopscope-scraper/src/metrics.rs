//! Derived listing metrics: average price, revenue estimates, demand score.
//!
//! Every estimate requires all of its inputs. A missing input yields `None`,
//! never a zero, except for [`demand_score`], which is always computable and
//! treats missing signals as contributing nothing.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use shopscope_core::Money;

/// Reference ceilings and per-signal caps for [`demand_score`].
///
/// A signal at or above its reference earns its full cap. The defaults carry
/// no derivation beyond having been used in production; tune them through
/// configuration rather than in code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemandWeights {
    pub reference_revenue: Decimal,
    pub reference_reviews: u64,
    pub reference_favorites: u64,
    pub revenue_cap: u8,
    pub reviews_cap: u8,
    pub favorites_cap: u8,
}

impl Default for DemandWeights {
    fn default() -> Self {
        Self {
            reference_revenue: Decimal::from(100_000),
            reference_reviews: 1_000,
            reference_favorites: 5_000,
            revenue_cap: 40,
            reviews_cap: 40,
            favorites_cap: 20,
        }
    }
}

/// Estimated monthly views per favorite.
pub const DEFAULT_VIEWS_PER_FAVORITE: u64 = 3;

/// Unrounded mean of the prices sharing the first entry's currency.
#[must_use]
pub fn mean_price(prices: &[Money]) -> Option<Money> {
    let currency = prices.first()?.currency;
    let amounts: Vec<Decimal> = prices
        .iter()
        .filter(|p| p.currency == currency)
        .map(|p| p.amount)
        .collect();
    let count = Decimal::from(amounts.len());
    let sum = amounts
        .iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(*amount))?;
    Some(Money::new(currency, sum.checked_div(count)?))
}

/// [`mean_price`] to 2 dp, as reported on the record.
#[must_use]
pub fn average_price(prices: &[Money]) -> Option<Money> {
    mean_price(prices).map(|mean| {
        let rounded = mean
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Money::new(mean.currency, rounded)
    })
}

/// `round(mean × reviews)`, half away from zero.
///
/// Takes the unrounded [`mean_price`]. `None` when the product overflows
/// `Decimal`.
#[must_use]
pub fn estimated_yearly_revenue(mean: Option<&Money>, review_count: Option<u64>) -> Option<Money> {
    let mean = mean?;
    let reviews = Decimal::from(review_count?);
    let Some(product) = mean.amount.checked_mul(reviews) else {
        tracing::warn!(
            amount = %mean.amount,
            reviews = %reviews,
            "revenue estimate overflows; skipped"
        );
        return None;
    };
    let yearly = product.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    Some(Money::new(mean.currency, yearly))
}

/// Yearly revenue divided by 12, to 2 dp.
#[must_use]
pub fn estimated_monthly_revenue(yearly: Option<&Money>) -> Option<Money> {
    let yearly = yearly?;
    let monthly = (yearly.amount / Decimal::from(12))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    Some(Money::new(yearly.currency, monthly))
}

#[must_use]
pub fn estimated_monthly_views(favorites: Option<u64>, views_per_favorite: u64) -> Option<u64> {
    favorites.map(|f| f.saturating_mul(views_per_favorite))
}

/// Bounded 0 to 100 demand heuristic.
///
/// | signal    | points                                            |
/// |-----------|---------------------------------------------------|
/// | revenue   | `min(revenue / reference_revenue × 40, 40)`       |
/// | reviews   | `min(reviews / reference_reviews × 40, 40)`       |
/// | favorites | `min(favorites / reference_favorites × 20, 20)`   |
///
/// Each sub-score is capped before summing.
#[must_use]
pub fn demand_score(
    yearly_revenue: Option<&Money>,
    review_count: Option<u64>,
    favorites: Option<u64>,
    weights: &DemandWeights,
) -> u8 {
    let revenue = sub_score(
        yearly_revenue.map(|m| m.amount),
        weights.reference_revenue,
        weights.revenue_cap,
    );
    let reviews = sub_score(
        review_count.map(Decimal::from),
        Decimal::from(weights.reference_reviews),
        weights.reviews_cap,
    );
    let favs = sub_score(
        favorites.map(Decimal::from),
        Decimal::from(weights.reference_favorites),
        weights.favorites_cap,
    );

    let total = (revenue + reviews + favs)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    total.to_u8().unwrap_or(0)
}

fn sub_score(value: Option<Decimal>, reference: Decimal, cap: u8) -> Decimal {
    let cap = Decimal::from(cap);
    let Some(value) = value else {
        return Decimal::ZERO;
    };
    if reference <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    value
        .checked_div(reference)
        .and_then(|ratio| ratio.checked_mul(cap))
        .unwrap_or(cap)
        .clamp(Decimal::ZERO, cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopscope_core::Currency;

    fn usd(amount: i64) -> Money {
        Money::new(Currency::Usd, Decimal::from(amount))
    }

    #[test]
    fn ten_and_twenty_dollars_with_100_reviews() {
        let avg = average_price(&[usd(10), usd(20)]).unwrap();
        assert_eq!(avg, usd(15));

        let yearly = estimated_yearly_revenue(Some(&avg), Some(100)).unwrap();
        assert_eq!(yearly, usd(1_500));

        let monthly = estimated_monthly_revenue(Some(&yearly)).unwrap();
        assert_eq!(monthly, usd(125));
    }

    #[test]
    fn revenue_uses_unrounded_mean() {
        let prices = [
            usd(10),
            usd(10),
            Money::new(Currency::Usd, Decimal::new(1_001, 2)),
        ];
        assert_eq!(
            average_price(&prices),
            Some(Money::new(Currency::Usd, Decimal::from(10)))
        );

        let mean = mean_price(&prices);
        assert_eq!(
            estimated_yearly_revenue(mean.as_ref(), Some(1_000)),
            Some(usd(10_003))
        );
    }

    #[test]
    fn average_rounds_half_away_from_zero() {
        let prices = [
            Money::new(Currency::Usd, Decimal::new(1_000, 2)),
            Money::new(Currency::Usd, Decimal::new(1_001, 2)),
        ];
        assert_eq!(
            average_price(&prices),
            Some(Money::new(Currency::Usd, Decimal::new(1_001, 2)))
        );
    }

    #[test]
    fn overflowing_revenue_is_unavailable() {
        let huge = Money::new(Currency::Usd, Decimal::from(10_000_000_000_u64));
        assert!(estimated_yearly_revenue(Some(&huge), Some(u64::MAX)).is_none());

        let max = Money::new(Currency::Usd, Decimal::MAX);
        assert!(estimated_yearly_revenue(Some(&max), Some(2)).is_none());
    }

    #[test]
    fn largest_review_count_within_price_band_is_computable() {
        let top = Money::new(Currency::Usd, Decimal::from(10_000));
        assert!(estimated_yearly_revenue(Some(&top), Some(u64::MAX)).is_some());
    }

    #[test]
    fn no_prices_means_no_average_and_no_revenue() {
        let avg = average_price(&[]);
        assert!(avg.is_none());
        assert!(estimated_yearly_revenue(avg.as_ref(), Some(100)).is_none());
        assert!(estimated_monthly_revenue(None).is_none());
    }

    #[test]
    fn missing_reviews_means_no_revenue() {
        assert!(estimated_yearly_revenue(Some(&usd(15)), None).is_none());
    }

    #[test]
    fn zero_reviews_is_zero_revenue_not_unavailable() {
        assert_eq!(
            estimated_yearly_revenue(Some(&usd(15)), Some(0)),
            Some(usd(0))
        );
    }

    #[test]
    fn average_uses_first_currency_only() {
        let prices = [
            usd(10),
            Money::new(Currency::Eur, Decimal::from(500)),
            usd(30),
        ];
        assert_eq!(average_price(&prices), Some(usd(20)));
    }

    #[test]
    fn yearly_revenue_rounds_half_up() {
        let avg = Money::new(Currency::Usd, Decimal::new(1_005, 2));
        assert_eq!(
            estimated_yearly_revenue(Some(&avg), Some(50)),
            Some(Money::new(Currency::Usd, Decimal::from(503)))
        );
    }

    #[test]
    fn monthly_revenue_keeps_two_decimals() {
        assert_eq!(
            estimated_monthly_revenue(Some(&usd(1_000))),
            Some(Money::new(Currency::Usd, Decimal::new(8_333, 2)))
        );
    }

    #[test]
    fn all_signals_absent_scores_zero() {
        assert_eq!(demand_score(None, None, None, &DemandWeights::default()), 0);
    }

    #[test]
    fn saturated_signals_score_one_hundred() {
        let score = demand_score(
            Some(&usd(5_000_000)),
            Some(1_000_000),
            Some(u64::MAX),
            &DemandWeights::default(),
        );
        assert_eq!(score, 100);
    }

    #[test]
    fn each_signal_is_capped_before_summing() {
        let weights = DemandWeights::default();
        assert_eq!(demand_score(Some(&usd(10_000_000)), None, None, &weights), 40);
        assert_eq!(demand_score(None, Some(50_000), None, &weights), 40);
        assert_eq!(demand_score(None, None, Some(50_000), &weights), 20);
    }

    #[test]
    fn partial_signals_scale_linearly() {
        // 50k revenue -> 20, 500 reviews -> 20, 2 500 favorites -> 10.
        let score = demand_score(
            Some(&usd(50_000)),
            Some(500),
            Some(2_500),
            &DemandWeights::default(),
        );
        assert_eq!(score, 50);
    }

    #[test]
    fn score_stays_in_range_for_any_combination() {
        let weights = DemandWeights::default();
        let revenues = [None, Some(usd(0)), Some(usd(1)), Some(usd(99_999)), Some(usd(i64::MAX / 4))];
        let counts = [None, Some(0), Some(1), Some(999), Some(1_000), Some(u64::MAX)];
        for revenue in &revenues {
            for reviews in counts {
                for favorites in counts {
                    let score = demand_score(revenue.as_ref(), reviews, favorites, &weights);
                    assert!(score <= 100, "score {score} out of range");
                }
            }
        }
    }

    #[test]
    fn zero_reference_contributes_nothing() {
        let weights = DemandWeights {
            reference_reviews: 0,
            ..DemandWeights::default()
        };
        assert_eq!(demand_score(None, Some(10), None, &weights), 0);
    }

    #[test]
    fn views_multiply_favorites() {
        assert_eq!(estimated_monthly_views(Some(1_204), DEFAULT_VIEWS_PER_FAVORITE), Some(3_612));
        assert_eq!(estimated_monthly_views(None, DEFAULT_VIEWS_PER_FAVORITE), None);
    }
}
