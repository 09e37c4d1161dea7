// Quote types and result preparation
// A Quote is the priced outcome of a request: the split allocation plus the
// fee and price metrics derived from it
//
// Numan Thabit 2025 Nov

use crate::domain::coin::ratio;
use crate::domain::Coin;
use crate::errors::RouterResult;
use crate::metrics::MetricsSink;
use crate::router::routes::Route;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapMethod {
    /// Fixed input, maximize output.
    #[default]
    ExactIn,
    /// Fixed output, minimize input.
    ExactOut,
}

impl SwapMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapMethod::ExactIn => "exact_in",
            SwapMethod::ExactOut => "exact_out",
        }
    }
}

/// A route with its share of the request.
#[derive(Debug, Clone, Serialize)]
pub struct SplitRoute {
    #[serde(flatten)]
    pub route: Route,
    pub in_amount: u128,
    pub out_amount: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub method: SwapMethod,
    pub amount_in: Coin,
    /// For exact-out this is the requested amount. A split's `out_amount`
    /// is what its input really buys and may exceed its share by rounding.
    pub amount_out: Coin,
    pub route: Vec<SplitRoute>,
    pub effective_fee: Decimal,
    pub price_impact: Decimal,
    pub in_base_out_quote_spot_price: Decimal,
}

impl Quote {
    /// Totals the splits and derives the fee and price metrics.
    /// `spot_price_scaling` converts the raw spot price into display units.
    pub fn prepare(
        method: SwapMethod,
        token_in_denom: &str,
        token_out_denom: &str,
        route: Vec<SplitRoute>,
        spot_price_scaling: Decimal,
        metrics: &dyn MetricsSink,
    ) -> RouterResult<Quote> {
        let total_in: u128 = route.iter().map(|s| s.in_amount).sum();
        let total_out: u128 = route.iter().map(|s| s.out_amount).sum();

        let mut effective_fee = Decimal::ZERO;
        let mut total_spot = Decimal::ZERO;
        let mut total_effective = Decimal::ZERO;

        for split in &route {
            // share of the input, so always within [0, 1]
            let fraction = ratio(split.in_amount, total_in).unwrap_or(Decimal::ZERO);
            effective_fee += split.route.total_fee() * fraction;

            let rq = split
                .route
                .quote(&Coin::new(token_in_denom, split.in_amount), metrics)?;
            total_spot = total_spot.saturating_add(rq.route_spot_price.saturating_mul(fraction));
            total_effective = total_effective.saturating_add(rq.effective_spot_price.saturating_mul(fraction));
        }

        let price_impact = if total_spot.is_zero() {
            Decimal::ZERO
        } else {
            total_effective
                .checked_div(total_spot)
                .map(|r| r - Decimal::ONE)
                .unwrap_or(Decimal::ZERO)
        };

        Ok(Quote {
            method,
            amount_in: Coin::new(token_in_denom, total_in),
            amount_out: Coin::new(token_out_denom, total_out),
            route,
            effective_fee,
            price_impact,
            in_base_out_quote_spot_price: total_spot.saturating_mul(spot_price_scaling),
        })
    }

    pub fn pool_ids(&self) -> Vec<Vec<u64>> {
        self.route
            .iter()
            .map(|s| s.route.pool_ids().collect())
            .collect()
    }
}
