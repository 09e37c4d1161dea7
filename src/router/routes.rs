// Route types and the route quote engine
// A Route is a candidate topology with live pool capabilities and taker
// fees attached. Quoting walks the hops in order, charging the taker fee
// before every pool swap
//
// Numan Thabit 2025 Nov

use crate::domain::coin::ratio;
use crate::domain::{CandidatePool, CandidateRoute, Coin, Denom, Pool};
use crate::errors::{PoolError, RouterError, RouterResult};
use crate::metrics::MetricsSink;
use crate::router::taker_fee::TakerFeeRepository;
use crate::state::PoolSnapshot;
use rust_decimal::Decimal;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::warn;

/// One hop: a pool, the denom it produces and the taker fee for the hop pair.
#[derive(Debug, Clone)]
pub struct RoutablePool {
    pub pool: Arc<Pool>,
    pub token_out_denom: Denom,
    pub taker_fee: Decimal,
}

impl RoutablePool {
    pub fn id(&self) -> u64 {
        self.pool.id
    }
}

impl Serialize for RoutablePool {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RoutablePool", 6)?;
        s.serialize_field("id", &self.pool.id)?;
        s.serialize_field("type", self.pool.pool_type.label())?;
        s.serialize_field("code_id", &self.pool.pool_type.code_id())?;
        s.serialize_field("spread_factor", &self.pool.spread_factor)?;
        s.serialize_field("token_out_denom", &self.token_out_denom)?;
        s.serialize_field("taker_fee", &self.taker_fee)?;
        s.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub pools: Vec<RoutablePool>,
    #[serde(rename = "has-cw-pool")]
    pub contains_generalized_cosmwasm: bool,
    #[serde(skip)]
    pub contains_canonical_orderbook: bool,
}

/// Output of quoting a route for one input amount.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuote {
    pub token_out: Coin,
    /// Product of the pre-trade spot prices, token in as base.
    pub route_spot_price: Decimal,
    /// Product of the realized out/in ratios.
    pub effective_spot_price: Decimal,
}

impl Route {
    /// Attaches live pools and taker fees to a candidate topology starting at
    /// `token_in_denom`. Fails with NotFound for a missing pool and Validation
    /// when a pool does not hold the hop's denoms.
    pub fn attach(
        candidate: &CandidateRoute,
        token_in_denom: &str,
        snapshot: &PoolSnapshot,
        taker_fees: &TakerFeeRepository,
        default_taker_fee: Decimal,
    ) -> RouterResult<Route> {
        if candidate.is_empty() {
            return Err(RouterError::Validation("route has no pools".into()));
        }

        let mut pools = Vec::with_capacity(candidate.len());
        let mut denom_in = token_in_denom;
        for CandidatePool { id, token_out_denom } in &candidate.pools {
            let pool = snapshot
                .get(*id)
                .ok_or_else(|| RouterError::NotFound(format!("pool {id}")))?;
            for denom in [denom_in, token_out_denom.as_str()] {
                if !pool.has_denom(denom) {
                    return Err(RouterError::Validation(format!(
                        "denom {denom} not found in pool {id}"
                    )));
                }
            }
            if denom_in == token_out_denom.as_str() {
                return Err(RouterError::Validation(format!(
                    "pool {id} hop swaps {denom_in} for itself"
                )));
            }
            let taker_fee = taker_fees.fee_or(denom_in, token_out_denom, default_taker_fee);
            pools.push(RoutablePool {
                pool: Arc::clone(pool),
                token_out_denom: token_out_denom.clone(),
                taker_fee,
            });
            denom_in = token_out_denom.as_str();
        }
        Ok(Route::new(pools, snapshot))
    }

    pub fn new(pools: Vec<RoutablePool>, snapshot: &PoolSnapshot) -> Self {
        let contains_generalized_cosmwasm = pools
            .iter()
            .any(|p| p.pool.pool_type.is_generalized_cosmwasm());
        let contains_canonical_orderbook = pools
            .iter()
            .any(|p| p.pool.pool_type.is_orderbook() && snapshot.is_canonical_orderbook(p.id()));
        Self {
            pools,
            contains_generalized_cosmwasm,
            contains_canonical_orderbook,
        }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn pool_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.pools.iter().map(|p| p.id())
    }

    pub fn pool_id_sum(&self) -> u128 {
        self.pool_ids().map(u128::from).sum()
    }

    pub fn token_out_denom(&self) -> Option<&str> {
        self.pools.last().map(|p| p.token_out_denom.as_str())
    }

    pub fn to_candidate(&self) -> CandidateRoute {
        CandidateRoute::new(
            self.pools
                .iter()
                .map(|p| CandidatePool::new(p.id(), p.token_out_denom.clone()))
                .collect(),
        )
    }

    /// Output amount only. Used by the split optimizer's inner loop.
    pub fn calculate_token_out(&self, token_in: &Coin) -> Result<Coin, PoolError> {
        let mut current = token_in.clone();
        for hop in &self.pools {
            let capability = hop.pool.capability();
            let charged = capability.charge_taker_fee_exact_in(&current, hop.taker_fee)?;
            current = capability.calculate_token_out_by_token_in(&charged, &hop.token_out_denom)?;
        }
        Ok(current)
    }

    /// Full quote with spot price metrics. A failing spot price contributes
    /// zero; a failing swap fails the whole route.
    pub fn quote(&self, token_in: &Coin, metrics: &dyn MetricsSink) -> RouterResult<RouteQuote> {
        let mut route_spot_price = Decimal::ONE;
        let mut effective_spot_price = Decimal::ONE;
        let mut current = token_in.clone();

        for hop in &self.pools {
            let capability = hop.pool.capability();
            let spot = match capability.calc_spot_price(&current.denom, &hop.token_out_denom) {
                Ok(price) => price,
                Err(err) => {
                    warn!(pool_id = hop.id(), error = %err, "failed to calculate spot price for pool");
                    metrics.spot_price_error(hop.id());
                    Decimal::ZERO
                }
            };

            let charged = capability.charge_taker_fee_exact_in(&current, hop.taker_fee)?;
            let out = capability.calculate_token_out_by_token_in(&charged, &hop.token_out_denom)?;

            let realized = ratio(out.amount, charged.amount).unwrap_or_else(|| {
                warn!(pool_id = hop.id(), "realized price out of decimal range");
                metrics.spot_price_error(hop.id());
                Decimal::ZERO
            });
            effective_spot_price = effective_spot_price.saturating_mul(realized);
            route_spot_price = route_spot_price.saturating_mul(spot);
            current = out;
        }

        Ok(RouteQuote {
            token_out: current,
            route_spot_price,
            effective_spot_price,
        })
    }

    /// Compounded spread + taker fee across hops.
    pub fn total_fee(&self) -> Decimal {
        self.pools.iter().fold(Decimal::ZERO, |total, hop| {
            let hop_fee = hop.pool.spread_factor + hop.taker_fee;
            total + (Decimal::ONE - total) * hop_fee
        })
    }

    /// Smallest input producing at least `amount_out`. Doubles an upper
    /// bound, then bisects; route output is monotone in its input.
    pub fn required_input_for(&self, token_in_denom: &str, amount_out: u128) -> Result<u128, PoolError> {
        let first_pool = self.pools.first().map(|p| p.id()).unwrap_or_default();
        if amount_out == 0 {
            return Ok(0);
        }
        let out_for = |amount: u128| -> Result<u128, PoolError> {
            Ok(self
                .calculate_token_out(&Coin::new(token_in_denom, amount))?
                .amount)
        };

        let mut lo = 0u128;
        let mut hi = amount_out;
        loop {
            if out_for(hi)? >= amount_out {
                break;
            }
            lo = hi;
            hi = hi
                .checked_mul(2)
                .filter(|h| *h < (1u128 << 100))
                .ok_or_else(|| PoolError::InsufficientLiquidity {
                    pool_id: first_pool,
                    denom: self.token_out_denom().unwrap_or_default().to_string(),
                })?;
        }

        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if out_for(mid)? >= amount_out {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        Ok(hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PoolRecord, PoolType, SwapCapability};
    use crate::metrics::NoopMetrics;
    use crate::venues::amm::ConstantProductCurve;
    use rust_decimal_macros::dec;

    #[derive(Debug)]
    struct BrokenSpot(ConstantProductCurve);

    impl SwapCapability for BrokenSpot {
        fn calculate_token_out_by_token_in(&self, t: &Coin, d: &str) -> Result<Coin, PoolError> {
            self.0.calculate_token_out_by_token_in(t, d)
        }

        fn calc_spot_price(&self, _: &str, _: &str) -> Result<Decimal, PoolError> {
            Err(PoolError::Other {
                pool_id: 2,
                reason: "no spot".into(),
            })
        }
    }

    fn record(id: u64, a: (&str, u128), b: (&str, u128), spread: Decimal) -> PoolRecord {
        PoolRecord {
            id,
            pool_type: PoolType::ConstantProduct,
            denoms: vec![a.0.into(), b.0.into()],
            balances: vec![Coin::new(a.0, a.1), Coin::new(b.0, b.1)],
            spread_factor: spread,
            liquidity_cap: 1_000,
        }
    }

    fn snapshot(broken_spot: bool) -> PoolSnapshot {
        let r1 = record(1, ("a", 1_000_000), ("b", 2_000_000), Decimal::ZERO);
        let r2 = record(2, ("b", 2_000_000), ("c", 2_000_000), dec!(0.01));
        let c1 = Arc::new(ConstantProductCurve::from_record(&r1));
        let c2 = ConstantProductCurve::from_record(&r2);
        let p2 = if broken_spot {
            Pool::new(r2, Arc::new(BrokenSpot(c2)))
        } else {
            Pool::new(r2, Arc::new(c2))
        };
        PoolSnapshot::new(1, vec![Pool::new(r1, c1), p2])
    }

    fn two_hop(snapshot: &PoolSnapshot) -> Route {
        let fees = TakerFeeRepository::new();
        fees.set_taker_fee("a", "b", Decimal::ZERO);
        let candidate = CandidateRoute::new(vec![CandidatePool::new(1, "b"), CandidatePool::new(2, "c")]);
        Route::attach(&candidate, "a", snapshot, &fees, dec!(0.001)).unwrap()
    }

    #[test]
    fn quote_charges_fees_hop_by_hop() {
        let snap = snapshot(false);
        let route = two_hop(&snap);
        assert_eq!(route.pools[0].taker_fee, Decimal::ZERO);
        assert_eq!(route.pools[1].taker_fee, dec!(0.001));

        let q = route.quote(&Coin::new("a", 1_000), &NoopMetrics).unwrap();
        // hop 1: 2_000_000 * 1_000 / 1_001_000 = 1_998
        // hop 2: fee 1_998 -> 1_996, spread -> 1_976, 2_000_000 * 1_976 / 2_001_976 = 1_974
        assert_eq!(q.token_out, Coin::new("c", 1_974));
        assert_eq!(q.route_spot_price, dec!(2));
        assert_eq!(route.calculate_token_out(&Coin::new("a", 1_000)).unwrap(), q.token_out);
        assert!(q.effective_spot_price < q.route_spot_price);
    }

    #[test]
    fn spot_price_failure_contributes_zero() {
        let snap = snapshot(true);
        let q = two_hop(&snap).quote(&Coin::new("a", 1_000), &NoopMetrics).unwrap();
        assert_eq!(q.route_spot_price, Decimal::ZERO);
        assert_eq!(q.token_out.amount, 1_974);
    }

    #[test]
    fn attach_rejects_pools_without_the_hop_denom() {
        let snap = snapshot(false);
        let fees = TakerFeeRepository::new();
        let bad = CandidateRoute::new(vec![CandidatePool::new(2, "c")]);
        assert!(matches!(
            Route::attach(&bad, "a", &snap, &fees, Decimal::ZERO),
            Err(RouterError::Validation(_))
        ));
        let missing = CandidateRoute::new(vec![CandidatePool::new(77, "c")]);
        assert!(matches!(
            Route::attach(&missing, "a", &snap, &fees, Decimal::ZERO),
            Err(RouterError::NotFound(_))
        ));
    }

    #[test]
    fn required_input_is_minimal() {
        let snap = snapshot(false);
        let route = two_hop(&snap);
        let needed = route.required_input_for("a", 1_974).unwrap();
        assert!(route.calculate_token_out(&Coin::new("a", needed)).unwrap().amount >= 1_974);
        assert!(route.calculate_token_out(&Coin::new("a", needed - 1)).unwrap().amount < 1_974);
    }

    #[test]
    fn total_fee_compounds() {
        let snap = snapshot(false);
        // hop 1: 0 + 0; hop 2: (1 - 0) * (0.01 + 0.001)
        assert_eq!(two_hop(&snap).total_fee(), dec!(0.011));
    }
}
