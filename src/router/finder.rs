// Candidate route finder
// Bounded breadth-first search over the liquidity index. Shorter routes are
// always found before longer ones
//
// Numan Thabit 2025 Nov

use crate::control::QueryContext;
use crate::domain::{CandidatePool, CandidateRoute, Denom};
use crate::errors::{RouterError, RouterResult};
use crate::router::index::PoolLiquidityIndex;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateRouteSearchOptions {
    pub max_routes: usize,
    pub max_pools_per_route: usize,
    /// Liquidity threshold for non-preferred pools.
    pub min_pool_liquidity_cap: u64,
}

#[derive(Debug, Default)]
pub struct CandidateRouteFinder {
    invocations: AtomicU64,
}

impl CandidateRouteFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of searches run so far.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Finds up to `max_routes` routes from `token_in` to `token_out`.
    /// An exhausted search space yields an empty list, not an error.
    pub fn find(
        &self,
        ctx: &QueryContext,
        index: &PoolLiquidityIndex,
        token_in: &str,
        token_out: &str,
        opts: &CandidateRouteSearchOptions,
    ) -> RouterResult<Vec<CandidateRoute>> {
        if token_in == token_out {
            return Err(RouterError::Validation(format!(
                "token in and token out denoms are equal: {token_in}"
            )));
        }
        self.invocations.fetch_add(1, Ordering::Relaxed);

        let mut routes: Vec<CandidateRoute> = Vec::new();
        let mut seen: HashSet<BTreeSet<u64>> = HashSet::new();
        // pools already expanded through; never revisited by a later path
        let mut visited: HashSet<u64> = HashSet::new();
        let mut queue: VecDeque<Vec<CandidatePool>> = VecDeque::from([Vec::new()]);

        while let Some(path) = queue.pop_front() {
            if routes.len() >= opts.max_routes {
                break;
            }
            ctx.check("candidate route search")?;

            let current_denom: &str = path.last().map(|p| p.token_out_denom.as_str()).unwrap_or(token_in);
            let (pools, found) = index.get_sorted_pools_by_denom(current_denom, opts.min_pool_liquidity_cap);
            if !found {
                debug!(denom = current_denom, "no pools for denom in candidate route search");
                continue;
            }

            for pool in pools.iter() {
                if routes.len() >= opts.max_routes {
                    break;
                }
                if visited.contains(&pool.id) || path.iter().any(|p| p.id == pool.id) {
                    continue;
                }
                // never route back through the starting denom
                if !path.is_empty() && pool.has_denom(token_in) {
                    continue;
                }

                let mut next = path.clone();
                if pool.has_denom(token_out) {
                    next.push(CandidatePool::new(pool.id, token_out));
                    let route = CandidateRoute::new(next);
                    if seen.insert(route.pool_id_set()) {
                        routes.push(route);
                    }
                    continue;
                }

                if next.len() + 1 >= opts.max_pools_per_route {
                    continue;
                }
                for denom in pool.denoms.iter().filter(|d| d.as_str() != current_denom) {
                    if !index.contains_denom(denom) {
                        continue;
                    }
                    let mut extended = next.clone();
                    extended.push(CandidatePool::new(pool.id, Denom::clone(denom)));
                    queue.push_back(extended);
                }
            }

            visited.extend(path.iter().map(|p| p.id));
        }

        debug!(
            token_in = token_in,
            token_out = token_out,
            num_routes = routes.len(),
            "candidate route search finished"
        );
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::domain::{Coin, Pool, PoolRecord, PoolType};
    use crate::venues::amm::ConstantProductCurve;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn pool(id: u64, denoms: &[&str], liquidity_cap: u64) -> Arc<Pool> {
        let record = PoolRecord {
            id,
            pool_type: PoolType::ConstantProduct,
            denoms: denoms.iter().map(|d| d.to_string()).collect(),
            balances: denoms.iter().map(|d| Coin::new(*d, 1_000_000)).collect(),
            spread_factor: Decimal::ZERO,
            liquidity_cap,
        };
        let curve = Arc::new(ConstantProductCurve::from_record(&record));
        Arc::new(Pool::new(record, curve))
    }

    fn index(pools: Vec<Arc<Pool>>, cfg: &RouterConfig) -> PoolLiquidityIndex {
        let mut by_denom: HashMap<String, Vec<Arc<Pool>>> = HashMap::new();
        for p in &pools {
            for d in &p.denoms {
                by_denom.entry(d.clone()).or_default().push(Arc::clone(p));
            }
        }
        for v in by_denom.values_mut() {
            v.sort_by(|a, b| b.liquidity_cap.cmp(&a.liquidity_cap));
        }
        PoolLiquidityIndex::set_candidate_route_search_data(by_denom, cfg)
    }

    fn opts(min_pool_liquidity_cap: u64) -> CandidateRouteSearchOptions {
        CandidateRouteSearchOptions {
            max_routes: 10,
            max_pools_per_route: 3,
            min_pool_liquidity_cap,
        }
    }

    fn scenario() -> PoolLiquidityIndex {
        index(
            vec![
                pool(1, &["eth", "usdt"], 5_000_000),
                pool(2, &["usdc", "usdt"], 1_000_000),
                pool(3, &["eth", "usdc"], 4_000_000),
            ],
            &RouterConfig::default(),
        )
    }

    #[test]
    fn direct_routes_come_first() {
        let finder = CandidateRouteFinder::new();
        let routes = finder
            .find(&QueryContext::background(), &scenario(), "eth", "usdc", &opts(0))
            .unwrap();
        assert_eq!(
            routes,
            vec![
                CandidateRoute::new(vec![CandidatePool::new(3, "usdc")]),
                CandidateRoute::new(vec![CandidatePool::new(1, "usdt"), CandidatePool::new(2, "usdc")]),
            ]
        );
        assert_eq!(finder.invocations(), 1);
    }

    #[test]
    fn hop_limit_is_respected() {
        let finder = CandidateRouteFinder::new();
        let one_hop = CandidateRouteSearchOptions {
            max_pools_per_route: 1,
            ..opts(0)
        };
        let routes = finder
            .find(&QueryContext::background(), &scenario(), "eth", "usdc", &one_hop)
            .unwrap();
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn liquidity_filter_prunes_hops() {
        let finder = CandidateRouteFinder::new();
        let routes = finder
            .find(&QueryContext::background(), &scenario(), "eth", "usdc", &opts(2_000_000))
            .unwrap();
        assert_eq!(routes, vec![CandidateRoute::new(vec![CandidatePool::new(3, "usdc")])]);
    }

    #[test]
    fn self_swap_is_rejected_and_unknown_denoms_are_empty() {
        let finder = CandidateRouteFinder::new();
        let ctx = QueryContext::background();
        assert!(matches!(
            finder.find(&ctx, &scenario(), "eth", "eth", &opts(0)),
            Err(RouterError::Validation(_))
        ));
        assert!(finder.find(&ctx, &scenario(), "unknown", "usdc", &opts(0)).unwrap().is_empty());
    }

    #[test]
    fn cancelled_search_returns_cancelled() {
        let ctx = QueryContext::background();
        ctx.cancel();
        let err = CandidateRouteFinder::new()
            .find(&ctx, &scenario(), "eth", "usdc", &opts(0))
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
