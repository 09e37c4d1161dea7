// Pool liquidity index
// Per-denom pool lists bucketed into every configured liquidity tier.
// An index is immutable once built; rebuilding produces a new value that
// replaces the old one with the rest of the generation
//
// Numan Thabit 2025 Nov

use crate::config::RouterConfig;
use crate::domain::{Denom, Pool};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
struct DenomPools {
    /// Every pool holding the denom, preferred first, then liquidity descending.
    sorted: Vec<Arc<Pool>>,
    /// Pools passing each tier threshold, aligned with `PoolLiquidityIndex::tiers`.
    tiered: Vec<Vec<Arc<Pool>>>,
    total_liquidity: u64,
}

#[derive(Debug, Default, Clone)]
pub struct PoolLiquidityIndex {
    /// Tier thresholds, strictest first.
    tiers: Vec<u64>,
    preferred: BTreeSet<u64>,
    by_denom: HashMap<Denom, DenomPools>,
}

impl PoolLiquidityIndex {
    /// Builds the index from per-denom pool lists that are already ordered
    /// preferred first, then by liquidity cap descending.
    pub fn set_candidate_route_search_data(
        denom_pools: HashMap<Denom, Vec<Arc<Pool>>>,
        cfg: &RouterConfig,
    ) -> Self {
        let tiers: Vec<u64> = cfg.liquidity_tiers().into_iter().rev().collect();
        let preferred: BTreeSet<u64> = cfg.preferred_pool_ids.iter().copied().collect();

        let by_denom = denom_pools
            .into_iter()
            .map(|(denom, sorted)| {
                let tiered = bucket_into_tiers(&sorted, &tiers, &preferred);
                let total_liquidity = sorted
                    .iter()
                    .fold(0u64, |acc, p| acc.saturating_add(p.liquidity_cap));
                (
                    denom,
                    DenomPools {
                        sorted,
                        tiered,
                        total_liquidity,
                    },
                )
            })
            .collect();

        Self {
            tiers,
            preferred,
            by_denom,
        }
    }

    /// Pools holding `denom` whose liquidity cap reaches `min_liquidity_cap`,
    /// plus preferred pools. `found` is false when no pool holds the denom.
    pub fn get_sorted_pools_by_denom(
        &self,
        denom: &str,
        min_liquidity_cap: u64,
    ) -> (Cow<'_, [Arc<Pool>]>, bool) {
        let Some(entry) = self.by_denom.get(denom) else {
            return (Cow::Borrowed(&[][..]), false);
        };
        match self.tiers.iter().position(|t| *t == min_liquidity_cap) {
            Some(i) => (Cow::Borrowed(entry.tiered[i].as_slice()), true),
            None => {
                let filtered = entry
                    .sorted
                    .iter()
                    .filter(|p| {
                        p.liquidity_cap >= min_liquidity_cap || self.preferred.contains(&p.id)
                    })
                    .cloned()
                    .collect();
                (Cow::Owned(filtered), true)
            }
        }
    }

    /// Summed liquidity cap of all pools holding the denom, zero if unknown.
    pub fn denom_liquidity(&self, denom: &str) -> u64 {
        self.by_denom
            .get(denom)
            .map(|e| e.total_liquidity)
            .unwrap_or(0)
    }

    pub fn contains_denom(&self, denom: &str) -> bool {
        self.by_denom.contains_key(denom)
    }

    pub fn tiers(&self) -> &[u64] {
        &self.tiers
    }

    /// Unfiltered sorted pools per denom, for the debug dump.
    pub fn sorted_pools(&self) -> impl Iterator<Item = (&Denom, &[Arc<Pool>])> {
        self.by_denom.iter().map(|(d, e)| (d, e.sorted.as_slice()))
    }
}

/// One descending pass over `sorted`. Tier `i` closes for good as soon as a
/// non-preferred pool falls below `tiers[i]`, because every later pool is
/// smaller still. Preferred pools land in every tier.
fn bucket_into_tiers(
    sorted: &[Arc<Pool>],
    tiers: &[u64],
    preferred: &BTreeSet<u64>,
) -> Vec<Vec<Arc<Pool>>> {
    let mut tiered: Vec<Vec<Arc<Pool>>> = vec![Vec::new(); tiers.len()];
    let mut first_open = 0;

    for pool in sorted {
        if preferred.contains(&pool.id) {
            for bucket in tiered.iter_mut() {
                bucket.push(Arc::clone(pool));
            }
            continue;
        }
        while first_open < tiers.len() && pool.liquidity_cap < tiers[first_open] {
            first_open += 1;
        }
        if first_open == tiers.len() {
            break;
        }
        for bucket in tiered[first_open..].iter_mut() {
            bucket.push(Arc::clone(pool));
        }
    }
    tiered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DynamicMinLiquidityCapFilterEntry;
    use crate::domain::{Coin, PoolRecord, PoolType};
    use crate::venues::amm::ConstantProductCurve;
    use rust_decimal::Decimal;

    fn pool(id: u64, liquidity_cap: u64) -> Arc<Pool> {
        let record = PoolRecord {
            id,
            pool_type: PoolType::ConstantProduct,
            denoms: vec!["a".into(), "b".into()],
            balances: vec![Coin::new("a", 1_000), Coin::new("b", 1_000)],
            spread_factor: Decimal::ZERO,
            liquidity_cap,
        };
        let curve = Arc::new(ConstantProductCurve::from_record(&record));
        Arc::new(Pool::new(record, curve))
    }

    fn cfg(preferred: Vec<u64>) -> RouterConfig {
        RouterConfig {
            min_pool_liquidity_cap: 10,
            preferred_pool_ids: preferred,
            dynamic_min_liquidity_cap_filters_desc: vec![
                DynamicMinLiquidityCapFilterEntry {
                    min_tokens_cap: 10_000,
                    filter_value: 1_000,
                },
                DynamicMinLiquidityCapFilterEntry {
                    min_tokens_cap: 1_000,
                    filter_value: 100,
                },
            ],
            ..RouterConfig::default()
        }
    }

    fn ids(pools: &[Arc<Pool>]) -> Vec<u64> {
        pools.iter().map(|p| p.id).collect()
    }

    #[test]
    fn single_scan_fills_every_tier() {
        let pools = vec![pool(9, 2_000), pool(1, 500), pool(2, 50), pool(3, 5)];
        let index = PoolLiquidityIndex::set_candidate_route_search_data(
            HashMap::from([("a".to_string(), pools)]),
            &cfg(vec![]),
        );
        assert_eq!(index.tiers(), &[1_000, 100, 10]);

        let (p, found) = index.get_sorted_pools_by_denom("a", 1_000);
        assert!(found);
        assert_eq!(ids(&p), vec![9]);
        assert_eq!(ids(&index.get_sorted_pools_by_denom("a", 100).0), vec![9, 1]);
        assert_eq!(ids(&index.get_sorted_pools_by_denom("a", 10).0), vec![9, 1, 2]);
        // thresholds without a tier are filtered on the fly
        assert_eq!(ids(&index.get_sorted_pools_by_denom("a", 0).0), vec![9, 1, 2, 3]);
        assert_eq!(index.denom_liquidity("a"), 2_555);
    }

    #[test]
    fn preferred_pools_bypass_the_filter() {
        let pools = vec![pool(3, 5), pool(9, 2_000), pool(1, 500)];
        let index = PoolLiquidityIndex::set_candidate_route_search_data(
            HashMap::from([("a".to_string(), pools)]),
            &cfg(vec![3]),
        );
        assert_eq!(ids(&index.get_sorted_pools_by_denom("a", 1_000).0), vec![3, 9]);
        assert_eq!(ids(&index.get_sorted_pools_by_denom("a", 500).0), vec![3, 9, 1]);
    }

    #[test]
    fn unknown_denom_is_not_found() {
        let index = PoolLiquidityIndex::default();
        let (pools, found) = index.get_sorted_pools_by_denom("nope", 0);
        assert!(!found);
        assert!(pools.is_empty());
        assert_eq!(index.denom_liquidity("nope"), 0);
    }
}
