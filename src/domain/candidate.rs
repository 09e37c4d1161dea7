// Candidate route topology
// Pool-ID/denom hop sequences found by the route search, before any
// pool state is attached
//
// Numan Thabit 2025 Nov

use crate::domain::coin::Denom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidatePool {
    pub id: u64,
    pub token_out_denom: Denom,
}

impl CandidatePool {
    pub fn new(id: u64, token_out_denom: impl Into<Denom>) -> Self {
        Self {
            id,
            token_out_denom: token_out_denom.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateRoute {
    pub pools: Vec<CandidatePool>,
}

impl CandidateRoute {
    pub fn new(pools: Vec<CandidatePool>) -> Self {
        Self { pools }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn token_out_denom(&self) -> Option<&str> {
        self.pools.last().map(|p| p.token_out_denom.as_str())
    }

    pub fn pool_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.pools.iter().map(|p| p.id)
    }

    /// Set of pool IDs, used to deduplicate routes that differ only in order.
    pub fn pool_id_set(&self) -> BTreeSet<u64> {
        self.pool_ids().collect()
    }

    pub fn contains_pool(&self, pool_id: u64) -> bool {
        self.pools.iter().any(|p| p.id == pool_id)
    }

    /// The same topology traversed from the other end. `token_in_denom` is the
    /// denom this route starts from.
    pub fn reversed(&self, token_in_denom: &str) -> CandidateRoute {
        let mut inputs: Vec<&str> = Vec::with_capacity(self.pools.len());
        inputs.push(token_in_denom);
        for pool in self.pools.iter().take(self.pools.len().saturating_sub(1)) {
            inputs.push(&pool.token_out_denom);
        }

        let pools = self
            .pools
            .iter()
            .zip(inputs)
            .rev()
            .map(|(pool, denom_in)| CandidatePool::new(pool.id, denom_in))
            .collect();
        CandidateRoute { pools }
    }
}

/// Candidate routes for one denom pair plus the union of their pool IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRoutes {
    pub routes: Vec<CandidateRoute>,
    pub unique_pool_ids: BTreeSet<u64>,
}

impl CandidateRoutes {
    pub fn new(routes: Vec<CandidateRoute>) -> Self {
        let unique_pool_ids = routes.iter().flat_map(|r| r.pool_ids()).collect();
        Self {
            routes,
            unique_pool_ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn reversed(&self, token_in_denom: &str) -> CandidateRoutes {
        CandidateRoutes {
            routes: self
                .routes
                .iter()
                .map(|r| r.reversed(token_in_denom))
                .collect(),
            unique_pool_ids: self.unique_pool_ids.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversing_a_two_hop_route_swaps_hop_order_and_denoms() {
        let route = CandidateRoute::new(vec![
            CandidatePool::new(1, "uusdt"),
            CandidatePool::new(2, "uusdc"),
        ]);
        let reversed = route.reversed("ueth");
        assert_eq!(
            reversed,
            CandidateRoute::new(vec![
                CandidatePool::new(2, "uusdt"),
                CandidatePool::new(1, "ueth"),
            ])
        );
        assert_eq!(reversed.reversed("uusdc"), route);
    }

    #[test]
    fn unique_pool_ids_are_collected() {
        let routes = CandidateRoutes::new(vec![
            CandidateRoute::new(vec![CandidatePool::new(3, "b")]),
            CandidateRoute::new(vec![CandidatePool::new(1, "a"), CandidatePool::new(3, "b")]),
        ]);
        assert_eq!(routes.unique_pool_ids.into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }
}
