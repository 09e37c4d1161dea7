// Router caches
// Generic TTL map with lazy expiry on read, plus the two router caches built
// on it: direction-independent candidate topologies and directional ranked
// routes per amount order of magnitude
//
// Numan Thabit 2025 Nov

use crate::domain::coin::order_of_magnitude;
use crate::domain::{CandidateRoute, CandidateRoutes, Denom};
use crate::router::quote::SwapMethod;
use crate::router::taker_fee::DenomPair;
use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Concurrent map whose entries expire `ttl` after insertion. Expired entries
/// are removed when read; there is no background sweep.
#[derive(Debug)]
pub struct ExpiringCache<K: Eq + Hash, V> {
    entries: DashMap<K, Entry<V>>,
}

impl<K: Eq + Hash, V: Clone> Default for ExpiringCache<K, V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V: Clone> ExpiringCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        // the read guard must drop before removal to avoid deadlocking the shard
        let hit = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if hit {
            self.entries.remove_if(key, |_, e| e.expires_at <= now);
        }
        None
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Entries stored, expired ones included until read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Candidate topology for an unordered pair, stored as found from `origin`.
#[derive(Debug, Clone)]
struct StoredCandidates {
    origin: Denom,
    routes: CandidateRoutes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RankedKey {
    pub token_in: Denom,
    pub token_out: Denom,
    pub method: SwapMethod,
    /// Magnitude of the fixed side: input for exact-in, output for exact-out.
    pub order_of_magnitude: u32,
}

impl RankedKey {
    pub fn new(token_in: &str, token_out: &str, method: SwapMethod, amount: u128) -> Self {
        Self {
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            method,
            order_of_magnitude: order_of_magnitude(amount),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RouterCacheConfig {
    pub candidate_ttl: Duration,
    pub ranked_ttl: Duration,
    pub ranked_enabled: bool,
}

#[derive(Debug)]
pub struct RouterCache {
    cfg: RouterCacheConfig,
    candidates: ExpiringCache<DenomPair, StoredCandidates>,
    ranked: ExpiringCache<RankedKey, Vec<CandidateRoute>>,
}

impl RouterCache {
    pub fn new(cfg: RouterCacheConfig) -> Self {
        Self {
            cfg,
            candidates: ExpiringCache::new(),
            ranked: ExpiringCache::new(),
        }
    }

    /// Topology from `token_in` to `token_out`, reversed if it was stored
    /// from the other direction.
    pub fn get_candidate_routes(&self, token_in: &str, token_out: &str) -> Option<CandidateRoutes> {
        let stored = self.candidates.get(&DenomPair::new(token_in, token_out))?;
        if stored.origin == token_in {
            Some(stored.routes)
        } else {
            Some(stored.routes.reversed(&stored.origin))
        }
    }

    pub fn set_candidate_routes(&self, token_in: &str, token_out: &str, routes: CandidateRoutes) {
        self.candidates.insert(
            DenomPair::new(token_in, token_out),
            StoredCandidates {
                origin: token_in.to_string(),
                routes,
            },
            self.cfg.candidate_ttl,
        );
    }

    pub fn get_ranked_routes(&self, key: &RankedKey) -> Option<Vec<CandidateRoute>> {
        if !self.cfg.ranked_enabled {
            return None;
        }
        self.ranked.get(key)
    }

    pub fn set_ranked_routes(&self, key: RankedKey, routes: Vec<CandidateRoute>) {
        if self.cfg.ranked_enabled {
            self.ranked.insert(key, routes, self.cfg.ranked_ttl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CandidatePool;

    fn cfg(ranked_enabled: bool) -> RouterCacheConfig {
        RouterCacheConfig {
            candidate_ttl: Duration::from_secs(60),
            ranked_ttl: Duration::from_secs(60),
            ranked_enabled,
        }
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let cache: ExpiringCache<u8, u8> = ExpiringCache::new();
        cache.insert(1, 10, Duration::ZERO);
        cache.insert(2, 20, Duration::from_secs(60));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&2), Some(20));
    }

    #[test]
    fn candidate_routes_are_direction_independent() {
        let cache = RouterCache::new(cfg(true));
        let routes = CandidateRoutes::new(vec![CandidateRoute::new(vec![
            CandidatePool::new(1, "usdt"),
            CandidatePool::new(2, "usdc"),
        ])]);
        cache.set_candidate_routes("eth", "usdc", routes.clone());

        assert_eq!(cache.get_candidate_routes("eth", "usdc"), Some(routes));
        let reversed = cache.get_candidate_routes("usdc", "eth").unwrap();
        assert_eq!(
            reversed.routes[0],
            CandidateRoute::new(vec![CandidatePool::new(2, "usdt"), CandidatePool::new(1, "eth")])
        );
    }

    #[test]
    fn ranked_cache_is_keyed_by_magnitude_and_can_be_disabled() {
        let cache = RouterCache::new(cfg(true));
        let key = |tin: &str, tout: &str, amount: u128| RankedKey::new(tin, tout, SwapMethod::ExactIn, amount);
        let routes = vec![CandidateRoute::new(vec![CandidatePool::new(3, "usdc")])];
        cache.set_ranked_routes(key("eth", "usdc", 1_000_000), routes.clone());
        assert_eq!(cache.get_ranked_routes(&key("eth", "usdc", 9_999_999)), Some(routes));
        assert_eq!(cache.get_ranked_routes(&key("eth", "usdc", 10_000_000)), None);
        assert_eq!(cache.get_ranked_routes(&key("usdc", "eth", 1_000_000)), None);
        assert_eq!(
            cache.get_ranked_routes(&RankedKey::new("eth", "usdc", SwapMethod::ExactOut, 1_000_000)),
            None
        );

        let disabled = RouterCache::new(cfg(false));
        disabled.set_ranked_routes(key("eth", "usdc", 1), vec![]);
        assert_eq!(disabled.get_ranked_routes(&key("eth", "usdc", 1)), None);
    }
}
