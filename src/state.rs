// Pool generations and snapshot ingestion
//
// Holds the current immutable generation (pool snapshot, liquidity index and
// taker fees) behind an atomic reference swap, and runs the ingestion task
// that polls a PoolProvider and publishes new generations. Broadcasts the
// height of every applied generation to subscribers.
//
// Numan Thabit 2025 Nov

use crate::config::{CosmWasmPoolConfig, RouterConfig};
use crate::domain::{Denom, Pool, PoolType};
use crate::router::index::PoolLiquidityIndex;
use crate::router::taker_fee::{DenomPair, TakerFeeEntry, TakerFeeRepository};
use crate::router::RouterOrchestrator;
use anyhow::Result;
use arc_swap::ArcSwap;
use backoff::{future::retry, ExponentialBackoff};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Everything the provider reports for one block.
#[derive(Debug, Clone, Default)]
pub struct BlockPools {
    pub height: u64,
    pub pools: Vec<Pool>,
    pub taker_fees: Vec<TakerFeeEntry>,
}

/// Source of pool state, implemented by the external ingestion pipeline.
pub trait PoolProvider: Send + Sync {
    fn get_all_pools(&self) -> impl Future<Output = Result<BlockPools>> + Send;

    fn get_pool(&self, pool_id: u64) -> impl Future<Output = Result<Option<Pool>>> + Send;

    fn cosmwasm_pool_config(&self) -> CosmWasmPoolConfig;
}

/// Pools of one block. Never mutated after construction.
#[derive(Debug, Default, Clone)]
pub struct PoolSnapshot {
    height: u64,
    pools: HashMap<u64, Arc<Pool>>,
    canonical_orderbooks: BTreeSet<u64>,
}

impl PoolSnapshot {
    pub fn new(height: u64, pools: Vec<Pool>) -> Self {
        let pools: HashMap<u64, Arc<Pool>> = pools.into_iter().map(|p| (p.id, Arc::new(p))).collect();

        // the deepest orderbook per denom pair is the canonical one
        let mut best: HashMap<DenomPair, (u64, u64)> = HashMap::new();
        for pool in pools.values().filter(|p| p.pool_type.is_orderbook()) {
            if let [a, b, ..] = pool.denoms.as_slice() {
                let candidate = (pool.liquidity_cap, pool.id);
                best.entry(DenomPair::new(a, b))
                    .and_modify(|cur| {
                        if candidate.0 > cur.0 || (candidate.0 == cur.0 && candidate.1 < cur.1) {
                            *cur = candidate;
                        }
                    })
                    .or_insert(candidate);
            }
        }
        let canonical_orderbooks = best.into_values().map(|(_, id)| id).collect();

        Self {
            height,
            pools,
            canonical_orderbooks,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn get(&self, pool_id: u64) -> Option<&Arc<Pool>> {
        self.pools.get(&pool_id)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn pools(&self) -> impl Iterator<Item = &Arc<Pool>> {
        self.pools.values()
    }

    pub fn is_canonical_orderbook(&self, pool_id: u64) -> bool {
        self.canonical_orderbooks.contains(&pool_id)
    }
}

/// Snapshot plus the indices derived from it, swapped as one unit.
#[derive(Debug, Default)]
pub struct RouterGeneration {
    pub snapshot: PoolSnapshot,
    pub index: PoolLiquidityIndex,
    pub taker_fees: TakerFeeRepository,
}

impl RouterGeneration {
    /// Validates the block's pools and builds the index over them.
    pub fn build(block: BlockPools, cfg: &RouterConfig, cosmwasm: &CosmWasmPoolConfig) -> Self {
        let pools = filter_routable_pools(block.pools, cosmwasm);
        let snapshot = PoolSnapshot::new(block.height, pools);
        let denom_pools = sort_pools_by_denom(&snapshot, cfg);
        let index = PoolLiquidityIndex::set_candidate_route_search_data(denom_pools, cfg);
        let taker_fees = TakerFeeRepository::from_entries(block.taker_fees);
        debug!(
            height = snapshot.height(),
            num_pools = snapshot.len(),
            num_taker_fees = taker_fees.len(),
            "built router generation"
        );
        Self {
            snapshot,
            index,
            taker_fees,
        }
    }
}

/// Drops pools the router cannot route through and resolves CosmWasm pool
/// roles from the configured code IDs.
fn filter_routable_pools(pools: Vec<Pool>, cosmwasm: &CosmWasmPoolConfig) -> Vec<Pool> {
    pools
        .into_iter()
        .filter_map(|mut pool| {
            if pool.denoms.len() < 2 {
                warn!(pool_id = pool.id, "skipping pool with fewer than two denoms");
                return None;
            }
            if let PoolType::CosmWasm { code_id, .. } = pool.pool_type {
                let Some(class) = cosmwasm.classify(code_id) else {
                    debug!(pool_id = pool.id, code_id = code_id, "skipping unlisted cosmwasm pool");
                    return None;
                };
                pool.pool_type = PoolType::CosmWasm { code_id, class };
            }
            Some(pool)
        })
        .collect()
}

/// Per-denom pool lists: preferred first, then liquidity cap descending,
/// then pool ID ascending.
fn sort_pools_by_denom(snapshot: &PoolSnapshot, cfg: &RouterConfig) -> HashMap<Denom, Vec<Arc<Pool>>> {
    let mut by_denom: HashMap<Denom, Vec<Arc<Pool>>> = HashMap::new();
    for pool in snapshot.pools() {
        for denom in &pool.denoms {
            by_denom.entry(denom.clone()).or_default().push(Arc::clone(pool));
        }
    }
    for pools in by_denom.values_mut() {
        pools.sort_by(|a, b| {
            cfg.is_preferred(b.id)
                .cmp(&cfg.is_preferred(a.id))
                .then(b.liquidity_cap.cmp(&a.liquidity_cap))
                .then(a.id.cmp(&b.id))
        });
    }
    by_denom
}

/// Current generation plus a channel announcing every swap.
pub struct RouterState {
    current: ArcSwap<RouterGeneration>,
    tx: broadcast::Sender<u64>,
}

impl RouterState {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            current: ArcSwap::from_pointee(RouterGeneration::default()),
            tx,
        }
    }

    /// The generation to use for a whole request.
    pub fn load(&self) -> Arc<RouterGeneration> {
        self.current.load_full()
    }

    pub fn store(&self, generation: RouterGeneration) {
        let height = generation.snapshot.height();
        self.current.store(Arc::new(generation));
        let _ = self.tx.send(height);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.tx.subscribe()
    }

    pub fn height(&self) -> u64 {
        self.current.load().snapshot.height()
    }
}

/// Start the snapshot ingestion task.
/// Polls the provider every `interval` and applies each newer block.
pub fn start_snapshot_ingest<P>(
    provider: Arc<P>,
    router: Arc<RouterOrchestrator>,
    interval: Duration,
) -> tokio::task::JoinHandle<()>
where
    P: PoolProvider + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            let backoff = ExponentialBackoff {
                initial_interval: Duration::from_millis(100),
                max_interval: Duration::from_secs(5),
                max_elapsed_time: Some(interval.max(Duration::from_secs(1)) * 10),
                multiplier: 2.0,
                ..Default::default()
            };
            let fetched = retry(backoff, || {
                let provider = Arc::clone(&provider);
                async move {
                    provider
                        .get_all_pools()
                        .await
                        .map_err(backoff::Error::transient)
                }
            })
            .await;

            let block = match fetched {
                Ok(block) => block,
                Err(err) => {
                    warn!(error = %err, "failed to fetch pools; retrying next cycle");
                    continue;
                }
            };

            let current = router.state().height();
            if block.height <= current && current != 0 {
                debug!(height = block.height, current = current, "snapshot not newer; skipping");
                continue;
            }

            let height = block.height;
            let num_pools = block.pools.len();
            router.apply_block(block, &provider.cosmwasm_pool_config());
            info!(height = height, num_pools = num_pools, "pool snapshot applied");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coin, CosmWasmPoolKind, PoolRecord};
    use crate::venues::transmuter::TransmuterCurve;
    use rust_decimal::Decimal;

    fn pool(id: u64, pool_type: PoolType, liquidity_cap: u64) -> Pool {
        let record = PoolRecord {
            id,
            pool_type,
            denoms: vec!["x".into(), "y".into()],
            balances: vec![Coin::new("x", 10), Coin::new("y", 10)],
            spread_factor: Decimal::ZERO,
            liquidity_cap,
        };
        let curve = Arc::new(TransmuterCurve::from_record(&record));
        Pool::new(record, curve)
    }

    fn orderbook(code_id: u64) -> PoolType {
        PoolType::CosmWasm {
            code_id,
            class: CosmWasmPoolKind::Orderbook,
        }
    }

    #[test]
    fn unlisted_cosmwasm_pools_are_dropped() {
        let cosmwasm = CosmWasmPoolConfig {
            orderbook_code_ids: vec![5],
            ..CosmWasmPoolConfig::default()
        };
        let block = BlockPools {
            height: 3,
            pools: vec![
                pool(1, PoolType::ConstantProduct, 10),
                pool(2, orderbook(5), 10),
                pool(3, orderbook(6), 10),
            ],
            taker_fees: vec![],
        };
        let generation = RouterGeneration::build(block, &RouterConfig::default(), &cosmwasm);
        assert_eq!(generation.snapshot.len(), 2);
        assert!(generation.snapshot.get(3).is_none());
        assert_eq!(generation.snapshot.height(), 3);
    }

    #[test]
    fn deepest_orderbook_is_canonical() {
        let snap = PoolSnapshot::new(1, vec![pool(7, orderbook(5), 100), pool(8, orderbook(5), 900)]);
        assert!(snap.is_canonical_orderbook(8));
        assert!(!snap.is_canonical_orderbook(7));
    }

    #[test]
    fn preferred_pools_sort_first() {
        let cfg = RouterConfig {
            preferred_pool_ids: vec![4],
            ..RouterConfig::default()
        };
        let snap = PoolSnapshot::new(
            1,
            vec![
                pool(4, PoolType::ConstantProduct, 1),
                pool(5, PoolType::ConstantProduct, 50),
                pool(6, PoolType::ConstantProduct, 50),
                pool(9, PoolType::ConstantProduct, 70),
            ],
        );
        let sorted = sort_pools_by_denom(&snap, &cfg);
        let ids: Vec<u64> = sorted["x"].iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![4, 9, 5, 6]);
    }

    #[test]
    fn store_broadcasts_height() {
        let state = RouterState::new(4);
        let mut rx = state.subscribe();
        state.store(RouterGeneration {
            snapshot: PoolSnapshot::new(42, vec![]),
            ..RouterGeneration::default()
        });
        assert_eq!(rx.try_recv().unwrap(), 42);
        assert_eq!(state.height(), 42);
    }
}
