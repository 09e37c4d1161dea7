// Shared fixtures for the router integration tests
// Three constant-product pools over ETH, USDT and USDC
//
// Numan Thabit 2025 Nov

#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;
use ultra_router::config::{CosmWasmPoolConfig, RouterConfig};
use ultra_router::domain::{Coin, Pool, PoolRecord, PoolType};
use ultra_router::metrics::{MetricsSink, NoopMetrics};
use ultra_router::router::overwrite::RouteOverwriteStore;
use ultra_router::router::{RouterOrchestrator, TakerFeeEntry};
use ultra_router::state::BlockPools;
use ultra_router::tokens::StaticTokenMetadata;
use ultra_router::venues::ConstantProductCurve;

pub const ETH: &str = "eth";
pub const USDT: &str = "usdt";
pub const USDC: &str = "usdc";

pub const POOL_A: u64 = 1;
pub const POOL_B: u64 = 2;
pub const POOL_C: u64 = 3;

pub fn cp_pool(id: u64, a: (&str, u128), b: (&str, u128), spread_factor: Decimal, liquidity_cap: u64) -> Pool {
    let record = PoolRecord {
        id,
        pool_type: PoolType::ConstantProduct,
        denoms: vec![a.0.to_string(), b.0.to_string()],
        balances: vec![Coin::new(a.0, a.1), Coin::new(b.0, b.1)],
        spread_factor,
        liquidity_cap,
    };
    let curve = Arc::new(ConstantProductCurve::from_record(&record));
    Pool::new(record, curve)
}

/// A(USDT/ETH, 1%, 5M), B(USDC/USDT, 3%, 1M), C(ETH/USDC, 0.5%, 4M).
pub fn scenario_pools() -> Vec<Pool> {
    vec![
        cp_pool(POOL_A, (USDT, 5_000_000), (ETH, 5_000_000), dec!(0.01), 5_000_000),
        cp_pool(POOL_B, (USDC, 1_000_000), (USDT, 1_000_000), dec!(0.03), 1_000_000),
        cp_pool(POOL_C, (ETH, 4_000_000), (USDC, 4_000_000), dec!(0.005), 4_000_000),
    ]
}

pub fn scenario_block(height: u64) -> BlockPools {
    BlockPools {
        height,
        pools: scenario_pools(),
        taker_fees: vec![TakerFeeEntry {
            denom0: ETH.into(),
            denom1: USDC.into(),
            fee: dec!(0.002),
        }],
    }
}

pub fn router_with(cfg: RouterConfig, overwrite_dir: Option<PathBuf>) -> RouterOrchestrator {
    let router = RouterOrchestrator::new(
        cfg,
        RouteOverwriteStore::new(overwrite_dir),
        Arc::new(StaticTokenMetadata::default()),
        Arc::new(NoopMetrics),
    )
    .unwrap();
    router.apply_block(scenario_block(1), &CosmWasmPoolConfig::default());
    router
}

/// Scenario router reporting to `metrics`.
pub fn router_with_metrics(metrics: Arc<dyn MetricsSink>) -> RouterOrchestrator {
    let router = RouterOrchestrator::new(
        RouterConfig::default(),
        RouteOverwriteStore::new(None),
        Arc::new(StaticTokenMetadata::default()),
        metrics,
    )
    .unwrap();
    router.apply_block(scenario_block(1), &CosmWasmPoolConfig::default());
    router
}

/// Constant-product pool over any number of denoms, no spread.
pub fn multi_pool(id: u64, reserves: &[(&str, u128)], liquidity_cap: u64) -> Pool {
    let record = PoolRecord {
        id,
        pool_type: PoolType::ConstantProduct,
        denoms: reserves.iter().map(|(d, _)| d.to_string()).collect(),
        balances: reserves.iter().map(|(d, a)| Coin::new(*d, *a)).collect(),
        spread_factor: Decimal::ZERO,
        liquidity_cap,
    };
    let curve = Arc::new(ConstantProductCurve::from_record(&record));
    Pool::new(record, curve)
}

pub fn scenario_router() -> RouterOrchestrator {
    router_with(RouterConfig::default(), None)
}
