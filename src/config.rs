// Configuration management module
// This file handles loading and validation of the router settings
// from an optional config file overlaid by environment variables
//
// Numan Thabit 2025 Nov

use crate::domain::CosmWasmPoolKind;
use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub pools: CosmWasmPoolConfig,
    /// Pool/taker-fee snapshot written by the ingester (json or yaml)
    pub snapshot_path: PathBuf,
    /// Directory holding persisted route overwrites
    #[serde(default = "default_overwrite_routes_path")]
    pub overwrite_routes_path: PathBuf,
    /// Whether operators may pin routes at all
    #[serde(default = "default_true")]
    pub route_overwrite_enabled: bool,
    /// Snapshot polling interval
    #[serde(default = "default_ingest_interval_ms")]
    pub ingest_interval_ms: u64,
    /// Directory for the debug state dump written on shutdown (optional)
    pub state_dump_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }
        let cfg = builder
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;
        let app: AppConfig = cfg.try_deserialize()?;
        app.router.validate().context("invalid router config")?;
        Ok(app)
    }

    pub fn ingest_interval(&self) -> Duration {
        Duration::from_millis(self.ingest_interval_ms.max(1))
    }
}

/// Maps a token's own market capitalization to the liquidity filter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicMinLiquidityCapFilterEntry {
    pub min_tokens_cap: u64,
    pub filter_value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Pool IDs that skip the liquidity filter and rank first
    pub preferred_pool_ids: Vec<u64>,
    /// Maximum number of pools in one route
    pub max_pools_per_route: usize,
    /// Maximum number of candidate routes to search for
    pub max_routes: usize,
    /// Maximum number of routes to split across (0 or 1 disables splitting)
    pub max_split_routes: usize,
    /// Hard bound on rebalancing moves of the split optimizer
    pub max_split_iterations: usize,
    /// Fallback minimum pool liquidity cap
    pub min_pool_liquidity_cap: u64,
    /// Strictest-first list of dynamic filters
    pub dynamic_min_liquidity_cap_filters_desc: Vec<DynamicMinLiquidityCapFilterEntry>,
    /// Whether the ranked route cache is used
    pub route_cache_enabled: bool,
    pub candidate_route_cache_expiry_seconds: u64,
    pub ranked_route_cache_expiry_seconds: u64,
    /// Taker fee applied to pairs without an explicit entry
    pub default_taker_fee: Decimal,
    /// Minimum objective improvement (amount units) for a rebalancing move
    pub split_convergence_epsilon: u128,
    /// Initial rebalancing step is total / (routes * divisor)
    pub split_initial_step_divisor: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            preferred_pool_ids: Vec::new(),
            max_pools_per_route: 4,
            max_routes: 20,
            max_split_routes: 3,
            max_split_iterations: 64,
            min_pool_liquidity_cap: 0,
            dynamic_min_liquidity_cap_filters_desc: Vec::new(),
            route_cache_enabled: true,
            candidate_route_cache_expiry_seconds: 1200,
            ranked_route_cache_expiry_seconds: 300,
            default_taker_fee: dec!(0.001),
            split_convergence_epsilon: 0,
            split_initial_step_divisor: 4,
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_routes == 0 {
            bail!("max_routes must be positive");
        }
        if self.max_pools_per_route == 0 {
            bail!("max_pools_per_route must be positive");
        }
        if self.default_taker_fee.is_sign_negative() || self.default_taker_fee >= Decimal::ONE {
            bail!("default_taker_fee must be in [0, 1)");
        }
        validate_dynamic_min_liquidity_cap_desc(&self.dynamic_min_liquidity_cap_filters_desc)
    }

    /// Every liquidity threshold the index must keep a tier for.
    pub fn liquidity_tiers(&self) -> BTreeSet<u64> {
        let mut tiers: BTreeSet<u64> = self
            .dynamic_min_liquidity_cap_filters_desc
            .iter()
            .map(|f| f.filter_value)
            .collect();
        tiers.insert(self.min_pool_liquidity_cap);
        tiers
    }

    /// Picks the strictest filter whose threshold the given token cap reaches,
    /// falling back to `min_pool_liquidity_cap`.
    pub fn min_liquidity_filter_for(&self, min_tokens_cap: u64) -> u64 {
        self.dynamic_min_liquidity_cap_filters_desc
            .iter()
            .find(|f| min_tokens_cap >= f.min_tokens_cap)
            .map(|f| f.filter_value)
            .unwrap_or(self.min_pool_liquidity_cap)
    }

    pub fn is_preferred(&self, pool_id: u64) -> bool {
        self.preferred_pool_ids.contains(&pool_id)
    }
}

pub fn validate_dynamic_min_liquidity_cap_desc(
    filters: &[DynamicMinLiquidityCapFilterEntry],
) -> Result<()> {
    for pair in filters.windows(2) {
        if pair[0].min_tokens_cap <= pair[1].min_tokens_cap {
            bail!("min_tokens_cap must be in descending order");
        }
        if pair[0].filter_value < pair[1].filter_value {
            bail!("filter_value must be in descending order");
        }
    }
    Ok(())
}

/// Whitelisted CosmWasm code IDs by pool role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmWasmPoolConfig {
    pub transmuter_code_ids: Vec<u64>,
    pub alloyed_transmuter_code_ids: Vec<u64>,
    pub orderbook_code_ids: Vec<u64>,
    /// NOTE: these pools make network requests for every quote
    pub general_cosmwasm_code_ids: Vec<u64>,
}

impl CosmWasmPoolConfig {
    pub fn classify(&self, code_id: u64) -> Option<CosmWasmPoolKind> {
        if self.transmuter_code_ids.contains(&code_id) {
            Some(CosmWasmPoolKind::Transmuter)
        } else if self.alloyed_transmuter_code_ids.contains(&code_id) {
            Some(CosmWasmPoolKind::AlloyedTransmuter)
        } else if self.orderbook_code_ids.contains(&code_id) {
            Some(CosmWasmPoolKind::Orderbook)
        } else if self.general_cosmwasm_code_ids.contains(&code_id) {
            Some(CosmWasmPoolKind::Generalized)
        } else {
            None
        }
    }
}

fn default_overwrite_routes_path() -> PathBuf {
    PathBuf::from("route_overwrites")
}

fn default_ingest_interval_ms() -> u64 {
    1_000
}

fn default_true() -> bool {
    true
}
