// File snapshot provider
// Reads the pool and taker fee snapshot written by the external ingester
// (JSON or YAML, chosen by extension) and builds pools with the reference
// swap capabilities
//
// Numan Thabit 2025 Nov

use crate::config::CosmWasmPoolConfig;
use crate::domain::{CosmWasmPoolKind, Pool, PoolRecord, PoolType, SwapCapability};
use crate::router::taker_fee::TakerFeeEntry;
use crate::state::{BlockPools, PoolProvider};
use crate::tokens::{StaticTokenMetadata, TokenMetadata};
use crate::venues::amm::ConstantProductCurve;
use crate::venues::transmuter::TransmuterCurve;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub height: u64,
    #[serde(default)]
    pub pools: Vec<PoolRecord>,
    #[serde(default)]
    pub taker_fees: Vec<TakerFeeEntry>,
    #[serde(default)]
    pub tokens: Vec<TokenMetadata>,
}

impl SnapshotFile {
    pub async fn read(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("read pool snapshot {}", path.display()))?;
        let yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        let snapshot = if yaml {
            serde_yaml::from_slice(&raw).context("decode yaml pool snapshot")?
        } else {
            serde_json::from_slice(&raw).context("decode json pool snapshot")?
        };
        Ok(snapshot)
    }
}

/// Polls a snapshot file. Every call re-reads it, so the ingester may
/// replace the file between cycles.
#[derive(Debug, Clone)]
pub struct FileSnapshotProvider {
    path: PathBuf,
    cosmwasm: CosmWasmPoolConfig,
}

impl FileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>, cosmwasm: CosmWasmPoolConfig) -> Self {
        Self {
            path: path.into(),
            cosmwasm,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Token list shipped with the snapshot.
    pub async fn token_metadata(&self) -> Result<StaticTokenMetadata> {
        let snapshot = SnapshotFile::read(&self.path).await?;
        Ok(StaticTokenMetadata::new(snapshot.tokens))
    }

    fn build_pool(&self, record: PoolRecord) -> Option<Pool> {
        let capability: Arc<dyn SwapCapability> = match record.pool_type {
            PoolType::ConstantProduct => Arc::new(ConstantProductCurve::from_record(&record)),
            PoolType::CosmWasm { code_id, .. } => match self.cosmwasm.classify(code_id) {
                Some(CosmWasmPoolKind::Transmuter | CosmWasmPoolKind::AlloyedTransmuter) => {
                    Arc::new(TransmuterCurve::from_record(&record))
                }
                _ => {
                    warn!(pool_id = record.id, code_id = code_id, "no local swap math for cosmwasm pool; skipping");
                    return None;
                }
            },
            PoolType::StableSwap | PoolType::Concentrated => {
                warn!(pool_id = record.id, kind = record.pool_type.label(), "no local swap math for pool kind; skipping");
                return None;
            }
        };
        Some(Pool::new(record, capability))
    }
}

impl PoolProvider for FileSnapshotProvider {
    async fn get_all_pools(&self) -> Result<BlockPools> {
        let snapshot = SnapshotFile::read(&self.path).await?;
        let total = snapshot.pools.len();
        let pools: Vec<Pool> = snapshot
            .pools
            .into_iter()
            .filter_map(|record| self.build_pool(record))
            .collect();
        debug!(
            height = snapshot.height,
            num_pools = pools.len(),
            num_skipped = total - pools.len(),
            "pool snapshot read"
        );
        Ok(BlockPools {
            height: snapshot.height,
            pools,
            taker_fees: snapshot.taker_fees,
        })
    }

    async fn get_pool(&self, pool_id: u64) -> Result<Option<Pool>> {
        let snapshot = SnapshotFile::read(&self.path).await?;
        Ok(snapshot
            .pools
            .into_iter()
            .find(|p| p.id == pool_id)
            .and_then(|record| self.build_pool(record)))
    }

    fn cosmwasm_pool_config(&self) -> CosmWasmPoolConfig {
        self.cosmwasm.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coin;
    use crate::tokens::TokenMetadataProvider;
    use rust_decimal_macros::dec;

    const YAML: &str = r#"
height: 12
pools:
  - id: 1
    pool_type: { kind: constant_product }
    denoms: [uosmo, uatom]
    balances:
      - { denom: uosmo, amount: 1000 }
      - { denom: uatom, amount: 2000 }
    spread_factor: "0.002"
    liquidity_cap: 500
  - id: 2
    pool_type: { kind: cosm_wasm, code_id: 814, class: transmuter }
    denoms: [usdc.a, usdc.b]
    balances:
      - { denom: usdc.a, amount: 10 }
      - { denom: usdc.b, amount: 10 }
    spread_factor: "0"
    liquidity_cap: 20
  - id: 3
    pool_type: { kind: stable_swap }
    denoms: [usdc.a, usdt]
    spread_factor: "0"
    liquidity_cap: 20
taker_fees:
  - { denom0: uatom, denom1: uosmo, fee: "0.0015" }
tokens:
  - { denom: uosmo, precision: 6 }
"#;

    fn cosmwasm() -> CosmWasmPoolConfig {
        CosmWasmPoolConfig {
            transmuter_code_ids: vec![814],
            ..CosmWasmPoolConfig::default()
        }
    }

    #[tokio::test]
    async fn yaml_snapshot_builds_supported_pools() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pools.yaml");
        std::fs::write(&path, YAML).unwrap();

        let provider = FileSnapshotProvider::new(&path, cosmwasm());
        let block = provider.get_all_pools().await.unwrap();
        assert_eq!(block.height, 12);
        assert_eq!(block.pools.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(block.taker_fees[0].fee, dec!(0.0015));

        let out = block.pools[0]
            .capability()
            .calculate_token_out_by_token_in(&Coin::new("uosmo", 100), "uatom")
            .unwrap();
        assert!(out.amount > 0 && out.amount < 200);

        assert!(provider.get_pool(2).await.unwrap().is_some());
        assert!(provider.get_pool(3).await.unwrap().is_none());
        let tokens = provider.token_metadata().await.unwrap();
        assert_eq!(tokens.precision("uosmo"), Some(6));
    }

    #[tokio::test]
    async fn json_snapshot_round_trips_through_the_writer_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pools.json");
        let snapshot = SnapshotFile {
            height: 3,
            pools: vec![PoolRecord {
                id: 9,
                pool_type: PoolType::ConstantProduct,
                denoms: vec!["a".into(), "b".into()],
                balances: vec![Coin::new("a", 5), Coin::new("b", 5)],
                spread_factor: dec!(0.01),
                liquidity_cap: 10,
            }],
            ..SnapshotFile::default()
        };
        std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();
        assert_eq!(SnapshotFile::read(&path).await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let provider = FileSnapshotProvider::new("/nonexistent/pools.json", cosmwasm());
        assert!(provider.get_all_pools().await.is_err());
    }
}
