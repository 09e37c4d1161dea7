// Pool model
// Pool kinds as a sum type, the narrow swap capability every pool kind
// implements, and the serializable pool record used for snapshots
//
// Numan Thabit 2025 Nov

use crate::domain::coin::{mul_dec_floor, Coin, Denom};
use crate::errors::PoolError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Role of a CosmWasm pool, resolved from its code ID at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CosmWasmPoolKind {
    Transmuter,
    AlloyedTransmuter,
    Orderbook,
    /// Quotes require a network call to the chain.
    Generalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PoolType {
    ConstantProduct,
    StableSwap,
    Concentrated,
    CosmWasm { code_id: u64, class: CosmWasmPoolKind },
}

impl PoolType {
    pub fn code_id(&self) -> Option<u64> {
        match self {
            PoolType::CosmWasm { code_id, .. } => Some(*code_id),
            _ => None,
        }
    }

    pub fn is_generalized_cosmwasm(&self) -> bool {
        matches!(
            self,
            PoolType::CosmWasm {
                class: CosmWasmPoolKind::Generalized,
                ..
            }
        )
    }

    pub fn is_orderbook(&self) -> bool {
        matches!(
            self,
            PoolType::CosmWasm {
                class: CosmWasmPoolKind::Orderbook,
                ..
            }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            PoolType::ConstantProduct => "constant_product",
            PoolType::StableSwap => "stableswap",
            PoolType::Concentrated => "concentrated",
            PoolType::CosmWasm { class, .. } => match class {
                CosmWasmPoolKind::Transmuter => "cosmwasm_transmuter",
                CosmWasmPoolKind::AlloyedTransmuter => "cosmwasm_alloyed_transmuter",
                CosmWasmPoolKind::Orderbook => "cosmwasm_orderbook",
                CosmWasmPoolKind::Generalized => "cosmwasm_generalized",
            },
        }
    }
}

/// Swap math of a single pool. Implementations are pure functions of the
/// pool state they were built from.
pub trait SwapCapability: Send + Sync + fmt::Debug {
    /// Output of swapping `token_in` for `token_out_denom`, spread factor included.
    fn calculate_token_out_by_token_in(
        &self,
        token_in: &Coin,
        token_out_denom: &str,
    ) -> Result<Coin, PoolError>;

    /// Pre-trade price of `base_denom` quoted in `quote_denom`.
    fn calc_spot_price(&self, base_denom: &str, quote_denom: &str) -> Result<Decimal, PoolError>;

    /// Deducts the protocol taker fee from the input.
    fn charge_taker_fee_exact_in(&self, token_in: &Coin, taker_fee: Decimal) -> Result<Coin, PoolError> {
        let retained = Decimal::ONE - taker_fee;
        let amount = mul_dec_floor(token_in.amount, retained).ok_or(PoolError::Overflow { pool_id: 0 })?;
        Ok(Coin::new(token_in.denom.clone(), amount))
    }
}

/// One liquidity venue within a snapshot generation. Immutable once built.
#[derive(Debug, Clone)]
pub struct Pool {
    pub id: u64,
    pub pool_type: PoolType,
    pub denoms: Vec<Denom>,
    pub balances: Vec<Coin>,
    pub spread_factor: Decimal,
    /// USD-normalized pool value.
    pub liquidity_cap: u64,
    capability: Arc<dyn SwapCapability>,
}

impl Pool {
    pub fn new(
        record: PoolRecord,
        capability: Arc<dyn SwapCapability>,
    ) -> Self {
        Self {
            id: record.id,
            pool_type: record.pool_type,
            denoms: record.denoms,
            balances: record.balances,
            spread_factor: record.spread_factor,
            liquidity_cap: record.liquidity_cap,
            capability,
        }
    }

    pub fn has_denom(&self, denom: &str) -> bool {
        self.denoms.iter().any(|d| d == denom)
    }

    pub fn capability(&self) -> &dyn SwapCapability {
        self.capability.as_ref()
    }

    pub fn record(&self) -> PoolRecord {
        PoolRecord {
            id: self.id,
            pool_type: self.pool_type,
            denoms: self.denoms.clone(),
            balances: self.balances.clone(),
            spread_factor: self.spread_factor,
            liquidity_cap: self.liquidity_cap,
        }
    }
}

/// Serializable pool state, as written by the ingester and the debug dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub id: u64,
    pub pool_type: PoolType,
    pub denoms: Vec<Denom>,
    #[serde(default)]
    pub balances: Vec<Coin>,
    pub spread_factor: Decimal,
    pub liquidity_cap: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[derive(Debug)]
    struct Flat;

    impl SwapCapability for Flat {
        fn calculate_token_out_by_token_in(&self, token_in: &Coin, out: &str) -> Result<Coin, PoolError> {
            Ok(Coin::new(out, token_in.amount))
        }

        fn calc_spot_price(&self, _: &str, _: &str) -> Result<Decimal, PoolError> {
            Ok(Decimal::ONE)
        }
    }

    #[test]
    fn default_taker_fee_charge_truncates() {
        let charged = Flat
            .charge_taker_fee_exact_in(&Coin::new("uosmo", 1_999), dec!(0.001))
            .unwrap();
        assert_eq!(charged, Coin::new("uosmo", 1_997));
    }

    #[test]
    fn cosmwasm_type_serializes_with_class() {
        let ty = PoolType::CosmWasm {
            code_id: 148,
            class: CosmWasmPoolKind::Generalized,
        };
        let json = serde_json::to_string(&ty).unwrap();
        assert_eq!(json, r#"{"kind":"cosm_wasm","code_id":148,"class":"generalized"}"#);
        assert!(ty.is_generalized_cosmwasm());
        assert_eq!(ty.code_id(), Some(148));
    }
}
