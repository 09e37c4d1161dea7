// Transmuter venue capability
// 1:1 conversion between equivalent assets, bounded by the output balance
//
// Numan Thabit 2025 Nov

use crate::domain::{Coin, PoolRecord, SwapCapability};
use crate::errors::PoolError;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct TransmuterCurve {
    pool_id: u64,
    balances: Vec<Coin>,
}

impl TransmuterCurve {
    pub fn new(pool_id: u64, balances: Vec<Coin>) -> Self {
        Self { pool_id, balances }
    }

    pub fn from_record(record: &PoolRecord) -> Self {
        Self::new(record.id, record.balances.clone())
    }

    fn balance(&self, denom: &str) -> Result<u128, PoolError> {
        self.balances
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount)
            .ok_or_else(|| PoolError::DenomNotInPool {
                pool_id: self.pool_id,
                denom: denom.to_string(),
            })
    }
}

impl SwapCapability for TransmuterCurve {
    fn calculate_token_out_by_token_in(
        &self,
        token_in: &Coin,
        token_out_denom: &str,
    ) -> Result<Coin, PoolError> {
        self.balance(&token_in.denom)?;
        let available = self.balance(token_out_denom)?;
        if token_in.amount > available {
            return Err(PoolError::InsufficientLiquidity {
                pool_id: self.pool_id,
                denom: token_out_denom.to_string(),
            });
        }
        Ok(Coin::new(token_out_denom, token_in.amount))
    }

    fn calc_spot_price(&self, base_denom: &str, quote_denom: &str) -> Result<Decimal, PoolError> {
        self.balance(base_denom)?;
        self.balance(quote_denom)?;
        Ok(Decimal::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_one_to_one_until_drained() {
        let t = TransmuterCurve::new(4, vec![Coin::new("usdc.a", 50), Coin::new("usdc.b", 100)]);
        let out = t
            .calculate_token_out_by_token_in(&Coin::new("usdc.b", 50), "usdc.a")
            .unwrap();
        assert_eq!(out, Coin::new("usdc.a", 50));
        assert!(t
            .calculate_token_out_by_token_in(&Coin::new("usdc.b", 51), "usdc.a")
            .is_err());
    }
}
