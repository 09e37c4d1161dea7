// AMM venue capability module
// Constant-product (x * y = k) swap math for balancer-style two-asset pools,
// used by the snapshot provider and as a reference curve in tests
//
// Numan Thabit 2025 Nov

use crate::domain::coin::{mul_dec_floor, ratio};
use crate::domain::{Coin, PoolRecord, SwapCapability};
use crate::errors::PoolError;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct ConstantProductCurve {
    pool_id: u64,
    reserves: Vec<Coin>,
    spread_factor: Decimal,
}

impl ConstantProductCurve {
    pub fn new(pool_id: u64, reserves: Vec<Coin>, spread_factor: Decimal) -> Self {
        Self {
            pool_id,
            reserves,
            spread_factor,
        }
    }

    pub fn from_record(record: &PoolRecord) -> Self {
        Self::new(record.id, record.balances.clone(), record.spread_factor)
    }

    fn reserve(&self, denom: &str) -> Result<u128, PoolError> {
        self.reserves
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount)
            .ok_or_else(|| PoolError::DenomNotInPool {
                pool_id: self.pool_id,
                denom: denom.to_string(),
            })
    }
}

impl SwapCapability for ConstantProductCurve {
    fn calculate_token_out_by_token_in(
        &self,
        token_in: &Coin,
        token_out_denom: &str,
    ) -> Result<Coin, PoolError> {
        let reserve_in = self.reserve(&token_in.denom)?;
        let reserve_out = self.reserve(token_out_denom)?;
        if reserve_in == 0 || reserve_out == 0 {
            return Err(PoolError::InsufficientLiquidity {
                pool_id: self.pool_id,
                denom: token_out_denom.to_string(),
            });
        }

        let overflow = PoolError::Overflow {
            pool_id: self.pool_id,
        };
        let amount_in = mul_dec_floor(token_in.amount, Decimal::ONE - self.spread_factor)
            .ok_or_else(|| overflow.clone())?;
        let numerator = reserve_out
            .checked_mul(amount_in)
            .ok_or_else(|| overflow.clone())?;
        let denominator = reserve_in.checked_add(amount_in).ok_or(overflow)?;

        Ok(Coin::new(token_out_denom, numerator / denominator))
    }

    /// Price of one unit of `base_denom` in `quote_denom`: reserve_quote / reserve_base.
    fn calc_spot_price(&self, base_denom: &str, quote_denom: &str) -> Result<Decimal, PoolError> {
        let base = self.reserve(base_denom)?;
        let quote = self.reserve(quote_denom)?;
        if base == 0 {
            return Err(PoolError::InsufficientLiquidity {
                pool_id: self.pool_id,
                denom: base_denom.to_string(),
            });
        }
        ratio(quote, base).ok_or(PoolError::Overflow {
            pool_id: self.pool_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn curve(spread: Decimal) -> ConstantProductCurve {
        ConstantProductCurve::new(
            1,
            vec![Coin::new("ueth", 1_000_000), Coin::new("uusdc", 2_000_000)],
            spread,
        )
    }

    #[test]
    fn output_follows_constant_product() {
        let out = curve(Decimal::ZERO)
            .calculate_token_out_by_token_in(&Coin::new("ueth", 1_000_000), "uusdc")
            .unwrap();
        assert_eq!(out, Coin::new("uusdc", 1_000_000));
    }

    #[test]
    fn spread_is_charged_on_input() {
        // 100 * 0.99 = 99 -> 2_000_000 * 99 / 1_000_099
        let out = curve(dec!(0.01))
            .calculate_token_out_by_token_in(&Coin::new("ueth", 100), "uusdc")
            .unwrap();
        assert_eq!(out.amount, 197);
    }

    #[test]
    fn spot_price_is_reserve_ratio() {
        assert_eq!(curve(Decimal::ZERO).calc_spot_price("ueth", "uusdc").unwrap(), dec!(2));
        assert!(matches!(
            curve(Decimal::ZERO).calc_spot_price("uatom", "uusdc"),
            Err(PoolError::DenomNotInPool { .. })
        ));
    }

    #[test]
    fn empty_reserve_is_insufficient_liquidity() {
        let empty = ConstantProductCurve::new(
            9,
            vec![Coin::new("a", 10), Coin::new("b", 0)],
            Decimal::ZERO,
        );
        assert!(matches!(
            empty.calculate_token_out_by_token_in(&Coin::new("a", 5), "b"),
            Err(PoolError::InsufficientLiquidity { pool_id: 9, .. })
        ));
    }
}
