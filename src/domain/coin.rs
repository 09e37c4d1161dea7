// Coin and amount arithmetic
// Integer token amounts and the fixed-point helpers used when fees and
// prices are applied to them
//
// Numan Thabit 2025 Nov

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque asset identifier.
pub type Denom = String;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: Denom,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<Denom>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// floor(amount * factor) without going through a lossy float.
/// Returns None for negative factors or on overflow.
pub fn mul_dec_floor(amount: u128, factor: Decimal) -> Option<u128> {
    if factor.is_sign_negative() && !factor.is_zero() {
        return None;
    }
    let factor = factor.normalize();
    let mantissa = u128::try_from(factor.mantissa()).ok()?;
    let scale = 10u128.checked_pow(factor.scale())?;
    match amount.checked_mul(mantissa) {
        Some(product) => Some(product / scale),
        None => {
            // amount = q * scale + r, so amount * m / scale = q * m + r * m / scale
            let whole = (amount / scale).checked_mul(mantissa)?;
            let rest = (amount % scale).checked_mul(mantissa)? / scale;
            whole.checked_add(rest)
        }
    }
}

const DECIMAL_MANTISSA_BITS: u32 = 96;

/// amount as a Decimal, None above 96 bits.
pub fn to_decimal(amount: u128) -> Option<Decimal> {
    Decimal::from_u128(amount)
}

/// numerator / denominator as a Decimal. Zero denominators yield zero.
/// Operands wider than 96 bits are shifted down together, trading low bits
/// of precision for range; None only when the quotient itself is too large.
pub fn ratio(numerator: u128, denominator: u128) -> Option<Decimal> {
    if denominator == 0 {
        return Some(Decimal::ZERO);
    }
    let widest = 128 - numerator.max(denominator).leading_zeros();
    let shift = widest.saturating_sub(DECIMAL_MANTISSA_BITS);
    let (numerator, denominator) = (numerator >> shift, denominator >> shift);
    if denominator == 0 {
        return None;
    }
    to_decimal(numerator)?.checked_div(to_decimal(denominator)?)
}

/// Base-10 order of magnitude, 0 for amounts below 10.
pub fn order_of_magnitude(amount: u128) -> u32 {
    if amount == 0 {
        0
    } else {
        amount.ilog10()
    }
}
