// Token metadata
// Denom validity and decimal precision, used to validate requests and to
// scale spot prices into display units
//
// Numan Thabit 2025 Nov

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub trait TokenMetadataProvider: Send + Sync {
    fn is_valid_denom(&self, denom: &str) -> bool;

    /// Decimal places of the denom's smallest unit, None if unknown.
    fn precision(&self, denom: &str) -> Option<u32>;

    /// Factor converting a raw out-per-in spot price into display units.
    /// One when either precision is unknown.
    fn spot_price_scaling_factor(&self, base_denom: &str, quote_denom: &str) -> Decimal {
        match (self.precision(base_denom), self.precision(quote_denom)) {
            (Some(base), Some(quote)) if base >= quote => {
                Decimal::from(10u64.saturating_pow(base - quote))
            }
            (Some(base), Some(quote)) => Decimal::ONE / Decimal::from(10u64.saturating_pow(quote - base)),
            _ => Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub denom: String,
    pub precision: u32,
}

/// Fixed token list, typically loaded alongside the pool snapshot.
/// With an empty list every denom is accepted.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenMetadata {
    tokens: HashMap<String, u32>,
}

impl StaticTokenMetadata {
    pub fn new(tokens: impl IntoIterator<Item = TokenMetadata>) -> Self {
        Self {
            tokens: tokens.into_iter().map(|t| (t.denom, t.precision)).collect(),
        }
    }
}

impl TokenMetadataProvider for StaticTokenMetadata {
    fn is_valid_denom(&self, denom: &str) -> bool {
        self.tokens.is_empty() || self.tokens.contains_key(denom)
    }

    fn precision(&self, denom: &str) -> Option<u32> {
        self.tokens.get(denom).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tokens() -> StaticTokenMetadata {
        StaticTokenMetadata::new([
            TokenMetadata {
                denom: "weth".into(),
                precision: 18,
            },
            TokenMetadata {
                denom: "uusdc".into(),
                precision: 6,
            },
        ])
    }

    #[test]
    fn scaling_follows_precision_difference() {
        let t = tokens();
        assert_eq!(t.spot_price_scaling_factor("weth", "uusdc"), dec!(1_000_000_000_000));
        assert_eq!(t.spot_price_scaling_factor("uusdc", "weth"), dec!(0.000000000001));
        assert_eq!(t.spot_price_scaling_factor("uusdc", "unknown"), Decimal::ONE);
    }

    #[test]
    fn unknown_denoms_are_invalid_once_a_list_exists() {
        assert!(!tokens().is_valid_denom("unknown"));
        assert!(StaticTokenMetadata::default().is_valid_denom("unknown"));
    }
}
