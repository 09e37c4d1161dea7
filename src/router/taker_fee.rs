// Taker fee repository
// Protocol fees per denom pair. Pairs are stored in canonical order so
// callers never care which side they pass first
//
// Numan Thabit 2025 Nov

use crate::domain::Denom;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Denom pair with `denom0 < denom1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DenomPair {
    pub denom0: Denom,
    pub denom1: Denom,
}

impl DenomPair {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self {
                denom0: a.to_string(),
                denom1: b.to_string(),
            }
        } else {
            Self {
                denom0: b.to_string(),
                denom1: a.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakerFeeEntry {
    pub denom0: Denom,
    pub denom1: Denom,
    pub fee: Decimal,
}

#[derive(Debug, Default)]
pub struct TakerFeeRepository {
    fees: DashMap<DenomPair, Decimal>,
}

impl TakerFeeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = TakerFeeEntry>) -> Self {
        let repo = Self::new();
        for e in entries {
            repo.set_taker_fee(&e.denom0, &e.denom1, e.fee);
        }
        repo
    }

    /// Returns the fee and whether an explicit entry exists.
    pub fn get_taker_fee(&self, denom0: &str, denom1: &str) -> (Decimal, bool) {
        match self.fees.get(&DenomPair::new(denom0, denom1)) {
            Some(fee) => (*fee, true),
            None => (Decimal::ZERO, false),
        }
    }

    /// Fee for the pair, or `default_fee` without an explicit entry.
    pub fn fee_or(&self, denom0: &str, denom1: &str, default_fee: Decimal) -> Decimal {
        match self.get_taker_fee(denom0, denom1) {
            (fee, true) => fee,
            (_, false) => default_fee,
        }
    }

    pub fn set_taker_fee(&self, denom0: &str, denom1: &str, fee: Decimal) {
        self.fees.insert(DenomPair::new(denom0, denom1), fee);
    }

    pub fn len(&self) -> usize {
        self.fees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fees.is_empty()
    }

    /// All entries in canonical order, sorted by pair.
    pub fn entries(&self) -> Vec<TakerFeeEntry> {
        let mut out: Vec<TakerFeeEntry> = self
            .fees
            .iter()
            .map(|kv| TakerFeeEntry {
                denom0: kv.key().denom0.clone(),
                denom1: kv.key().denom1.clone(),
                fee: *kv.value(),
            })
            .collect();
        out.sort_by(|a, b| (&a.denom0, &a.denom1).cmp(&(&b.denom0, &b.denom1)));
        out
    }
}

impl Clone for TakerFeeRepository {
    fn clone(&self) -> Self {
        Self {
            fees: self.fees.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn lookup_is_order_agnostic() {
        let repo = TakerFeeRepository::new();
        repo.set_taker_fee("uosmo", "uatom", dec!(0.002));
        assert_eq!(repo.get_taker_fee("uatom", "uosmo"), (dec!(0.002), true));
        assert_eq!(repo.get_taker_fee("uosmo", "uatom"), (dec!(0.002), true));
        assert_eq!(repo.get_taker_fee("uosmo", "uusdc"), (Decimal::ZERO, false));
        assert_eq!(repo.fee_or("uosmo", "uusdc", dec!(0.001)), dec!(0.001));
    }

    #[test]
    fn writes_replace_the_whole_entry() {
        let repo = TakerFeeRepository::new();
        repo.set_taker_fee("b", "a", dec!(0.003));
        repo.set_taker_fee("a", "b", dec!(0.0015));
        assert_eq!(repo.len(), 1);
        assert_eq!(
            repo.entries(),
            vec![TakerFeeEntry {
                denom0: "a".into(),
                denom1: "b".into(),
                fee: dec!(0.0015)
            }]
        );
    }
}
