use num_bigint::BigUint;
use num_traits::Zero;
use serde::Serialize;

use crate::oracle::{RateQuotes, RateSource};

/// A present quote, ready for display or for building a swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedRate {
    pub source: RateSource,
    pub rate: BigUint,
}

/// Present quotes, highest rate first.
///
/// Absent quotes are dropped; zero quotes are kept and sort last. Ties keep
/// `RateSource::ALL` order.
pub fn rank_rates(quotes: &RateQuotes) -> Vec<RankedRate> {
    let mut ranked: Vec<RankedRate> = quotes
        .iter()
        .filter_map(|(source, rate)| {
            rate.map(|rate| RankedRate {
                source,
                rate: rate.clone(),
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.rate.cmp(&a.rate));
    ranked
}

/// The highest quote, if any source answered.
pub fn best_rate(ranked: &[RankedRate]) -> Option<&RankedRate> {
    ranked.first()
}

/// Whether a swap can be priced: the best quote exists and is non-zero.
pub fn has_usable_rate(ranked: &[RankedRate]) -> bool {
    best_rate(ranked).is_some_and(|best| !best.rate.is_zero())
}
