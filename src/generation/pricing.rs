use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::generation::templates::template_for;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PricingStrategy {
    /// Use a price read out of the frame when one exists; otherwise fall
    /// back to market synthesis.
    Extracted,
    Budget,
    Market,
    Premium,
}

impl PricingStrategy {
    pub fn multiplier(&self) -> f64 {
        match self {
            PricingStrategy::Budget => 0.8,
            PricingStrategy::Extracted | PricingStrategy::Market => 1.0,
            PricingStrategy::Premium => 1.3,
        }
    }
}

impl Default for PricingStrategy {
    fn default() -> Self {
        PricingStrategy::Extracted
    }
}

/// Draw a price from the category's range, scale it by the strategy, and
/// round to a psychological ending (…9 in INR).
pub fn synthesize_price<R: Rng>(category: &str, strategy: PricingStrategy, rng: &mut R) -> f64 {
    let (low, high) = template_for(category).price_range;
    let raw = rng.gen_range(low..high) * strategy.multiplier();
    psychological_ending(raw)
}

/// Round to the nearest "charm" price: 1_532 -> 1_499, 212 -> 209, 46 -> 49.
pub fn psychological_ending(value: f64) -> f64 {
    let step = if value >= 1_000.0 { 100.0 } else { 10.0 };
    let rounded = (value / step).round() * step - 1.0;
    rounded.max(step - 1.0)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn charm_rounding_ends_in_nine() {
        assert_eq!(psychological_ending(1_532.0), 1_499.0);
        assert_eq!(psychological_ending(212.0), 209.0);
        assert_eq!(psychological_ending(46.0), 49.0);
        assert_eq!(psychological_ending(2.0), 9.0);
    }

    #[test]
    fn synthesized_prices_stay_near_the_category_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let (low, high) = template_for("apparel").price_range;
        for _ in 0..100 {
            let price = synthesize_price("apparel", PricingStrategy::Premium, &mut rng);
            assert!(price >= psychological_ending(low * 1.3) - 100.0);
            assert!(price <= psychological_ending(high * 1.3) + 100.0);
            let as_int = price as i64;
            assert_eq!(as_int % 10, 9, "price {price} lacks a charm ending");
        }
    }

    #[test]
    fn budget_multiplier_undercuts_premium() {
        assert!(PricingStrategy::Budget.multiplier() < PricingStrategy::Premium.multiplier());
        assert_eq!(PricingStrategy::Extracted.multiplier(), 1.0);
    }
}
