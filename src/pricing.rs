//! Tiered distance pricing
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::money::Amount;

/// Fare table for the distance based price. The base fare covers the first
/// block; every further full or partial block adds the block fare.
#[derive(Debug, Clone)]
pub struct PricingTable {
    pub base_fare: Amount,
    pub block_fare: Amount,
    pub base_km: Decimal,
    pub block_km: Decimal,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            base_fare: Amount::new(100_00, 2),
            block_fare: Amount::new(50_00, 2),
            base_km: Decimal::from(5),
            block_km: Decimal::from(5),
        }
    }
}

impl PricingTable {
    /// Price for a delivery over the given distance. Monotonic non-decreasing
    /// in distance; a partial block is charged as a full one.
    pub fn quote(&self, distance_km: Decimal) -> Amount {
        if distance_km <= self.base_km {
            return self.base_fare.round2();
        }

        let blocks = ((distance_km - self.base_km) / self.block_km).ceil();

        (self.base_fare + self.block_fare * blocks).round2()
    }
}

/// Distances arrive as free text from the client. Anything unparseable or
/// negative is rejected here and recovered upstream as a zero price.
pub fn parse_distance(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim())
        .ok()
        .filter(|d| !d.is_sign_negative())
}
