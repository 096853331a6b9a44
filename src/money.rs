//! Exact decimal money type and the revenue split rule
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// A monetary amount. Wraps [`rust_decimal::Decimal`] so settlement math never
/// touches binary floating point, and so the CBOR form stays exact (encoded as
/// the decimal string).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// `Amount::new(90_000, 2)` is 900.00
    pub fn new(units: i64, scale: u32) -> Self {
        Self(Decimal::new(units, scale))
    }

    pub fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Quantize to 2 decimal places, half-up. All persisted amounts go through
    /// this so ledger totals stay comparable.
    pub fn round2(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Amount {
    type Output = Amount;
    fn mul(self, rhs: Decimal) -> Amount {
        Amount(self.0 * rhs)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Amount)
    }
}

impl<C> minicbor::Encode<C> for Amount {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.0.to_string())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Amount {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let raw = d.str()?;

        Decimal::from_str(raw)
            .map(Amount)
            .map_err(|_| minicbor::decode::Error::message("failed to parse decimal amount"))
    }
}

/// The three shares of one settled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub rider: Amount,
    pub commissioner: Amount,
    pub boss: Amount,
}

impl Split {
    pub fn total(&self) -> Amount {
        self.rider + self.commissioner + self.boss
    }
}

fn rider_rate() -> Decimal {
    Decimal::new(90, 2) // 0.90
}

fn commissioner_rate() -> Decimal {
    Decimal::new(3, 2) // 0.03
}

/// Split a job price between rider, optional commissioner and boss.
///
/// Rider and commissioner shares are quantized half-up; the boss takes the
/// exact remainder so the three shares always sum to the rounded price. For
/// prices with two decimal places that remainder equals the nominal 7% / 10%
/// boss cut.
pub fn split_price(price: Amount, has_commissioner: bool) -> Split {
    let total = price.round2();
    if total <= Amount::ZERO {
        return Split {
            rider: Amount::ZERO,
            commissioner: Amount::ZERO,
            boss: Amount::ZERO,
        };
    }

    let rider = (total * rider_rate()).round2();
    let commissioner = if has_commissioner {
        (total * commissioner_rate()).round2()
    } else {
        Amount::ZERO
    };
    let boss = total - rider - commissioner;

    Split {
        rider,
        commissioner,
        boss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_encoding() {
        let original = Amount::new(123_45, 2);

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Amount = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(Amount::new(125, 3).round2(), Amount::new(13, 2)); // 0.125 -> 0.13
        assert_eq!(Amount::new(124, 3).round2(), Amount::new(12, 2)); // 0.124 -> 0.12
    }

    #[test]
    fn split_with_commissioner() {
        let split = split_price(Amount::new(1000, 0), true);

        assert_eq!(split.rider, Amount::new(900_00, 2));
        assert_eq!(split.commissioner, Amount::new(30_00, 2));
        assert_eq!(split.boss, Amount::new(70_00, 2));
    }

    #[test]
    fn split_without_commissioner() {
        let split = split_price(Amount::new(1000, 0), false);

        assert_eq!(split.rider, Amount::new(900_00, 2));
        assert_eq!(split.commissioner, Amount::ZERO);
        assert_eq!(split.boss, Amount::new(100_00, 2));
    }

    #[test]
    fn split_conserves_small_amounts() {
        for cents in [1i64, 3, 5, 15, 25, 55, 99] {
            let price = Amount::new(cents, 2);
            let split = split_price(price, true);

            assert_eq!(split.total(), price, "leak at {cents} cents");
            assert!(split.boss >= Amount::ZERO);
        }
    }
}
