//! Monetary scale rules shared by stored prices and converted prices.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits every stored price carries.
pub const MONEY_SCALE: u32 = 2;

/// Round half-to-even to two fractional digits and pin the scale to exactly two.
///
/// `1000` becomes `1000.00`, `10.125` becomes `10.12`, `10.135` becomes `10.14`.
pub fn to_money_scale(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(MONEY_SCALE);
    rounded
}
