//! Money helpers
//!
//! All amounts are GHS with two decimal places. Rounding is half-up
//! (midpoint away from zero), the convention the fee schedule is defined in.

use rust_decimal::{Decimal, RoundingStrategy};

/// ISO currency code the platform settles in
pub const CURRENCY: &str = "GHS";

/// Decimal places carried by GHS amounts
pub const SCALE: u32 = 2;

/// Round an amount half-up to currency scale
pub fn round_half_up(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether an amount is a valid positive charge amount at currency scale
pub fn is_valid_amount(amount: Decimal) -> bool {
    amount > Decimal::ZERO && amount == round_half_up(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(dec!(2.245)), dec!(2.25));
        assert_eq!(round_half_up(dec!(2.244)), dec!(2.24));
        assert_eq!(round_half_up(dec!(15.005)), dec!(15.01));
    }

    #[test]
    fn test_valid_amount() {
        assert!(is_valid_amount(dec!(10.00)));
        assert!(!is_valid_amount(dec!(0)));
        assert!(!is_valid_amount(dec!(-5)));
        assert!(!is_valid_amount(dec!(10.001)));
    }
}
