//! Fee computation
//!
//! Pure and deterministic: no I/O, no clock. Both the escrow ledger and any
//! fee-preview surface compute through the same schedule so the figures a
//! client is shown are the figures settlement applies.
//!
//! ```text
//! platform_fee   = round(gross * 0.10, 2)        half-up
//! processing_fee = round(gross * rate(rail), 2)  half-up
//! net            = gross - platform_fee - processing_fee
//! ```

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::money::round_half_up;
use crate::types::provider::PaymentProvider;

/// Platform commission retained by the marketplace operator
pub const PLATFORM_FEE_RATE: Decimal = dec!(0.10);

/// Fee split for a gross task price over a given rail
///
/// Conservation holds by construction: `net` is the exact remainder after
/// the two rounded fees, so `gross == platform_fee + processing_fee + net`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub gross: Decimal,
    pub platform_fee: Decimal,
    pub processing_fee: Decimal,
    pub net: Decimal,
}

impl FeeBreakdown {
    /// Check the conservation identity
    pub fn is_conserved(&self) -> bool {
        self.platform_fee + self.processing_fee + self.net == self.gross
    }
}

/// Computes the platform fee, processing fee, and net payable amount
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeCalculator;

impl FeeCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Platform commission for a gross amount
    pub fn platform_fee(&self, gross: Decimal) -> Decimal {
        round_half_up(gross * PLATFORM_FEE_RATE)
    }

    /// Provider processing fee for a gross amount
    pub fn processing_fee(&self, gross: Decimal, provider: PaymentProvider) -> Decimal {
        round_half_up(gross * provider.processing_rate())
    }

    /// Net amount payable to the tasker after both fees
    pub fn net_amount(&self, gross: Decimal, provider: PaymentProvider) -> Decimal {
        gross - self.platform_fee(gross) - self.processing_fee(gross, provider)
    }

    /// Full fee split for a gross amount over a provider rail
    pub fn breakdown(&self, gross: Decimal, provider: PaymentProvider) -> FeeBreakdown {
        let platform_fee = self.platform_fee(gross);
        let processing_fee = self.processing_fee(gross, provider);
        FeeBreakdown {
            gross,
            platform_fee,
            processing_fee,
            net: gross - platform_fee - processing_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_money_scenario() {
        // 150.00 GHS over MTN MoMo: 15.00 platform, 2.25 processing, 132.75 net
        let calc = FeeCalculator::new();
        let fees = calc.breakdown(dec!(150.00), PaymentProvider::MtnMomo);

        assert_eq!(fees.platform_fee, dec!(15.00));
        assert_eq!(fees.processing_fee, dec!(2.25));
        assert_eq!(fees.net, dec!(132.75));
        assert!(fees.is_conserved());
    }

    #[test]
    fn test_card_scenario() {
        let calc = FeeCalculator::new();
        let fees = calc.breakdown(dec!(100.00), PaymentProvider::Flutterwave);

        assert_eq!(fees.platform_fee, dec!(10.00));
        assert_eq!(fees.processing_fee, dec!(4.00));
        assert_eq!(fees.net, dec!(86.00));
    }

    #[test]
    fn test_rounding_half_up() {
        // 33.33 * 3.5% = 1.16655 -> 1.17
        let calc = FeeCalculator::new();
        let fees = calc.breakdown(dec!(33.33), PaymentProvider::Paystack);

        assert_eq!(fees.processing_fee, dec!(1.17));
        assert!(fees.is_conserved());
    }

    #[test]
    fn test_conservation_across_awkward_amounts() {
        let calc = FeeCalculator::new();
        for gross in [dec!(10.01), dec!(19.99), dec!(0.05), dec!(1234.56)] {
            for provider in [
                PaymentProvider::Paystack,
                PaymentProvider::Flutterwave,
                PaymentProvider::MtnMomo,
                PaymentProvider::GhBank,
            ] {
                let fees = calc.breakdown(gross, provider);
                assert!(fees.is_conserved(), "drift at {gross} via {provider}");
            }
        }
    }

    #[test]
    fn test_net_matches_breakdown() {
        let calc = FeeCalculator::new();
        let gross = dec!(87.50);
        let provider = PaymentProvider::VodafoneCash;
        assert_eq!(
            calc.net_amount(gross, provider),
            calc.breakdown(gross, provider).net
        );
    }
}
