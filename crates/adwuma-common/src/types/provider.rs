//! Payment providers and their processing-fee rates
//!
//! Rates are the statutory schedule for the Ghanaian rails the platform
//! settles over: card-network gateways carry the card interchange cost,
//! mobile-money and bank rails the telco/ACH cost.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Payment rail classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    CardNetwork,
    MobileMoney,
    BankTransfer,
}

/// A payment provider the platform can charge or pay out through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentProvider {
    Paystack,
    Flutterwave,
    MtnMomo,
    VodafoneCash,
    AirteltigoMoney,
    GhBank,
}

impl PaymentProvider {
    /// Processing fee rate charged by the provider for moving funds
    pub fn processing_rate(&self) -> Decimal {
        match self {
            PaymentProvider::Paystack => dec!(0.035),
            PaymentProvider::Flutterwave => dec!(0.04),
            PaymentProvider::MtnMomo => dec!(0.015),
            PaymentProvider::VodafoneCash => dec!(0.015),
            PaymentProvider::AirteltigoMoney => dec!(0.015),
            PaymentProvider::GhBank => dec!(0.015),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            PaymentProvider::Paystack | PaymentProvider::Flutterwave => ProviderKind::CardNetwork,
            PaymentProvider::MtnMomo
            | PaymentProvider::VodafoneCash
            | PaymentProvider::AirteltigoMoney => ProviderKind::MobileMoney,
            PaymentProvider::GhBank => ProviderKind::BankTransfer,
        }
    }

    pub fn is_mobile_money(&self) -> bool {
        self.kind() == ProviderKind::MobileMoney
    }
}

impl std::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentProvider::Paystack => "PAYSTACK",
            PaymentProvider::Flutterwave => "FLUTTERWAVE",
            PaymentProvider::MtnMomo => "MTN_MOMO",
            PaymentProvider::VodafoneCash => "VODAFONE_CASH",
            PaymentProvider::AirteltigoMoney => "AIRTELTIGO_MONEY",
            PaymentProvider::GhBank => "GH_BANK",
        };
        f.write_str(s)
    }
}

/// Reference to a stored payment method (card token, wallet number, account)
///
/// The method itself lives with the excluded payments vault; the core only
/// needs the opaque id and the provider rail for fee computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodRef {
    pub id: String,
    pub provider: PaymentProvider,
}

impl PaymentMethodRef {
    pub fn new(id: impl Into<String>, provider: PaymentProvider) -> Self {
        Self {
            id: id.into(),
            provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_money_rate() {
        assert_eq!(PaymentProvider::MtnMomo.processing_rate(), dec!(0.015));
        assert!(PaymentProvider::MtnMomo.is_mobile_money());
    }

    #[test]
    fn test_card_rates() {
        assert_eq!(PaymentProvider::Paystack.processing_rate(), dec!(0.035));
        assert_eq!(PaymentProvider::Flutterwave.processing_rate(), dec!(0.04));
        assert_eq!(PaymentProvider::Paystack.kind(), ProviderKind::CardNetwork);
    }
}
