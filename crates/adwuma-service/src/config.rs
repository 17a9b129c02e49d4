//! Service configuration

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use adwuma_common::{DEFAULT_GATEWAY_TIMEOUT_MS, DEFAULT_MIN_PAYOUT};

/// Marketplace service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdwumaConfig {
    /// Minimum payout a tasker may request, in GHS
    pub min_payout: Decimal,
    /// Timeout applied to every payment-gateway call
    pub gateway_timeout_ms: u64,
    /// Notification channel depth for the mpsc sink
    pub notification_buffer: usize,
}

impl Default for AdwumaConfig {
    fn default() -> Self {
        Self {
            min_payout: DEFAULT_MIN_PAYOUT,
            gateway_timeout_ms: DEFAULT_GATEWAY_TIMEOUT_MS,
            notification_buffer: 256,
        }
    }
}

impl AdwumaConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(val) = std::env::var("ADWUMA_MIN_PAYOUT") {
            if let Ok(v) = val.parse() {
                cfg.min_payout = v;
            }
        }
        if let Ok(val) = std::env::var("ADWUMA_GATEWAY_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                cfg.gateway_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("ADWUMA_NOTIFICATION_BUFFER") {
            if let Ok(v) = val.parse() {
                cfg.notification_buffer = v;
            }
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let cfg = AdwumaConfig::default();
        assert_eq!(cfg.min_payout, dec!(20));
        assert_eq!(cfg.gateway_timeout_ms, 10_000);
    }
}
