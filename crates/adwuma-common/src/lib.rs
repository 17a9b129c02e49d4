//! # Adwuma Common
//!
//! Shared types, errors, and fee computation for the Adwuma marketplace
//! settlement core.
//!
//! ## Core Types
//!
//! - [`Actor`]/[`ActorRole`]: authenticated caller identity and role
//! - [`PaymentProvider`]: payment rails with processing-fee rates
//! - [`FeeCalculator`]/[`FeeBreakdown`]: deterministic fee split
//! - [`AdwumaError`]: unified error taxonomy across the workspace

pub mod error;
pub mod fees;
pub mod money;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{AdwumaError, EscrowError, GatewayError, PayoutError, Result, TaskError};
pub use fees::{FeeBreakdown, FeeCalculator, PLATFORM_FEE_RATE};
pub use types::{Actor, ActorRole, PaymentMethodRef, PaymentProvider, ProviderKind};

/// Adwuma version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum gross price a task may be posted at, in GHS
pub const MIN_TASK_PRICE: rust_decimal::Decimal = rust_decimal_macros::dec!(10);

/// Default minimum payout a tasker may request, in GHS
pub const DEFAULT_MIN_PAYOUT: rust_decimal::Decimal = rust_decimal_macros::dec!(20);

/// Default timeout applied to payment-gateway calls
pub const DEFAULT_GATEWAY_TIMEOUT_MS: u64 = 10_000;
