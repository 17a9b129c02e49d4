//! # Adwuma Payments
//!
//! Gateway-facing half of the settlement core.
//!
//! ## Components
//!
//! - [`PaymentGateway`]: charge / refund / payout against an external
//!   provider, idempotent by reference ([`MockGateway`] for tests,
//!   [`TimeoutGateway`] to bound every call)
//! - [`SettlementProcessor`]: mirrors escrow locks and refunds into
//!   gateway movements without ever unwinding lifecycle state
//! - [`PayoutProcessor`]: per-tasker released-balance aggregation and
//!   reservation-backed payouts
//! - [`Transaction`]: the money-movement record keyed by idempotency
//!   reference

pub mod gateway;
pub mod payout;
pub mod settlement;
pub mod store;
pub mod transaction;

// Re-export commonly used types at crate root
pub use gateway::{GatewayReceipt, MockGateway, MockTransfer, PaymentGateway, TimeoutGateway};
pub use payout::{PayoutProcessor, PayoutRequest};
pub use settlement::SettlementProcessor;
pub use store::{MemoryPaymentStore, PaymentStore};
pub use transaction::{reference_for, Transaction, TransactionKind, TransactionStatus};
