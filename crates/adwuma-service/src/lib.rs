//! # Adwuma Service
//!
//! Configuration and the [`Marketplace`] facade: the assembled task
//! lifecycle, escrow ledger, settlement, and payout core behind the
//! operations the (external) UI/API layer consumes.

pub mod config;
pub mod service;
pub mod telemetry;

pub use config::AdwumaConfig;
pub use service::Marketplace;
