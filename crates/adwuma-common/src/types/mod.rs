//! Shared domain types

pub mod actor;
pub mod provider;

pub use actor::{Actor, ActorRole};
pub use provider::{PaymentMethodRef, PaymentProvider, ProviderKind};
